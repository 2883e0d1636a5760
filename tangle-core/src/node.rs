use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::Error;

/// Identity of a node, unique within one serialization session.
///
/// Assigned in depth-first visitation order starting at 1. Zero is reserved
/// for the "no data" node produced by decoding an empty document.
pub type RefId = u64;

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Pointer,
    Sequence,
    Mapping,
    Struct,
    Reference,
}

impl Kind {
    /// Every kind, in declaration order.
    pub const ALL: [Kind; 18] = [
        Kind::Null,
        Kind::Bool,
        Kind::Int8,
        Kind::Int16,
        Kind::Int32,
        Kind::Int64,
        Kind::Uint8,
        Kind::Uint16,
        Kind::Uint32,
        Kind::Uint64,
        Kind::Float32,
        Kind::Float64,
        Kind::String,
        Kind::Pointer,
        Kind::Sequence,
        Kind::Mapping,
        Kind::Struct,
        Kind::Reference,
    ];

    /// Returns the wire discriminator for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int8 => "int8",
            Kind::Int16 => "int16",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Uint8 => "uint8",
            Kind::Uint16 => "uint16",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::String => "string",
            Kind::Pointer => "ptr",
            Kind::Sequence => "slice",
            Kind::Mapping => "map",
            Kind::Struct => "struct",
            Kind::Reference => "ref",
        }
    }

    /// Returns true for kinds whose payload is a single literal.
    pub fn is_scalar(self) -> bool {
        !matches!(
            self,
            Kind::Null
                | Kind::Pointer
                | Kind::Sequence
                | Kind::Mapping
                | Kind::Struct
                | Kind::Reference
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidKind(s.to_string()))
    }
}

/// A literal payload. The variant fixes the numeric width.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
}

impl Scalar {
    /// Returns the kind matching this literal's width.
    pub fn kind(&self) -> Kind {
        match self {
            Scalar::Bool(_) => Kind::Bool,
            Scalar::I8(_) => Kind::Int8,
            Scalar::I16(_) => Kind::Int16,
            Scalar::I32(_) => Kind::Int32,
            Scalar::I64(_) => Kind::Int64,
            Scalar::U8(_) => Kind::Uint8,
            Scalar::U16(_) => Kind::Uint16,
            Scalar::U32(_) => Kind::Uint32,
            Scalar::U64(_) => Kind::Uint64,
            Scalar::F32(_) => Kind::Float32,
            Scalar::F64(_) => Kind::Float64,
            Scalar::String(_) => Kind::String,
        }
    }
}

macro_rules! impl_scalar_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Scalar {
            fn from(value: $t) -> Self {
                Scalar::$variant(value)
            }
        }
    };
}

impl_scalar_from!(bool, Bool);
impl_scalar_from!(i8, I8);
impl_scalar_from!(i16, I16);
impl_scalar_from!(i32, I32);
impl_scalar_from!(i64, I64);
impl_scalar_from!(u8, U8);
impl_scalar_from!(u16, U16);
impl_scalar_from!(u32, U32);
impl_scalar_from!(u64, U64);
impl_scalar_from!(f32, F32);
impl_scalar_from!(f64, F64);
impl_scalar_from!(String, String);

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

/// Kind-dependent content of a [`Node`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Null,
    Scalar(Scalar),
    /// A pointer or optional. `None` is the nil pointer.
    Pointer(Option<Box<Node>>),
    Sequence(Vec<Node>),
    /// String-keyed mapping. Key order carries no meaning.
    Mapping(IndexMap<String, Node>),
    /// Named fields of a struct-like aggregate.
    Struct(IndexMap<String, Node>),
    /// Placeholder for an already-visited object, holding its RefId.
    Reference(RefId),
}

impl Payload {
    /// Returns the kind this payload encodes.
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Null => Kind::Null,
            Payload::Scalar(scalar) => scalar.kind(),
            Payload::Pointer(_) => Kind::Pointer,
            Payload::Sequence(_) => Kind::Sequence,
            Payload::Mapping(_) => Kind::Mapping,
            Payload::Struct(_) => Kind::Struct,
            Payload::Reference(_) => Kind::Reference,
        }
    }
}

/// One element of the acyclic intermediate tree.
///
/// The kind is derived from the payload, so a node can never declare one
/// kind while carrying the payload of another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    ref_id: RefId,
    payload: Payload,
}

impl Node {
    pub fn new(ref_id: RefId, payload: Payload) -> Self {
        Node { ref_id, payload }
    }

    pub fn null(ref_id: RefId) -> Self {
        Node::new(ref_id, Payload::Null)
    }

    pub fn scalar(ref_id: RefId, value: impl Into<Scalar>) -> Self {
        Node::new(ref_id, Payload::Scalar(value.into()))
    }

    pub fn pointer(ref_id: RefId, target: Option<Node>) -> Self {
        Node::new(ref_id, Payload::Pointer(target.map(Box::new)))
    }

    pub fn sequence(ref_id: RefId, items: Vec<Node>) -> Self {
        Node::new(ref_id, Payload::Sequence(items))
    }

    pub fn mapping(ref_id: RefId, entries: impl IntoIterator<Item = (String, Node)>) -> Self {
        Node::new(ref_id, Payload::Mapping(entries.into_iter().collect()))
    }

    pub fn structure(ref_id: RefId, fields: impl IntoIterator<Item = (String, Node)>) -> Self {
        Node::new(ref_id, Payload::Struct(fields.into_iter().collect()))
    }

    pub fn reference(ref_id: RefId, target: RefId) -> Self {
        Node::new(ref_id, Payload::Reference(target))
    }

    pub fn ref_id(&self) -> RefId {
        self.ref_id
    }

    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_parts(mut self) -> (RefId, Payload) {
        (self.ref_id, std::mem::take(&mut self.payload))
    }

    /// Returns true for the zero node that stands for "no data".
    pub fn is_empty(&self) -> bool {
        self.ref_id == 0 && self.payload == Payload::Null
    }

    /// Counts this node and all of its descendants.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            match &node.payload {
                Payload::Pointer(Some(inner)) => pending.push(inner.as_ref()),
                Payload::Sequence(items) => pending.extend(items),
                Payload::Mapping(entries) | Payload::Struct(entries) => {
                    pending.extend(entries.values())
                }
                _ => {}
            }
        }
        count
    }
}

/// Descendants are released one level at a time, so dropping a deep tree
/// does not recurse.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(&mut self.payload, &mut pending);
        while let Some(mut node) = pending.pop() {
            detach_children(&mut node.payload, &mut pending);
        }
    }
}

fn detach_children(payload: &mut Payload, pending: &mut Vec<Node>) {
    match payload {
        Payload::Pointer(target) => pending.extend(target.take().map(|inner| *inner)),
        Payload::Sequence(items) => pending.append(items),
        Payload::Mapping(entries) | Payload::Struct(entries) => {
            pending.extend(entries.drain(..).map(|(_, child)| child))
        }
        _ => {}
    }
}
