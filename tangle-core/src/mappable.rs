use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::mpsc::{Receiver, Sender, SyncSender};

use indexmap::IndexMap;

use crate::error::Error;
use crate::mapper::SerializationSession;
use crate::materializer::MaterializationSession;
use crate::node::{Kind, Node, RefId, Scalar};
use crate::resolver::{NodeRef, NodeView};
use crate::shared::Shared;
use crate::stack;

/// One named field of a struct shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    /// Rust field name.
    pub name: &'static str,
    /// Key used in the tree.
    pub key: &'static str,
    /// Excluded from serialization and materialization.
    pub skip: bool,
}

/// The static shape of a mappable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Null,
    Scalar(Kind),
    Pointer,
    Sequence,
    Mapping,
    Struct(&'static [FieldDesc]),
    /// A kind the codec refuses, named the way errors report it.
    Unsupported(&'static str),
}

impl Shape {
    /// The node kind values of this shape serialize to, if supported.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Shape::Null => Some(Kind::Null),
            Shape::Scalar(kind) => Some(*kind),
            Shape::Pointer => Some(Kind::Pointer),
            Shape::Sequence => Some(Kind::Sequence),
            Shape::Mapping => Some(Kind::Mapping),
            Shape::Struct(_) => Some(Kind::Struct),
            Shape::Unsupported(_) => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Shape::Pointer)
    }

    pub fn fields(&self) -> &'static [FieldDesc] {
        match self {
            Shape::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// Finds the non-skipped field serialized under `key`.
    pub fn field(&self, key: &str) -> Option<&'static FieldDesc> {
        self.fields()
            .iter()
            .find(|field| !field.skip && field.key == key)
    }
}

/// A value the codec can turn into a node tree and back.
///
/// Implemented here for scalars, containers and [`Shared`]; derive it for
/// named structs and unit enums with `#[derive(Mappable)]`.
pub trait Mappable: Sized {
    const SHAPE: Shape;

    /// True when a pointer node without a target is a valid value.
    const NULLABLE: bool = false;

    /// Emits this value's node, assigning RefIds from `session`.
    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error>;

    /// Builds a value from `node`.
    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error>;

    /// Fails if this value could not be serialized because of its kind.
    ///
    /// Called for skipped struct fields, which are never visited.
    fn check_supported(&self) -> Result<(), Error> {
        match Self::SHAPE {
            Shape::Unsupported(kind) => Err(Error::UnsupportedKind(kind)),
            _ => Ok(()),
        }
    }
}

macro_rules! impl_mappable_scalar {
    ($t:ty, $variant:ident, $kind:ident) => {
        impl Mappable for $t {
            const SHAPE: Shape = Shape::Scalar(Kind::$kind);

            fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
                Ok(Node::scalar(session.next_ref_id(), self.clone()))
            }

            fn from_node(
                node: NodeRef<'_>,
                _session: &mut MaterializationSession,
            ) -> Result<Self, Error> {
                match node.scalar() {
                    Some(Scalar::$variant(value)) => Ok(value.clone()),
                    _ => Err(node.unexpected(Kind::$kind)),
                }
            }
        }
    };
}

impl_mappable_scalar!(bool, Bool, Bool);
impl_mappable_scalar!(i8, I8, Int8);
impl_mappable_scalar!(i16, I16, Int16);
impl_mappable_scalar!(i32, I32, Int32);
impl_mappable_scalar!(i64, I64, Int64);
impl_mappable_scalar!(u8, U8, Uint8);
impl_mappable_scalar!(u16, U16, Uint16);
impl_mappable_scalar!(u32, U32, Uint32);
impl_mappable_scalar!(u64, U64, Uint64);
impl_mappable_scalar!(f32, F32, Float32);
impl_mappable_scalar!(f64, F64, Float64);
impl_mappable_scalar!(String, String, String);

impl Mappable for () {
    const SHAPE: Shape = Shape::Null;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        Ok(Node::null(session.next_ref_id()))
    }

    fn from_node(node: NodeRef<'_>, _session: &mut MaterializationSession) -> Result<Self, Error> {
        match node.view() {
            NodeView::Null => Ok(()),
            _ => Err(node.unexpected(Kind::Null)),
        }
    }
}

fn nil_pointer() -> Error {
    Error::InvalidValue {
        kind: Kind::Pointer,
        value: "null".to_string(),
    }
}

/// An owned, non-shared pointer. Never deduplicated.
impl<T: Mappable> Mappable for Box<T> {
    const SHAPE: Shape = Shape::Pointer;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        let ref_id = session.next_ref_id();
        let inner = self.as_ref().to_node(session)?;
        Ok(Node::pointer(ref_id, Some(inner)))
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        match node.view() {
            NodeView::Pointer(Some(inner)) => Ok(Box::new(T::from_node(inner, session)?)),
            NodeView::Pointer(None) => Err(nil_pointer()),
            _ => Err(node.unexpected(Kind::Pointer)),
        }
    }

    fn check_supported(&self) -> Result<(), Error> {
        self.as_ref().check_supported()
    }
}

/// A nullable pointer. `None` is a pointer node without a target.
///
/// When `T` is a pointer that is never nil, `Some` reuses `T`'s pointer node
/// rather than nesting a second one. A nullable `T` keeps its own node so
/// `Some(None)` survives.
impl<T: Mappable> Mappable for Option<T> {
    const SHAPE: Shape = Shape::Pointer;
    const NULLABLE: bool = true;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        match self {
            None => Ok(Node::pointer(session.next_ref_id(), None)),
            Some(value) if flattens::<T>() => value.to_node(session),
            Some(value) => {
                let ref_id = session.next_ref_id();
                let inner = value.to_node(session)?;
                Ok(Node::pointer(ref_id, Some(inner)))
            }
        }
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        match node.view() {
            NodeView::Null | NodeView::Pointer(None) => Ok(None),
            _ if flattens::<T>() => T::from_node(node, session).map(Some),
            NodeView::Pointer(Some(inner)) => T::from_node(inner, session).map(Some),
            _ => Err(node.unexpected(Kind::Pointer)),
        }
    }

    fn check_supported(&self) -> Result<(), Error> {
        match self {
            Some(value) => value.check_supported(),
            None => match T::SHAPE {
                Shape::Unsupported(kind) => Err(Error::UnsupportedKind(kind)),
                _ => Ok(()),
            },
        }
    }
}

fn flattens<T: Mappable>() -> bool {
    T::SHAPE.is_pointer() && !T::NULLABLE
}

impl<T: Mappable> Mappable for Vec<T> {
    const SHAPE: Shape = Shape::Sequence;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        let ref_id = session.next_ref_id();
        let items = self
            .iter()
            .map(|item| item.to_node(session))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Node::sequence(ref_id, items))
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        let NodeView::Sequence(children) = node.view() else {
            return Err(node.unexpected(Kind::Sequence));
        };
        children
            .iter()
            .map(|child| T::from_node(child, session))
            .collect()
    }
}

fn mapping_node<'a, V: Mappable + 'a>(
    entries: impl Iterator<Item = (&'a String, &'a V)>,
    session: &mut SerializationSession,
) -> Result<Node, Error> {
    let ref_id = session.next_ref_id();
    let mut nodes = IndexMap::new();
    for (key, value) in entries {
        nodes.insert(key.clone(), value.to_node(session)?);
    }
    Ok(Node::mapping(ref_id, nodes))
}

fn mapping_entries<V: Mappable, C: FromIterator<(String, V)>>(
    node: NodeRef<'_>,
    session: &mut MaterializationSession,
) -> Result<C, Error> {
    let NodeView::Mapping(fields) = node.view() else {
        return Err(node.unexpected(Kind::Mapping));
    };
    fields
        .iter()
        .map(|(key, child)| V::from_node(child, session).map(|value| (key.to_string(), value)))
        .collect()
}

/// Entries are emitted in key order so the output does not depend on the
/// hasher.
impl<V: Mappable, S: BuildHasher + Default> Mappable for HashMap<String, V, S> {
    const SHAPE: Shape = Shape::Mapping;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        mapping_node(entries.into_iter(), session)
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        mapping_entries(node, session)
    }
}

impl<V: Mappable> Mappable for BTreeMap<String, V> {
    const SHAPE: Shape = Shape::Mapping;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        mapping_node(self.iter(), session)
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        mapping_entries(node, session)
    }
}

impl<V: Mappable, S: BuildHasher + Default> Mappable for IndexMap<String, V, S> {
    const SHAPE: Shape = Shape::Mapping;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        mapping_node(self.iter(), session)
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        mapping_entries(node, session)
    }
}

/// The only identity-bearing value. The first visit emits a pointer node
/// and registers the object; later visits emit references to it.
impl<T: Mappable + Default + 'static> Mappable for Shared<T> {
    const SHAPE: Shape = Shape::Pointer;

    fn to_node(&self, session: &mut SerializationSession) -> Result<Node, Error> {
        if let Some(target) = session.lookup(self.handle()) {
            return Ok(Node::reference(session.next_ref_id(), target));
        }
        let ref_id = session.next_ref_id();
        session.register(self.handle(), ref_id);
        let inner = stack::grow(|| self.read().to_node(session))?;
        Ok(Node::pointer(ref_id, Some(inner)))
    }

    fn from_node(node: NodeRef<'_>, session: &mut MaterializationSession) -> Result<Self, Error> {
        match node.view() {
            NodeView::Reference { target, node: None } => Err(Error::UnresolvedReference(target)),
            NodeView::Reference {
                target,
                node: Some(found),
            } => {
                if let Some(existing) = session.shared::<T>(target)? {
                    return Ok(existing);
                }
                // Only pointer nodes allocate; anything else would recurse forever.
                if found.kind() != Kind::Pointer {
                    return Err(found.unexpected(Kind::Pointer));
                }
                Self::from_node(found, session)
            }
            NodeView::Pointer(Some(inner)) => allocate(node.ref_id(), inner, session),
            NodeView::Pointer(None) => Err(nil_pointer()),
            _ => Err(node.unexpected(Kind::Pointer)),
        }
    }
}

/// Registers a placeholder under `ref_id` before populating it, so
/// references reached from `inner` close the cycle.
fn allocate<T: Mappable + Default + 'static>(
    ref_id: RefId,
    inner: NodeRef<'_>,
    session: &mut MaterializationSession,
) -> Result<Shared<T>, Error> {
    if ref_id != 0 {
        if let Some(existing) = session.shared::<T>(ref_id)? {
            return Ok(existing);
        }
    }
    let shared = Shared::new(T::default());
    if ref_id != 0 {
        session.register(ref_id, shared.clone());
    }
    let value = stack::grow(|| T::from_node(inner, session))?;
    shared.replace(value);
    Ok(shared)
}

macro_rules! impl_mappable_unsupported {
    ($name:literal, [$($params:tt)*], $t:ty) => {
        impl<$($params)*> Mappable for $t {
            const SHAPE: Shape = Shape::Unsupported($name);

            fn to_node(&self, _session: &mut SerializationSession) -> Result<Node, Error> {
                Err(Error::UnsupportedKind($name))
            }

            fn from_node(
                _node: NodeRef<'_>,
                _session: &mut MaterializationSession,
            ) -> Result<Self, Error> {
                Err(Error::UnsupportedKind($name))
            }
        }
    };
}

impl_mappable_unsupported!("chan", [T], Sender<T>);
impl_mappable_unsupported!("chan", [T], SyncSender<T>);
impl_mappable_unsupported!("chan", [T], Receiver<T>);
impl_mappable_unsupported!("unsafe pointer", [T: ?Sized], *const T);
impl_mappable_unsupported!("unsafe pointer", [T: ?Sized], *mut T);
impl_mappable_unsupported!("array", [T, const N: usize], [T; N]);
impl_mappable_unsupported!("func", [R], fn() -> R);
impl_mappable_unsupported!("func", [A, R], fn(A) -> R);
impl_mappable_unsupported!("func", [A, B, R], fn(A, B) -> R);
impl_mappable_unsupported!("func", [A, B, C, R], fn(A, B, C) -> R);
