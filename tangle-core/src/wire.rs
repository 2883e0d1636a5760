//! Wire encoding of the node tree.
//!
//! Every node is an object `{"refid": n, "kind": "...", "value": ...}` whose
//! `value` shape depends on the kind: a literal for scalars, an array of child
//! nodes for `slice`, an object of child nodes for `map` and `struct`, a single
//! nested node (or null) for `ptr`, and the target RefId for `ref`.
//!
//! Decoding goes through [`Literal`], a format-agnostic document value, so the
//! same validation runs for JSON and CBOR. Each list element nests three
//! document levels deep, so the parsers' nesting limits are lifted and every
//! recursive step grows the stack on demand.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::node::{Kind, Node, Payload, RefId, Scalar};
use crate::stack;

/// Encodes a node tree as compact JSON.
pub fn encode_json(node: &Node) -> Result<Vec<u8>, Error> {
    Ok(serde_json::to_vec(node)?)
}

/// Encodes a node tree as indented JSON.
pub fn encode_json_pretty(node: &Node) -> Result<Vec<u8>, Error> {
    Ok(serde_json::to_vec_pretty(node)?)
}

/// Decodes a JSON document. A blank document yields the empty node.
pub fn decode_json(bytes: &[u8]) -> Result<Node, Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Node::default());
    }
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let literal = Literal::deserialize(&mut deserializer)?;
    deserializer.end()?;
    decode_document(literal)
}

/// Encodes a node tree as CBOR.
pub fn encode_cbor(node: &Node) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    ciborium::into_writer(node, &mut buf).map_err(|e| Error::Cbor(e.to_string()))?;
    Ok(buf)
}

/// Decodes a CBOR document. Zero bytes yield the empty node.
pub fn decode_cbor(bytes: &[u8]) -> Result<Node, Error> {
    if bytes.is_empty() {
        return Ok(Node::default());
    }
    let literal: Literal = ciborium::de::from_reader_with_recursion_limit(bytes, usize::MAX)
        .map_err(|e| Error::Cbor(e.to_string()))?;
    decode_document(literal)
}

/// An untyped document value.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum Literal {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Literal>),
    Map(IndexMap<String, Literal>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(v) => write!(f, "bool({v})"),
            Literal::Int(v) => write!(f, "int({v})"),
            Literal::Uint(v) => write!(f, "uint({v})"),
            Literal::Float(v) => write!(f, "float({v})"),
            Literal::Text(v) => write!(f, "string({v:?})"),
            Literal::Bytes(v) => write!(f, "bytes(len {})", v.len()),
            Literal::List(v) => write!(f, "array(len {})", v.len()),
            Literal::Map(v) => write!(f, "object(len {})", v.len()),
        }
    }
}

impl<'de> Deserialize<'de> for Literal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LiteralVisitor;

        impl<'de> Visitor<'de> for LiteralVisitor {
            type Value = Literal;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a document value")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Literal, E> {
                Ok(Literal::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Literal, E> {
                Ok(Literal::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Literal, D::Error>
            where
                D: Deserializer<'de>,
            {
                Literal::deserialize(deserializer)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Literal, E> {
                Ok(Literal::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Literal, E> {
                Ok(Literal::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Literal, E> {
                Ok(Literal::Uint(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Literal, E> {
                Ok(Literal::Float(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Literal, E> {
                Ok(Literal::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Literal, E> {
                Ok(Literal::Text(v))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Literal, E> {
                Ok(Literal::Bytes(v.to_vec()))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Literal, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Literal::List(items))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Literal, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Literal>()? {
                    entries.insert(key, value);
                }
                Ok(Literal::Map(entries))
            }
        }

        stack::grow(|| deserializer.deserialize_any(LiteralVisitor))
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        stack::grow(|| {
            let mut state = serializer.serialize_struct("Node", 3)?;
            state.serialize_field("refid", &self.ref_id())?;
            state.serialize_field("kind", self.kind().as_str())?;
            state.serialize_field("value", &PayloadValue(self.payload()))?;
            state.end()
        })
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let literal = Literal::deserialize(deserializer)?;
        decode_document(literal).map_err(de::Error::custom)
    }
}

struct PayloadValue<'a>(&'a Payload);

impl Serialize for PayloadValue<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Payload::Null | Payload::Pointer(None) => serializer.serialize_unit(),
            Payload::Scalar(scalar) => match scalar {
                Scalar::Bool(v) => serializer.serialize_bool(*v),
                Scalar::I8(v) => serializer.serialize_i8(*v),
                Scalar::I16(v) => serializer.serialize_i16(*v),
                Scalar::I32(v) => serializer.serialize_i32(*v),
                Scalar::I64(v) => serializer.serialize_i64(*v),
                Scalar::U8(v) => serializer.serialize_u8(*v),
                Scalar::U16(v) => serializer.serialize_u16(*v),
                Scalar::U32(v) => serializer.serialize_u32(*v),
                Scalar::U64(v) => serializer.serialize_u64(*v),
                Scalar::F32(v) => serializer.serialize_f32(*v),
                Scalar::F64(v) => serializer.serialize_f64(*v),
                Scalar::String(v) => serializer.serialize_str(v),
            },
            Payload::Pointer(Some(node)) => node.serialize(serializer),
            Payload::Sequence(items) => serializer.collect_seq(items),
            Payload::Mapping(entries) | Payload::Struct(entries) => serializer.collect_map(entries),
            Payload::Reference(target) => serializer.serialize_u64(*target),
        }
    }
}

/// Converts a whole document into a node. `null` means "no data".
pub(crate) fn decode_document(literal: Literal) -> Result<Node, Error> {
    match literal {
        Literal::Null => Ok(Node::default()),
        Literal::Map(fields) => decode_node(fields),
        other => Err(Error::NotANode(other.to_string())),
    }
}

fn decode_child(parent: Kind, literal: Literal) -> Result<Node, Error> {
    match literal {
        Literal::Map(fields) => decode_node(fields),
        other => Err(invalid(parent, &other)),
    }
}

fn decode_node(fields: IndexMap<String, Literal>) -> Result<Node, Error> {
    stack::grow(|| decode_fields(fields))
}

fn decode_fields(mut fields: IndexMap<String, Literal>) -> Result<Node, Error> {
    let ref_id = match fields.swap_remove("refid") {
        None | Some(Literal::Null) => 0,
        Some(literal) => {
            as_ref_id(&literal).ok_or_else(|| Error::NotANode(format!("refid {literal}")))?
        }
    };
    let value = fields.swap_remove("value").unwrap_or_default();

    let kind = match fields.swap_remove("kind") {
        Some(Literal::Text(name)) => name.parse::<Kind>()?,
        None | Some(Literal::Null) if value == Literal::Null => return Ok(Node::null(ref_id)),
        None | Some(Literal::Null) => return Err(Error::InvalidKind(String::new())),
        Some(other) => return Err(Error::InvalidKind(other.to_string())),
    };

    let payload = match kind {
        Kind::Null => match value {
            Literal::Null => Payload::Null,
            other => return Err(invalid(kind, &other)),
        },
        Kind::Bool => match value {
            Literal::Bool(v) => Payload::Scalar(Scalar::Bool(v)),
            other => return Err(invalid(kind, &other)),
        },
        Kind::Int8 => Payload::Scalar(Scalar::I8(integer(kind, &value)?)),
        Kind::Int16 => Payload::Scalar(Scalar::I16(integer(kind, &value)?)),
        Kind::Int32 => Payload::Scalar(Scalar::I32(integer(kind, &value)?)),
        Kind::Int64 => Payload::Scalar(Scalar::I64(integer(kind, &value)?)),
        Kind::Uint8 => Payload::Scalar(Scalar::U8(integer(kind, &value)?)),
        Kind::Uint16 => Payload::Scalar(Scalar::U16(integer(kind, &value)?)),
        Kind::Uint32 => Payload::Scalar(Scalar::U32(integer(kind, &value)?)),
        Kind::Uint64 => Payload::Scalar(Scalar::U64(integer(kind, &value)?)),
        Kind::Float32 => Payload::Scalar(Scalar::F32(float(kind, &value)? as f32)),
        Kind::Float64 => Payload::Scalar(Scalar::F64(float(kind, &value)?)),
        Kind::String => match value {
            Literal::Text(v) => Payload::Scalar(Scalar::String(v)),
            other => return Err(invalid(kind, &other)),
        },
        Kind::Pointer => match value {
            Literal::Null => Payload::Pointer(None),
            Literal::Map(inner) => Payload::Pointer(Some(Box::new(decode_node(inner)?))),
            other => return Err(invalid(kind, &other)),
        },
        Kind::Sequence => match value {
            Literal::Null => Payload::Sequence(Vec::new()),
            Literal::List(items) => Payload::Sequence(
                items
                    .into_iter()
                    .map(|item| decode_child(kind, item))
                    .collect::<Result<_, _>>()?,
            ),
            other => return Err(invalid(kind, &other)),
        },
        Kind::Mapping | Kind::Struct => {
            let entries: IndexMap<String, Node> = match value {
                Literal::Null => IndexMap::new(),
                Literal::Map(entries) => entries
                    .into_iter()
                    .map(|(key, child)| Ok((key, decode_child(kind, child)?)))
                    .collect::<Result<_, Error>>()?,
                other => return Err(invalid(kind, &other)),
            };
            if kind == Kind::Mapping {
                Payload::Mapping(entries)
            } else {
                Payload::Struct(entries)
            }
        }
        Kind::Reference => match as_ref_id(&value) {
            Some(target) => Payload::Reference(target),
            None => return Err(invalid(kind, &value)),
        },
    };

    Ok(Node::new(ref_id, payload))
}

fn invalid(kind: Kind, literal: &Literal) -> Error {
    Error::InvalidValue {
        kind,
        value: literal.to_string(),
    }
}

fn as_ref_id(literal: &Literal) -> Option<RefId> {
    match *literal {
        Literal::Uint(v) => Some(v),
        Literal::Int(v) => RefId::try_from(v).ok(),
        _ => None,
    }
}

fn integer<T>(kind: Kind, literal: &Literal) -> Result<T, Error>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    let converted = match *literal {
        Literal::Int(v) => T::try_from(v).ok(),
        Literal::Uint(v) => T::try_from(v).ok(),
        // Some producers write integral numbers as floats.
        Literal::Float(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
            T::try_from(v as i64).ok()
        }
        _ => None,
    };
    converted.ok_or_else(|| invalid(kind, literal))
}

fn float(kind: Kind, literal: &Literal) -> Result<f64, Error> {
    match *literal {
        Literal::Float(v) => Ok(v),
        Literal::Int(v) => Ok(v as f64),
        Literal::Uint(v) => Ok(v as f64),
        _ => Err(invalid(kind, literal)),
    }
}
