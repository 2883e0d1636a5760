//! One-call pipelines over the whole codec.

use crate::error::Error;
use crate::mappable::Mappable;
use crate::mapper::serialize;
use crate::materializer::materialize;
use crate::resolver::resolve;
use crate::wire;

/// Serializes `value` and encodes it as compact JSON.
pub fn to_json<T: Mappable>(value: &T) -> Result<Vec<u8>, Error> {
    wire::encode_json(&serialize(value)?)
}

pub fn to_json_pretty<T: Mappable>(value: &T) -> Result<Vec<u8>, Error> {
    wire::encode_json_pretty(&serialize(value)?)
}

/// Decodes, resolves and materializes a JSON document.
///
/// Unresolved references only fail if materialization reaches them.
pub fn from_json<T: Mappable>(bytes: &[u8]) -> Result<T, Error> {
    materialize(&resolve(wire::decode_json(bytes)?))
}

pub fn to_cbor<T: Mappable>(value: &T) -> Result<Vec<u8>, Error> {
    wire::encode_cbor(&serialize(value)?)
}

pub fn from_cbor<T: Mappable>(bytes: &[u8]) -> Result<T, Error> {
    materialize(&resolve(wire::decode_cbor(bytes)?))
}
