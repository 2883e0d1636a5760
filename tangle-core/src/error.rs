use crate::node::{Kind, RefId};

/// Error type for every stage of the codec.
///
/// All variants except [`Error::UnresolvedReference`] are data-integrity
/// failures of the input; none of them is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported kind \"{0}\"")]
    UnsupportedKind(&'static str),
    #[error("invalid value kind \"{0}\"")]
    InvalidKind(String),
    #[error("invalid value {value} for kind \"{kind}\"")]
    InvalidValue { kind: Kind, value: String },
    #[error("unexpected kind (expected: {expected}, got: {got})")]
    UnexpectedKind { expected: Kind, got: Kind },
    #[error("unresolved reference to refid {0}")]
    UnresolvedReference(RefId),
    #[error("refid {ref_id} is bound to a value that is not a {expected}")]
    IdentityMismatch { ref_id: RefId, expected: &'static str },
    #[error("expected a node object, found {0}")]
    NotANode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR error: {0}")]
    Cbor(String),
}
