use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::Error;
use crate::mappable::Mappable;
use crate::node::{Node, RefId};
use crate::shared::Handle;
use crate::stack;

/// Serializes `value` into a fresh node tree.
///
/// RefIds start at 1 and follow depth-first visitation order. A [`Shared`]
/// object reached a second time becomes a reference to the RefId of its
/// first visit, which is what makes cyclic graphs terminate.
///
/// [`Shared`]: crate::Shared
pub fn serialize<T: Mappable>(value: &T) -> Result<Node, Error> {
    let mut session = SerializationSession::new();
    let node = value.to_node(&mut session)?;
    debug!(
        "serialized {} nodes, {} shared objects",
        session.last,
        session.registry.len()
    );
    Ok(node)
}

/// Per-call serializer state: the RefId counter and the identity registry.
#[derive(Debug, Default)]
pub struct SerializationSession {
    last: RefId,
    registry: HashMap<Handle, RefId>,
}

impl SerializationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next RefId.
    pub fn next_ref_id(&mut self) -> RefId {
        self.last += 1;
        self.last
    }

    /// Records that the object behind `handle` was emitted as `ref_id`.
    pub fn register(&mut self, handle: Handle, ref_id: RefId) {
        trace!("registered {handle} as refid {ref_id}");
        self.registry.insert(handle, ref_id);
    }

    /// Returns the RefId of an already-visited object.
    pub fn lookup(&self, handle: Handle) -> Option<RefId> {
        self.registry.get(&handle).copied()
    }

    /// Number of RefIds assigned so far.
    pub fn assigned(&self) -> u64 {
        self.last
    }
}

/// Builds a struct node field by field, in declaration order.
///
/// Used by `#[derive(Mappable)]`.
#[derive(Debug)]
pub struct StructWriter {
    ref_id: RefId,
    fields: IndexMap<String, Node>,
}

impl StructWriter {
    /// Claims the struct's RefId before any field is visited.
    pub fn new(session: &mut SerializationSession) -> Self {
        StructWriter {
            ref_id: session.next_ref_id(),
            fields: IndexMap::new(),
        }
    }

    /// Emits `value` under `key`.
    pub fn field<F: Mappable>(
        &mut self,
        key: &str,
        value: &F,
        session: &mut SerializationSession,
    ) -> Result<(), Error> {
        let node = stack::grow(|| value.to_node(session))?;
        self.fields.insert(key.to_string(), node);
        Ok(())
    }

    /// Skips an excluded field. Its kind is still checked, so an excluded
    /// field of an unsupported kind fails the whole call.
    pub fn skip<F: Mappable>(&mut self, value: &F) -> Result<(), Error> {
        value.check_supported()
    }

    pub fn finish(self) -> Node {
        Node::structure(self.ref_id, self.fields)
    }
}
