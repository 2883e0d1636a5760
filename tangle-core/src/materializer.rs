use std::any::{Any, type_name};
use std::collections::HashMap;

use log::{debug, trace};

use crate::error::Error;
use crate::mappable::{Mappable, Shape};
use crate::node::{Kind, RefId};
use crate::resolver::{Fields, NodeRef, NodeView, ResolvedTree};
use crate::shared::Shared;
use crate::stack;

/// Builds a `T` from a resolved tree.
///
/// Shared objects are allocated once per RefId; every reference to that
/// RefId yields a clone of the same [`Shared`], so cycles close into real
/// cycles. The first mismatch aborts the call.
pub fn materialize<T: Mappable>(tree: &ResolvedTree) -> Result<T, Error> {
    let mut session = MaterializationSession::new();
    let value = T::from_node(tree.root(), &mut session)?;
    debug!(
        "materialized {} nodes, {} shared objects",
        tree.len(),
        session.objects.len()
    );
    Ok(value)
}

/// Per-call materializer state: RefId -> already allocated object.
#[derive(Debug, Default)]
pub struct MaterializationSession {
    objects: HashMap<RefId, Box<dyn Any>>,
}

impl MaterializationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `ref_id` to `object`. Called before the object is populated so
    /// that references reached while populating it find it.
    pub fn register<T: 'static>(&mut self, ref_id: RefId, object: Shared<T>) {
        trace!("bound refid {ref_id} to {}", object.handle());
        self.objects.insert(ref_id, Box::new(object));
    }

    /// Returns the object bound to `ref_id`, if any.
    ///
    /// Fails if the object exists but is not a `Shared<T>`.
    pub fn shared<T: 'static>(&self, ref_id: RefId) -> Result<Option<Shared<T>>, Error> {
        let Some(object) = self.objects.get(&ref_id) else {
            return Ok(None);
        };
        object
            .downcast_ref::<Shared<T>>()
            .cloned()
            .map(Some)
            .ok_or(Error::IdentityMismatch {
                ref_id,
                expected: type_name::<Shared<T>>(),
            })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Reads the fields of a struct node by key.
///
/// Used by `#[derive(Mappable)]`. Tree fields the destination does not name
/// are ignored; destination fields missing from the tree get their default.
#[derive(Debug)]
pub struct StructReader<'t> {
    fields: Fields<'t>,
}

impl<'t> StructReader<'t> {
    pub fn open(node: NodeRef<'t>, shape: &Shape) -> Result<Self, Error> {
        let NodeView::Struct(fields) = node.view() else {
            return Err(node.unexpected(Kind::Struct));
        };
        for key in fields.keys() {
            if shape.field(key).is_none() {
                debug!("ignoring field {key:?} of refid {}", node.ref_id());
            }
        }
        Ok(StructReader { fields })
    }

    pub fn field<F: Mappable + Default>(
        &self,
        key: &str,
        session: &mut MaterializationSession,
    ) -> Result<F, Error> {
        match self.fields.get(key) {
            Some(child) => stack::grow(|| F::from_node(child, session)),
            None => Ok(F::default()),
        }
    }
}
