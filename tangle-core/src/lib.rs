//! Tangle is a codec for cyclic object graphs.
//!
//! A value graph goes through four stages:
//! - **Serialize**: [`serialize`] walks a [`Mappable`] value depth-first and
//!   emits an acyclic [`Node`] tree. Every node gets a fresh RefId; a
//!   [`Shared`] object reached again is emitted as a reference to the RefId of
//!   its first visit.
//! - **Encode**: [`wire`] turns the tree into JSON or CBOR and back.
//! - **Resolve**: [`resolve`] indexes a decoded tree by RefId and links every
//!   reference to its target.
//! - **Materialize**: [`materialize`] rebuilds the typed graph, allocating one
//!   object per shared RefId so cycles come back as cycles.
//!
//! # Example
//!
//! ```
//! use tangle_core::{Mappable, Shared, from_json, to_json};
//!
//! #[derive(Debug, Default, Mappable)]
//! struct Person {
//!     pub name: String,
//!     pub friend: Option<Shared<Person>>,
//! }
//!
//! let arthur = Shared::new(Person { name: "Arthur".into(), friend: None });
//! let ford = Shared::new(Person { name: "Ford".into(), friend: Some(arthur.clone()) });
//! arthur.write().friend = Some(ford.clone());
//!
//! let bytes = to_json(&arthur).unwrap();
//! let back: Shared<Person> = from_json(&bytes).unwrap();
//! let friend = back.read().friend.clone().unwrap();
//! let again = friend.read().friend.clone().unwrap();
//! assert!(again.ptr_eq(&back));
//!
//! // Break the cycles so both graphs are freed.
//! arthur.write().friend = None;
//! back.write().friend = None;
//! ```

extern crate self as tangle_core;

pub mod codec;
mod error;
mod mappable;
mod mapper;
mod materializer;
mod node;
mod resolver;
mod shared;
mod stack;
pub mod wire;

pub use codec::{from_cbor, from_json, to_cbor, to_json, to_json_pretty};
pub use error::Error;
pub use mappable::{FieldDesc, Mappable, Shape};
pub use mapper::{SerializationSession, StructWriter, serialize};
pub use materializer::{MaterializationSession, StructReader, materialize};
pub use node::{Kind, Node, Payload, RefId, Scalar};
pub use resolver::{Children, Fields, NodeRef, NodeView, ResolvedTree, resolve};
pub use shared::{Handle, Shared};

#[cfg(feature = "derive")]
pub use tangle_derive::Mappable;
