//! Turns a decoded node tree into a linked, indexed tree.
//!
//! Resolution runs in two passes. Indexing walks the tree once, moving every
//! node into a flat arena and recording `RefId -> arena slot`. Linking then
//! scans the arena and rewrites each reference to point at its target slot,
//! so cycles and forward references are closed by lookup, never by descent.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::error::Error;
use crate::node::{Kind, Node, Payload, RefId, Scalar};
use crate::stack;

type Index = usize;

/// Resolves every reference in `tree`.
///
/// Never fails: references whose target is missing are reported through
/// [`ResolvedTree::unresolved`] and left unlinked.
pub fn resolve(tree: Node) -> ResolvedTree {
    let mut session = ResolutionSession::default();
    session.index(tree);
    session.link();

    let tree = session.finish();
    debug!(
        "resolved {} nodes, {} unresolved references",
        tree.len(),
        tree.unresolved.len()
    );
    tree
}

#[derive(Debug, Clone)]
enum Linked {
    Null,
    Scalar(Scalar),
    Pointer(Option<Index>),
    Sequence(Vec<Index>),
    Mapping(IndexMap<String, Index>),
    Struct(IndexMap<String, Index>),
    Reference(Link),
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Pending(RefId),
    Resolved { target: RefId, slot: Index },
    Unresolved(RefId),
}

#[derive(Debug, Clone)]
struct Slot {
    ref_id: RefId,
    payload: Linked,
}

impl Slot {
    fn kind(&self) -> Kind {
        match &self.payload {
            Linked::Null => Kind::Null,
            Linked::Scalar(scalar) => scalar.kind(),
            Linked::Pointer(_) => Kind::Pointer,
            Linked::Sequence(_) => Kind::Sequence,
            Linked::Mapping(_) => Kind::Mapping,
            Linked::Struct(_) => Kind::Struct,
            Linked::Reference(_) => Kind::Reference,
        }
    }
}

#[derive(Debug, Default)]
struct ResolutionSession {
    slots: Vec<Slot>,
    index: HashMap<RefId, Index>,
    unresolved: BTreeSet<RefId>,
}

impl ResolutionSession {
    /// First pass: moves `node` and its descendants into the arena in
    /// depth-first order and returns the slot of `node`.
    fn index(&mut self, node: Node) -> Index {
        stack::grow(|| self.index_node(node))
    }

    fn index_node(&mut self, node: Node) -> Index {
        let (ref_id, payload) = node.into_parts();
        let slot = self.slots.len();
        self.slots.push(Slot {
            ref_id,
            payload: Linked::Null,
        });

        if ref_id != 0 {
            match self.index.entry(ref_id) {
                Entry::Vacant(entry) => {
                    entry.insert(slot);
                }
                Entry::Occupied(_) => warn!("duplicate refid {ref_id}, keeping the first node"),
            }
        }

        let linked = match payload {
            Payload::Null => Linked::Null,
            Payload::Scalar(scalar) => Linked::Scalar(scalar),
            Payload::Pointer(target) => Linked::Pointer(target.map(|inner| self.index(*inner))),
            Payload::Sequence(items) => {
                Linked::Sequence(items.into_iter().map(|item| self.index(item)).collect())
            }
            Payload::Mapping(entries) => Linked::Mapping(
                entries
                    .into_iter()
                    .map(|(key, child)| (key, self.index(child)))
                    .collect(),
            ),
            Payload::Struct(fields) => Linked::Struct(
                fields
                    .into_iter()
                    .map(|(key, child)| (key, self.index(child)))
                    .collect(),
            ),
            Payload::Reference(target) => Linked::Reference(Link::Pending(target)),
        };

        if let Some(entry) = self.slots.get_mut(slot) {
            entry.payload = linked;
        }
        slot
    }

    /// Second pass: links every pending reference by index lookup.
    fn link(&mut self) {
        for slot in &mut self.slots {
            let Linked::Reference(link) = &mut slot.payload else {
                continue;
            };
            let Link::Pending(target) = *link else {
                continue;
            };
            match self.index.get(&target) {
                Some(&found) => {
                    trace!("linked refid {} -> {target}", slot.ref_id);
                    *link = Link::Resolved {
                        target,
                        slot: found,
                    };
                }
                None => {
                    trace!("refid {} points at missing refid {target}", slot.ref_id);
                    self.unresolved.insert(target);
                    *link = Link::Unresolved(target);
                }
            }
        }
    }

    fn finish(self) -> ResolvedTree {
        ResolvedTree {
            slots: self.slots,
            index: self.index,
            unresolved: self.unresolved,
        }
    }
}

/// A node tree whose references have been linked to their targets.
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    // Never empty: slot 0 is the root.
    slots: Vec<Slot>,
    index: HashMap<RefId, Index>,
    unresolved: BTreeSet<RefId>,
}

impl ResolvedTree {
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            slot: 0,
        }
    }

    /// Finds the node carrying `ref_id`.
    pub fn lookup(&self, ref_id: RefId) -> Option<NodeRef<'_>> {
        self.index
            .get(&ref_id)
            .map(|&slot| NodeRef { tree: self, slot })
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Target RefIds that no node carries, in ascending order.
    pub fn unresolved(&self) -> Vec<RefId> {
        self.unresolved.iter().copied().collect()
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the tree is the "no data" node.
    pub fn is_empty(&self) -> bool {
        match self.slots.first() {
            Some(root) => root.ref_id == 0 && matches!(root.payload, Linked::Null),
            None => true,
        }
    }

    fn slot(&self, slot: Index) -> &Slot {
        &self.slots[slot]
    }
}

/// A borrowed view of one node in a [`ResolvedTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t ResolvedTree,
    slot: Index,
}

impl<'t> NodeRef<'t> {
    fn at(&self, slot: Index) -> NodeRef<'t> {
        NodeRef {
            tree: self.tree,
            slot,
        }
    }

    fn entry(&self) -> &'t Slot {
        self.tree.slot(self.slot)
    }

    pub fn ref_id(&self) -> RefId {
        self.entry().ref_id
    }

    pub fn kind(&self) -> Kind {
        self.entry().kind()
    }

    pub fn view(&self) -> NodeView<'t> {
        let tree = self.tree;
        match &self.entry().payload {
            Linked::Null => NodeView::Null,
            Linked::Scalar(scalar) => NodeView::Scalar(scalar),
            Linked::Pointer(target) => NodeView::Pointer(target.map(|slot| self.at(slot))),
            Linked::Sequence(items) => NodeView::Sequence(Children { tree, items }),
            Linked::Mapping(entries) => NodeView::Mapping(Fields { tree, entries }),
            Linked::Struct(entries) => NodeView::Struct(Fields { tree, entries }),
            Linked::Reference(link) => match *link {
                Link::Resolved { target, slot } => NodeView::Reference {
                    target,
                    node: Some(self.at(slot)),
                },
                Link::Pending(target) | Link::Unresolved(target) => {
                    NodeView::Reference { target, node: None }
                }
            },
        }
    }

    pub fn scalar(&self) -> Option<&'t Scalar> {
        match &self.entry().payload {
            Linked::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Follows a linked reference to its target node.
    pub fn target(&self) -> Option<NodeRef<'t>> {
        match self.entry().payload {
            Linked::Reference(Link::Resolved { slot, .. }) => Some(self.at(slot)),
            _ => None,
        }
    }

    /// Returns the string payload, or an error naming the actual kind.
    pub fn expect_str(&self) -> Result<&'t str, Error> {
        match self.scalar() {
            Some(Scalar::String(value)) => Ok(value),
            _ => Err(self.unexpected(Kind::String)),
        }
    }

    /// Builds the error for a node found where `expected` was required.
    pub fn unexpected(&self, expected: Kind) -> Error {
        Error::UnexpectedKind {
            expected,
            got: self.kind(),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.slot == other.slot
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("ref_id", &self.ref_id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Shape-specific contents of a [`NodeRef`].
#[derive(Debug)]
pub enum NodeView<'t> {
    Null,
    Scalar(&'t Scalar),
    Pointer(Option<NodeRef<'t>>),
    Sequence(Children<'t>),
    Mapping(Fields<'t>),
    Struct(Fields<'t>),
    /// `node` is `None` when the target was never defined.
    Reference {
        target: RefId,
        node: Option<NodeRef<'t>>,
    },
}

/// Ordered children of a sequence node.
#[derive(Debug, Clone, Copy)]
pub struct Children<'t> {
    tree: &'t ResolvedTree,
    items: &'t [Index],
}

impl<'t> Children<'t> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<NodeRef<'t>> {
        let tree = self.tree;
        self.items
            .get(position)
            .map(|&slot| NodeRef { tree, slot })
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        let tree = self.tree;
        self.items.iter().map(move |&slot| NodeRef { tree, slot })
    }
}

/// Keyed children of a mapping or struct node.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'t> {
    tree: &'t ResolvedTree,
    entries: &'t IndexMap<String, Index>,
}

impl<'t> Fields<'t> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<NodeRef<'t>> {
        let tree = self.tree;
        self.entries.get(key).map(|&slot| NodeRef { tree, slot })
    }

    pub fn keys(&self) -> impl Iterator<Item = &'t str> + 't {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'t str, NodeRef<'t>)> + 't {
        let tree = self.tree;
        self.entries
            .iter()
            .map(move |(key, &slot)| (key.as_str(), NodeRef { tree, slot }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'t>(node: NodeRef<'t>, key: &str) -> NodeRef<'t> {
        match node.view() {
            NodeView::Struct(fields) | NodeView::Mapping(fields) => fields.get(key).unwrap(),
            other => panic!("expected fields, got {other:?}"),
        }
    }

    fn pointee(node: NodeRef<'_>) -> NodeRef<'_> {
        match node.view() {
            NodeView::Pointer(Some(inner)) => inner,
            other => panic!("expected pointer, got {other:?}"),
        }
    }

    fn item(node: NodeRef<'_>, position: usize) -> NodeRef<'_> {
        match node.view() {
            NodeView::Sequence(children) => children.get(position).unwrap(),
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    fn named(fields: impl IntoIterator<Item = (&'static str, Node)>) -> Vec<(String, Node)> {
        fields
            .into_iter()
            .map(|(key, node)| (key.to_string(), node))
            .collect()
    }

    #[test]
    fn trees_without_references() {
        let trees = [
            Node::pointer(1, Some(Node::scalar(2, true))),
            Node::mapping(1, named([("test", Node::scalar(2, true))])),
            Node::sequence(1, vec![Node::scalar(2, true)]),
            Node::pointer(1, None),
        ];

        for node in trees {
            let size = node.size();
            let tree = resolve(node);
            assert!(!tree.has_unresolved());
            assert_eq!(tree.unresolved(), Vec::<RefId>::new());
            assert_eq!(tree.len(), size);
            assert_eq!(tree.root().ref_id(), 1);
        }
    }

    #[test]
    fn direct_self_reference() {
        let tree = resolve(Node::pointer(1, Some(Node::reference(2, 1))));

        assert!(!tree.has_unresolved());
        let reference = pointee(tree.root());
        assert_eq!(reference.kind(), Kind::Reference);
        assert_eq!(reference.target(), Some(tree.root()));
    }

    #[test]
    fn node_referencing_its_own_refid() {
        let tree = resolve(Node::reference(1, 1));

        assert!(!tree.has_unresolved());
        assert_eq!(tree.root().target(), Some(tree.root()));
    }

    #[test]
    fn child_back_reference() {
        let tree = resolve(Node::pointer(
            1,
            Some(Node::structure(
                2,
                named([
                    ("Name", Node::pointer(3, Some(Node::scalar(4, "Mike")))),
                    ("Children", Node::sequence(5, vec![Node::reference(6, 1)])),
                ]),
            )),
        ));

        assert!(!tree.has_unresolved());
        let child = item(field(pointee(tree.root()), "Children"), 0);
        assert_eq!(child.target(), Some(tree.root()));
    }

    #[test]
    fn missing_target_is_reported() {
        let tree = resolve(Node::pointer(
            1,
            Some(Node::structure(
                2,
                named([
                    ("Name", Node::pointer(3, Some(Node::scalar(4, "Mike")))),
                    ("Children", Node::sequence(5, vec![Node::reference(6, 9)])),
                ]),
            )),
        ));

        assert!(tree.has_unresolved());
        assert_eq!(tree.unresolved(), vec![9]);

        let child = item(field(pointee(tree.root()), "Children"), 0);
        assert!(child.target().is_none());
        match child.view() {
            NodeView::Reference { target, node } => {
                assert_eq!(target, 9);
                assert!(node.is_none());
            }
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_is_sorted_and_deduplicated() {
        let tree = resolve(Node::sequence(
            1,
            vec![
                Node::reference(2, 40),
                Node::reference(3, 7),
                Node::reference(4, 40),
            ],
        ));
        assert_eq!(tree.unresolved(), vec![7, 40]);
    }

    /// Mike -> Frank (parent) -> [Mike, Zak]; siblings point at each other
    /// and Zak's parent is a reference back to Frank. Mike's sibling link is a
    /// forward reference to a node defined later in the walk.
    #[test]
    fn family_cross_links() {
        let zak = Node::pointer(
            10,
            Some(Node::structure(
                11,
                named([
                    ("Name", Node::scalar(12, "Zak")),
                    ("Sibling", Node::reference(13, 1)),
                    ("Parent", Node::reference(14, 5)),
                ]),
            )),
        );
        let frank = Node::pointer(
            5,
            Some(Node::structure(
                6,
                named([
                    ("Name", Node::scalar(7, "Frank")),
                    ("Children", Node::sequence(8, vec![Node::reference(9, 1), zak])),
                ]),
            )),
        );
        let mike = Node::pointer(
            1,
            Some(Node::structure(
                2,
                named([
                    ("Sibling", Node::reference(3, 10)),
                    ("Name", Node::scalar(4, "Mike")),
                    ("Parent", frank),
                ]),
            )),
        );

        let tree = resolve(mike);
        assert!(!tree.has_unresolved());
        assert!(tree.unresolved().is_empty());

        let mike = tree.root();
        let frank = field(pointee(mike), "Parent");
        let children = field(pointee(frank), "Children");
        let zak = item(children, 1);

        assert_eq!(frank.ref_id(), 5);
        assert_eq!(zak.ref_id(), 10);
        assert_eq!(item(children, 0).target(), Some(mike));
        assert_eq!(field(pointee(mike), "Sibling").target(), Some(zak));
        assert_eq!(field(pointee(zak), "Sibling").target(), Some(mike));
        assert_eq!(field(pointee(zak), "Parent").target(), Some(frank));
        assert_eq!(tree.lookup(10), Some(zak));
    }

    #[test]
    fn duplicate_refids_keep_the_first_node() {
        let tree = resolve(Node::sequence(
            1,
            vec![Node::scalar(2, "first"), Node::scalar(2, "second")],
        ));
        let found = tree.lookup(2).unwrap();
        assert_eq!(found.scalar(), Some(&Scalar::String("first".to_string())));
    }

    #[test]
    fn empty_document_resolves_to_empty_tree() {
        let tree = resolve(Node::default());
        assert!(tree.is_empty());
        assert!(!tree.has_unresolved());
        assert_eq!(tree.len(), 1);
    }
}
