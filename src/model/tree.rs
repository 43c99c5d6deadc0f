use std::ops::Index;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// N-ary tree stored in an arena.
///
/// Every node is linked to its parent and to its previous and next siblings,
/// which gives the display order of a parent's children. Any other per-node
/// state lives in the observer `O`, keyed by [`NodeId`].
#[derive(Serialize, Deserialize)]
pub struct Tree<O> {
    pub map: NodeMap,
    pub data: O,
}

impl<O: Observer> Tree<O> {
    pub fn with_observer(data: O) -> Self { Tree { map: NodeMap::new(), data } }

    pub fn mk_node(&mut self) -> UnattachedNode<'_, O> {
        let id = self.map.map.insert(Node::default());
        self.data.added_to_forest(&self.map, id);
        UnattachedNode { id, tree: self }
    }
}

/// Map that holds the structure of the tree.
///
/// A map can hold several roots at once. Branches move between roots by
/// detaching and reattaching them.
#[derive(Serialize, Deserialize)]
pub struct NodeMap {
    map: SlotMap<NodeId, Node>,
}

impl NodeMap {
    fn new() -> NodeMap { NodeMap { map: SlotMap::default() } }

    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

impl Index<NodeId> for NodeMap {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output { &self.map[index] }
}

slotmap::new_key_type! {
    /// Stable handle of a node in the tree.
    pub struct NodeId;
}

impl NodeId {
    #[track_caller]
    pub fn detach<'a, O: Observer>(self, tree: &'a mut Tree<O>) -> DetachedNode<'a, O> {
        DetachedNode { id: self, tree }
    }

    pub fn parent(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.parent)
    }

    pub fn children(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        ChildIterator {
            cur: map.map.get(self).and_then(|n| n.first_child),
            map,
        }
    }

    pub fn children_rev(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        ChildRevIterator {
            cur: map.map.get(self).and_then(|n| n.last_child),
            map,
        }
    }

    pub fn traverse_preorder(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        PreorderTraversal::new(map, self)
    }

    /// Returns an iterator over all ancestors of the current node, including itself.
    pub fn ancestors(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let node = next;
            next = node.and_then(|n| n.parent(map));
            node
        })
    }

    /// Like [`NodeId::ancestors`], paired with the parent of each ancestor.
    pub fn ancestors_with_parent(
        self,
        map: &NodeMap,
    ) -> impl Iterator<Item = (NodeId, Option<NodeId>)> + '_ {
        self.ancestors(map).map(|node| (node, node.parent(map)))
    }

    pub fn next_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.next_sibling)
    }

    pub fn prev_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.prev_sibling)
    }

    pub fn first_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.first_child)
    }

    pub fn last_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.last_child)
    }

    pub fn is_empty(self, map: &NodeMap) -> bool {
        map.map.get(self).map(|n| n.first_child.is_none()).unwrap_or(true)
    }

    pub fn root(self, map: &NodeMap) -> NodeId {
        self.ancestors(map).last().unwrap_or(self)
    }
}

/// Receives structural events from a [`Tree`].
pub trait Observer
where Self: Sized {
    fn added_to_forest(&mut self, map: &NodeMap, node: NodeId);
    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId);
    /// Called while `node` is still linked under its old parent.
    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId);
}

impl Observer for () {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn added_to_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removing_from_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removed_from_forest(&mut self, _map: &NodeMap, _node: NodeId) {}
}

#[must_use = "Unattached nodes should be inserted into the tree or kept as a root"]
pub struct UnattachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> UnattachedNode<'a, O> {
    /// Keeps the node as a root of its own.
    pub fn into_root(self) -> NodeId { self.id }

    #[track_caller]
    pub fn push_back(self, parent: NodeId) -> NodeId { self.id.detach(self.tree).push_back(parent) }

    #[track_caller]
    pub fn insert_before(self, sibling: NodeId) -> NodeId {
        self.id.detach(self.tree).insert_before(sibling)
    }

    #[track_caller]
    pub fn insert_after(self, sibling: NodeId) -> NodeId {
        self.id.detach(self.tree).insert_after(sibling)
    }
}

/// A node about to be moved or removed.
///
/// Moving a node between two positions under the same parent emits no
/// events. Moving it to another parent emits `removing_from_parent` followed
/// by `added_to_parent`.
#[must_use = "Detached nodes should be reattached to the tree or removed"]
pub struct DetachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> DetachedNode<'a, O> {
    #[track_caller]
    pub fn push_back(self, parent: NodeId) -> NodeId {
        if self.id == parent || parent.ancestors(&self.tree.map).any(|a| a == self.id) {
            debug_assert!(false, "cannot attach {:?} under its own subtree", self.id);
            return self.id;
        }
        self.attach_with(parent, |id, map| id.link_under_back(parent, map))
    }

    #[track_caller]
    pub fn insert_before(self, sibling: NodeId) -> NodeId {
        let Some(parent) = self.sibling_parent(sibling) else {
            return self.id;
        };
        self.attach_with(parent, |id, map| id.link_before(sibling, map))
    }

    #[track_caller]
    pub fn insert_after(self, sibling: NodeId) -> NodeId {
        let Some(parent) = self.sibling_parent(sibling) else {
            return self.id;
        };
        self.attach_with(parent, |id, map| id.link_after(sibling, map))
    }

    /// Unlinks the node from its parent, leaving it in the forest as a root.
    pub fn into_root(self) -> NodeId {
        if self.id.parent(&self.tree.map).is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
            self.tree.map.unlink(self.id);
        }
        self.id
    }

    /// Unlinks the node and deletes it with its whole subtree.
    pub fn remove(self) {
        let tree = self.tree;
        let id = DetachedNode { id: self.id, tree: &mut *tree }.into_root();
        if let Some(node) = tree.map.map.remove(id) {
            node.delete_recursive(tree, id);
        }
    }

    #[track_caller]
    fn sibling_parent(&self, sibling: NodeId) -> Option<NodeId> {
        if sibling == self.id {
            return None;
        }
        let parent = sibling.parent(&self.tree.map);
        debug_assert!(parent.is_some(), "cannot make a sibling of a root node: {sibling:?}");
        parent
    }

    fn attach_with(self, new_parent: NodeId, attach: impl FnOnce(NodeId, &mut NodeMap)) -> NodeId {
        let old_parent = self.id.parent(&self.tree.map);
        let moved = old_parent != Some(new_parent);
        if moved && old_parent.is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
        }
        self.tree.map.unlink(self.id);
        attach(self.id, &mut self.tree.map);
        if moved {
            self.tree.data.added_to_parent(&self.tree.map, self.id);
        }
        self.id
    }
}

#[derive(Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Node {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

impl NodeId {
    fn link_under_back(self, parent: NodeId, map: &mut NodeMap) {
        let prev_child = {
            let parent_node = &mut map.map[parent];
            parent_node.first_child.get_or_insert(self);
            parent_node.last_child.replace(self)
        };
        map.map[self].parent = Some(parent);
        if let Some(prev) = prev_child {
            map.map[self].prev_sibling = Some(prev);
            map.map[prev].next_sibling = Some(self);
        }
    }

    fn link_before(self, next: NodeId, map: &mut NodeMap) {
        let parent = map.map[next].parent;
        let prev = map.map[next].prev_sibling.replace(self);
        let node = &mut map.map[self];
        node.parent = parent;
        node.next_sibling = Some(next);
        node.prev_sibling = prev;
        match prev {
            Some(prev) => map.map[prev].next_sibling = Some(self),
            None => {
                if let Some(parent) = parent {
                    map.map[parent].first_child = Some(self);
                }
            }
        }
    }

    fn link_after(self, prev: NodeId, map: &mut NodeMap) {
        let parent = map.map[prev].parent;
        let next = map.map[prev].next_sibling.replace(self);
        let node = &mut map.map[self];
        node.parent = parent;
        node.prev_sibling = Some(prev);
        node.next_sibling = next;
        match next {
            Some(next) => map.map[next].prev_sibling = Some(self),
            None => {
                if let Some(parent) = parent {
                    map.map[parent].last_child = Some(self);
                }
            }
        }
    }
}

impl NodeMap {
    fn unlink(&mut self, id: NodeId) {
        let Some((prev_sibling, next_sibling, parent)) =
            self.map.get(id).map(|n| (n.prev_sibling, n.next_sibling, n.parent))
        else {
            return;
        };
        if let Some(prev) = prev_sibling {
            self.map[prev].next_sibling = next_sibling;
        }
        if let Some(next) = next_sibling {
            self.map[next].prev_sibling = prev_sibling;
        }
        if let Some(parent) = parent {
            let parent_node = &mut self.map[parent];
            if parent_node.first_child == Some(id) {
                parent_node.first_child = next_sibling;
            }
            if parent_node.last_child == Some(id) {
                parent_node.last_child = prev_sibling;
            }
        }
        let node = &mut self.map[id];
        node.prev_sibling = None;
        node.next_sibling = None;
        node.parent = None;
    }
}

impl Node {
    fn delete_recursive(&self, cx: &mut Tree<impl Observer>, id: NodeId) {
        cx.data.removed_from_forest(&cx.map, id);
        let mut iter = self.first_child;
        while let Some(child) = iter {
            let next = child.next_sibling(&cx.map);
            if let Some(node) = cx.map.map.remove(child) {
                node.delete_recursive(cx, child);
            }
            iter = next;
        }
    }
}

struct ChildIterator<'a> {
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> Iterator for ChildIterator<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = id.next_sibling(self.map);
        Some(id)
    }
}

struct ChildRevIterator<'a> {
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> Iterator for ChildRevIterator<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = id.prev_sibling(self.map);
        Some(id)
    }
}

struct PreorderTraversal<'a> {
    top: NodeId,
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> PreorderTraversal<'a> {
    fn new(map: &'a NodeMap, root: NodeId) -> Self {
        Self {
            top: root,
            cur: Some(root),
            map,
        }
    }
}

impl<'a> Iterator for PreorderTraversal<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        if let Some(child) = node.first_child(self.map) {
            self.cur = Some(child);
        } else {
            self.cur = None;
            for ancestor in node.ancestors(self.map) {
                if ancestor == self.top {
                    break;
                }
                if let Some(sibling) = ancestor.next_sibling(self.map) {
                    self.cur = Some(sibling);
                    break;
                }
            }
        }
        Some(node)
    }
}
