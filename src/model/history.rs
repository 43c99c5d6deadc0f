use serde::{Deserialize, Serialize};

use crate::model::tree::{NodeId, NodeMap};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TreeEvent {
    AddedToForest(NodeId),
    AddedToParent(NodeId),
    RemovingFromParent(NodeId),
    RemovedFromForest(NodeId),
}

/// Focus-recency order of each parent's children, most recent first.
///
/// This is kept apart from the sibling order in [`NodeMap`]. A child joins
/// the order at the tail when it is attached and only moves towards the head
/// when [`History::promote`] is called.
#[derive(Default, Serialize, Deserialize)]
pub struct History {
    orders: slotmap::SecondaryMap<NodeId, Vec<NodeId>>,
}

impl History {
    pub fn head(&self, parent: NodeId) -> Option<NodeId> {
        self.orders.get(parent).and_then(|order| order.first().copied())
    }

    pub fn order(&self, parent: NodeId) -> &[NodeId] {
        self.orders.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Follows the recency heads down from `node` to a leaf.
    pub fn last(&self, node: NodeId) -> NodeId {
        let mut node = node;
        while let Some(head) = self.head(node) {
            node = head;
        }
        node
    }

    /// Moves `node` to the head of its parent's order. Returns true if the
    /// head changed.
    pub fn promote(&mut self, map: &NodeMap, node: NodeId) -> bool {
        let Some(parent) = node.parent(map) else {
            return false;
        };
        let Some(order) = self.orders.get_mut(parent) else {
            return false;
        };
        match order.iter().position(|&n| n == node) {
            Some(0) => false,
            Some(idx) => {
                order[..=idx].rotate_right(1);
                true
            }
            None => {
                debug_assert!(false, "{node:?} is missing from the order of {parent:?}");
                false
            }
        }
    }

    pub fn handle_event(&mut self, map: &NodeMap, event: TreeEvent) {
        use TreeEvent::*;
        match event {
            AddedToForest(_node) => {}
            AddedToParent(node) => {
                let Some(parent) = node.parent(map) else { return };
                match self.orders.entry(parent) {
                    Some(entry) => entry.or_default().push(node),
                    None => debug_assert!(false, "parent {parent:?} is not in the forest"),
                }
            }
            RemovingFromParent(node) => {
                let Some(parent) = node.parent(map) else { return };
                if let Some(order) = self.orders.get_mut(parent) {
                    order.retain(|&n| n != node);
                    if order.is_empty() {
                        self.orders.remove(parent);
                    }
                }
            }
            RemovedFromForest(node) => {
                self.orders.remove(node);
            }
        }
    }
}
