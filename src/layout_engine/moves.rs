use tracing::{debug, instrument};

use super::containers::{Container, ContainerKind, Place};
use super::engine::{SeatId, WindowManager};
use super::graph::{Direction, Layout, LayoutKind, Orientation};
use crate::model::tree::NodeId;
use crate::sys::compositor::Compositor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plan {
    Relocate(Place),
    /// Nest the workspace's children in a new container and put the moved
    /// node beside it.
    Wrap {
        workspace: NodeId,
        orientation: Orientation,
        next: bool,
    },
}

impl<C: Compositor> WindowManager<C> {
    /// Moves the current container in `direction`. Focus stays on it.
    #[instrument(skip(self))]
    pub fn move_direction(&mut self, seat: SeatId, direction: Direction) {
        let Some(current) = self.current() else { return };
        let Some(plan) = self.plan_move(current, direction) else {
            debug!(?current, "nowhere to move");
            return;
        };
        debug!(?current, ?plan, "move");
        self.mark_current_path(current, false);
        match plan {
            Plan::Relocate(place) => self.relocate(current, place),
            Plan::Wrap { workspace, orientation, next } => {
                let group = self.wrap_children(workspace, orientation);
                let place = if next { Place::After(group) } else { Place::Before(group) };
                self.relocate(current, place);
            }
        }
        self.mark_current_path(current, true);
    }

    fn plan_move(&self, current: NodeId, direction: Direction) -> Option<Plan> {
        let map = &self.tree.map;
        let parent = current.parent(map)?;
        let Some(orientation) = direction.orientation() else {
            return match direction {
                Direction::Parent if !self.is_workspace(parent) => {
                    Some(Plan::Relocate(Place::After(parent)))
                }
                _ => None,
            };
        };
        let next = direction.is_next();
        let axis_matches = |node: NodeId| {
            self.layout_of(node).map(Layout::orientation) == Some(orientation)
        };

        if axis_matches(parent) {
            let sibling = if next { current.next_sibling(map) } else { current.prev_sibling(map) };
            if let Some(sibling) = sibling {
                let place = if self.is_group(sibling) {
                    Place::Append(sibling)
                } else if next {
                    Place::After(sibling)
                } else {
                    Place::Before(sibling)
                };
                return Some(Plan::Relocate(place));
            }
        }

        let mut anchor = parent;
        while let Some(grandparent) = anchor.parent(map) {
            if axis_matches(grandparent) {
                let place = if next { Place::After(anchor) } else { Place::Before(anchor) };
                return Some(Plan::Relocate(place));
            }
            anchor = grandparent;
        }
        let workspace = anchor;

        let dest = (self.output_of(workspace))
            .and_then(|output| self.outputs.adjacent(output, direction))
            .and_then(|output| self.outputs.get(output))
            .and_then(|output| output.current);
        if let Some(dest) = dest {
            let mut target = self.last(dest);
            if self.is_surface(target) {
                target = target.parent(map).unwrap_or(dest);
            }
            return Some(Plan::Relocate(Place::Append(target)));
        }

        // A lone leaf has nothing to move past.
        let alone = (current.ancestors(map))
            .take_while(|&node| node != workspace)
            .all(|node| node.prev_sibling(map).is_none() && node.next_sibling(map).is_none());
        if !alone && !axis_matches(workspace) {
            return Some(Plan::Wrap { workspace, orientation, next });
        }
        None
    }

    fn is_group(&self, node: NodeId) -> bool {
        matches!(self.container(node).map(|c| &c.kind), Some(ContainerKind::Group { .. }))
    }

    /// Nests every child of `workspace` in a new container that keeps the
    /// workspace's layout, then splits the workspace along `orientation`.
    fn wrap_children(&mut self, workspace: NodeId, orientation: Orientation) -> NodeId {
        let Some(ws) = self.container(workspace) else { return workspace };
        let mut group_container = Container::new(ContainerKind::Group {
            layout: ws.layout().unwrap_or(self.default_layout),
        });
        group_container.visible = ws.visible;
        group_container.geometry = ws.geometry;

        let recency = self.tree.data.history.order(workspace).to_vec();
        let children: Vec<NodeId> = workspace.children(&self.tree.map).collect();
        let group = self.tree.mk_node().into_root();
        self.tree.data.containers.insert(group, group_container);
        for child in children {
            child.detach(&mut self.tree).push_back(group);
        }
        for &node in recency.iter().rev() {
            self.tree.data.history.promote(&self.tree.map, node);
        }
        group.detach(&mut self.tree).push_back(workspace);
        self.set_layout(workspace, Layout::new(LayoutKind::Split, orientation));
        debug!(?workspace, ?group, "wrapped workspace children");
        group
    }
}
