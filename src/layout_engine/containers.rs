use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::engine::WindowManager;
use super::graph::{Direction, Layout};
use super::outputs::OutputId;
use crate::model::history::{History, TreeEvent};
use crate::model::tree::{self, NodeId, NodeMap};
use crate::sys::compositor::{Compositor, Layer};
use crate::sys::geometry::Rect;

/// Per-node state shared by every kind of container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub visible: bool,
    /// Marks the current path from a workspace down to the active node.
    pub is_current: bool,
    pub geometry: Rect,
    pub kind: ContainerKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Group { layout: Layout },
    Workspace(Workspace),
    Surface(Surface),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub number: Option<u64>,
    pub output: Option<OutputId>,
    pub layout: Layout,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub app_id: Option<String>,
    /// Geometry last committed by the client, relative to its buffer.
    pub client_geometry: Rect,
    pub fullscreen: bool,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Container {
            visible: false,
            is_current: false,
            geometry: Rect::default(),
            kind,
        }
    }

    pub fn layout(&self) -> Option<Layout> {
        match &self.kind {
            ContainerKind::Group { layout } => Some(*layout),
            ContainerKind::Workspace(ws) => Some(ws.layout),
            ContainerKind::Surface(_) => None,
        }
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        match &self.kind {
            ContainerKind::Workspace(ws) => Some(ws),
            _ => None,
        }
    }

    pub fn workspace_mut(&mut self) -> Option<&mut Workspace> {
        match &mut self.kind {
            ContainerKind::Workspace(ws) => Some(ws),
            _ => None,
        }
    }

    pub fn surface_mut(&mut self) -> Option<&mut Surface> {
        match &mut self.kind {
            ContainerKind::Surface(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn surface(&self) -> Option<&Surface> {
        match &self.kind {
            ContainerKind::Surface(surface) => Some(surface),
            _ => None,
        }
    }
}

/// Tree observer holding everything attached to a node.
#[derive(Default, Serialize, Deserialize)]
pub struct Components {
    pub history: History,
    pub containers: slotmap::SecondaryMap<NodeId, Container>,
}

impl Components {
    fn dispatch_event(&mut self, map: &NodeMap, event: TreeEvent) {
        self.history.handle_event(map, event);
        if let TreeEvent::RemovedFromForest(node) = event {
            self.containers.remove(node);
        }
    }
}

impl tree::Observer for Components {
    fn added_to_forest(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::AddedToForest(node))
    }

    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::AddedToParent(node))
    }

    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::RemovingFromParent(node))
    }

    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::RemovedFromForest(node))
    }
}

/// Where [`WindowManager::relocate`] puts a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Place {
    Append(NodeId),
    Before(NodeId),
    After(NodeId),
}

impl<C: Compositor> WindowManager<C> {
    pub fn container(&self, node: NodeId) -> Option<&Container> {
        self.tree.data.containers.get(node)
    }

    pub(crate) fn container_mut(&mut self, node: NodeId) -> Option<&mut Container> {
        self.tree.data.containers.get_mut(node)
    }

    pub fn is_surface(&self, node: NodeId) -> bool {
        self.container(node).is_some_and(|c| c.surface().is_some())
    }

    pub fn is_workspace(&self, node: NodeId) -> bool {
        self.container(node).is_some_and(|c| c.workspace().is_some())
    }

    pub(crate) fn is_visible(&self, node: NodeId) -> bool {
        self.container(node).is_some_and(|c| c.visible)
    }

    pub(crate) fn layout_of(&self, node: NodeId) -> Option<Layout> {
        self.container(node).and_then(Container::layout)
    }

    pub(crate) fn set_layout(&mut self, node: NodeId, layout: Layout) {
        match self.container_mut(node).map(|c| &mut c.kind) {
            Some(ContainerKind::Group { layout: l }) => *l = layout,
            Some(ContainerKind::Workspace(ws)) => ws.layout = layout,
            _ => {}
        }
    }

    /// Workspace a node belongs to. Workspaces are the roots of the forest.
    pub fn workspace_of(&self, node: NodeId) -> NodeId { node.root(&self.tree.map) }

    /// Follows the focus-recency heads down from `node`.
    pub fn last(&self, node: NodeId) -> NodeId { self.tree.data.history.last(node) }

    /// Resolves the current node of the focused workspace.
    ///
    /// The walk follows recency heads and stops above the first node that is
    /// not marked current.
    pub fn current(&self) -> Option<NodeId> {
        let mut node = self.workspaces.focused()?;
        while let Some(next) = self.tree.data.history.head(node) {
            if !self.container(next).is_some_and(|c| c.is_current) {
                break;
            }
            node = next;
        }
        Some(node)
    }

    pub(crate) fn set_current(&mut self, next: NodeId) {
        let current = self.current();
        if current == Some(next) {
            return;
        }
        let old_surface = current.filter(|&n| self.is_surface(n));
        if let Some(current) = current {
            self.mark_current_path(current, false);
        }
        self.mark_current_path(next, true);
        self.sync_focus(next, old_surface);
    }

    /// Sets `is_current` on `node` and its ancestors, promoting each one to
    /// the head of its parent's recency order.
    pub(crate) fn mark_current_path(&mut self, node: NodeId, current: bool) {
        let path: Vec<(NodeId, Option<NodeId>)> =
            node.ancestors_with_parent(&self.tree.map).collect();
        for (node, parent) in path {
            let Some(container) = self.container_mut(node) else { continue };
            container.is_current = current;
            match parent {
                Some(parent) => {
                    let head_changed = self.tree.data.history.promote(&self.tree.map, node);
                    let tabbed = self.layout_of(parent).is_some_and(Layout::is_tabbed);
                    if head_changed && tabbed && self.is_visible(parent) {
                        self.show(parent);
                    }
                }
                None => self.workspaces.promote(node),
            }
        }
    }

    /// Pushes focus to the compositor after the current path moved to `next`.
    pub(crate) fn sync_focus(&mut self, next: NodeId, old_surface: Option<NodeId>) {
        if self.is_surface(next) {
            self.set_focus(Some(next));
        } else if old_surface.is_some() {
            self.set_focus(None);
        }
    }

    /// Moves `node` under `new_parent`, or only detaches it when `None`.
    pub(crate) fn reparent(&mut self, node: NodeId, new_parent: Option<NodeId>) {
        if let Some(old_parent) = node.parent(&self.tree.map) {
            node.detach(&mut self.tree).into_root();
            self.cleanup_parent(old_parent);
            self.hide(node);
        }
        let Some(parent) = new_parent else { return };
        node.detach(&mut self.tree).push_back(parent);
        self.resize(parent);
        if self.is_visible(parent) {
            self.show(parent);
        }
    }

    /// Moves an attached node next to a sibling or under a new parent.
    ///
    /// The node is attached at its new place before its old parent is
    /// cleaned up, so the anchor may be the old parent itself.
    pub(crate) fn relocate(&mut self, node: NodeId, place: Place) {
        let old_parent = node.parent(&self.tree.map);
        let new_parent = match place {
            Place::Append(parent) => Some(parent),
            Place::Before(sibling) | Place::After(sibling) => sibling.parent(&self.tree.map),
        };
        let Some(new_parent) = new_parent else {
            error!(?node, ?place, "cannot relocate next to a root");
            return;
        };
        debug!(?node, ?place, "relocate");
        self.hide(node);
        match place {
            Place::Append(parent) => node.detach(&mut self.tree).push_back(parent),
            Place::Before(sibling) => node.detach(&mut self.tree).insert_before(sibling),
            Place::After(sibling) => node.detach(&mut self.tree).insert_after(sibling),
        };
        if let Some(old_parent) = old_parent.filter(|&p| p != new_parent) {
            self.cleanup_parent(old_parent);
        }
        self.resize(new_parent);
        if self.is_visible(new_parent) {
            self.show(new_parent);
        }
    }

    fn cleanup_parent(&mut self, parent: NodeId) {
        if !parent.is_empty(&self.tree.map) {
            self.resize(parent);
        } else if !self.is_workspace(parent) {
            self.free_group(parent);
        } else if !self.is_visible(parent) {
            self.free_workspace(parent);
        }
    }

    fn free_group(&mut self, group: NodeId) {
        if !matches!(self.container(group).map(|c| &c.kind), Some(ContainerKind::Group { .. })) {
            debug_assert!(false, "{group:?} is not a plain container");
            error!(?group, "refusing to free a workspace or surface as a container");
            return;
        }
        debug!(?group, "free container");
        self.reparent(group, None);
        group.detach(&mut self.tree).remove();
    }

    /// Recomputes the geometry of every descendant of `node`.
    pub(crate) fn resize(&mut self, node: NodeId) {
        let Some(container) = self.container(node) else { return };
        let geometry = container.geometry;
        let layout = match &container.kind {
            ContainerKind::Group { layout } => *layout,
            ContainerKind::Workspace(ws) => ws.layout,
            ContainerKind::Surface(surface) => {
                if !surface.client_geometry.same_size(&geometry) {
                    self.compositor.request_resize(node, geometry.width, geometry.height);
                }
                return;
            }
        };
        let children: Vec<NodeId> = node.children(&self.tree.map).collect();
        if children.is_empty() {
            return;
        }
        let rects: Vec<Rect> = if layout.is_tabbed() {
            vec![geometry; children.len()]
        } else {
            geometry.split(layout.orientation(), children.len()).collect()
        };
        for (child, rect) in children.into_iter().zip(rects) {
            if let Some(c) = self.container_mut(child) {
                c.geometry = rect;
            }
            self.resize(child);
        }
    }

    pub(crate) fn show(&mut self, node: NodeId) {
        let Some(container) = self.tree.data.containers.get_mut(node) else { return };
        container.visible = true;
        let layout = match &container.kind {
            ContainerKind::Surface(surface) => {
                let layer = if surface.fullscreen { Layer::Fullscreen } else { Layer::Normal };
                self.compositor.map_view(node, layer);
                return;
            }
            ContainerKind::Group { layout } => *layout,
            ContainerKind::Workspace(ws) => ws.layout,
        };
        let head = self.tree.data.history.head(node);
        let children: Vec<NodeId> = node.children(&self.tree.map).collect();
        for child in children {
            if layout.is_tabbed() && Some(child) != head {
                self.hide(child);
            } else {
                self.show(child);
            }
        }
    }

    pub(crate) fn hide(&mut self, node: NodeId) {
        let Some(container) = self.tree.data.containers.get_mut(node) else { return };
        let was_visible = std::mem::replace(&mut container.visible, false);
        if container.surface().is_some() {
            if was_visible {
                self.compositor.unmap_view(node);
            }
            return;
        }
        let children: Vec<NodeId> = node.children(&self.tree.map).collect();
        for child in children {
            self.hide(child);
        }
    }

    /// Finds the node reached from `node` by moving in `direction`.
    ///
    /// Returns `node` itself when there is nowhere to go.
    pub(crate) fn lookup(&self, node: NodeId, direction: Direction) -> NodeId {
        let map = &self.tree.map;
        let Some(orientation) = direction.orientation() else {
            return match direction {
                Direction::Parent if !self.is_workspace(node) => node.parent(map).unwrap_or(node),
                Direction::Child if !self.is_surface(node) => {
                    self.tree.data.history.head(node).unwrap_or(node)
                }
                _ => node,
            };
        };

        let output = self
            .container(self.workspace_of(node))
            .and_then(|c| c.workspace())
            .and_then(|ws| ws.output)
            .and_then(|output| self.outputs.adjacent(output, direction));

        if let Some(parent) = node.parent(map) {
            let axis_matches = self.layout_of(parent).map(Layout::orientation) == Some(orientation);
            if axis_matches {
                let sibling = if direction.is_next() {
                    node.next_sibling(map)
                } else {
                    node.prev_sibling(map)
                };
                if let Some(sibling) = sibling {
                    return sibling;
                }
            }
            let target = self.lookup(parent, direction);
            if target != parent {
                return self.last(target);
            }
            if axis_matches && output.is_none() {
                let wrapped = if direction.is_next() {
                    parent.first_child(map)
                } else {
                    parent.last_child(map)
                };
                return wrapped.unwrap_or(node);
            }
        }

        match output.and_then(|output| self.outputs.get(output)).and_then(|o| o.current) {
            Some(workspace) => self.last(workspace),
            None => node,
        }
    }
}
