use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, error, instrument, warn};

use super::containers::{Components, Container, ContainerKind, Surface};
use super::graph::{Direction, Layout, LayoutKind, Orientation, StateChange};
use super::outputs::{OutputId, Outputs};
use super::workspaces::Workspaces;
use crate::commands::{Command, Operation, Receiver};
use crate::common::config::{Action, Assignments, Config, WorkspaceSelector};
use crate::model::tree::{NodeId, Tree};
use crate::sys::compositor::Compositor;
use crate::sys::geometry::{Point, Rect};

slotmap::new_key_type! {
    pub struct SeatId;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    pub name: String,
}

/// What the protocol layer knows about a surface when it appears.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub app_id: Option<String>,
    pub geometry: Rect,
}

/// The container tree with its workspaces, outputs and seats.
///
/// All mutations are synchronous. Decisions are pushed into the
/// [`Compositor`] as they are made.
pub struct WindowManager<C> {
    pub(crate) tree: Tree<Components>,
    pub(crate) workspaces: Workspaces,
    pub(crate) outputs: Outputs,
    pub(crate) seats: SlotMap<SeatId, Seat>,
    /// Surface holding keyboard focus on every seat.
    pub(crate) focus: Option<NodeId>,
    pub(crate) default_layout: Layout,
    pub(crate) assignments: Assignments,
    pub(crate) compositor: C,
}

impl<C: Compositor> WindowManager<C> {
    pub fn new(compositor: C, config: &Config) -> Self {
        WindowManager {
            tree: Tree::with_observer(Components::default()),
            workspaces: Workspaces::default(),
            outputs: Outputs::default(),
            seats: SlotMap::default(),
            focus: None,
            default_layout: config.settings.default_layout,
            assignments: config.assignments(),
            compositor,
        }
    }

    pub fn compositor(&self) -> &C { &self.compositor }

    pub fn compositor_mut(&mut self) -> &mut C { &mut self.compositor }

    pub fn workspaces(&self) -> &Workspaces { &self.workspaces }

    pub fn outputs(&self) -> &Outputs { &self.outputs }

    pub fn focus(&self) -> Option<NodeId> { self.focus }

    pub fn add_seat(&mut self, name: &str) -> SeatId {
        let seat = self.seats.insert(Seat { name: name.to_owned() });
        if self.focus.is_some() {
            self.compositor.set_keyboard_focus(seat, self.focus);
        }
        seat
    }

    pub fn remove_seat(&mut self, seat: SeatId) -> Option<Seat> { self.seats.remove(seat) }

    /// Moves keyboard focus to `surface` on every seat.
    pub(crate) fn set_focus(&mut self, surface: Option<NodeId>) {
        if self.focus == surface {
            return;
        }
        debug!(old = ?self.focus, new = ?surface, "focus");
        if let Some(old) = self.focus {
            self.compositor.request_activate(old, false);
        }
        self.focus = surface;
        for seat in self.seats.keys() {
            self.compositor.set_keyboard_focus(seat, surface);
        }
        if let Some(new) = surface {
            self.compositor.request_activate(new, true);
            self.show(new);
        }
    }

    /// Places a new surface and returns its node, or `None` when there is no
    /// output to show it on yet.
    ///
    /// Assigned surfaces go to their workspace, others next to the current
    /// container. The new surface is focused only if nothing else is.
    #[instrument(skip(self))]
    pub fn surface_added(&mut self, info: SurfaceInfo) -> Option<NodeId> {
        if self.outputs.is_empty() {
            debug!("no output yet, leaving the surface to the caller");
            return None;
        }
        let assigned = (info.app_id.as_deref())
            .and_then(|app_id| self.assignments.workspace_for(app_id))
            .cloned();
        let parent = match assigned {
            Some(WorkspaceSelector::Name(name)) => Some(self.workspace_named(&name)),
            Some(WorkspaceSelector::Number(number)) => Some(self.workspace_numbered(number)),
            None => self.current(),
        };
        let Some(mut parent) = parent else {
            error!("no current container while outputs exist");
            return None;
        };
        if self.is_surface(parent) {
            parent = parent.parent(&self.tree.map).unwrap_or_else(|| self.workspace_of(parent));
        }

        let node = self.tree.mk_node().into_root();
        let surface = Surface {
            app_id: info.app_id,
            client_geometry: info.geometry,
            fullscreen: false,
        };
        self.tree.data.containers.insert(node, Container::new(ContainerKind::Surface(surface)));
        debug!(?node, ?parent, "new surface");
        self.reparent(node, Some(parent));

        if self.focus.is_none() && self.is_visible(self.workspace_of(node)) {
            self.set_current(node);
        }
        Some(node)
    }

    /// Releases a surface's node. Focus falls back to the most recent leaf of
    /// the focused workspace.
    #[instrument(skip(self))]
    pub fn surface_removed(&mut self, surface: NodeId) {
        if !self.is_surface(surface) {
            warn!(?surface, "removal of unknown surface");
            return;
        }
        let refocus = self.focus == Some(surface);
        if refocus {
            self.set_focus(None);
        }
        self.reparent(surface, None);
        surface.detach(&mut self.tree).remove();
        if refocus && let Some(workspace) = self.workspaces.focused() {
            let next = self.last(workspace);
            self.set_current(next);
        }
    }

    /// Records the client's geometry and places its view.
    #[instrument(skip(self))]
    pub fn surface_committed(&mut self, surface: NodeId, client_geometry: Rect) {
        let Some(s) = self.container_mut(surface).and_then(Container::surface_mut) else {
            return;
        };
        s.client_geometry = client_geometry;
        let fullscreen = s.fullscreen;
        let origin = if fullscreen {
            let workspace = self.workspace_of(surface);
            self.container(workspace).map(|c| c.geometry.origin())
        } else {
            self.resize(surface);
            self.container(surface).map(|c| c.geometry.origin())
        };
        let Some(origin) = origin else { return };
        let position = Point::new(origin.x - client_geometry.x, origin.y - client_geometry.y);
        self.compositor.position_view(surface, position);
    }

    #[instrument(skip(self))]
    pub fn surface_fullscreen_requested(&mut self, surface: NodeId, fullscreen: bool) {
        let change = if fullscreen { StateChange::Enable } else { StateChange::Disable };
        self.surface_fullscreen(surface, change);
    }

    /// Changes a surface's fullscreen state. A fullscreen surface is sized to
    /// its workspace and shown in the fullscreen layer.
    pub fn surface_fullscreen(&mut self, surface: NodeId, change: StateChange) {
        let Some(s) = self.container(surface).and_then(Container::surface) else { return };
        let fullscreen = change.apply(s.fullscreen);
        if fullscreen == s.fullscreen {
            return;
        }
        debug!(?surface, fullscreen, "fullscreen");
        if fullscreen {
            let workspace = self.workspace_of(surface);
            if let Some(geometry) = self.container(workspace).map(|c| c.geometry) {
                self.compositor.request_resize(surface, geometry.width, geometry.height);
            }
        }
        if let Some(s) = self.container_mut(surface).and_then(Container::surface_mut) {
            s.fullscreen = fullscreen;
        }
        self.compositor.request_fullscreen(surface, fullscreen);
        if !fullscreen {
            self.resize(surface);
        }
        if self.is_visible(surface) {
            self.show(surface);
        }
    }

    pub fn surface_close(&mut self, surface: NodeId) {
        if self.is_surface(surface) {
            self.compositor.request_close(surface);
        }
    }

    pub fn quit(&mut self) { self.compositor.quit(); }

    #[instrument(skip(self))]
    pub fn focus_direction(&mut self, seat: SeatId, direction: Direction) {
        let Some(current) = self.current() else { return };
        let next = self.lookup(current, direction);
        if next == current {
            debug!(?current, "nothing there");
            return;
        }
        self.set_current(next);
    }

    /// Switches the layout of the current container, or of the current
    /// surface's parent. `None` toggles the orientation.
    #[instrument(skip(self))]
    pub fn layout_switch(
        &mut self,
        seat: SeatId,
        kind: LayoutKind,
        orientation: Option<Orientation>,
    ) {
        let Some(mut node) = self.current() else { return };
        if self.is_surface(node) {
            let Some(parent) = node.parent(&self.tree.map) else { return };
            node = parent;
        }
        let Some(layout) = self.layout_of(node) else { return };
        let next = layout.switch(kind, orientation);
        if next == layout {
            return;
        }
        debug!(?node, ?layout, ?next, "layout switch");
        self.set_layout(node, next);
        self.resize(node);
        if self.is_visible(node) {
            self.show(node);
        }
    }

    /// Runs a parsed command on behalf of `seat`.
    #[instrument(skip(self, command), fields(%command))]
    pub fn invoke(&mut self, command: &Command, seat: SeatId) {
        use Operation::*;
        let operation = command.operation();
        let focused = match operation.receiver() {
            Receiver::FocusedSurface => match self.focus {
                Some(surface) => Some(surface),
                None => {
                    debug!("no focused surface");
                    return;
                }
            },
            Receiver::Root | Receiver::Workspaces => None,
        };
        match operation {
            Quit => self.quit(),
            Close => {
                if let Some(surface) = focused {
                    self.surface_close(surface);
                }
            }
            Fullscreen(change) => {
                if let Some(surface) = focused {
                    self.surface_fullscreen(surface, *change);
                }
            }
            FocusDirection(direction) => self.focus_direction(seat, *direction),
            FocusWorkspace(target) => self.focus_workspace(seat, *target),
            FocusWorkspaceName(name) => self.focus_workspace_by_name(seat, name),
            FocusWorkspaceNumber(number) => self.focus_workspace_by_number(seat, *number),
            FocusOutput(direction) => self.focus_output(seat, *direction),
            FocusOutputName(name) => self.focus_output_by_name(seat, name),
            MoveDirection(direction) => self.move_direction(seat, *direction),
            MoveToWorkspace(target) => self.move_to_workspace(seat, *target),
            MoveToWorkspaceName(name) => self.move_to_workspace_by_name(seat, name),
            MoveToWorkspaceNumber(number) => self.move_to_workspace_by_number(seat, *number),
            MoveWorkspaceToOutput(direction) => self.move_workspace_to_output(seat, *direction),
            MoveWorkspaceToOutputName(name) => self.move_workspace_to_output_by_name(seat, name),
            LayoutSwitch { kind, orientation } => self.layout_switch(seat, *kind, *orientation),
        }
    }

    /// Runs the action of a key or button binding.
    pub fn run_action(&mut self, action: &Action, seat: SeatId) {
        match action {
            Action::Command(command) => self.invoke(command, seat),
            Action::Exec { exec } => self.compositor.spawn(&exec.argv()),
        }
    }

    pub fn draw_tree(&self) -> String {
        let workspaces = self.workspaces.sorted().map(|ws| self.get_ascii_tree(ws)).collect();
        let tree = ascii_tree::Tree::Node("workspaces".to_owned(), workspaces);
        let mut out = String::new();
        if let Err(e) = ascii_tree::write_tree(&mut out, &tree) {
            error!("failed to draw tree: {e}");
        }
        out
    }

    fn get_ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let Some(container) = self.container(node) else {
            return ascii_tree::Tree::Leaf(vec![format!("{node:?} (missing)")]);
        };
        let status = if container.is_current { "☒ " } else { "☐ " };
        let visible = if container.visible { "" } else { " hidden" };
        let g = container.geometry;
        let desc = match &container.kind {
            ContainerKind::Workspace(ws) => {
                let output = ws.output.and_then(|o| self.outputs.get(o)).map(|o| o.name.as_str());
                format!("{status}workspace {:?} {:?} on {}", ws.name, ws.layout, output.unwrap_or("-"))
            }
            ContainerKind::Group { layout } => format!("{status}{node:?} {layout:?}"),
            ContainerKind::Surface(s) => {
                let app_id = s.app_id.as_deref().unwrap_or("?");
                let fullscreen = if s.fullscreen { " fullscreen" } else { "" };
                format!("{status}{node:?} {app_id}{fullscreen}")
            }
        };
        let desc = format!("{desc} {}x{}+{}+{}{visible}", g.width, g.height, g.x, g.y);
        let children: Vec<_> =
            node.children(&self.tree.map).map(|c| self.get_ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let output_name = |id: OutputId| self.outputs.get(id).map(|o| o.name.clone());
        let workspace_name = |node: NodeId| {
            self.container(node).and_then(Container::workspace).map(|ws| ws.name.clone())
        };
        let outputs = (self.outputs.iter())
            .map(|(_, o)| OutputSnapshot {
                name: o.name.clone(),
                geometry: o.geometry,
                scale: o.scale,
                workspace: o.current.and_then(workspace_name),
            })
            .collect();
        let workspaces = (self.workspaces.sorted())
            .filter_map(|node| {
                let container = self.container(node)?;
                let ws = container.workspace()?;
                Some(WorkspaceSnapshot {
                    name: ws.name.clone(),
                    number: ws.number,
                    output: ws.output.and_then(output_name),
                    layout: ws.layout,
                    visible: container.visible,
                    is_current: container.is_current,
                    geometry: container.geometry,
                    children: self.child_snapshots(node),
                })
            })
            .collect();
        Snapshot {
            outputs,
            workspaces,
            focused_workspace: self.workspaces.focused().and_then(workspace_name),
            focus: self.focus,
        }
    }

    fn child_snapshots(&self, node: NodeId) -> Vec<NodeSnapshot> {
        let snapshot = |child: NodeId| {
            let container = self.container(child)?;
            let common = NodeState {
                id: child,
                visible: container.visible,
                is_current: container.is_current,
                geometry: container.geometry,
            };
            Some(match &container.kind {
                ContainerKind::Group { layout } => NodeSnapshot::Group {
                    state: common,
                    layout: *layout,
                    children: self.child_snapshots(child),
                },
                ContainerKind::Surface(s) => NodeSnapshot::Surface {
                    state: common,
                    app_id: s.app_id.clone(),
                    fullscreen: s.fullscreen,
                },
                ContainerKind::Workspace(_) => return None,
            })
        };
        node.children(&self.tree.map).filter_map(snapshot).collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub outputs: Vec<OutputSnapshot>,
    pub workspaces: Vec<WorkspaceSnapshot>,
    pub focused_workspace: Option<String>,
    pub focus: Option<NodeId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputSnapshot {
    pub name: String,
    pub geometry: Rect,
    pub scale: i32,
    pub workspace: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkspaceSnapshot {
    pub name: String,
    pub number: Option<u64>,
    pub output: Option<String>,
    pub layout: Layout,
    pub visible: bool,
    pub is_current: bool,
    pub geometry: Rect,
    pub children: Vec<NodeSnapshot>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeState {
    pub id: NodeId,
    pub visible: bool,
    pub is_current: bool,
    pub geometry: Rect,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NodeSnapshot {
    Group {
        state: NodeState,
        layout: Layout,
        children: Vec<NodeSnapshot>,
    },
    Surface {
        state: NodeState,
        app_id: Option<String>,
        fullscreen: bool,
    },
}

impl NodeSnapshot {
    pub fn state(&self) -> &NodeState {
        match self {
            NodeSnapshot::Group { state, .. } | NodeSnapshot::Surface { state, .. } => state,
        }
    }
}
