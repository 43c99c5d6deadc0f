use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, instrument, trace};

use super::engine::{SeatId, WindowManager};
use super::graph::{Direction, Orientation};
use crate::common::collections::BTreeMap;
use crate::common::config::VirtualOutput;
use crate::model::tree::NodeId;
use crate::sys::compositor::Compositor;
use crate::sys::geometry::Rect;

slotmap::new_key_type! {
    pub struct OutputId;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub name: String,
    pub geometry: Rect,
    pub scale: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub geometry: Rect,
    pub scale: i32,
    /// Workspace shown on this output. Only empty while the output is set up.
    pub current: Option<NodeId>,
}

/// Registry of the outputs known to the window manager.
#[derive(Default, Serialize, Deserialize)]
pub struct Outputs {
    map: SlotMap<OutputId, Output>,
}

impl Outputs {
    pub fn get(&self, id: OutputId) -> Option<&Output> { self.map.get(id) }

    pub(crate) fn get_mut(&mut self, id: OutputId) -> Option<&mut Output> { self.map.get_mut(id) }

    pub fn ids(&self) -> impl Iterator<Item = OutputId> + '_ { self.map.keys() }

    pub fn iter(&self) -> impl Iterator<Item = (OutputId, &Output)> + '_ { self.map.iter() }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn by_name(&self, name: &str) -> Option<OutputId> {
        self.map.iter().find(|(_, o)| o.name == name).map(|(id, _)| id)
    }

    fn insert(&mut self, info: OutputInfo) -> OutputId {
        self.map.insert(Output {
            name: info.name,
            geometry: info.geometry,
            scale: info.scale,
            current: None,
        })
    }

    fn remove(&mut self, id: OutputId) -> Option<Output> { self.map.remove(id) }

    pub(crate) fn forget_workspace(&mut self, workspace: NodeId) {
        for output in self.map.values_mut() {
            if output.current == Some(workspace) {
                output.current = None;
            }
        }
    }

    /// Finds the output next to `from` in a spatial direction.
    ///
    /// Candidates must start beyond the matching edge of `from` and have their
    /// center within half of `from`'s size on the other axis. Among those, the
    /// one whose center deviates least from `from`'s center on the other axis
    /// wins.
    pub fn adjacent(&self, from: OutputId, direction: Direction) -> Option<OutputId> {
        let orientation = direction.orientation()?;
        let current = self.map.get(from)?.geometry;
        let center = current.center();
        let (half_width, half_height) = (current.width / 2, current.height / 2);
        let (min, max) = match direction {
            Direction::Top => (i32::MIN, current.y),
            Direction::Bottom => (current.max_y(), i32::MAX),
            Direction::Left => (i32::MIN, current.x),
            Direction::Right => (current.max_x(), i32::MAX),
            Direction::Parent | Direction::Child => return None,
        };

        let (mut best_dx, mut best_dy) = (i32::MAX, i32::MAX);
        let mut target = None;
        for (id, output) in &self.map {
            if id == from {
                continue;
            }
            let other = output.geometry.center();
            let dx = (center.x - other.x).abs();
            let dy = (center.y - other.y).abs();
            let edge = match orientation {
                Orientation::Vertical => {
                    if dx > half_width || dx > best_dx {
                        continue;
                    }
                    output.geometry.y
                }
                Orientation::Horizontal => {
                    if dy > half_height || dy > best_dy {
                        continue;
                    }
                    output.geometry.x
                }
            };
            trace!(?id, dx, dy, edge, min, max, "adjacent candidate");
            if edge < min || edge > max {
                continue;
            }
            best_dx = dx;
            best_dy = dy;
            target = Some(id);
        }
        target
    }
}

impl<C: Compositor> WindowManager<C> {
    /// Registers an output and gives it a workspace.
    ///
    /// Workspaces left without an output are adopted, the most recent one
    /// being shown. Otherwise a fresh anonymous workspace is created.
    #[instrument(skip(self))]
    pub fn add_output(&mut self, info: OutputInfo) -> OutputId {
        let id = self.outputs.insert(info);
        let orphans: Vec<NodeId> = (self.workspaces.history().iter().copied())
            .filter(|&ws| self.output_of(ws).is_none())
            .collect();
        let shown = match orphans.first() {
            Some(&first) => {
                for &workspace in &orphans {
                    self.set_workspace_output(workspace, Some(id));
                }
                first
            }
            None => {
                let workspace = self.create_workspace(None, None);
                self.set_workspace_output(workspace, Some(id));
                workspace
            }
        };
        let focused = self.workspaces.focused();
        self.output_set_current_workspace(id, shown);
        // Showing promoted `shown`; focus stays where it was.
        if let Some(focused) = focused.filter(|&ws| ws != shown) {
            self.workspaces.promote(focused);
        }
        if self.workspaces.focused() == Some(shown) {
            // An adopted workspace lost its current path with its output.
            let next = self.last(shown);
            self.mark_current_path(next, true);
            self.sync_focus(next, None);
        }
        id
    }

    /// Removes an output, migrating its workspaces to the most recently used
    /// remaining output.
    #[instrument(skip(self))]
    pub fn remove_output(&mut self, id: OutputId) {
        if self.outputs.get(id).is_none() {
            return;
        }
        let on_output = |wm: &Self, ws: NodeId| wm.output_of(ws) == Some(id);
        let affected: Vec<NodeId> =
            (self.workspaces.history().iter().copied()).filter(|&ws| on_output(self, ws)).collect();
        let focused_here = self.workspaces.focused().is_some_and(|ws| on_output(self, ws));
        let receiver = (self.workspaces.history().iter())
            .filter_map(|&ws| self.output_of(ws))
            .find(|&o| o != id)
            .or_else(|| self.outputs.ids().find(|&o| o != id));
        debug!(?affected, ?receiver, focused_here, "migrating workspaces");

        let mut old_surface = None;
        if focused_here && let Some(current) = self.current() {
            old_surface = Some(current).filter(|&n| self.is_surface(n));
            self.mark_current_path(current, false);
        }
        let removed_current = self.outputs.remove(id).and_then(|o| o.current);

        for workspace in affected {
            self.hide(workspace);
            let reclaim = Some(workspace) == removed_current
                && workspace.is_empty(&self.tree.map)
                && receiver.is_some();
            if reclaim {
                self.free_workspace(workspace);
                continue;
            }
            match receiver {
                Some(receiver) => {
                    self.set_workspace_output(workspace, Some(receiver));
                }
                None => {
                    if let Some(ws) = self.container_mut(workspace).and_then(|c| c.workspace_mut()) {
                        ws.output = None;
                    }
                }
            }
        }

        if !focused_here {
            return;
        }
        let shown = receiver.and_then(|r| self.outputs.get(r)).and_then(|o| o.current);
        match shown {
            Some(workspace) => {
                let next = self.last(workspace);
                self.mark_current_path(next, true);
                self.sync_focus(next, old_surface);
            }
            None => self.set_focus(None),
        }
    }

    #[instrument(skip(self))]
    pub fn output_geometry_changed(&mut self, id: OutputId, geometry: Rect, scale: i32) {
        let Some(output) = self.outputs.get_mut(id) else { return };
        output.geometry = geometry;
        output.scale = scale;
        let workspaces: Vec<NodeId> = (self.workspaces.sorted())
            .filter(|&ws| self.output_of(ws) == Some(id))
            .collect();
        for workspace in workspaces {
            self.set_workspace_output(workspace, Some(id));
        }
    }

    /// Creates the virtual outputs of the configuration, left to right.
    pub fn outputs_from_config(
        &mut self,
        outputs: &BTreeMap<String, VirtualOutput>,
    ) -> Vec<OutputId> {
        let mut x = 0;
        let mut ids = Vec::with_capacity(outputs.len());
        for (name, output) in outputs {
            let geometry = Rect::new(x, 0, output.width, output.height);
            x += output.width;
            ids.push(self.add_output(OutputInfo {
                name: name.clone(),
                geometry,
                scale: output.scale,
            }));
        }
        ids
    }

    /// Shows `workspace` on `output`, hiding the previous one. Returns false
    /// if it was already shown there.
    pub(crate) fn output_set_current_workspace(
        &mut self,
        output: OutputId,
        workspace: NodeId,
    ) -> bool {
        let Some(o) = self.outputs.get_mut(output) else { return false };
        debug!(output = %o.name, ?workspace, previous = ?o.current, "output workspace");
        if o.current == Some(workspace) {
            return false;
        }
        let previous = o.current.replace(workspace);
        if let Some(previous) = previous {
            self.workspace_hide(previous);
        }
        self.workspace_show(workspace);
        true
    }

    fn focus_output_id(&mut self, output: OutputId) {
        let Some(workspace) = self.outputs.get(output).and_then(|o| o.current) else {
            return;
        };
        let next = self.last(workspace);
        self.set_current(next);
    }

    #[instrument(skip(self))]
    pub fn focus_output(&mut self, seat: SeatId, direction: Direction) {
        let from = self.workspaces.focused().and_then(|ws| self.output_of(ws));
        if let Some(to) = from.and_then(|from| self.outputs.adjacent(from, direction)) {
            self.focus_output_id(to);
        }
    }

    #[instrument(skip(self))]
    pub fn focus_output_by_name(&mut self, seat: SeatId, name: &str) {
        if let Some(output) = self.outputs.by_name(name) {
            self.focus_output_id(output);
        }
    }

    #[instrument(skip(self))]
    pub fn move_workspace_to_output(&mut self, seat: SeatId, direction: Direction) {
        let from = self.workspaces.focused().and_then(|ws| self.output_of(ws));
        if let Some(to) = from.and_then(|from| self.outputs.adjacent(from, direction)) {
            self.move_workspace_to(to);
        }
    }

    #[instrument(skip(self))]
    pub fn move_workspace_to_output_by_name(&mut self, seat: SeatId, name: &str) {
        if let Some(output) = self.outputs.by_name(name) {
            self.move_workspace_to(output);
        }
    }

    /// Moves the focused workspace to `dest`, where it becomes the shown one.
    /// Its old output falls back to its most recent other workspace.
    fn move_workspace_to(&mut self, dest: OutputId) {
        let Some(workspace) = self.workspaces.focused() else { return };
        let Some(source) = self.output_of(workspace) else { return };
        if source == dest {
            return;
        }
        debug!(?workspace, ?source, ?dest, "move workspace to output");
        if let Some(o) = self.outputs.get_mut(source)
            && o.current == Some(workspace)
        {
            o.current = None;
        }
        let fallback = (self.workspaces.history().iter().copied())
            .find(|&ws| ws != workspace && self.output_of(ws) == Some(source));
        let fallback = match fallback {
            Some(fallback) => fallback,
            None => {
                let fresh = self.create_workspace(None, None);
                self.set_workspace_output(fresh, Some(source));
                fresh
            }
        };
        self.output_set_current_workspace(source, fallback);
        self.set_workspace_output(workspace, Some(dest));
        self.output_set_current_workspace(dest, workspace);
    }
}
