use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::containers::{Container, ContainerKind, Workspace};
use super::engine::{SeatId, WindowManager};
use super::graph::Target;
use super::outputs::OutputId;
use crate::common::collections::HashMap;
use crate::model::tree::NodeId;
use crate::sys::compositor::Compositor;

/// Sort key of a workspace: numbered ones first by number, then the rest by
/// name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    unnumbered: bool,
    number: u64,
    name: String,
}

impl SortKey {
    fn new(name: &str, number: Option<u64>) -> Self {
        SortKey {
            unnumbered: number.is_none(),
            number: number.unwrap_or(0),
            name: name.to_owned(),
        }
    }
}

/// The set of all workspaces, indexed by name and number.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Workspaces {
    by_name: HashMap<String, NodeId>,
    by_number: HashMap<u64, NodeId>,
    sorted: Vec<(SortKey, NodeId)>,
    /// Compositor-wide focus recency, most recent first.
    history: Vec<NodeId>,
}

impl Workspaces {
    pub fn is_empty(&self) -> bool { self.sorted.is_empty() }

    pub fn len(&self) -> usize { self.sorted.len() }

    pub fn by_name(&self, name: &str) -> Option<NodeId> { self.by_name.get(name).copied() }

    pub fn by_number(&self, number: u64) -> Option<NodeId> { self.by_number.get(&number).copied() }

    /// The most recently focused workspace.
    pub fn focused(&self) -> Option<NodeId> { self.history.first().copied() }

    pub fn history(&self) -> &[NodeId] { &self.history }

    pub fn sorted(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sorted.iter().map(|(_, node)| *node)
    }

    /// First free number found by scanning the sorted numbers from zero.
    ///
    /// The scan stops at the first number larger than the counter, so gaps
    /// below the lowest existing number are reused first.
    pub fn next_number(&self) -> u64 {
        let mut number = 0;
        for (key, _) in &self.sorted {
            if key.unnumbered || key.number > number {
                break;
            }
            number += 1;
        }
        number
    }

    /// Neighbor of `node` in sorted order.
    pub fn neighbor(&self, node: NodeId, next: bool) -> Option<NodeId> {
        let idx = self.sorted.iter().position(|(_, n)| *n == node)?;
        let idx = if next { idx.checked_add(1)? } else { idx.checked_sub(1)? };
        self.sorted.get(idx).map(|(_, n)| *n)
    }

    fn insert(&mut self, node: NodeId, name: &str, number: Option<u64>) {
        self.by_name.insert(name.to_owned(), node);
        if let Some(number) = number {
            self.by_number.insert(number, node);
        }
        let key = SortKey::new(name, number);
        let idx = self.sorted.partition_point(|(k, _)| *k <= key);
        self.sorted.insert(idx, (key, node));
        self.history.push(node);
    }

    fn remove(&mut self, node: NodeId) {
        self.by_name.retain(|_, n| *n != node);
        let Some(idx) = self.sorted.iter().position(|(_, n)| *n == node) else { return };
        let (key, _) = self.sorted.remove(idx);
        if !key.unnumbered && self.by_number.get(&key.number) == Some(&node) {
            self.by_number.remove(&key.number);
            let other = self.sorted.iter().find(|(k, _)| !k.unnumbered && k.number == key.number);
            if let Some((_, other)) = other {
                self.by_number.insert(key.number, *other);
            }
        }
        self.history.retain(|n| *n != node);
    }

    pub(crate) fn promote(&mut self, node: NodeId) {
        if let Some(idx) = self.history.iter().position(|n| *n == node) {
            self.history[..=idx].rotate_right(1);
        }
    }
}

/// Number carried by a workspace name: its leading decimal digits.
pub fn leading_number(name: &str) -> Option<u64> {
    let end = name.find(|c: char| !c.is_ascii_digit()).unwrap_or(name.len());
    name[..end].parse().ok()
}

impl<C: Compositor> WindowManager<C> {
    /// Creates a workspace, or returns the existing one with the same name.
    ///
    /// A named workspace takes its number from the name. An anonymous one is
    /// named after its number, which defaults to the next free one.
    pub(crate) fn create_workspace(&mut self, name: Option<&str>, number: Option<u64>) -> NodeId {
        let (name, number) = match name {
            Some(name) => (name.to_owned(), leading_number(name)),
            None => {
                let number = number.unwrap_or_else(|| self.workspaces.next_number());
                (number.to_string(), Some(number))
            }
        };
        if let Some(existing) = self.workspaces.by_name(&name) {
            return existing;
        }
        let node = self.tree.mk_node().into_root();
        let mut container = Container::new(ContainerKind::Workspace(Workspace {
            name: name.clone(),
            number,
            output: None,
            layout: self.default_layout,
        }));
        container.is_current = self.workspaces.is_empty();
        self.tree.data.containers.insert(node, container);
        self.workspaces.insert(node, &name, number);
        debug!(?node, %name, ?number, "new workspace");
        node
    }

    /// Binds a workspace to an output and fits it to the output's geometry.
    ///
    /// Without an explicit output, the output of the focused workspace is
    /// used, then any output at all.
    pub(crate) fn set_workspace_output(
        &mut self,
        workspace: NodeId,
        output: Option<OutputId>,
    ) -> Option<OutputId> {
        let output = output
            .or_else(|| self.workspaces.focused().and_then(|ws| self.output_of(ws)))
            .or_else(|| self.outputs.ids().next());
        let geometry = output.and_then(|o| self.outputs.get(o)).map(|o| o.geometry);
        let Some(container) = self.container_mut(workspace) else { return None };
        if let ContainerKind::Workspace(ws) = &mut container.kind {
            ws.output = output;
        }
        if let Some(geometry) = geometry {
            container.geometry = geometry;
            self.resize(workspace);
        }
        output
    }

    pub fn output_of(&self, workspace: NodeId) -> Option<OutputId> {
        self.container(workspace).and_then(|c| c.workspace()).and_then(|ws| ws.output)
    }

    pub(crate) fn workspace_show(&mut self, workspace: NodeId) {
        debug!(?workspace, "show workspace");
        self.workspaces.promote(workspace);
        self.show(workspace);
    }

    pub(crate) fn workspace_hide(&mut self, workspace: NodeId) {
        debug!(?workspace, "hide workspace");
        self.hide(workspace);
        if workspace.is_empty(&self.tree.map) {
            self.free_workspace(workspace);
        }
    }

    pub(crate) fn free_workspace(&mut self, workspace: NodeId) {
        if !self.is_workspace(workspace) {
            debug_assert!(false, "{workspace:?} is not a workspace");
            return;
        }
        if !workspace.is_empty(&self.tree.map) {
            debug_assert!(false, "freeing non-empty workspace {workspace:?}");
            error!(?workspace, "refusing to free a workspace that still has children");
            return;
        }
        debug!(?workspace, "free workspace");
        self.hide(workspace);
        self.workspaces.remove(workspace);
        self.outputs.forget_workspace(workspace);
        workspace.detach(&mut self.tree).remove();
    }

    /// Makes `workspace` the shown workspace of its output and moves the
    /// current path into it. Returns false if it already was shown.
    pub(crate) fn focus_workspace_node(&mut self, workspace: NodeId) -> bool {
        let output = self.output_of(workspace);
        let Some(output) = output.or_else(|| self.set_workspace_output(workspace, None)) else {
            return false;
        };
        let old = self.current();
        let old_surface = old.filter(|&n| self.is_surface(n));
        if let Some(old) = old {
            self.mark_current_path(old, false);
        }
        let switched = self.output_set_current_workspace(output, workspace);
        let next = self.last(workspace);
        self.mark_current_path(next, true);
        self.sync_focus(next, old_surface);
        switched
    }

    fn resolve_target(&self, target: Target) -> Option<NodeId> {
        let focused = self.workspaces.focused()?;
        match target {
            Target::Next => self.workspaces.neighbor(focused, true),
            Target::Previous => self.workspaces.neighbor(focused, false),
            Target::BackAndForth => self.workspaces.history().get(1).copied(),
        }
    }

    /// Looks a workspace up by name, creating it on the most recent output
    /// when missing.
    pub(crate) fn workspace_named(&mut self, name: &str) -> NodeId {
        if let Some(workspace) = self.workspaces.by_name(name) {
            return workspace;
        }
        let workspace = self.create_workspace(Some(name), None);
        self.set_workspace_output(workspace, None);
        workspace
    }

    pub(crate) fn workspace_numbered(&mut self, number: u64) -> NodeId {
        if let Some(workspace) = self.workspaces.by_number(number) {
            return workspace;
        }
        let workspace = self.create_workspace(None, Some(number));
        self.set_workspace_output(workspace, None);
        workspace
    }

    #[instrument(skip(self))]
    pub fn focus_workspace(&mut self, seat: SeatId, target: Target) {
        let Some(workspace) = self.resolve_target(target) else {
            debug!("no workspace there");
            return;
        };
        self.focus_workspace_node(workspace);
    }

    /// Focusing the already focused workspace goes back and forth instead.
    #[instrument(skip(self))]
    pub fn focus_workspace_by_name(&mut self, seat: SeatId, name: &str) {
        let workspace = self.workspace_named(name);
        self.focus_or_back_and_forth(seat, workspace);
    }

    #[instrument(skip(self))]
    pub fn focus_workspace_by_number(&mut self, seat: SeatId, number: u64) {
        let workspace = self.workspace_numbered(number);
        self.focus_or_back_and_forth(seat, workspace);
    }

    fn focus_or_back_and_forth(&mut self, seat: SeatId, workspace: NodeId) {
        if self.workspaces.focused() == Some(workspace) && self.is_visible(workspace) {
            self.focus_workspace(seat, Target::BackAndForth);
        } else {
            self.focus_workspace_node(workspace);
        }
    }

    #[instrument(skip(self))]
    pub fn move_to_workspace(&mut self, seat: SeatId, target: Target) {
        if let Some(workspace) = self.resolve_target(target) {
            self.move_current_into(workspace);
        }
    }

    #[instrument(skip(self))]
    pub fn move_to_workspace_by_name(&mut self, seat: SeatId, name: &str) {
        if self.current().is_none_or(|c| self.is_workspace(c)) {
            return;
        }
        let workspace = self.workspace_named(name);
        self.move_current_into(workspace);
    }

    #[instrument(skip(self))]
    pub fn move_to_workspace_by_number(&mut self, seat: SeatId, number: u64) {
        if self.current().is_none_or(|c| self.is_workspace(c)) {
            return;
        }
        let workspace = self.workspace_numbered(number);
        self.move_current_into(workspace);
    }

    /// Moves the current container into `workspace`, under its most recent
    /// container. Focus stays in the source workspace.
    fn move_current_into(&mut self, workspace: NodeId) {
        let Some(current) = self.current() else { return };
        if self.is_workspace(current) {
            return;
        }
        let source = self.workspace_of(current);
        if source == workspace {
            return;
        }
        let mut parent = self.last(workspace);
        if self.is_surface(parent) {
            parent = parent.parent(&self.tree.map).unwrap_or(workspace);
        }
        debug!(?current, ?source, ?workspace, "move to workspace");
        let old_surface = Some(current).filter(|&n| self.is_surface(n));
        self.mark_current_path(current, false);
        self.reparent(current, Some(parent));
        let next = self.last(source);
        self.mark_current_path(next, true);
        self.sync_focus(next, old_surface);
    }
}
