mod containers;
mod engine;
pub(crate) mod graph;
mod moves;
mod outputs;
mod workspaces;

pub use containers::{Container, ContainerKind, Surface, Workspace};
pub use engine::{
    NodeSnapshot, NodeState, OutputSnapshot, Seat, SeatId, Snapshot, SurfaceInfo, WindowManager,
    WorkspaceSnapshot,
};
pub use graph::{Direction, Layout, LayoutKind, Orientation, StateChange, Target};
pub use outputs::{Output, OutputId, OutputInfo, Outputs};
pub use workspaces::{Workspaces, leading_number};

#[cfg(test)]
mod tests;
