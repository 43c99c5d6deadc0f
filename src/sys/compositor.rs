//! The outward side of the window manager.
//!
//! Everything the window manager decides is pushed into a [`Compositor`]: the
//! protocol layer resizes and activates clients, the renderer maps views into
//! layers, and the input layer moves keyboard focus.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::layout_engine::SeatId;
use crate::model::tree::NodeId;
use crate::sys::geometry::Point;

/// Render layer a view is mapped into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Normal,
    Fullscreen,
}

pub trait Compositor {
    fn request_resize(&mut self, surface: NodeId, width: i32, height: i32);
    fn request_activate(&mut self, surface: NodeId, activated: bool);
    fn request_fullscreen(&mut self, surface: NodeId, fullscreen: bool);
    fn request_close(&mut self, surface: NodeId);
    fn set_keyboard_focus(&mut self, seat: SeatId, surface: Option<NodeId>);
    /// Inserts the view into `layer` and damages it.
    fn map_view(&mut self, surface: NodeId, layer: Layer);
    /// Damages the region below the view and removes it from its layer.
    fn unmap_view(&mut self, surface: NodeId);
    fn position_view(&mut self, surface: NodeId, position: Point);
    fn spawn(&mut self, argv: &[String]);
    fn quit(&mut self);
}

/// Compositor that only reports what it is asked to do.
#[derive(Default)]
pub struct LoggingCompositor {
    pub quit_requested: bool,
}

impl Compositor for LoggingCompositor {
    fn request_resize(&mut self, surface: NodeId, width: i32, height: i32) {
        info!(?surface, width, height, "resize");
    }

    fn request_activate(&mut self, surface: NodeId, activated: bool) {
        info!(?surface, activated, "activate");
    }

    fn request_fullscreen(&mut self, surface: NodeId, fullscreen: bool) {
        info!(?surface, fullscreen, "fullscreen");
    }

    fn request_close(&mut self, surface: NodeId) {
        info!(?surface, "close");
    }

    fn set_keyboard_focus(&mut self, seat: SeatId, surface: Option<NodeId>) {
        info!(?seat, ?surface, "keyboard focus");
    }

    fn map_view(&mut self, surface: NodeId, layer: Layer) {
        info!(?surface, ?layer, "map");
    }

    fn unmap_view(&mut self, surface: NodeId) {
        info!(?surface, "unmap");
    }

    fn position_view(&mut self, surface: NodeId, position: Point) {
        info!(?surface, x = position.x, y = position.y, "position");
    }

    fn spawn(&mut self, argv: &[String]) {
        info!(?argv, "spawn");
    }

    fn quit(&mut self) {
        info!("quit");
        self.quit_requested = true;
    }
}
