//! Integer geometry in the compositor's global coordinate space.

use serde::{Deserialize, Serialize};

use crate::layout_engine::Orientation;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Point { x, y } }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn origin(&self) -> Point { Point::new(self.x, self.y) }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    pub fn max_y(&self) -> i32 { self.y + self.height }

    /// Center point, rounded towards the origin.
    pub fn center(&self) -> Point { Point::new(self.x + self.width / 2, self.y + self.height / 2) }

    pub fn same_size(&self, other: &Rect) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Splits the rect into `count` equal slices along `orientation`.
    ///
    /// Slice sizes use integer division, so any remainder is left uncovered at
    /// the far end of the rect.
    pub fn split(&self, orientation: Orientation, count: usize) -> impl Iterator<Item = Rect> + '_ {
        let count = count.max(1) as i32;
        (0..count).map(move |i| match orientation {
            Orientation::Horizontal => {
                let width = self.width / count;
                Rect::new(self.x + i * width, self.y, width, self.height)
            }
            Orientation::Vertical => {
                let height = self.height / count;
                Rect::new(self.x, self.y + i * height, self.width, height)
            }
        })
    }
}
