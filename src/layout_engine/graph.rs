use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumString, VariantNames, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn toggle(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Navigation direction.
///
/// The four spatial directions carry an axis and a polarity. `Parent` and
/// `Child` move along the tree instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumString, VariantNames, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
    Parent,
    Child,
}

impl Direction {
    /// Spatial directions usable to cross between outputs.
    pub const CROSS: [Direction; 4] =
        [Direction::Left, Direction::Right, Direction::Top, Direction::Bottom];

    pub fn orientation(self) -> Option<Orientation> {
        match self {
            Direction::Left | Direction::Right => Some(Orientation::Horizontal),
            Direction::Top | Direction::Bottom => Some(Orientation::Vertical),
            Direction::Parent | Direction::Child => None,
        }
    }

    /// Whether the direction moves forward in sibling order.
    pub fn is_next(self) -> bool { matches!(self, Direction::Right | Direction::Bottom) }

    pub fn is_tree(self) -> bool { matches!(self, Direction::Parent | Direction::Child) }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
            Direction::Parent => Direction::Child,
            Direction::Child => Direction::Parent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumString, VariantNames, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LayoutKind {
    Tabbed,
    Split,
}

/// Stored layout of a container.
///
/// "Toggle" is only ever a request (see [`Layout::switch`]), never a stored
/// layout.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    TabbedHorizontal,
    TabbedVertical,
    SplitHorizontal,
    SplitVertical,
}

impl Layout {
    pub fn new(kind: LayoutKind, orientation: Orientation) -> Self {
        use Layout::*;
        match (kind, orientation) {
            (LayoutKind::Tabbed, Orientation::Horizontal) => TabbedHorizontal,
            (LayoutKind::Tabbed, Orientation::Vertical) => TabbedVertical,
            (LayoutKind::Split, Orientation::Horizontal) => SplitHorizontal,
            (LayoutKind::Split, Orientation::Vertical) => SplitVertical,
        }
    }

    pub fn kind(self) -> LayoutKind {
        match self {
            Layout::TabbedHorizontal | Layout::TabbedVertical => LayoutKind::Tabbed,
            Layout::SplitHorizontal | Layout::SplitVertical => LayoutKind::Split,
        }
    }

    pub fn orientation(self) -> Orientation {
        match self {
            Layout::TabbedHorizontal | Layout::SplitHorizontal => Orientation::Horizontal,
            Layout::TabbedVertical | Layout::SplitVertical => Orientation::Vertical,
        }
    }

    pub fn is_tabbed(self) -> bool { self.kind() == LayoutKind::Tabbed }

    /// Resolves a layout request against the current layout.
    ///
    /// With no orientation ("toggle"), switching to a different kind lands on
    /// its horizontal variant, and requesting the current kind flips the
    /// orientation.
    pub fn switch(self, kind: LayoutKind, orientation: Option<Orientation>) -> Layout {
        let orientation = match orientation {
            Some(orientation) => orientation,
            None if kind != self.kind() => Orientation::Horizontal,
            None => self.orientation().toggle(),
        };
        Layout::new(kind, orientation)
    }
}

/// Workspace navigation relative to the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumString, VariantNames, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Target {
    Next,
    Previous,
    BackAndForth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumString, VariantNames, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StateChange {
    Enable,
    Disable,
    Toggle,
}

impl StateChange {
    pub fn apply(self, current: bool) -> bool {
        match self {
            StateChange::Enable => true,
            StateChange::Disable => false,
            StateChange::Toggle => !current,
        }
    }
}
