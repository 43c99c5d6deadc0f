pub mod commands;
pub mod common {
    pub mod collections;
    pub mod config;
    pub mod log;
}
pub mod layout_engine;
pub mod model {
    pub mod history;
    pub mod tree;
}
pub mod sys {
    pub mod compositor;
    pub mod geometry;
}
