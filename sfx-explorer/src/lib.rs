//! Headless explorer: loads configuration, opens a session against the
//! cluster endpoint and prints the tree every time a repaint is requested.

pub mod app;
pub mod error;
pub mod render;
