//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout and the status panel
//! - `styles`: color scheme and text styling

pub mod render;
pub mod styles;
