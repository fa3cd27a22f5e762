pub mod config;
pub mod directory;
pub mod unit;

// Drawing surface and styles
pub mod canvas;
pub mod theme;

// Geometry, list position, ordering
pub mod layout;
pub mod list_view;
pub mod search;
pub mod sort;

// Rendering
pub mod modal;
pub mod render;

// Input handling
pub mod dispatch;
pub mod escape;
pub mod privilege;

pub use dispatch::{Dashboard, DashboardError, DashboardOptions, ElevationRequest, Flow, Input, Key};
