//! Plain data types shared by the window manager modules.

pub mod geometry;

pub use geometry::Geometry;
