//! Quadrille engine crate.
//!
//! A minimal real-time sprite renderer atop a fixed-function graphics
//! device, plus the platform pieces around it: window shell, input
//! snapshot, logging.

pub mod device;
pub mod input;
pub mod logging;
pub mod render;
pub mod scene;
pub mod sprite;
pub mod window;
