//! Sprite rendering subsystem.
//!
//! The renderer consumes the frame scene and issues fixed-function device
//! commands: pack all sprites into one shared vertex buffer, then draw each
//! category at its byte offset inside a scene bracket.
//!
//! Convention:
//! - sprite geometry is in back-buffer pixels (top-left origin, +Y down),
//!   already projected; the device backend converts to NDC
//! - sprite z is a depth value in [0, 1], used for depth ordering only

mod packer;
mod renderer;

pub use renderer::SpriteRenderer;

use thiserror::Error;

use crate::device::DeviceError;

/// Errors surfaced by scene rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A native device call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Packing the scene would overflow the shared vertex buffer. Nothing
    /// was written; the frame must be split or the scene reduced.
    #[error("scene needs {required} bytes but the vertex buffer holds {capacity}")]
    SceneTooLarge { required: usize, capacity: usize },
}
