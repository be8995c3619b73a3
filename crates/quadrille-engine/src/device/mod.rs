//! Graphics device abstraction.
//!
//! This module is responsible for:
//! - the native fixed-function device seam ([`NativeDevice`] and friends),
//!   so rendering logic is backend-agnostic and testable
//! - shared-ownership resource handles with explicit release
//!   ([`VertexBuffer`], [`Texture`]) for the device-reset protocol
//! - scoped brackets with guaranteed, non-throwing release
//!   ([`SceneGuard`], [`BufferLock`])
//! - the production wgpu backend ([`GpuDevice`])

mod api;
mod error;
mod gpu;
mod handle;
mod params;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{
    DeviceState, NativeBuffer, NativeDevice, NativeTexture, StageChannel, TextureOp, VertexFormat,
};
pub use error::DeviceError;
pub use gpu::GpuDevice;
pub use handle::{BufferLock, Device, SceneGuard, Texture, VertexBuffer};
pub use params::{DepthFormat, PresentInterval, PresentParams};
