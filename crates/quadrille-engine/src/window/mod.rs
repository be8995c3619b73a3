//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, translates platform events into
//! the input snapshot, and drives the application frame callback.

mod runtime;

pub use runtime::{App, AppControl, FrameCtx, Shell, WindowConfig};
pub use winit::dpi::PhysicalSize;
pub use winit::window::Window;
