//! Input snapshot.
//!
//! Public API is platform-agnostic and does not expose winit types. The
//! window shell translates platform events into [`InputEvent`]s; application
//! code queries the resulting [`InputState`] each frame.

mod state;
mod types;

pub use state::InputState;
pub use types::{InputEvent, Key, MouseButton};
