use std::collections::HashSet;

use super::types::{InputEvent, Key, MouseButton};

/// Snapshot of user input for one window.
///
/// Holds "is down" information, the pointer position, and the wheel delta
/// accumulated since the last frame. The window shell feeds events in;
/// application code only queries.
#[derive(Debug, Default)]
pub struct InputState {
    focused: bool,
    pointer_pos: Option<(f32, f32)>,
    wheel_delta: f32,
    keys_down: HashSet<Key>,
    buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Applies one platform-agnostic event to the snapshot.
    pub fn apply_event(&mut self, ev: InputEvent) {
        match ev {
            InputEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    // Avoid stuck keys/buttons when focus changes mid-press.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }

            InputEvent::PointerMoved { x, y } => {
                self.pointer_pos = Some((x, y));
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
            }

            InputEvent::Button { button, pressed } => {
                if pressed {
                    self.buttons_down.insert(button);
                } else {
                    self.buttons_down.remove(&button);
                }
            }

            InputEvent::Wheel { delta } => {
                self.wheel_delta += delta;
            }

            InputEvent::Key { key, pressed } => {
                if pressed {
                    self.keys_down.insert(key);
                } else {
                    self.keys_down.remove(&key);
                }
            }
        }
    }

    /// Resets per-frame accumulators; called by the shell after each frame.
    pub fn end_frame(&mut self) {
        self.wheel_delta = 0.0;
    }

    #[inline]
    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    #[inline]
    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Pointer position in logical pixels, `None` while outside the window.
    #[inline]
    pub fn pointer_pos(&self) -> Option<(f32, f32)> {
        self.pointer_pos
    }

    /// Wheel movement accumulated this frame, in lines.
    #[inline]
    pub fn wheel_delta(&self) -> f32 {
        self.wheel_delta
    }

    #[inline]
    pub fn focused(&self) -> bool {
        self.focused
    }
}
