use std::sync::Arc;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::input::{InputEvent, InputState, Key, MouseButton};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "quadrille".to_string(),
            width: 1280,
            height: 1024,
            fullscreen: false,
        }
    }
}

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Per-frame context passed to [`App::on_frame`].
pub struct FrameCtx<'a> {
    pub window: &'a Window,
    pub input: &'a InputState,
}

/// Application contract implemented by the layer above the shell.
pub trait App {
    /// Raw window-message hook; return [`AppControl::Exit`] to close.
    ///
    /// Input events are already folded into the input snapshot before this
    /// is called; most apps only need [`on_frame`](Self::on_frame).
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called when the drawable size changes (resize, minimize, restore).
    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        let _ = size;
    }

    /// Called once per frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;
}

/// Owns the event loop and the single application window.
///
/// The shell creates the window, builds the app from it, keeps the input
/// snapshot current, requests continuous redraws, and exits when the window
/// is closed or a callback asks for it.
pub struct Shell;

impl Shell {
    pub fn run<A, F>(config: WindowConfig, make_app: F) -> Result<()>
    where
        A: App + 'static,
        F: FnOnce(Arc<Window>) -> Result<A> + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = ShellState {
            config,
            make_app: Some(make_app),
            window: None,
            app: None,
            input: InputState::default(),
            startup_error: None,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.startup_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct ShellState<A, F> {
    config: WindowConfig,
    make_app: Option<F>,
    window: Option<Arc<Window>>,
    app: Option<A>,
    input: InputState,
    startup_error: Option<anyhow::Error>,
}

impl<A, F> ApplicationHandler for ShellState<A, F>
where
    A: App + 'static,
    F: FnOnce(Arc<Window>) -> Result<A> + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(
                self.config.width as f64,
                self.config.height as f64,
            ));
        if self.config.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.startup_error = Some(anyhow::Error::new(err).context("failed to create window"));
                event_loop.exit();
                return;
            }
        };

        if let Some(make_app) = self.make_app.take() {
            match make_app(window.clone()) {
                Ok(app) => self.app = Some(app),
                Err(err) => {
                    self.startup_error = Some(err.context("failed to initialize application"));
                    event_loop.exit();
                    return;
                }
            }
        }

        log::info!("window created: {}", self.config.title);
        window.request_redraw();
        self.window = Some(window);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: the render loop polls device health each frame,
        // so frames must keep coming even with no window activity.
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.clone() else {
            return;
        };

        if let Some(ev) = translate_input_event(&window, &event) {
            self.input.apply_event(ev);
        }

        if let Some(app) = self.app.as_mut() {
            if app.on_window_event(&event) == AppControl::Exit {
                event_loop.exit();
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("window close requested");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(app) = self.app.as_mut() {
                    app.on_resize(size);
                }
                window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                if let Some(app) = self.app.as_mut() {
                    app.on_resize(size);
                }
                window.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                // Split borrows so the frame context can hold the input
                // snapshot while the app is borrowed mutably.
                let Self { app, input, .. } = self;
                let mut exit = false;
                if let Some(app) = app.as_mut() {
                    let mut ctx = FrameCtx {
                        window: &*window,
                        input,
                    };
                    if app.on_frame(&mut ctx) == AppControl::Exit {
                        exit = true;
                    }
                }
                self.input.end_frame();
                if exit {
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}

fn translate_input_event(window: &Window, event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::Focused(focused) => Some(InputEvent::Focused(*focused)),

        WindowEvent::CursorLeft { .. } => Some(InputEvent::PointerLeft),

        WindowEvent::CursorMoved { position, .. } => {
            let scale = window.scale_factor();
            let logical = position.to_logical::<f64>(scale);
            Some(InputEvent::PointerMoved {
                x: logical.x as f32,
                y: logical.y as f32,
            })
        }

        WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::Button {
            button: map_mouse_button(*button),
            pressed: *state == ElementState::Pressed,
        }),

        WindowEvent::MouseWheel { delta, .. } => {
            let delta = match delta {
                MouseScrollDelta::LineDelta(_, y) => *y,
                // Rough pixels-to-lines conversion for touchpads.
                MouseScrollDelta::PixelDelta(p) => (p.y / 20.0) as f32,
            };
            Some(InputEvent::Wheel { delta })
        }

        WindowEvent::KeyboardInput { event, .. } => Some(InputEvent::Key {
            key: map_key(event.physical_key),
            pressed: event.state == ElementState::Pressed,
        }),

        _ => None,
    }
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Other(3),
        WinitMouseButton::Forward => MouseButton::Other(4),
        WinitMouseButton::Other(v) => MouseButton::Other(v),
    }
}

fn map_key(key: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = key else {
        return Key::Unknown(0);
    };

    match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter => Key::Enter,
        KeyCode::Space => Key::Space,

        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,

        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,

        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,

        KeyCode::Digit0 => Key::Digit0,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::Digit5 => Key::Digit5,
        KeyCode::Digit6 => Key::Digit6,
        KeyCode::Digit7 => Key::Digit7,
        KeyCode::Digit8 => Key::Digit8,
        KeyCode::Digit9 => Key::Digit9,

        other => Key::Unknown(other as u32),
    }
}
