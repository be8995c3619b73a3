//! Demo app: a handful of colored, textured and dual-textured quads
//! rendered every frame, with the device-loss polling discipline the
//! renderer expects from its caller.

use std::rc::Rc;

use anyhow::{Context, Result};

use quadrille_engine::device::{Device, GpuDevice, PresentParams};
use quadrille_engine::input::{Key, MouseButton};
use quadrille_engine::logging::{self, LogConfig};
use quadrille_engine::render::SpriteRenderer;
use quadrille_engine::sprite::{
    BlendMode, ColorVertex, ColoredSprite, DiffuseColor, DualTexturedSprite, DualTexturedVertex,
    Position, TexCoord, TextureId, TexturedSprite, TexturedVertex,
};
use quadrille_engine::window::{App, AppControl, FrameCtx, PhysicalSize, Shell, WindowConfig};

fn main() -> Result<()> {
    logging::init(LogConfig::default());

    set_curdir_to_appdir()?;

    let params = PresentParams::default();
    let config = WindowConfig {
        title: "quadrille demo".to_string(),
        width: params.width,
        height: params.height,
        fullscreen: params.fullscreen,
    };

    Shell::run(config, move |window| {
        let gpu = Rc::new(GpuDevice::new(window, &params)?);
        let renderer = SpriteRenderer::new(Device::from_raw(gpu.clone()), params)?;

        Ok(DemoApp {
            gpu,
            renderer,
            sprites: init_colored_sprites(),
            tex_sprites: init_textured_sprites(),
            tex2_sprites: init_multitextured_sprites(),
            a_was_pressed: false,
            left_mb_was_pressed: false,
        })
    })
}

/// Makes texture paths relative to the executable work regardless of the
/// directory the app is launched from.
fn set_curdir_to_appdir() -> Result<()> {
    let exe = std::env::current_exe().context("can't determine executable path")?;
    let dir = exe
        .parent()
        .context("executable path has no parent directory")?;
    std::env::set_current_dir(dir)
        .with_context(|| format!("can't change directory to {}", dir.display()))?;
    log::debug!("working directory set to {}", dir.display());
    Ok(())
}

struct DemoApp {
    gpu: Rc<GpuDevice>,
    renderer: SpriteRenderer,

    sprites: Vec<ColoredSprite>,
    tex_sprites: Vec<TexturedSprite>,
    tex2_sprites: Vec<DualTexturedSprite>,

    a_was_pressed: bool,
    left_mb_was_pressed: bool,
}

impl App for DemoApp {
    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        if ctx.input.key_down(Key::Escape) {
            return AppControl::Exit;
        }

        match self.frame(ctx) {
            Ok(()) => AppControl::Continue,
            Err(err) => {
                log::error!("frame failed: {err:#}");
                AppControl::Exit
            }
        }
    }
}

impl DemoApp {
    fn frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<()> {
        // Loss is a state, not an error: skip the frame and poke recovery.
        if !self.renderer.is_focused()? {
            self.renderer.try_restore()?;
            return Ok(());
        }

        self.handle_some_input(ctx);

        for _ in 0..2 {
            for s in &self.sprites {
                self.renderer.add_to_scene(s.clone());
            }
            for s in &self.tex_sprites {
                self.renderer.add_to_scene(s.clone());
            }
            for s in &self.tex2_sprites {
                self.renderer.add_to_scene(s.clone());
            }
        }

        self.renderer.render_scene()?;
        self.renderer.clear_scene();
        Ok(())
    }

    fn handle_some_input(&mut self, ctx: &FrameCtx<'_>) {
        let a_is_pressed = ctx.input.key_down(Key::A);
        let left_mb_is_pressed = ctx.input.button_down(MouseButton::Left);

        if a_is_pressed && !self.a_was_pressed {
            log::info!("key 'a' pressed");
        }
        if !a_is_pressed && self.a_was_pressed {
            log::info!("key 'a' released");
        }

        if left_mb_is_pressed && !self.left_mb_was_pressed {
            log::info!("left mouse button pressed");
        }
        if !left_mb_is_pressed && self.left_mb_was_pressed {
            log::info!("left mouse button released");
        }

        self.a_was_pressed = a_is_pressed;
        self.left_mb_was_pressed = left_mb_is_pressed;
    }
}

const DARK_RED: DiffuseColor = DiffuseColor::argb(0xff, 0x7f, 0x00, 0x00);
const RED: DiffuseColor = DiffuseColor::argb(0xff, 0xff, 0x00, 0x00);
const QUAD_UVS: [(f32, f32); 4] = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];

/// Corner positions in perimeter order: top-left, bottom-left,
/// bottom-right, top-right. The first corner is tinted darker so the
/// per-vertex color interpolation is visible.
fn quad_corners(left: f32, top: f32, right: f32, bottom: f32) -> [(f32, f32, DiffuseColor); 4] {
    [
        (left, top, DARK_RED),
        (left, bottom, RED),
        (right, bottom, RED),
        (right, top, RED),
    ]
}

fn colored_quad(left: f32, top: f32, right: f32, bottom: f32) -> ColoredSprite {
    let corners = quad_corners(left, top, right, bottom);
    ColoredSprite {
        vertices: std::array::from_fn(|i| {
            let (x, y, color) = corners[i];
            ColorVertex {
                position: Position::new(x, y, 0.5),
                color,
            }
        }),
    }
}

fn textured_quad(
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    texture: &str,
    blending: BlendMode,
) -> TexturedSprite {
    let corners = quad_corners(left, top, right, bottom);
    TexturedSprite {
        vertices: std::array::from_fn(|i| {
            let (x, y, color) = corners[i];
            TexturedVertex {
                position: Position::new(x, y, 0.5),
                color,
                uv: TexCoord::new(QUAD_UVS[i].0, QUAD_UVS[i].1),
            }
        }),
        texture: TextureId::new(texture),
        blending,
    }
}

fn init_colored_sprites() -> Vec<ColoredSprite> {
    vec![
        colored_quad(10.0, 10.0, 90.0, 90.0),
        colored_quad(210.0, 210.0, 290.0, 290.0),
    ]
}

fn init_textured_sprites() -> Vec<TexturedSprite> {
    vec![
        textured_quad(110.0, 110.0, 190.0, 190.0, "banana.png", BlendMode::Add),
        textured_quad(210.0, 10.0, 290.0, 90.0, "banana.png", BlendMode::Modulate),
    ]
}

fn init_multitextured_sprites() -> Vec<DualTexturedSprite> {
    let corners = quad_corners(10.0, 110.0, 90.0, 190.0);
    vec![DualTexturedSprite {
        vertices: std::array::from_fn(|i| {
            let (x, y, color) = corners[i];
            let uv = TexCoord::new(QUAD_UVS[i].0, QUAD_UVS[i].1);
            DualTexturedVertex {
                position: Position::new(x, y, 0.5),
                color,
                uv0: uv,
                uv1: uv,
            }
        }),
        texture0: TextureId::new("banana.png"),
        blending0: BlendMode::Add,
        texture1: TextureId::new("stain.png"),
        blending1: BlendMode::Modulate,
    }]
}
