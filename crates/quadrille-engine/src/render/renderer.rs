use crate::device::{
    BufferLock, Device, DeviceError, DeviceState, PresentParams, SceneGuard, StageChannel, Texture,
    TextureOp, VertexBuffer, VertexFormat,
};
use crate::scene::Scene;
use crate::sprite::{BlendMode, Sprite, TextureId};

use super::packer::{self, FrameLayout};
use super::RenderError;

/// Shared vertex buffer capacity. Bounds how many sprites fit in one frame;
/// see [`RenderError::SceneTooLarge`].
const VERTEX_BUFFER_BYTES: u32 = 1 << 20;

/// Translation table from blending modes to native combine operations.
/// Built once, indexed by `BlendMode as usize`, never mutated.
static TEXTURE_OPS: [TextureOp; BlendMode::COUNT] = [
    TextureOp::Modulate,
    TextureOp::Add,
    TextureOp::SelectArg1,
    TextureOp::SelectArg2,
    TextureOp::Disable,
];

fn texture_op(mode: BlendMode) -> TextureOp {
    TEXTURE_OPS[mode as usize]
}

/// Sprite renderer.
///
/// Accumulates sprites into a scene and renders that scene on demand:
/// pack into the shared vertex buffer, sequence state changes and draws
/// inside one scene bracket, present. Device loss is handled by the
/// polling protocol around [`is_focused`](Self::is_focused) and
/// [`try_restore`](Self::try_restore); see the crate demo for the loop
/// discipline.
pub struct SpriteRenderer {
    scene: Scene,
    device: Device,
    present_params: PresentParams,
    vbuf: VertexBuffer,
}

impl SpriteRenderer {
    /// Builds a renderer on `device` with presentation parameters that stay
    /// fixed for the renderer's lifetime (they are re-applied on reset).
    pub fn new(device: Device, present_params: PresentParams) -> Result<Self, DeviceError> {
        let vbuf = device.create_vertex_buffer(VERTEX_BUFFER_BYTES)?;
        Ok(Self {
            scene: Scene::new(),
            device,
            present_params,
            vbuf,
        })
    }

    /// Queues a sprite for the current frame. Accepts all three sprite
    /// kinds via their `Into<Sprite>` conversions.
    pub fn add_to_scene(&mut self, sprite: impl Into<Sprite>) {
        self.scene.add(sprite);
    }

    /// Renders the queued scene: clear, pack, draw, present.
    pub fn render_scene(&mut self) -> Result<(), RenderError> {
        self.device.clear()?;

        let layout = self.copy_scene_to_vbuf()?;
        self.draw_to_back_buffer(&layout)?;

        if !self.device.present()? {
            log::debug!("present reported device loss; frame dropped");
        }
        Ok(())
    }

    /// Removes all queued sprites. Call once per frame after a successful
    /// render, otherwise sprites accumulate across frames.
    pub fn clear_scene(&mut self) {
        self.scene.clear();
    }

    /// Coarse render-loop gate: true iff the device is operational.
    pub fn is_focused(&self) -> Result<bool, DeviceError> {
        Ok(self.device.state()? == DeviceState::Operational)
    }

    /// Tri-state device health, for recovery logic.
    pub fn device_state(&self) -> Result<DeviceState, DeviceError> {
        self.device.state()
    }

    /// Advances the recovery protocol one step.
    ///
    /// No-op while the device is operational or still lost. Once the device
    /// reports it can be reset, releases the vertex buffer, resets the
    /// device with the stored presentation parameters, and recreates the
    /// buffer at its original capacity. Success is observed on the next
    /// health poll.
    pub fn try_restore(&mut self) -> Result<(), DeviceError> {
        match self.device.state()? {
            DeviceState::Operational => {
                log::debug!("renderer restore requested, but there is nothing to restore");
            }
            DeviceState::Lost => {
                log::debug!("renderer restore requested, but the device can't be restored yet");
            }
            DeviceState::NotReset => {
                log::info!("restoring renderer");
                self.vbuf.reset();
                self.device.reset(&self.present_params)?;
                self.vbuf = self.device.create_vertex_buffer(VERTEX_BUFFER_BYTES)?;
            }
        }
        Ok(())
    }

    /// Binds `id` to `stage`, clearing the stage for the empty identifier.
    fn set_texture(&self, stage: u32, id: &TextureId) -> Result<(), DeviceError> {
        if id.is_none() {
            self.device.set_texture(stage, &Texture::unbound())
        } else {
            let texture = self.device.create_texture(id)?;
            self.device.set_texture(stage, &texture)
        }
    }

    /// Applies `mode` to both channels of `stage`.
    fn set_blending(&self, stage: u32, mode: BlendMode) -> Result<(), DeviceError> {
        let op = texture_op(mode);
        self.device.set_stage_op(stage, StageChannel::Color, op)?;
        self.device.set_stage_op(stage, StageChannel::Alpha, op)
    }

    fn copy_scene_to_vbuf(&mut self) -> Result<FrameLayout, RenderError> {
        let mut lock = BufferLock::acquire(&self.vbuf)?;
        packer::pack_scene(&self.scene, lock.bytes_mut())
    }

    fn draw_to_back_buffer(&self, layout: &FrameLayout) -> Result<(), RenderError> {
        let _guard = SceneGuard::begin(&self.device)?;

        // Known baseline before colored sprites, which use neither stage.
        self.set_texture(0, &TextureId::none())?;
        self.set_blending(0, BlendMode::SelectArg1)?;
        self.set_texture(1, &TextureId::none())?;
        self.set_blending(1, BlendMode::Disable)?;

        self.device.set_vertex_buffer(
            &self.vbuf,
            layout.colored_offset() as u32,
            VertexFormat::Colored.stride(),
        )?;
        self.device.set_vertex_format(VertexFormat::Colored)?;
        for i in 0..self.scene.colored().len() {
            self.device.draw_strip(4 * i as u32, 2)?;
        }

        self.device.set_vertex_buffer(
            &self.vbuf,
            layout.textured_offset() as u32,
            VertexFormat::Textured.stride(),
        )?;
        self.device.set_vertex_format(VertexFormat::Textured)?;
        for (i, sprite) in self.scene.textured().iter().enumerate() {
            self.set_texture(0, &sprite.texture)?;
            self.set_blending(0, sprite.blending)?;
            self.device.draw_strip(4 * i as u32, 2)?;
        }

        self.device.set_vertex_buffer(
            &self.vbuf,
            layout.dual_textured_offset() as u32,
            VertexFormat::DualTextured.stride(),
        )?;
        self.device.set_vertex_format(VertexFormat::DualTextured)?;
        for (i, sprite) in self.scene.dual_textured().iter().enumerate() {
            self.set_texture(0, &sprite.texture0)?;
            self.set_blending(0, sprite.blending0)?;
            self.set_texture(1, &sprite.texture1)?;
            self.set_blending(1, sprite.blending1)?;
            self.device.draw_strip(4 * i as u32, 2)?;
        }

        Ok(())
    }
}
