use std::any::Any;
use std::cell::RefMut;
use std::path::Path;
use std::rc::Rc;

use super::error::DeviceError;
use super::params::PresentParams;

/// Health of the native device, advanced only by polling [`NativeDevice::state`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceState {
    /// Device renders normally.
    Operational,
    /// Device is unusable and cannot be recovered yet; keep polling.
    Lost,
    /// Device is recoverable; a [`NativeDevice::reset`] will bring it back.
    NotReset,
}

/// Native texture-combine operation for one stage channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureOp {
    Modulate,
    Add,
    SelectArg1,
    SelectArg2,
    Disable,
}

/// Which channel of a texture stage an operation applies to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StageChannel {
    Color,
    Alpha,
}

/// Vertex layout announced to the device before drawing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    /// Position + diffuse color.
    Colored,
    /// Position + diffuse color + one texture coordinate set.
    Textured,
    /// Position + diffuse color + two texture coordinate sets.
    DualTextured,
}

impl VertexFormat {
    /// Bytes per vertex in this layout: position x/y/z/w, packed ARGB color,
    /// then 0/1/2 texture coordinate pairs.
    pub const fn stride(self) -> u32 {
        match self {
            VertexFormat::Colored => 20,
            VertexFormat::Textured => 28,
            VertexFormat::DualTextured => 36,
        }
    }
}

/// GPU-owned vertex buffer memory.
///
/// `lock`/`unlock` bracket exclusive CPU write access to the buffer's
/// backing bytes; callers go through the `BufferLock` guard rather than
/// calling these directly.
pub trait NativeBuffer {
    fn as_any(&self) -> &dyn Any;

    /// Buffer capacity in bytes.
    fn capacity(&self) -> u32;

    /// Maps the buffer for exclusive CPU write access.
    ///
    /// Fails if the buffer is already locked.
    fn lock(&self) -> Result<RefMut<'_, Vec<u8>>, DeviceError>;

    /// Publishes the mapped bytes to the GPU and releases the mapping.
    ///
    /// The mapping obtained from [`lock`](Self::lock) must be dropped first.
    fn unlock(&self) -> Result<(), DeviceError>;
}

/// GPU-owned texture memory.
pub trait NativeTexture {
    fn as_any(&self) -> &dyn Any;
}

/// The native fixed-function rendering device for one window.
///
/// Object-safe so the renderer can run against the production backend
/// ([`GpuDevice`](super::GpuDevice)) or a scripted device in tests. All
/// calls are synchronous and thread-confined; the device performs no
/// internal locking.
pub trait NativeDevice {
    /// Creates a vertex buffer with the given byte capacity.
    fn create_vertex_buffer(&self, bytes: u32) -> Result<Rc<dyn NativeBuffer>, DeviceError>;

    /// Loads a texture from an image file.
    fn create_texture(&self, path: &Path) -> Result<Rc<dyn NativeTexture>, DeviceError>;

    /// Binds `buffer` as the vertex source, starting `offset` bytes in,
    /// with `stride` bytes per vertex.
    fn set_vertex_buffer(
        &self,
        buffer: &dyn NativeBuffer,
        offset: u32,
        stride: u32,
    ) -> Result<(), DeviceError>;

    /// Announces the layout of subsequently drawn vertices.
    fn set_vertex_format(&self, format: VertexFormat) -> Result<(), DeviceError>;

    /// Binds a texture to `stage`, or clears the stage when `None`.
    fn set_texture(&self, stage: u32, texture: Option<&dyn NativeTexture>)
        -> Result<(), DeviceError>;

    /// Sets the combine operation for one channel of `stage`.
    fn set_stage_op(
        &self,
        stage: u32,
        channel: StageChannel,
        op: TextureOp,
    ) -> Result<(), DeviceError>;

    /// Clears the back buffer and depth buffer.
    fn clear(&self) -> Result<(), DeviceError>;

    /// Opens the frame drawing bracket. Must be balanced by
    /// [`end_scene`](Self::end_scene); callers use the `SceneGuard`.
    fn begin_scene(&self) -> Result<(), DeviceError>;

    /// Closes the frame drawing bracket.
    fn end_scene(&self) -> Result<(), DeviceError>;

    /// Draws `triangles` strip triangles starting at `first_vertex` of the
    /// bound vertex buffer.
    fn draw_strip(&self, first_vertex: u32, triangles: u32) -> Result<(), DeviceError>;

    /// Presents the back buffer. Returns `false` when the frame could not
    /// be shown because the device is lost; loss is a state, not an error.
    fn present(&self) -> Result<bool, DeviceError>;

    /// Polls device health.
    fn state(&self) -> Result<DeviceState, DeviceError>;

    /// Resets the device with the given presentation parameters.
    ///
    /// All resources created from the device must have been released by the
    /// caller beforehand and recreated afterwards.
    fn reset(&self, params: &PresentParams) -> Result<(), DeviceError>;
}
