use std::cell::RefMut;
use std::path::Path;
use std::rc::Rc;

use crate::sprite::TextureId;

use super::api::{
    DeviceState, NativeBuffer, NativeDevice, NativeTexture, StageChannel, TextureOp, VertexFormat,
};
use super::error::DeviceError;
use super::params::PresentParams;

/// Handle to the native device.
///
/// Clones share the same underlying device; the device is released when the
/// last clone is dropped. Thread-confined: handles perform no locking.
#[derive(Clone)]
pub struct Device {
    raw: Rc<dyn NativeDevice>,
}

impl Device {
    #[inline]
    pub fn from_raw(raw: Rc<dyn NativeDevice>) -> Self {
        Self { raw }
    }

    /// Creates a vertex buffer with the given byte capacity.
    pub fn create_vertex_buffer(&self, bytes: u32) -> Result<VertexBuffer, DeviceError> {
        let raw = self.raw.create_vertex_buffer(bytes)?;
        Ok(VertexBuffer { raw: Some(raw) })
    }

    /// Loads the texture identified by `id`.
    pub fn create_texture(&self, id: &TextureId) -> Result<Texture, DeviceError> {
        let raw = self.raw.create_texture(Path::new(id.path()))?;
        Ok(Texture { raw: Some(raw) })
    }

    /// Binds `buffer` as the vertex source at `offset` with `stride` bytes
    /// per vertex.
    pub fn set_vertex_buffer(
        &self,
        buffer: &VertexBuffer,
        offset: u32,
        stride: u32,
    ) -> Result<(), DeviceError> {
        let raw = buffer
            .raw
            .as_deref()
            .ok_or_else(|| DeviceError::backend("set_vertex_buffer", "vertex buffer handle is empty"))?;
        self.raw.set_vertex_buffer(raw, offset, stride)
    }

    pub fn set_vertex_format(&self, format: VertexFormat) -> Result<(), DeviceError> {
        self.raw.set_vertex_format(format)
    }

    /// Binds `texture` to `stage`; an unbound handle clears the stage.
    pub fn set_texture(&self, stage: u32, texture: &Texture) -> Result<(), DeviceError> {
        self.raw.set_texture(stage, texture.raw.as_deref())
    }

    pub fn set_stage_op(
        &self,
        stage: u32,
        channel: StageChannel,
        op: TextureOp,
    ) -> Result<(), DeviceError> {
        self.raw.set_stage_op(stage, channel, op)
    }

    /// Clears the back buffer and depth buffer.
    pub fn clear(&self) -> Result<(), DeviceError> {
        self.raw.clear()
    }

    /// Draws `triangles` strip triangles from the bound vertex buffer,
    /// starting at `first_vertex`.
    pub fn draw_strip(&self, first_vertex: u32, triangles: u32) -> Result<(), DeviceError> {
        self.raw.draw_strip(first_vertex, triangles)
    }

    /// Presents the back buffer. `false` means the frame was dropped
    /// because the device is lost; poll [`state`](Self::state) to recover.
    pub fn present(&self) -> Result<bool, DeviceError> {
        self.raw.present()
    }

    /// Polls device health.
    pub fn state(&self) -> Result<DeviceState, DeviceError> {
        self.raw.state()
    }

    /// Resets the device. Callers release device-owned resources first and
    /// recreate them afterwards; see `SpriteRenderer::try_restore`.
    pub fn reset(&self, params: &PresentParams) -> Result<(), DeviceError> {
        self.raw.reset(params)
    }

    // begin/end are reachable only through SceneGuard, which guarantees the
    // end bracket fires on every exit path.
    fn begin_scene(&self) -> Result<(), DeviceError> {
        self.raw.begin_scene()
    }

    fn end_scene(&self) -> Result<(), DeviceError> {
        self.raw.end_scene()
    }
}

/// Handle to a GPU vertex buffer.
///
/// Clones share the underlying buffer. `reset()` releases the resource
/// without destroying the handle object; the device-reset protocol requires
/// every buffer to be released before the device itself resets.
#[derive(Clone, Default)]
pub struct VertexBuffer {
    raw: Option<Rc<dyn NativeBuffer>>,
}

impl VertexBuffer {
    /// Drops the underlying resource. The handle stays usable as an empty
    /// handle until a new buffer is assigned.
    pub fn reset(&mut self) {
        self.raw = None;
    }

    /// Capacity in bytes; zero for an empty handle.
    pub fn capacity(&self) -> u32 {
        self.raw.as_deref().map_or(0, NativeBuffer::capacity)
    }
}

/// Handle to a GPU texture.
///
/// The unbound handle is valid and clears a texture stage when bound.
#[derive(Clone, Default)]
pub struct Texture {
    raw: Option<Rc<dyn NativeTexture>>,
}

impl Texture {
    /// Handle bound to no texture; equivalent to `Texture::default()`.
    #[inline]
    pub fn unbound() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.raw.is_some()
    }

    /// Drops the underlying resource, keeping the handle object.
    pub fn reset(&mut self) {
        self.raw = None;
    }
}

/// Scoped begin/end bracket around frame drawing.
///
/// The end bracket fires exactly once, on drop at the latest, even when an
/// error aborts drawing mid-way. It runs during cleanup and therefore never
/// propagates a failure: a failed end call is logged and suppressed.
pub struct SceneGuard<'a> {
    device: Option<&'a Device>,
}

impl<'a> SceneGuard<'a> {
    /// Opens the drawing bracket.
    pub fn begin(device: &'a Device) -> Result<Self, DeviceError> {
        device.begin_scene()?;
        Ok(Self {
            device: Some(device),
        })
    }

    /// Closes the bracket early. Safe to call multiple times.
    pub fn end(&mut self) {
        if let Some(device) = self.device.take() {
            if let Err(err) = device.end_scene() {
                log::error!("end_scene failed during cleanup; ignored: {err}");
            }
        }
    }
}

impl Drop for SceneGuard<'_> {
    fn drop(&mut self) {
        self.end();
    }
}

/// Scoped exclusive CPU mapping of a vertex buffer.
///
/// Unlocking is guaranteed on every exit path and never propagates a
/// failure: a failed unlock is logged and suppressed so it cannot mask the
/// error that aborted packing.
pub struct BufferLock<'a> {
    raw: &'a dyn NativeBuffer,
    mapped: Option<RefMut<'a, Vec<u8>>>,
}

impl<'a> BufferLock<'a> {
    /// Locks `buffer` over its entire extent.
    pub fn acquire(buffer: &'a VertexBuffer) -> Result<Self, DeviceError> {
        let raw = buffer
            .raw
            .as_deref()
            .ok_or_else(|| DeviceError::backend("lock_vertex_buffer", "vertex buffer handle is empty"))?;
        let mapped = raw.lock()?;
        Ok(Self {
            raw,
            mapped: Some(mapped),
        })
    }

    /// The mapped bytes. Empty once the lock has been released.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match self.mapped.as_mut() {
            Some(mapped) => mapped.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Releases the mapping early. Safe to call multiple times.
    pub fn unlock(&mut self) {
        if self.mapped.take().is_some() {
            if let Err(err) = self.raw.unlock() {
                log::error!("vertex buffer unlock failed during cleanup; ignored: {err}");
            }
        }
    }
}

impl Drop for BufferLock<'_> {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::super::fake::{Call, FakeDevice};
    use super::*;

    fn device() -> (Rc<FakeDevice>, Device) {
        let fake = FakeDevice::new();
        let device = Device::from_raw(fake.clone() as Rc<dyn NativeDevice>);
        (fake, device)
    }

    // ── scene guard ───────────────────────────────────────────────────────

    #[test]
    fn scene_guard_brackets_drawing() {
        let (fake, device) = device();
        {
            let _guard = SceneGuard::begin(&device).unwrap();
            device.clear().unwrap();
        }
        assert_eq!(fake.calls(), vec![Call::BeginScene, Call::Clear, Call::EndScene]);
    }

    #[test]
    fn scene_guard_ends_exactly_once() {
        let (fake, device) = device();
        let mut guard = SceneGuard::begin(&device).unwrap();
        guard.end();
        guard.end();
        drop(guard);
        let ends = fake.calls().iter().filter(|c| **c == Call::EndScene).count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn scene_guard_suppresses_end_failure() {
        let (fake, device) = device();
        fake.fail_end_scene.set(true);
        let guard = SceneGuard::begin(&device).unwrap();
        drop(guard); // must not panic or propagate
        assert!(fake.calls().contains(&Call::EndScene));
    }

    // ── buffer lock ───────────────────────────────────────────────────────

    #[test]
    fn buffer_lock_maps_full_extent_and_unlocks() {
        let (fake, device) = device();
        let vbuf = device.create_vertex_buffer(64).unwrap();
        let buffer = fake.last_buffer().unwrap();
        {
            let mut lock = BufferLock::acquire(&vbuf).unwrap();
            assert_eq!(lock.bytes_mut().len(), 64);
            lock.bytes_mut()[0] = 0xab;
        }
        assert_eq!(buffer.lock_count.get(), 1);
        assert_eq!(buffer.unlock_count.get(), 1);
        assert_eq!(buffer.data.borrow()[0], 0xab);
    }

    #[test]
    fn buffer_lock_unlock_is_idempotent() {
        let (fake, device) = device();
        let vbuf = device.create_vertex_buffer(16).unwrap();
        let buffer = fake.last_buffer().unwrap();
        let mut lock = BufferLock::acquire(&vbuf).unwrap();
        lock.unlock();
        lock.unlock();
        assert!(lock.bytes_mut().is_empty());
        drop(lock);
        assert_eq!(buffer.unlock_count.get(), 1);
    }

    #[test]
    fn buffer_lock_suppresses_unlock_failure() {
        let (fake, device) = device();
        let vbuf = device.create_vertex_buffer(16).unwrap();
        fake.last_buffer().unwrap().fail_unlock.set(true);
        let lock = BufferLock::acquire(&vbuf).unwrap();
        drop(lock); // must not panic or propagate
    }

    #[test]
    fn buffer_lock_fails_on_empty_handle() {
        let (_fake, device) = device();
        let mut vbuf = device.create_vertex_buffer(16).unwrap();
        vbuf.reset();
        assert!(BufferLock::acquire(&vbuf).is_err());
    }

    // ── handles ───────────────────────────────────────────────────────────

    #[test]
    fn vertex_buffer_reset_releases_resource() {
        let (fake, device) = device();
        let mut vbuf = device.create_vertex_buffer(32).unwrap();
        assert_eq!(vbuf.capacity(), 32);

        fake.clear_calls();
        vbuf.reset();

        assert_eq!(vbuf.capacity(), 0);
        assert_eq!(fake.calls(), vec![Call::BufferReleased]);
    }

    #[test]
    fn vertex_buffer_clones_share_the_resource() {
        let (fake, device) = device();
        let vbuf = device.create_vertex_buffer(32).unwrap();
        let mut other = vbuf.clone();

        fake.clear_calls();
        other.reset();
        // The first handle still keeps the buffer alive.
        assert!(fake.calls().is_empty());
        assert_eq!(vbuf.capacity(), 32);
    }

    #[test]
    fn unbound_texture_clears_the_stage() {
        let (fake, device) = device();
        device.set_texture(0, &Texture::unbound()).unwrap();
        assert_eq!(
            fake.calls(),
            vec![Call::SetTexture { stage: 0, path: None }]
        );
    }
}
