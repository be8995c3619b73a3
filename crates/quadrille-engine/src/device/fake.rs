//! Scripted in-memory device for tests.
//!
//! Records every operation so tests can assert call order, and lets tests
//! script the health sequence and inject failures. No GPU is touched.

use std::any::Any;
use std::cell::{Cell, RefCell, RefMut};
use std::collections::VecDeque;
use std::path::Path;
use std::rc::{Rc, Weak};

use super::api::{
    DeviceState, NativeBuffer, NativeDevice, NativeTexture, StageChannel, TextureOp, VertexFormat,
};
use super::error::DeviceError;
use super::params::PresentParams;

/// One recorded device operation.
///
/// Health queries are intentionally not recorded: polling is not a device
/// mutation, and the recovery tests assert on mutations only.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateVertexBuffer { bytes: u32 },
    CreateTexture { path: String },
    SetVertexBuffer { offset: u32, stride: u32 },
    SetVertexFormat(VertexFormat),
    SetTexture { stage: u32, path: Option<String> },
    SetStageOp { stage: u32, channel: StageChannel, op: TextureOp },
    Clear,
    BeginScene,
    EndScene,
    DrawStrip { first_vertex: u32, triangles: u32 },
    Present,
    Reset,
    /// Pushed when a buffer's backing resource is dropped.
    BufferReleased,
}

pub(crate) struct FakeDevice {
    calls: Rc<RefCell<Vec<Call>>>,
    /// Scripted health answers, consumed front to back; empty = Operational.
    states: RefCell<VecDeque<DeviceState>>,
    /// When set, created buffers get this capacity instead of the requested one.
    pub capacity_override: Cell<Option<u32>>,
    pub fail_end_scene: Cell<bool>,
    pub fail_draw: Cell<bool>,
    last_buffer: RefCell<Weak<FakeBuffer>>,
}

impl FakeDevice {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            states: RefCell::new(VecDeque::new()),
            capacity_override: Cell::new(None),
            fail_end_scene: Cell::new(false),
            fail_draw: Cell::new(false),
            last_buffer: RefCell::new(Weak::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Queues a health answer; consumed by the next `state()` query.
    pub fn script_state(&self, state: DeviceState) {
        self.states.borrow_mut().push_back(state);
    }

    /// The most recently created buffer, while someone still holds it.
    pub fn last_buffer(&self) -> Option<Rc<FakeBuffer>> {
        self.last_buffer.borrow().upgrade()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl NativeDevice for FakeDevice {
    fn create_vertex_buffer(&self, bytes: u32) -> Result<Rc<dyn NativeBuffer>, DeviceError> {
        self.record(Call::CreateVertexBuffer { bytes });
        let capacity = self.capacity_override.get().unwrap_or(bytes);
        let buffer = Rc::new(FakeBuffer {
            capacity,
            data: RefCell::new(vec![0; capacity as usize]),
            lock_count: Cell::new(0),
            unlock_count: Cell::new(0),
            fail_unlock: Cell::new(false),
            calls: self.calls.clone(),
        });
        *self.last_buffer.borrow_mut() = Rc::downgrade(&buffer);
        Ok(buffer)
    }

    fn create_texture(&self, path: &Path) -> Result<Rc<dyn NativeTexture>, DeviceError> {
        self.record(Call::CreateTexture {
            path: path.display().to_string(),
        });
        Ok(Rc::new(FakeTexture {
            path: path.display().to_string(),
        }))
    }

    fn set_vertex_buffer(
        &self,
        _buffer: &dyn NativeBuffer,
        offset: u32,
        stride: u32,
    ) -> Result<(), DeviceError> {
        self.record(Call::SetVertexBuffer { offset, stride });
        Ok(())
    }

    fn set_vertex_format(&self, format: VertexFormat) -> Result<(), DeviceError> {
        self.record(Call::SetVertexFormat(format));
        Ok(())
    }

    fn set_texture(
        &self,
        stage: u32,
        texture: Option<&dyn NativeTexture>,
    ) -> Result<(), DeviceError> {
        let path = texture.map(|t| {
            t.as_any()
                .downcast_ref::<FakeTexture>()
                .map(|t| t.path.clone())
                .unwrap_or_default()
        });
        self.record(Call::SetTexture { stage, path });
        Ok(())
    }

    fn set_stage_op(
        &self,
        stage: u32,
        channel: StageChannel,
        op: TextureOp,
    ) -> Result<(), DeviceError> {
        self.record(Call::SetStageOp { stage, channel, op });
        Ok(())
    }

    fn clear(&self) -> Result<(), DeviceError> {
        self.record(Call::Clear);
        Ok(())
    }

    fn begin_scene(&self) -> Result<(), DeviceError> {
        self.record(Call::BeginScene);
        Ok(())
    }

    fn end_scene(&self) -> Result<(), DeviceError> {
        self.record(Call::EndScene);
        if self.fail_end_scene.get() {
            return Err(DeviceError::native("end_scene", 0x8876_086c));
        }
        Ok(())
    }

    fn draw_strip(&self, first_vertex: u32, triangles: u32) -> Result<(), DeviceError> {
        self.record(Call::DrawStrip {
            first_vertex,
            triangles,
        });
        if self.fail_draw.get() {
            return Err(DeviceError::native("draw_strip", 0x8876_086c));
        }
        Ok(())
    }

    fn present(&self) -> Result<bool, DeviceError> {
        self.record(Call::Present);
        Ok(true)
    }

    fn state(&self) -> Result<DeviceState, DeviceError> {
        Ok(self
            .states
            .borrow_mut()
            .pop_front()
            .unwrap_or(DeviceState::Operational))
    }

    fn reset(&self, _params: &PresentParams) -> Result<(), DeviceError> {
        self.record(Call::Reset);
        Ok(())
    }
}

pub(crate) struct FakeBuffer {
    capacity: u32,
    pub data: RefCell<Vec<u8>>,
    pub lock_count: Cell<u32>,
    pub unlock_count: Cell<u32>,
    pub fail_unlock: Cell<bool>,
    calls: Rc<RefCell<Vec<Call>>>,
}

impl NativeBuffer for FakeBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn lock(&self) -> Result<RefMut<'_, Vec<u8>>, DeviceError> {
        self.lock_count.set(self.lock_count.get() + 1);
        self.data
            .try_borrow_mut()
            .map_err(|_| DeviceError::backend("lock_vertex_buffer", "buffer is already locked"))
    }

    fn unlock(&self) -> Result<(), DeviceError> {
        self.unlock_count.set(self.unlock_count.get() + 1);
        if self.fail_unlock.get() {
            return Err(DeviceError::native("unlock_vertex_buffer", 0x8876_086c));
        }
        Ok(())
    }
}

impl Drop for FakeBuffer {
    fn drop(&mut self) {
        self.calls.borrow_mut().push(Call::BufferReleased);
    }
}

pub(crate) struct FakeTexture {
    pub path: String,
}

impl NativeTexture for FakeTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
