//! wgpu implementation of the native device.
//!
//! The fixed-function contract is replayed on top of wgpu:
//! - state changes and draws recorded between `begin_scene`/`end_scene` are
//!   issued as one render pass when the bracket closes
//! - the two texture stages are evaluated by the sprite shader, driven by a
//!   small uniform per (texture, combine-op) combination
//! - vertex buffers keep a CPU shadow region; locking maps the shadow and
//!   unlocking uploads it through the queue
//! - surface loss maps onto the tri-state device health (see `resize`)

use std::any::Any;
use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::api::{
    DeviceState, NativeBuffer, NativeDevice, NativeTexture, StageChannel, TextureOp, VertexFormat,
};
use super::error::DeviceError;
use super::params::{DepthFormat, PresentInterval, PresentParams};

// Clear color matches the renderer's blue backdrop.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 1.0,
    a: 1.0,
};

/// Production [`NativeDevice`] rendering into a winit window through wgpu.
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: RefCell<wgpu::SurfaceConfiguration>,
    depth_format: wgpu::TextureFormat,
    depth_view: RefCell<wgpu::TextureView>,

    /// Current drawable size; zero while the window is minimized.
    size: Cell<PhysicalSize<u32>>,
    state: Cell<DeviceState>,

    pipelines: Pipelines,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    stage_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Bound in place of a texture when a stage is empty.
    white_view: wgpu::TextureView,

    texture_cache: RefCell<HashMap<PathBuf, Rc<GpuTexture>>>,
    stage_groups: RefCell<HashMap<StageKey, Rc<wgpu::BindGroup>>>,
    next_texture_id: Cell<u64>,

    frame: RefCell<FrameState>,
    pending: RefCell<Option<wgpu::SurfaceTexture>>,
}

struct Pipelines {
    colored: wgpu::RenderPipeline,
    textured: wgpu::RenderPipeline,
    dual: wgpu::RenderPipeline,
}

impl Pipelines {
    fn get(&self, format: VertexFormat) -> &wgpu::RenderPipeline {
        match format {
            VertexFormat::Colored => &self.colored,
            VertexFormat::Textured => &self.textured,
            VertexFormat::DualTextured => &self.dual,
        }
    }
}

#[derive(Clone)]
struct StageState {
    texture: Option<(u64, wgpu::TextureView)>,
    color_op: TextureOp,
    alpha_op: TextureOp,
}

impl Default for StageState {
    fn default() -> Self {
        Self {
            texture: None,
            color_op: TextureOp::Disable,
            alpha_op: TextureOp::Disable,
        }
    }
}

#[derive(Default)]
struct CurrentBinding {
    buffer: Option<wgpu::Buffer>,
    buffer_offset: u32,
    format: Option<VertexFormat>,
    stages: [StageState; 2],
}

struct DrawCall {
    buffer: wgpu::Buffer,
    offset: u32,
    format: VertexFormat,
    stages: [StageState; 2],
    first_vertex: u32,
    vertex_count: u32,
}

#[derive(Default)]
struct FrameState {
    in_scene: bool,
    clear_requested: bool,
    binding: CurrentBinding,
    draws: Vec<DrawCall>,
}

/// Bind-group cache key: texture identities + combine ops per stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct StageKey {
    textures: [u64; 2],
    color_ops: [TextureOp; 2],
    alpha_ops: [TextureOp; 2],
}

impl GpuDevice {
    /// Creates the device bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks
    /// until it completes.
    pub fn new(window: Arc<Window>, params: &PresentParams) -> Result<Self, DeviceError> {
        pollster::block_on(Self::new_async(window, params))
    }

    async fn new_async(window: Arc<Window>, params: &PresentParams) -> Result<Self, DeviceError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| DeviceError::backend("create_surface", e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| DeviceError::backend("request_adapter", e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("quadrille device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| DeviceError::backend("request_device", e.to_string()))?;

        log::info!("graphics device initialized: {}", adapter.get_info().name);

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps)
            .ok_or_else(|| DeviceError::backend("configure_surface", "no supported surface formats"))?;

        let desired_mode = present_mode(params.present_interval);
        let present = if caps.present_modes.contains(&desired_mode) {
            desired_mode
        } else {
            wgpu::PresentMode::Fifo
        };

        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_format = depth_texture_format(params.depth_format);
        let depth_view = create_depth_view(&device, depth_format, config.width, config.height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quadrille sprite shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sprite.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadrille globals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(16),
                },
                count: None,
            }],
        });

        let stage_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadrille stage bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(32),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quadrille sprite pipeline layout"),
            bind_group_layouts: &[&globals_layout, &stage_layout],
            immediate_size: 0,
        });

        let pipelines = Pipelines {
            colored: make_pipeline(
                &device,
                &shader,
                &pipeline_layout,
                format,
                depth_format,
                VertexFormat::Colored,
            ),
            textured: make_pipeline(
                &device,
                &shader,
                &pipeline_layout,
                format,
                depth_format,
                VertexFormat::Textured,
            ),
            dual: make_pipeline(
                &device,
                &shader,
                &pipeline_layout,
                format,
                depth_format,
                VertexFormat::DualTextured,
            ),
        };

        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quadrille globals ubo"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadrille globals bind group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quadrille stage sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white_view = create_white_texture(&device, &queue);

        Ok(Self {
            device,
            queue,
            surface,
            config: RefCell::new(config),
            depth_format,
            depth_view: RefCell::new(depth_view),
            size: Cell::new(size),
            state: Cell::new(DeviceState::Operational),
            pipelines,
            globals_buf,
            globals_bg,
            stage_layout,
            sampler,
            white_view,
            texture_cache: RefCell::new(HashMap::new()),
            stage_groups: RefCell::new(HashMap::new()),
            next_texture_id: Cell::new(1),
            frame: RefCell::new(FrameState::default()),
            pending: RefCell::new(None),
        })
    }

    /// Tracks the drawable size.
    ///
    /// A zero-sized drawable (minimized window) cannot be reconfigured and
    /// marks the device lost; when extent returns, the device becomes
    /// recoverable and the caller's restore protocol brings it back.
    pub fn resize(&self, new_size: PhysicalSize<u32>) {
        self.size.set(new_size);

        if new_size.width == 0 || new_size.height == 0 {
            if self.state.get() == DeviceState::Operational {
                log::debug!("drawable has zero extent; device lost");
            }
            self.state.set(DeviceState::Lost);
            return;
        }

        match self.state.get() {
            DeviceState::Operational => {
                let mut config = self.config.borrow_mut();
                config.width = new_size.width;
                config.height = new_size.height;
                self.surface.configure(&self.device, &config);
                *self.depth_view.borrow_mut() =
                    create_depth_view(&self.device, self.depth_format, config.width, config.height);
            }
            DeviceState::Lost => {
                log::debug!("drawable regained extent; device can be reset");
                self.state.set(DeviceState::NotReset);
            }
            DeviceState::NotReset => {}
        }
    }

    fn stage_bind_group(&self, stages: &[StageState; 2]) -> Rc<wgpu::BindGroup> {
        let key = StageKey {
            textures: [
                stages[0].texture.as_ref().map_or(0, |(id, _)| *id),
                stages[1].texture.as_ref().map_or(0, |(id, _)| *id),
            ],
            color_ops: [stages[0].color_op, stages[1].color_op],
            alpha_ops: [stages[0].alpha_op, stages[1].alpha_op],
        };

        if let Some(group) = self.stage_groups.borrow().get(&key) {
            return group.clone();
        }

        let ops = |s: &StageState| -> [u32; 4] {
            [
                op_index(s.color_op),
                op_index(s.alpha_op),
                s.texture.is_some() as u32,
                0,
            ]
        };
        let mut data = [0u32; 8];
        data[..4].copy_from_slice(&ops(&stages[0]));
        data[4..].copy_from_slice(&ops(&stages[1]));

        let ops_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quadrille stage ops ubo"),
                contents: bytemuck::cast_slice(&data),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let view0 = stages[0]
            .texture
            .as_ref()
            .map_or(&self.white_view, |(_, view)| view);
        let view1 = stages[1]
            .texture
            .as_ref()
            .map_or(&self.white_view, |(_, view)| view);

        let group = Rc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadrille stage bind group"),
            layout: &self.stage_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ops_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view0),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(view1),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));

        self.stage_groups.borrow_mut().insert(key, group.clone());
        group
    }
}

impl NativeDevice for GpuDevice {
    fn create_vertex_buffer(&self, bytes: u32) -> Result<Rc<dyn NativeBuffer>, DeviceError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quadrille sprite vertex buffer"),
            size: bytes as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Rc::new(GpuBuffer {
            buffer,
            shadow: RefCell::new(vec![0; bytes as usize]),
            queue: self.queue.clone(),
        }))
    }

    fn create_texture(&self, path: &Path) -> Result<Rc<dyn NativeTexture>, DeviceError> {
        if let Some(texture) = self.texture_cache.borrow().get(path) {
            return Ok(texture.clone());
        }

        let image = image::open(path)
            .map_err(|e| {
                log::error!("can't load texture from {:?}: {e}", path);
                DeviceError::backend("create_texture", format!("{}: {e}", path.display()))
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quadrille sprite texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let id = self.next_texture_id.get();
        self.next_texture_id.set(id + 1);

        let entry = Rc::new(GpuTexture {
            id,
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        });
        self.texture_cache
            .borrow_mut()
            .insert(path.to_path_buf(), entry.clone());
        Ok(entry)
    }

    fn set_vertex_buffer(
        &self,
        buffer: &dyn NativeBuffer,
        offset: u32,
        _stride: u32,
    ) -> Result<(), DeviceError> {
        let buffer = buffer
            .as_any()
            .downcast_ref::<GpuBuffer>()
            .ok_or_else(|| {
                DeviceError::backend("set_vertex_buffer", "buffer was not created by this device")
            })?;

        let mut frame = self.frame.borrow_mut();
        frame.binding.buffer = Some(buffer.buffer.clone());
        frame.binding.buffer_offset = offset;
        Ok(())
    }

    fn set_vertex_format(&self, format: VertexFormat) -> Result<(), DeviceError> {
        self.frame.borrow_mut().binding.format = Some(format);
        Ok(())
    }

    fn set_texture(
        &self,
        stage: u32,
        texture: Option<&dyn NativeTexture>,
    ) -> Result<(), DeviceError> {
        let slot = stage_slot(stage, "set_texture")?;
        let entry = match texture {
            None => None,
            Some(texture) => {
                let texture = texture.as_any().downcast_ref::<GpuTexture>().ok_or_else(|| {
                    DeviceError::backend("set_texture", "texture was not created by this device")
                })?;
                Some((texture.id, texture.view.clone()))
            }
        };
        self.frame.borrow_mut().binding.stages[slot].texture = entry;
        Ok(())
    }

    fn set_stage_op(
        &self,
        stage: u32,
        channel: StageChannel,
        op: TextureOp,
    ) -> Result<(), DeviceError> {
        let slot = stage_slot(stage, "set_stage_op")?;
        let mut frame = self.frame.borrow_mut();
        match channel {
            StageChannel::Color => frame.binding.stages[slot].color_op = op,
            StageChannel::Alpha => frame.binding.stages[slot].alpha_op = op,
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), DeviceError> {
        self.frame.borrow_mut().clear_requested = true;
        Ok(())
    }

    fn begin_scene(&self) -> Result<(), DeviceError> {
        let mut frame = self.frame.borrow_mut();
        frame.in_scene = true;
        frame.draws.clear();
        frame.binding = CurrentBinding::default();
        Ok(())
    }

    fn end_scene(&self) -> Result<(), DeviceError> {
        let (draws, clear_requested) = {
            let mut frame = self.frame.borrow_mut();
            frame.in_scene = false;
            frame.binding = CurrentBinding::default();
            (
                std::mem::take(&mut frame.draws),
                std::mem::take(&mut frame.clear_requested),
            )
        };

        if self.state.get() != DeviceState::Operational {
            // Nothing to render onto; recovery is polled by the caller.
            return Ok(());
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost while ending scene; frame dropped");
                self.state.set(DeviceState::NotReset);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other) => {
                log::debug!("transient surface error; frame dropped");
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("surface out of memory");
                return Err(DeviceError::backend("end_scene", "surface out of memory"));
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        {
            let config = self.config.borrow();
            let globals = [config.width as f32, config.height as f32, 0.0, 0.0];
            self.queue
                .write_buffer(&self.globals_buf, 0, bytemuck::cast_slice(&globals));
        }

        // Resolve bind groups before the pass; the pass borrows them.
        let groups: Vec<Rc<wgpu::BindGroup>> = draws
            .iter()
            .map(|draw| self.stage_bind_group(&draw.stages))
            .collect();

        let depth_view = self.depth_view.borrow();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quadrille frame encoder"),
            });

        {
            let load = if clear_requested {
                wgpu::LoadOp::Clear(CLEAR_COLOR)
            } else {
                wgpu::LoadOp::Load
            };
            let depth_load = if clear_requested {
                wgpu::LoadOp::Clear(1.0)
            } else {
                wgpu::LoadOp::Load
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quadrille sprite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &*depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for (draw, group) in draws.iter().zip(&groups) {
                rpass.set_pipeline(self.pipelines.get(draw.format));
                rpass.set_bind_group(0, &self.globals_bg, &[]);
                rpass.set_bind_group(1, group.as_ref(), &[]);
                rpass.set_vertex_buffer(0, draw.buffer.slice(draw.offset as u64..));
                rpass.draw(
                    draw.first_vertex..draw.first_vertex + draw.vertex_count,
                    0..1,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        *self.pending.borrow_mut() = Some(surface_texture);
        Ok(())
    }

    fn draw_strip(&self, first_vertex: u32, triangles: u32) -> Result<(), DeviceError> {
        let mut frame = self.frame.borrow_mut();
        if !frame.in_scene {
            return Err(DeviceError::backend("draw_strip", "no scene bracket is open"));
        }

        let Some(buffer) = frame.binding.buffer.clone() else {
            return Err(DeviceError::backend("draw_strip", "no vertex buffer bound"));
        };
        let Some(format) = frame.binding.format else {
            return Err(DeviceError::backend("draw_strip", "no vertex format set"));
        };
        let offset = frame.binding.buffer_offset;
        let stages = frame.binding.stages.clone();

        frame.draws.push(DrawCall {
            buffer,
            offset,
            format,
            stages,
            first_vertex,
            vertex_count: triangles + 2,
        });
        Ok(())
    }

    fn present(&self) -> Result<bool, DeviceError> {
        match self.pending.borrow_mut().take() {
            Some(frame) => {
                frame.present();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn state(&self) -> Result<DeviceState, DeviceError> {
        Ok(self.state.get())
    }

    fn reset(&self, params: &PresentParams) -> Result<(), DeviceError> {
        let size = self.size.get();
        if size.width == 0 || size.height == 0 {
            log::debug!("reset requested with zero-sized drawable; device stays lost");
            return Ok(());
        }

        self.pending.borrow_mut().take();

        let mut config = self.config.borrow_mut();
        config.width = size.width;
        config.height = size.height;
        config.present_mode = present_mode(params.present_interval);
        self.surface.configure(&self.device, &config);
        *self.depth_view.borrow_mut() =
            create_depth_view(&self.device, self.depth_format, config.width, config.height);

        self.state.set(DeviceState::Operational);
        log::info!("device reset to {}x{}", config.width, config.height);
        Ok(())
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    /// CPU shadow of the buffer contents; locking maps this region and
    /// unlocking uploads it.
    shadow: RefCell<Vec<u8>>,
    queue: wgpu::Queue,
}

impl NativeBuffer for GpuBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn capacity(&self) -> u32 {
        self.buffer.size() as u32
    }

    fn lock(&self) -> Result<RefMut<'_, Vec<u8>>, DeviceError> {
        self.shadow
            .try_borrow_mut()
            .map_err(|_| DeviceError::backend("lock_vertex_buffer", "buffer is already locked"))
    }

    fn unlock(&self) -> Result<(), DeviceError> {
        let shadow = self
            .shadow
            .try_borrow()
            .map_err(|_| DeviceError::backend("unlock_vertex_buffer", "mapping still held"))?;
        self.queue.write_buffer(&self.buffer, 0, &shadow);
        Ok(())
    }
}

struct GpuTexture {
    id: u64,
    view: wgpu::TextureView,
}

impl NativeTexture for GpuTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn stage_slot(stage: u32, op: &'static str) -> Result<usize, DeviceError> {
    if stage <= 1 {
        Ok(stage as usize)
    } else {
        Err(DeviceError::backend(op, "texture stage out of range"))
    }
}

fn op_index(op: TextureOp) -> u32 {
    match op {
        TextureOp::Modulate => 0,
        TextureOp::Add => 1,
        TextureOp::SelectArg1 => 2,
        TextureOp::SelectArg2 => 3,
        TextureOp::Disable => 4,
    }
}

fn present_mode(interval: PresentInterval) -> wgpu::PresentMode {
    match interval {
        PresentInterval::Immediate => wgpu::PresentMode::Immediate,
        PresentInterval::Vsync => wgpu::PresentMode::Fifo,
    }
}

fn depth_texture_format(format: DepthFormat) -> wgpu::TextureFormat {
    match format {
        DepthFormat::D16 => wgpu::TextureFormat::Depth16Unorm,
        DepthFormat::D32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn choose_surface_format(caps: &wgpu::SurfaceCapabilities) -> Option<wgpu::TextureFormat> {
    let preferred = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    for f in preferred {
        if caps.formats.contains(&f) {
            return Some(f);
        }
    }
    caps.formats.first().copied()
}

fn create_depth_view(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("quadrille depth buffer"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_white_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("quadrille white texture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0xff, 0xff, 0xff, 0xff],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn make_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    surface_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    format: VertexFormat,
) -> wgpu::RenderPipeline {
    const COLORED_ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Uint32];
    const TEXTURED_ATTRS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Uint32, 2 => Float32x2];
    const DUAL_ATTRS: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Uint32, 2 => Float32x2, 3 => Float32x2];

    let (entry_point, attributes): (&str, &[wgpu::VertexAttribute]) = match format {
        VertexFormat::Colored => ("vs_colored", &COLORED_ATTRS),
        VertexFormat::Textured => ("vs_textured", &TEXTURED_ATTRS),
        VertexFormat::DualTextured => ("vs_dual", &DUAL_ATTRS),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quadrille sprite pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: format.stride() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            }],
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    })
}
