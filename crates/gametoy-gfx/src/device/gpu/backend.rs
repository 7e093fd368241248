use std::borrow::Cow;
use std::collections::HashMap;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::coords::ViewportRect;
use crate::device::{
    Backend, BufferData, BufferId, BufferTarget, BufferUsage, FramebufferId, LinkError,
    Primitive, ProgramId, RenderbufferId, TexFilter, TexWrap, TextureId, VertexAttrib,
};
use crate::error::{GfxError, Result, ShaderStage};
use crate::resources::UniformValue;

use super::init::{self, GpuInit, SurfaceErrorAction};
use super::reflect::{self, UniformLayout};

/// Color format of every offscreen texture.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// Bind group slots shared by the stage templates.
const BIND_TARGET_INFO: u32 = 0;
const BIND_TEXTURE: u32 = 1;
const BIND_SAMPLER: u32 = 2;
const BIND_VERT_UNIFORMS: u32 = 3;
const BIND_FRAG_UNIFORMS: u32 = 4;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

#[derive(Default)]
struct TextureSlot {
    gpu: Option<GpuTexture>,
    filter: TexFilter,
    wrap: TexWrap,
}

#[derive(Default)]
struct BufferSlot {
    gpu: Option<wgpu::Buffer>,
}

#[derive(Default)]
struct FramebufferSlot {
    color: Option<TextureId>,
    depth: Option<RenderbufferId>,
}

struct StageUniforms {
    layout: UniformLayout,
    data: Vec<u8>,
    buffer: wgpu::Buffer,
}

type PipelineKey = (wgpu::TextureFormat, Primitive, &'static [VertexAttrib]);

struct Program {
    vs: wgpu::ShaderModule,
    fs: wgpu::ShaderModule,
    attribs: &'static [VertexAttrib],
    vert: StageUniforms,
    frag: StageUniforms,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

struct SurfaceFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// Where a pass renders to.
struct Target {
    view: wgpu::TextureView,
    color: Option<TextureId>,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    offscreen: bool,
}

/// [`Backend`] implemented on wgpu, bound to one window surface.
///
/// Offscreen targets are stored bottom row first: draws into them flip clip
/// space y, and viewports/readbacks address rows from the bottom. Every draw
/// and clear is submitted immediately so queued buffer writes land in order.
pub struct WgpuBackend<'w> {
    instance: wgpu::Instance,
    surface: wgpu::Surface<'w>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// `flip_y` blocks for the surface (`+1`) and offscreen targets (`-1`).
    surface_info: wgpu::Buffer,
    offscreen_info: wgpu::Buffer,
    fallback_view: wgpu::TextureView,
    samplers: HashMap<(TexFilter, TexWrap), wgpu::Sampler>,

    next_id: u32,
    textures: HashMap<TextureId, TextureSlot>,
    buffers: HashMap<BufferId, BufferSlot>,
    framebuffers: HashMap<FramebufferId, FramebufferSlot>,
    renderbuffers: HashMap<RenderbufferId, Option<(u32, u32)>>,
    programs: HashMap<ProgramId, Program>,

    texture: Option<TextureId>,
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
    framebuffer: Option<FramebufferId>,
    renderbuffer: Option<RenderbufferId>,
    program: Option<ProgramId>,
    viewport: ViewportRect,
    vertex_format: Option<&'static [VertexAttrib]>,
    clear_color: wgpu::Color,

    frame: Option<SurfaceFrame>,
    frame_failed: bool,
    surface_status: Option<SurfaceErrorAction>,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the device and configures a surface for `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: &'w Window, gpu: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(GfxError::ContextCreationFailed("window has zero size".into()));
        }

        let GpuInit {
            prefer_srgb,
            present_mode,
            alpha_mode,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
        } = gpu;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| GfxError::ContextCreationFailed(format!("surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GfxError::ContextCreationFailed(format!("adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gametoy device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| GfxError::ContextCreationFailed(format!("device: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = init::choose_surface_format(&caps, prefer_srgb).ok_or_else(|| {
            GfxError::ContextCreationFailed("no supported surface formats".into())
        })?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: init::choose_alpha_mode(&caps, alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        log::debug!(
            "wgpu backend on {:?} ({:?}), surface {format:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            size.width,
            size.height
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gametoy bind group layout"),
            entries: &[
                uniform_entry(BIND_TARGET_INFO, wgpu::ShaderStages::VERTEX),
                wgpu::BindGroupLayoutEntry {
                    binding: BIND_TEXTURE,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: BIND_SAMPLER,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(BIND_VERT_UNIFORMS, wgpu::ShaderStages::VERTEX),
                uniform_entry(BIND_FRAG_UNIFORMS, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gametoy pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let target_info = |label, flip: f32| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&[flip, 0.0, 0.0, 0.0]),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };
        let surface_info = target_info("gametoy surface info", 1.0);
        let offscreen_info = target_info("gametoy offscreen info", -1.0);

        let fallback = create_gpu_texture(&device, 1, 1);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &fallback.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4), rows_per_image: Some(1) },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            config,
            size,
            bind_group_layout,
            pipeline_layout,
            surface_info,
            offscreen_info,
            fallback_view: fallback.view,
            samplers: HashMap::new(),
            next_id: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            programs: HashMap::new(),
            texture: None,
            array_buffer: None,
            element_buffer: None,
            framebuffer: None,
            renderbuffer: None,
            program: None,
            viewport: ViewportRect::full(size.width, size.height),
            vertex_format: None,
            clear_color: wgpu::Color::TRANSPARENT,
            frame: None,
            frame_failed: false,
            surface_status: None,
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Outcome of the last failed surface acquisition, cleared on read.
    pub fn take_surface_status(&mut self) -> Option<SurfaceErrorAction> {
        self.surface_status.take()
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::Element => self.element_buffer,
        }
    }

    fn surface_view(&mut self) -> Option<wgpu::TextureView> {
        if self.frame.is_none() {
            if self.frame_failed || self.size.width == 0 || self.size.height == 0 {
                return None;
            }
            match self.surface.get_current_texture() {
                Ok(texture) => {
                    let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
                    self.frame = Some(SurfaceFrame { texture, view });
                }
                Err(err) => {
                    let reason = err.to_string();
                    let action = init::map_surface_error(
                        &self.surface,
                        &self.device,
                        &self.config,
                        self.size,
                        err,
                    );
                    match action {
                        SurfaceErrorAction::Fatal => log::error!("surface acquisition failed: {reason}"),
                        _ => log::warn!("surface acquisition failed ({action:?}): {reason}"),
                    }
                    self.surface_status = Some(action);
                    self.frame_failed = true;
                    return None;
                }
            }
        }
        self.frame.as_ref().map(|f| f.view.clone())
    }

    fn resolve_target(&mut self) -> std::result::Result<Target, &'static str> {
        let Some(fb) = self.framebuffer else {
            let view = self.surface_view().ok_or("no surface frame this frame")?;
            return Ok(Target {
                view,
                color: None,
                format: self.config.format,
                width: self.config.width,
                height: self.config.height,
                offscreen: false,
            });
        };

        let color = self
            .framebuffers
            .get(&fb)
            .and_then(|slot| slot.color)
            .ok_or("framebuffer has no color attachment")?;
        let tex = self
            .textures
            .get(&color)
            .and_then(|slot| slot.gpu.as_ref())
            .ok_or("framebuffer color attachment has no storage")?;
        Ok(Target {
            view: tex.view.clone(),
            color: Some(color),
            format: OFFSCREEN_FORMAT,
            width: tex.width,
            height: tex.height,
            offscreen: true,
        })
    }

    fn sampler(&mut self, filter: TexFilter, wrap: TexWrap) -> wgpu::Sampler {
        let device = &self.device;
        self.samplers
            .entry((filter, wrap))
            .or_insert_with(|| {
                let filter_mode = match filter {
                    TexFilter::Nearest => wgpu::FilterMode::Nearest,
                    TexFilter::Linear => wgpu::FilterMode::Linear,
                };
                let address_mode = match wrap {
                    TexWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
                    TexWrap::Repeat => wgpu::AddressMode::Repeat,
                };
                device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some("gametoy sampler"),
                    address_mode_u: address_mode,
                    address_mode_v: address_mode,
                    address_mode_w: address_mode,
                    mag_filter: filter_mode,
                    min_filter: filter_mode,
                    ..Default::default()
                })
            })
            .clone()
    }

    /// Viewport in target pixels, top-left origin, clamped to the target.
    fn pass_viewport(&self, target: &Target) -> Option<(f32, f32, f32, f32)> {
        let vp = self.viewport;
        let x = vp.x.min(target.width);
        let y = vp.y.min(target.height);
        let w = vp.width.min(target.width - x);
        let h = vp.height.min(target.height - y);
        if w == 0 || h == 0 {
            return None;
        }
        let y = if target.offscreen { y } else { target.height - (y + h) };
        Some((x as f32, y as f32, w as f32, h as f32))
    }

    fn try_draw(&mut self, primitive: Primitive, count: u32) -> std::result::Result<(), &'static str> {
        if count == 0 {
            return Ok(());
        }
        let program_id = self.program.ok_or("no program in use")?;
        let vbuf = self
            .array_buffer
            .and_then(|id| self.buffers.get(&id))
            .and_then(|slot| slot.gpu.clone())
            .ok_or("no vertex buffer bound")?;
        let ibuf = self
            .element_buffer
            .and_then(|id| self.buffers.get(&id))
            .and_then(|slot| slot.gpu.clone())
            .ok_or("no index buffer bound")?;

        let target = self.resolve_target()?;
        if target.color.is_some() && target.color == self.texture {
            return Err("texture is both sampled and rendered to");
        }
        let Some((vx, vy, vw, vh)) = self.pass_viewport(&target) else {
            return Ok(());
        };

        let (view, filter, wrap) = match self.texture.and_then(|id| self.textures.get(&id)) {
            Some(TextureSlot { gpu: Some(tex), filter, wrap }) => (tex.view.clone(), *filter, *wrap),
            _ => (self.fallback_view.clone(), TexFilter::Nearest, TexWrap::ClampToEdge),
        };
        let sampler = self.sampler(filter, wrap);

        let format = self.vertex_format;
        let program = self.programs.get_mut(&program_id).ok_or("unknown program")?;
        let attribs = format.unwrap_or(program.attribs);
        let key = (target.format, primitive, attribs);
        if !program.pipelines.contains_key(&key) {
            let pipeline = create_pipeline(&self.device, &self.pipeline_layout, program, key);
            program.pipelines.insert(key, pipeline);
        }
        let pipeline = program.pipelines.get(&key).ok_or("pipeline missing")?;

        self.queue.write_buffer(&program.vert.buffer, 0, &program.vert.data);
        self.queue.write_buffer(&program.frag.buffer, 0, &program.frag.data);

        let info = if target.offscreen { &self.offscreen_info } else { &self.surface_info };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gametoy draw bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: BIND_TARGET_INFO, resource: info.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: BIND_TEXTURE,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: BIND_SAMPLER,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: BIND_VERT_UNIFORMS,
                    resource: program.vert.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BIND_FRAG_UNIFORMS,
                    resource: program.frag.buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gametoy draw encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gametoy draw"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_viewport(vx, vy, vw, vh, 0.0, 1.0);
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vbuf.slice(..));
            pass.set_index_buffer(ibuf.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn try_read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        let fb = self
            .framebuffer
            .ok_or_else(|| GfxError::Readback("the visible surface cannot be read back".into()))?;
        let tex = self
            .framebuffers
            .get(&fb)
            .and_then(|slot| slot.color)
            .and_then(|id| self.textures.get(&id))
            .and_then(|slot| slot.gpu.as_ref())
            .ok_or_else(|| GfxError::Readback("framebuffer has no color storage".into()))?;

        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        if x + width > tex.width || y + height > tex.height {
            return Err(GfxError::Readback(format!(
                "region {x},{y} {width}x{height} outside {}x{} target",
                tex.width, tex.height
            )));
        }

        let row = width * 4;
        let padded_row = row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gametoy readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gametoy readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GfxError::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| GfxError::Readback(e.to_string()))?
            .map_err(|e| GfxError::Readback(e.to_string()))?;

        let mut out = Vec::with_capacity((row * height) as usize);
        {
            let data = slice.get_mapped_range();
            for r in 0..height as usize {
                let start = r * padded_row as usize;
                out.extend_from_slice(&data[start..start + row as usize]);
            }
        }
        staging.unmap();
        Ok(out)
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_gpu_texture(device: &wgpu::Device, width: u32, height: u32) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("gametoy texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view, width, height }
}

fn stage_uniforms(device: &wgpu::Device, module: &naga::Module, label: &str) -> StageUniforms {
    let layout = UniformLayout::reflect(module);
    let size = layout.buffer_size();
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    StageUniforms { layout, data: vec![0; size as usize], buffer }
}

fn vertex_format(size: u32) -> wgpu::VertexFormat {
    match size {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// Straight alpha over for color, accumulated coverage for alpha.
fn alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    program: &Program,
    (format, primitive, attribs): PipelineKey,
) -> wgpu::RenderPipeline {
    let mut offset = 0;
    let attributes: Vec<wgpu::VertexAttribute> = attribs
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let attr = wgpu::VertexAttribute {
                format: vertex_format(a.size),
                offset,
                shader_location: i as u32,
            };
            offset += a.size as u64 * 4;
            attr
        })
        .collect();

    let (topology, strip_index_format) = match primitive {
        Primitive::Triangles => (wgpu::PrimitiveTopology::TriangleList, None),
        Primitive::TriangleStrip => {
            (wgpu::PrimitiveTopology::TriangleStrip, Some(wgpu::IndexFormat::Uint16))
        }
        Primitive::Lines => (wgpu::PrimitiveTopology::LineList, None),
        Primitive::LineStrip => (wgpu::PrimitiveTopology::LineStrip, Some(wgpu::IndexFormat::Uint16)),
        Primitive::Points => (wgpu::PrimitiveTopology::PointList, None),
    };

    log::debug!("creating pipeline for {format:?} {primitive:?}");

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("gametoy pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &program.vs,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: offset,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fs,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(alpha_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Pads `data` to the 4-byte copy alignment.
fn aligned(data: &[u8]) -> Cow<'_, [u8]> {
    if data.len() % wgpu::COPY_BUFFER_ALIGNMENT as usize == 0 {
        return Cow::Borrowed(data);
    }
    let mut padded = data.to_vec();
    padded.resize(data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize), 0);
    Cow::Owned(padded)
}

impl Backend for WgpuBackend<'_> {
    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        init::apply_resize(
            &self.surface,
            &self.device,
            &mut self.config,
            &mut self.size,
            PhysicalSize::new(width, height),
        );
        log::debug!("surface reconfigured to {width}x{height}");
    }

    fn create_texture(&mut self) -> Result<TextureId> {
        let id = TextureId::from_raw(self.alloc());
        self.textures.insert(id, TextureSlot::default());
        Ok(id)
    }

    fn tex_image(&mut self, width: u32, height: u32) -> Result<()> {
        let max = self.device.limits().max_texture_dimension_2d;
        let slot = self
            .texture
            .and_then(|id| self.textures.get_mut(&id))
            .ok_or(GfxError::ResourceAllocation { kind: "texture storage" })?;
        if width > max || height > max {
            return Err(GfxError::ResourceAllocation { kind: "texture storage" });
        }
        slot.gpu = Some(create_gpu_texture(&self.device, width, height));
        Ok(())
    }

    fn tex_parameters(&mut self, filter: TexFilter, wrap: TexWrap) {
        if let Some(slot) = self.texture.and_then(|id| self.textures.get_mut(&id)) {
            slot.filter = filter;
            slot.wrap = wrap;
        }
    }

    fn tex_sub_image(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
        let Some(tex) = self
            .texture
            .and_then(|id| self.textures.get(&id))
            .and_then(|slot| slot.gpu.as_ref())
        else {
            log::warn!("tex_sub_image without texture storage bound");
            return Ok(());
        };
        if width == 0 || height == 0 {
            return Ok(());
        }
        if x + width > tex.width || y + height > tex.height {
            log::warn!(
                "tex_sub_image {x},{y} {width}x{height} outside {}x{} texture",
                tex.width,
                tex.height
            );
            return Ok(());
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn create_buffer(&mut self) -> Result<BufferId> {
        let id = BufferId::from_raw(self.alloc());
        self.buffers.insert(id, BufferSlot::default());
        Ok(id)
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: BufferData<'_>,
        _usage: BufferUsage,
    ) -> Result<()> {
        let usage = match target {
            BufferTarget::Array => wgpu::BufferUsages::VERTEX,
            BufferTarget::Element => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;
        let size = (data.len().max(4) as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gametoy buffer"),
            size,
            usage,
            mapped_at_creation: false,
        });
        if let BufferData::Bytes(bytes) = data {
            self.queue.write_buffer(&buffer, 0, &aligned(bytes));
        }

        let slot = self
            .bound_buffer(target)
            .and_then(|id| self.buffers.get_mut(&id))
            .ok_or(GfxError::ResourceAllocation { kind: "buffer storage" })?;
        slot.gpu = Some(buffer);
        Ok(())
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: u64, data: &[u8]) {
        let Some(buffer) = self
            .bound_buffer(target)
            .and_then(|id| self.buffers.get(&id))
            .and_then(|slot| slot.gpu.as_ref())
        else {
            log::warn!("buffer_sub_data without buffer storage bound");
            return;
        };
        let data = aligned(data);
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || offset + data.len() as u64 > buffer.size() {
            log::warn!("buffer_sub_data of {} bytes at {offset} rejected", data.len());
            return;
        }
        self.queue.write_buffer(buffer, offset, &data);
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId> {
        let id = FramebufferId::from_raw(self.alloc());
        self.framebuffers.insert(id, FramebufferSlot::default());
        Ok(id)
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId> {
        let id = RenderbufferId::from_raw(self.alloc());
        self.renderbuffers.insert(id, None);
        Ok(id)
    }

    // Depth/stencil is never tested by the 2D pipeline; only the size is kept.
    fn renderbuffer_storage(&mut self, width: u32, height: u32) -> Result<()> {
        if let Some(slot) = self.renderbuffer.and_then(|id| self.renderbuffers.get_mut(&id)) {
            *slot = Some((width, height));
        }
        Ok(())
    }

    fn framebuffer_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.framebuffer.and_then(|id| self.framebuffers.get_mut(&id)) {
            slot.color = Some(texture);
        }
    }

    fn framebuffer_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        if let Some(slot) = self.framebuffer.and_then(|id| self.framebuffers.get_mut(&id)) {
            slot.depth = Some(renderbuffer);
        }
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        self.framebuffers.remove(&id);
    }

    fn delete_renderbuffer(&mut self, id: RenderbufferId) {
        self.renderbuffers.remove(&id);
        for slot in self.framebuffers.values_mut() {
            if slot.depth == Some(id) {
                slot.depth = None;
            }
        }
    }

    fn link_program(
        &mut self,
        vert: &str,
        frag: &str,
        attribs: &'static [VertexAttrib],
    ) -> std::result::Result<ProgramId, LinkError> {
        let vmodule = reflect::compile_stage(ShaderStage::Vertex, vert)?;
        let fmodule = reflect::compile_stage(ShaderStage::Fragment, frag)?;

        let vs = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gametoy vertex stage"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(vert)),
        });
        let fs = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gametoy fragment stage"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(frag)),
        });

        let program = Program {
            vs,
            fs,
            attribs,
            vert: stage_uniforms(&self.device, &vmodule, "gametoy vertex uniforms"),
            frag: stage_uniforms(&self.device, &fmodule, "gametoy fragment uniforms"),
            pipelines: HashMap::new(),
        };

        let id = ProgramId::from_raw(self.alloc());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
    }

    fn uniform(&mut self, name: &str, value: &UniformValue) -> Result<()> {
        let Some(program) = self.program.and_then(|id| self.programs.get_mut(&id)) else {
            return Ok(());
        };
        for stage in [&mut program.vert, &mut program.frag] {
            stage.layout.write(&mut stage.data, name, value)?;
        }
        Ok(())
    }

    fn bind_texture(&mut self, id: Option<TextureId>) {
        self.texture = id;
    }

    fn bind_array_buffer(&mut self, id: Option<BufferId>) {
        self.array_buffer = id;
    }

    fn bind_element_buffer(&mut self, id: Option<BufferId>) {
        self.element_buffer = id;
    }

    fn bind_framebuffer(&mut self, id: Option<FramebufferId>) {
        self.framebuffer = id;
    }

    fn bind_renderbuffer(&mut self, id: Option<RenderbufferId>) {
        self.renderbuffer = id;
    }

    fn use_program(&mut self, id: Option<ProgramId>) {
        self.program = id;
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        self.viewport = rect;
    }

    fn vertex_attrib_layout(&mut self, format: &'static [VertexAttrib]) {
        self.vertex_format = Some(format);
    }

    fn set_clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        self.clear_color = wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: a as f64 };
    }

    fn clear(&mut self) {
        let target = match self.resolve_target() {
            Ok(target) => target,
            Err(reason) => {
                log::debug!("clear skipped: {reason}");
                return;
            }
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gametoy clear encoder"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gametoy clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32) {
        if let Err(reason) = self.try_draw(primitive, count) {
            log::warn!("draw of {count} indices skipped: {reason}");
        }
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        self.try_read_pixels(x, y, width, height)
    }

    fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            drop(frame.view);
            frame.texture.present();
        }
        self.frame_failed = false;
    }

    fn lose_context(&mut self) {
        self.frame = None;
        self.programs.clear();
        self.textures.clear();
        self.buffers.clear();
        self.framebuffers.clear();
        self.renderbuffers.clear();
        self.samplers.clear();
        log::debug!("wgpu backend released all resources");
    }
}
