use std::path::Path;

use windows::Win32::Foundation::{FALSE, HWND, RECT};
use windows::Win32::Graphics::{Direct3D::*, Direct3D12::*, Dxgi::Common::*};

use super::camera::Camera;
use super::d3d12::{
    barrier,
    command::Queue,
    device,
    resource,
    root_signature::{self, DescriptorRange, RootParameter, RootSignature, RootSignatureBuilder},
    shader::{self, GraphicsPipelineConfig, InputLayout, ShaderId, Shaders},
    swap_chain::SwapChain,
    texture::{TextureId, Textures},
    view::DescriptorHeap,
};
use super::model::{self, Model, SceneConstants};
use super::nbody::NBody;
use super::timer::StepTimer;
use crate::config::Config;
use crate::error::Result;

pub const SHADER_DIR: &str = "shaders/nbody";
pub const TEXTURE_DIR: &str = "assets/textures";

const DEPTH_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D32_FLOAT;

// triangle root parameters
const SCENE_CONSTANTS_PARAMETER: u32 = 0;
const TEXTURE_TABLE_PARAMETER: u32 = 1;

// seconds for one cross-fade between the two textures and back
const TEXTURE_BLEND_PERIOD: f64 = 4.0;
// radians per second
const CAMERA_ORBIT_SPEED: f64 = 0.2;

pub struct Renderer {
    // dropped first so both queues are drained before any resource is released
    queue: Queue,
    nbody: NBody,

    device: ID3D12Device2,
    swap_chain: SwapChain,

    _depth_buffer: ID3D12Resource,
    dsv_heap: DescriptorHeap,
    srv_heap: DescriptorHeap,

    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,

    root_signature: RootSignature,
    shaders: Shaders,
    _textures: Textures,
    model: Model,
    camera: Camera,

    vsync: bool,
    clear_color: [f32; 4],
}

impl Renderer {
    pub fn initialize(hwnd: HWND, config: &Config) -> Result<Self> {
        let (width, height) = (config.client_width(), config.client_height());
        let debug = config.debug_layer_enabled();

        let factory = device::create_factory(debug, config.gpu_validation_enabled())?;
        let device = device::find_and_create_device(&factory, debug)?;

        let mut queue = Queue::build(&device, D3D12_COMMAND_LIST_TYPE_DIRECT, "direct_queue")?;
        let swap_chain = SwapChain::build(&device, &factory, queue.get(), hwnd, width, height)?;

        let (depth_buffer, dsv_heap) = create_depth_buffer(&device, width, height)?;

        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: D3D12_MIN_DEPTH,
            MaxDepth: D3D12_MAX_DEPTH,
        };
        let scissor_rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };

        // everything below records its uploads into the still open direct command list
        let command_list = queue.command_list();

        let model = Model::new(&device, command_list)?;

        let mut shaders = Shaders::build(debug)?;
        for id in [ShaderId::Triangle, ShaderId::Particles, ShaderId::NBody] {
            let path = Path::new(SHADER_DIR).join(id.file_name());
            shaders.load_shaders_from_file(id, &path, id.kind())?;
        }

        let mut textures = Textures::new();
        for id in TextureId::ALL {
            let path = Path::new(TEXTURE_DIR).join(id.file_name());
            textures.load_texture(&device, command_list, id, &path)?;
        }

        let root_signature = create_root_signature(&device)?;
        let mut nbody = NBody::build(&device, command_list, &config.simulation)?;

        shaders.create_input_layout_and_pipeline_state(
            &device,
            ShaderId::Triangle,
            &root_signature,
            &GraphicsPipelineConfig {
                input_layout: InputLayout::PositionTexcoord,
                topology_type: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
                depth_write: true,
                additive_blend: false,
            },
        )?;
        shaders.create_input_layout_and_pipeline_state(
            &device,
            ShaderId::Particles,
            nbody.draw_root_signature(),
            &GraphicsPipelineConfig {
                input_layout: InputLayout::None,
                topology_type: D3D12_PRIMITIVE_TOPOLOGY_TYPE_POINT,
                depth_write: false,
                additive_blend: true,
            },
        )?;
        shaders.create_pipeline_state_for_compute_shader(
            &device,
            ShaderId::NBody,
            nbody.compute_root_signature(),
        )?;

        let srv_heap = DescriptorHeap::build(
            &device,
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            TextureId::ALL.len() as u32,
            D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
            "srv_heap",
        )?;
        for (slot, id) in TextureId::ALL.into_iter().enumerate() {
            textures.create_srv_from_texture(&device, id, &srv_heap, slot as u32)?;
        }

        queue.execute()?;
        queue.wait_for_previous_frame()?;
        textures.release_upload_heaps();
        nbody.release_upload_heap();

        tracing::info!(width, height, vsync = config.graphics.vsync, "Initialized renderer");

        Ok(Self {
            queue,
            nbody,
            device,
            swap_chain,
            _depth_buffer: depth_buffer,
            dsv_heap,
            srv_heap,
            viewport,
            scissor_rect,
            root_signature,
            shaders,
            _textures: textures,
            model,
            camera: Camera::new(width, height),
            vsync: config.graphics.vsync,
            clear_color: config.graphics.clear_color,
        })
    }

    pub fn device(&self) -> &ID3D12Device2 {
        &self.device
    }

    pub fn command_queue(&self) -> &ID3D12CommandQueue {
        self.queue.get()
    }

    pub fn command_list(&self) -> &ID3D12GraphicsCommandList {
        self.queue.command_list()
    }

    /// Moves the camera and writes this frame's constants.
    pub fn update(&mut self, timer: &StepTimer) -> Result<()> {
        let seconds = timer.total_seconds();
        self.camera.orbit((seconds * CAMERA_ORBIT_SPEED) as f32);

        let view_projection = self.camera.view_projection();
        let frame_index = self.swap_chain.frame_index();

        let constants = SceneConstants::new(
            view_projection,
            model::texture_blend(seconds, TEXTURE_BLEND_PERIOD),
        );
        self.model.update(&constants, frame_index)?;
        self.nbody.update(view_projection, frame_index)
    }

    /// Advances the particles by `steps` steps of `delta_time` seconds.
    pub fn simulate(&mut self, steps: u32, delta_time: f32) -> Result<()> {
        self.nbody.simulate(&self.shaders, steps, delta_time)
    }

    pub fn render(&mut self) -> Result<()> {
        self.begin_scene(self.clear_color)?;

        let command_list = self.queue.command_list();
        let frame_index = self.swap_chain.frame_index();

        shader::set_topology(command_list, D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        self.srv_heap
            .set_root_descriptor_table(command_list, TEXTURE_TABLE_PARAMETER)?;
        self.model
            .bind_buffers(command_list, SCENE_CONSTANTS_PARAMETER, frame_index)?;
        self.model.draw(command_list);

        self.nbody.draw(command_list, &self.shaders, frame_index)?;

        self.end_scene()
    }

    pub fn begin_scene(&mut self, color: [f32; 4]) -> Result<()> {
        self.queue
            .reset(Some(self.shaders.pipeline_state(ShaderId::Triangle)?))?;

        let command_list = self.queue.command_list();
        self.root_signature.set_graphics(command_list);

        let rtv = self.swap_chain.back_buffer_rtv()?;
        let dsv = self.dsv_heap.cpu_handle(0)?;

        unsafe {
            command_list.RSSetViewports(&[self.viewport]);
            command_list.RSSetScissorRects(&[self.scissor_rect]);

            command_list.ResourceBarrier(&[barrier::transition(
                self.swap_chain.back_buffer(),
                D3D12_RESOURCE_STATE_PRESENT,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
            )]);

            command_list.OMSetRenderTargets(1, Some(&rtv), FALSE, Some(&dsv));
            command_list.ClearRenderTargetView(rtv, &color, None);
            command_list.ClearDepthStencilView(dsv, D3D12_CLEAR_FLAG_DEPTH, 1.0, 0, &[]);
        }

        Ok(())
    }

    pub fn end_scene(&mut self) -> Result<()> {
        unsafe {
            self.queue.command_list().ResourceBarrier(&[barrier::transition(
                self.swap_chain.back_buffer(),
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            )]);
        }

        self.queue.execute()?;
        self.swap_chain.present(self.vsync)?;
        self.queue.wait_for_previous_frame()?;
        self.swap_chain.update_frame_index();
        Ok(())
    }

    /// Drains both queues. Handles are released when the renderer is dropped.
    pub fn shut_down(&mut self) -> Result<()> {
        self.nbody.wait_idle()?;
        self.queue.wait_for_previous_frame()?;
        tracing::info!(
            fence = self.queue.last_signalled(),
            "Renderer shut down"
        );
        Ok(())
    }
}

/// Root CBV `b0`, a table of the texture SRVs `t0`/`t1` and the static sampler `s0`.
fn create_root_signature(device: &ID3D12Device2) -> Result<RootSignature> {
    RootSignatureBuilder::new()
        .parameter(
            RootParameter::ConstantBufferView { register: 0 },
            D3D12_SHADER_VISIBILITY_ALL,
        )
        .parameter(
            RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange {
                    range_type: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
                    count: TextureId::ALL.len() as u32,
                    base_register: 0,
                }],
            },
            D3D12_SHADER_VISIBILITY_PIXEL,
        )
        .static_sampler(root_signature::standard_sampler(D3D12_SHADER_VISIBILITY_PIXEL))
        .flags(
            D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT
                | D3D12_ROOT_SIGNATURE_FLAG_DENY_HULL_SHADER_ROOT_ACCESS
                | D3D12_ROOT_SIGNATURE_FLAG_DENY_DOMAIN_SHADER_ROOT_ACCESS
                | D3D12_ROOT_SIGNATURE_FLAG_DENY_GEOMETRY_SHADER_ROOT_ACCESS,
        )
        .build(device, "triangle::root_signature")
}

fn create_depth_buffer(
    device: &ID3D12Device2,
    width: u32,
    height: u32,
) -> Result<(ID3D12Resource, DescriptorHeap)> {
    const CLEAR_VALUE: D3D12_CLEAR_VALUE = D3D12_CLEAR_VALUE {
        Format: DEPTH_FORMAT,
        Anonymous: D3D12_CLEAR_VALUE_0 {
            DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                Depth: 1.0,
                Stencil: 0,
            },
        },
    };

    let depth_buffer = resource::create_texture2d(
        device,
        (width, height),
        DEPTH_FORMAT,
        D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
        D3D12_RESOURCE_STATE_DEPTH_WRITE,
        Some(&CLEAR_VALUE),
        "depth_buffer",
    )?;

    let dsv_heap = DescriptorHeap::build(
        device,
        D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        1,
        D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
        "dsv_heap",
    )?;

    let dsv_desc = D3D12_DEPTH_STENCIL_VIEW_DESC {
        Format: DEPTH_FORMAT,
        ViewDimension: D3D12_DSV_DIMENSION_TEXTURE2D,
        Flags: D3D12_DSV_FLAG_NONE,
        Anonymous: D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
            Texture2D: D3D12_TEX2D_DSV { MipSlice: 0 },
        },
    };
    dsv_heap.create_dsv(device, 0, &depth_buffer, &dsv_desc)?;

    Ok((depth_buffer, dsv_heap))
}
