//! HLSL compilation through DXC and the pipeline states built from the results.

#[cfg(windows)]
use std::path::{Path, PathBuf};

#[cfg(windows)]
use windows::core::{s, w, HSTRING, PCWSTR};
#[cfg(windows)]
use windows::Win32::Graphics::{
    Direct3D::{Dxc::*, D3D_PRIMITIVE_TOPOLOGY},
    Direct3D12::*,
    Dxgi::Common::*,
};

#[cfg(windows)]
use super::{root_signature::RootSignature, util::set_name};
#[cfg(windows)]
use crate::error::{Error, Result};
#[cfg(windows)]
use crate::gfx::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderId {
    Triangle,
    Particles,
    NBody,
}

impl ShaderId {
    pub fn file_name(self) -> &'static str {
        match self {
            ShaderId::Triangle => "triangle.hlsl",
            ShaderId::Particles => "particles.hlsl",
            ShaderId::NBody => "nbody.hlsl",
        }
    }

    pub fn kind(self) -> ShaderKind {
        match self {
            ShaderId::Triangle | ShaderId::Particles => ShaderKind::Graphics,
            ShaderId::NBody => ShaderKind::Compute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Graphics,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage {
    pub entry_point: &'static str,
    pub target: &'static str,
}

pub const VERTEX_STAGE: ShaderStage = ShaderStage {
    entry_point: "VS_MAIN",
    target: "vs_6_0",
};
pub const PIXEL_STAGE: ShaderStage = ShaderStage {
    entry_point: "PS_MAIN",
    target: "ps_6_0",
};
pub const COMPUTE_STAGE: ShaderStage = ShaderStage {
    entry_point: "CS_MAIN",
    target: "cs_6_0",
};

impl ShaderKind {
    pub fn stages(self) -> &'static [ShaderStage] {
        match self {
            ShaderKind::Graphics => &[VERTEX_STAGE, PIXEL_STAGE],
            ShaderKind::Compute => &[COMPUTE_STAGE],
        }
    }
}

/// Vertex input the pipeline reads through the input assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `POSITION` float3 followed by `TEXCOORD` float2.
    PositionTexcoord,
    /// The vertex shader fetches its data itself.
    None,
}

#[cfg(windows)]
pub struct GraphicsPipelineConfig {
    pub input_layout: InputLayout,
    pub topology_type: D3D12_PRIMITIVE_TOPOLOGY_TYPE,
    pub depth_write: bool,
    pub additive_blend: bool,
}

#[cfg(windows)]
pub struct ShaderCompiler {
    compiler: IDxcCompiler3,
    utils: IDxcUtils,
    include_handler: IDxcIncludeHandler,
    debug: bool,
}

#[cfg(windows)]
impl ShaderCompiler {
    pub fn build(debug: bool) -> Result<Self> {
        let utils: IDxcUtils = unsafe { DxcCreateInstance(&CLSID_DxcUtils) }?;
        let compiler = unsafe { DxcCreateInstance(&CLSID_DxcCompiler) }?;

        let include_handler = unsafe { utils.CreateDefaultIncludeHandler() }?;

        Ok(Self {
            compiler,
            utils,
            include_handler,
            debug,
        })
    }

    pub fn compile_file(&self, path: &Path, stage: &ShaderStage) -> Result<IDxcBlob> {
        tracing::info!(path = %path.display(), stage.entry_point, stage.target, "Compiling shader");

        let compilation_error = |message: String| Error::ShaderCompilation {
            path: path.to_path_buf(),
            entry_point: stage.entry_point.to_string(),
            message,
        };

        let filename: HSTRING = path.as_os_str().into();
        let file = unsafe { self.utils.LoadFile(PCWSTR(filename.as_ptr()), None) }?;

        let source = DxcBuffer {
            Ptr: unsafe { file.GetBufferPointer() },
            Size: unsafe { file.GetBufferSize() },
            Encoding: DXC_CP_ACP.0,
        };

        let entry: HSTRING = stage.entry_point.into();
        let target: HSTRING = stage.target.into();

        let mut args = vec![
            PCWSTR(filename.as_ptr()),
            w!("-E"),
            PCWSTR(entry.as_ptr()),
            w!("-T"),
            PCWSTR(target.as_ptr()),
            w!("-HV"),
            w!("2021"),
        ];
        if self.debug {
            args.extend([w!("-Zi"), w!("-Qembed_debug"), w!("-Od")]);
        }

        let result: IDxcResult =
            unsafe { self.compiler.Compile(&source, Some(&args), &self.include_handler) }?;

        let mut errors: Option<IDxcBlobUtf8> = None;
        unsafe { result.GetOutput(DXC_OUT_ERRORS, &mut None, &mut errors) }?;
        let diagnostics = errors
            .filter(|e| unsafe { e.GetStringLength() } != 0)
            .map(|e| String::from_utf8_lossy(unsafe { e.GetStringPointer().as_bytes() }).into_owned());

        let status = unsafe { result.GetStatus() }?;
        if status.is_err() {
            return Err(compilation_error(
                diagnostics.unwrap_or_else(|| status.message()),
            ));
        }
        if let Some(warnings) = diagnostics {
            tracing::warn!(path = %path.display(), "{warnings}");
        }

        let mut output: Option<IDxcBlob> = None;
        let mut shader_name = None;
        unsafe { result.GetOutput(DXC_OUT_OBJECT, &mut shader_name, &mut output) }?;
        output.ok_or_else(|| compilation_error("the compiler produced no bytecode".to_string()))
    }
}

#[cfg(windows)]
fn bytecode(blob: &IDxcBlob) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: unsafe { blob.GetBufferPointer() },
        BytecodeLength: unsafe { blob.GetBufferSize() },
    }
}

#[cfg(windows)]
struct ShaderEntry {
    path: PathBuf,
    kind: ShaderKind,
    // per stage, in the order of `ShaderKind::stages`; dropped once the pipeline exists
    blobs: Vec<IDxcBlob>,
    pipeline_state: Option<ID3D12PipelineState>,
}

/// Compiled shaders and their pipeline states, keyed by [`ShaderId`].
#[cfg(windows)]
pub struct Shaders {
    compiler: ShaderCompiler,
    shaders: Registry<ShaderId, ShaderEntry>,
}

#[cfg(windows)]
impl Shaders {
    pub fn build(debug: bool) -> Result<Self> {
        Ok(Self {
            compiler: ShaderCompiler::build(debug)?,
            shaders: Registry::new("shader"),
        })
    }

    pub fn load_shaders_from_file(&mut self, id: ShaderId, path: &Path, kind: ShaderKind) -> Result<()> {
        if self.shaders.get(id).is_ok() {
            return Err(Error::AlreadyLoaded(format!("shader {id:?}")));
        }

        let blobs = kind
            .stages()
            .iter()
            .map(|stage| self.compiler.compile_file(path, stage))
            .collect::<Result<Vec<_>>>()?;

        self.shaders.insert(
            id,
            ShaderEntry {
                path: path.to_path_buf(),
                kind,
                blobs,
                pipeline_state: None,
            },
        )?;
        Ok(())
    }

    fn compiled(&self, id: ShaderId, kind: ShaderKind) -> Result<&ShaderEntry> {
        let entry = self.shaders.get(id)?;
        if entry.kind != kind || entry.blobs.len() != kind.stages().len() {
            return Err(Error::NotLoaded(format!("{kind:?} bytecode of shader {id:?}")));
        }
        Ok(entry)
    }

    pub fn create_input_layout_and_pipeline_state(
        &mut self,
        device: &ID3D12Device2,
        id: ShaderId,
        root_signature: &RootSignature,
        config: &GraphicsPipelineConfig,
    ) -> Result<()> {
        let entry = self.compiled(id, ShaderKind::Graphics)?;

        let input_elements = match config.input_layout {
            InputLayout::PositionTexcoord => vec![
                D3D12_INPUT_ELEMENT_DESC {
                    SemanticName: s!("POSITION"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32B32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: D3D12_APPEND_ALIGNED_ELEMENT,
                    InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
                D3D12_INPUT_ELEMENT_DESC {
                    SemanticName: s!("TEXCOORD"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: D3D12_APPEND_ALIGNED_ELEMENT,
                    InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
            ],
            InputLayout::None => Vec::new(),
        };

        let render_target_blend = if config.additive_blend {
            D3D12_RENDER_TARGET_BLEND_DESC {
                BlendEnable: true.into(),
                LogicOpEnable: false.into(),
                SrcBlend: D3D12_BLEND_ONE,
                DestBlend: D3D12_BLEND_ONE,
                BlendOp: D3D12_BLEND_OP_ADD,
                SrcBlendAlpha: D3D12_BLEND_ONE,
                DestBlendAlpha: D3D12_BLEND_ONE,
                BlendOpAlpha: D3D12_BLEND_OP_ADD,
                LogicOp: D3D12_LOGIC_OP_NOOP,
                RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
            }
        } else {
            D3D12_RENDER_TARGET_BLEND_DESC {
                BlendEnable: false.into(),
                LogicOpEnable: false.into(),
                SrcBlend: D3D12_BLEND_ONE,
                DestBlend: D3D12_BLEND_ZERO,
                BlendOp: D3D12_BLEND_OP_ADD,
                SrcBlendAlpha: D3D12_BLEND_ONE,
                DestBlendAlpha: D3D12_BLEND_ZERO,
                BlendOpAlpha: D3D12_BLEND_OP_ADD,
                LogicOp: D3D12_LOGIC_OP_NOOP,
                RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
            }
        };

        let mut rtv_formats = [DXGI_FORMAT_UNKNOWN; 8];
        rtv_formats[0] = DXGI_FORMAT_R8G8B8A8_UNORM;

        let desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: unsafe { std::mem::transmute_copy(root_signature.get()) },

            VS: bytecode(&entry.blobs[0]),
            PS: bytecode(&entry.blobs[1]),

            BlendState: D3D12_BLEND_DESC {
                AlphaToCoverageEnable: false.into(),
                IndependentBlendEnable: false.into(),
                RenderTarget: [render_target_blend; 8],
            },
            SampleMask: u32::MAX,
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                // the triangle is seen from both sides while the camera orbits
                CullMode: D3D12_CULL_MODE_NONE,
                DepthClipEnable: true.into(),
                ..Default::default()
            },
            DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: true.into(),
                DepthWriteMask: if config.depth_write {
                    D3D12_DEPTH_WRITE_MASK_ALL
                } else {
                    D3D12_DEPTH_WRITE_MASK_ZERO
                },
                DepthFunc: D3D12_COMPARISON_FUNC_LESS,
                StencilEnable: false.into(),
                ..Default::default()
            },

            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_elements.as_ptr(),
                NumElements: input_elements.len() as u32,
            },

            PrimitiveTopologyType: config.topology_type,
            NumRenderTargets: 1,
            RTVFormats: rtv_formats,
            DSVFormat: DXGI_FORMAT_D32_FLOAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },

            ..Default::default()
        };

        let pipeline_state: ID3D12PipelineState =
            unsafe { device.CreateGraphicsPipelineState(&desc) }?;
        self.store_pipeline_state(id, pipeline_state)
    }

    pub fn create_pipeline_state_for_compute_shader(
        &mut self,
        device: &ID3D12Device2,
        id: ShaderId,
        root_signature: &RootSignature,
    ) -> Result<()> {
        let entry = self.compiled(id, ShaderKind::Compute)?;

        let desc = D3D12_COMPUTE_PIPELINE_STATE_DESC {
            pRootSignature: unsafe { std::mem::transmute_copy(root_signature.get()) },
            CS: bytecode(&entry.blobs[0]),
            ..Default::default()
        };

        let pipeline_state: ID3D12PipelineState =
            unsafe { device.CreateComputePipelineState(&desc) }?;
        self.store_pipeline_state(id, pipeline_state)
    }

    fn store_pipeline_state(&mut self, id: ShaderId, pipeline_state: ID3D12PipelineState) -> Result<()> {
        let entry = self.shaders.get_mut(id)?;
        set_name(&pipeline_state, &format!("{id:?}::pso"))?;
        tracing::debug!(?id, path = %entry.path.display(), "Created pipeline state");

        // the bytecode is baked into the pipeline state
        entry.blobs.clear();
        entry.pipeline_state = Some(pipeline_state);
        Ok(())
    }

    pub fn pipeline_state(&self, id: ShaderId) -> Result<&ID3D12PipelineState> {
        self.shaders
            .get(id)?
            .pipeline_state
            .as_ref()
            .ok_or_else(|| Error::NotLoaded(format!("pipeline state of shader {id:?}")))
    }

    pub fn set_pipeline_state(&self, command_list: &ID3D12GraphicsCommandList, id: ShaderId) -> Result<()> {
        unsafe { command_list.SetPipelineState(self.pipeline_state(id)?) };
        Ok(())
    }
}

#[cfg(windows)]
pub fn set_topology(command_list: &ID3D12GraphicsCommandList, topology: D3D_PRIMITIVE_TOPOLOGY) {
    unsafe { command_list.IASetPrimitiveTopology(topology) };
}

#[cfg(windows)]
pub fn set_compute_dispatch(command_list: &ID3D12GraphicsCommandList, x: u32, y: u32, z: u32) {
    unsafe { command_list.Dispatch(x, y, z) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphics_shaders_compile_vertex_and_pixel_stages() {
        let stages = ShaderKind::Graphics.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].entry_point, "VS_MAIN");
        assert_eq!(stages[0].target, "vs_6_0");
        assert_eq!(stages[1].entry_point, "PS_MAIN");
        assert_eq!(stages[1].target, "ps_6_0");
    }

    #[test]
    fn compute_shaders_compile_one_stage() {
        assert_eq!(ShaderKind::Compute.stages(), &[COMPUTE_STAGE]);
        assert_eq!(COMPUTE_STAGE.entry_point, "CS_MAIN");
    }

    #[test]
    fn ids_map_to_their_sources() {
        assert_eq!(ShaderId::Triangle.kind(), ShaderKind::Graphics);
        assert_eq!(ShaderId::Particles.kind(), ShaderKind::Graphics);
        assert_eq!(ShaderId::NBody.kind(), ShaderKind::Compute);
        assert_eq!(ShaderId::NBody.file_name(), "nbody.hlsl");
    }
}
