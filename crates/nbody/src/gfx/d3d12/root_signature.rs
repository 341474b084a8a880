use windows::Win32::Graphics::Direct3D12::*;

use super::util::{blob_bytes, blob_to_string, set_name};
use crate::error::{Error, Result};

/// One contiguous run of descriptors inside a descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorRange {
    pub range_type: D3D12_DESCRIPTOR_RANGE_TYPE,
    pub count: u32,
    pub base_register: u32,
}

#[derive(Debug, Clone)]
pub enum RootParameter {
    ConstantBufferView { register: u32 },
    ShaderResourceView { register: u32 },
    UnorderedAccessView { register: u32 },
    Constants { register: u32, count: u32 },
    DescriptorTable { ranges: Vec<DescriptorRange> },
}

/// Collects root parameters and static samplers, then serializes them into a root signature.
pub struct RootSignatureBuilder {
    parameters: Vec<(RootParameter, D3D12_SHADER_VISIBILITY)>,
    samplers: Vec<D3D12_STATIC_SAMPLER_DESC>,
    flags: D3D12_ROOT_SIGNATURE_FLAGS,
}

impl Default for RootSignatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RootSignatureBuilder {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            samplers: Vec::new(),
            flags: D3D12_ROOT_SIGNATURE_FLAG_NONE,
        }
    }

    pub fn parameter(mut self, parameter: RootParameter, visibility: D3D12_SHADER_VISIBILITY) -> Self {
        self.parameters.push((parameter, visibility));
        self
    }

    pub fn static_sampler(mut self, sampler: D3D12_STATIC_SAMPLER_DESC) -> Self {
        self.samplers.push(sampler);
        self
    }

    pub fn flags(mut self, flags: D3D12_ROOT_SIGNATURE_FLAGS) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(&self, device: &ID3D12Device2, name: &str) -> Result<RootSignature> {
        // the table ranges must outlive the serialization call
        let ranges: Vec<Vec<D3D12_DESCRIPTOR_RANGE1>> = self
            .parameters
            .iter()
            .map(|(parameter, _)| match parameter {
                RootParameter::DescriptorTable { ranges } => ranges
                    .iter()
                    .map(|range| D3D12_DESCRIPTOR_RANGE1 {
                        RangeType: range.range_type,
                        NumDescriptors: range.count,
                        BaseShaderRegister: range.base_register,
                        RegisterSpace: 0,
                        Flags: D3D12_DESCRIPTOR_RANGE_FLAG_NONE,
                        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .collect();

        let params: Vec<D3D12_ROOT_PARAMETER1> = self
            .parameters
            .iter()
            .zip(&ranges)
            .map(|((parameter, visibility), ranges)| root_parameter(parameter, *visibility, ranges))
            .collect();

        let desc = D3D12_VERSIONED_ROOT_SIGNATURE_DESC {
            Version: D3D_ROOT_SIGNATURE_VERSION_1_1,
            Anonymous: D3D12_VERSIONED_ROOT_SIGNATURE_DESC_0 {
                Desc_1_1: D3D12_ROOT_SIGNATURE_DESC1 {
                    NumParameters: params.len() as u32,
                    pParameters: params.as_ptr(),
                    NumStaticSamplers: self.samplers.len() as u32,
                    pStaticSamplers: self.samplers.as_ptr(),
                    Flags: self.flags,
                },
            },
        };

        let mut blob = None;
        let mut error = None;
        let serialized =
            unsafe { D3D12SerializeVersionedRootSignature(&desc, &mut blob, Some(&mut error)) };
        if let Some(error) = error {
            return Err(Error::RootSignature(blob_to_string(&error)));
        }
        serialized?;

        let blob = blob.ok_or_else(|| Error::RootSignature(format!("{name}: empty blob")))?;
        let root_signature: ID3D12RootSignature =
            unsafe { device.CreateRootSignature(0, blob_bytes(&blob)) }?;
        set_name(&root_signature, name)?;

        tracing::debug!(name, parameters = params.len(), "Created root signature");

        Ok(RootSignature { root_signature })
    }
}

fn root_parameter(
    parameter: &RootParameter,
    visibility: D3D12_SHADER_VISIBILITY,
    ranges: &[D3D12_DESCRIPTOR_RANGE1],
) -> D3D12_ROOT_PARAMETER1 {
    let descriptor = |register| D3D12_ROOT_PARAMETER1_0 {
        Descriptor: D3D12_ROOT_DESCRIPTOR1 {
            ShaderRegister: register,
            RegisterSpace: 0,
            Flags: D3D12_ROOT_DESCRIPTOR_FLAG_NONE,
        },
    };

    let (parameter_type, anonymous) = match *parameter {
        RootParameter::ConstantBufferView { register } => {
            (D3D12_ROOT_PARAMETER_TYPE_CBV, descriptor(register))
        }
        RootParameter::ShaderResourceView { register } => {
            (D3D12_ROOT_PARAMETER_TYPE_SRV, descriptor(register))
        }
        RootParameter::UnorderedAccessView { register } => {
            (D3D12_ROOT_PARAMETER_TYPE_UAV, descriptor(register))
        }
        RootParameter::Constants { register, count } => (
            D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
            D3D12_ROOT_PARAMETER1_0 {
                Constants: D3D12_ROOT_CONSTANTS {
                    ShaderRegister: register,
                    RegisterSpace: 0,
                    Num32BitValues: count,
                },
            },
        ),
        RootParameter::DescriptorTable { .. } => (
            D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            D3D12_ROOT_PARAMETER1_0 {
                DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE1 {
                    NumDescriptorRanges: ranges.len() as u32,
                    pDescriptorRanges: ranges.as_ptr(),
                },
            },
        ),
    };

    D3D12_ROOT_PARAMETER1 {
        ParameterType: parameter_type,
        Anonymous: anonymous,
        ShaderVisibility: visibility,
    }
}

/// Linear filtering with wrapped addressing, bound to `s0`.
pub fn standard_sampler(visibility: D3D12_SHADER_VISIBILITY) -> D3D12_STATIC_SAMPLER_DESC {
    D3D12_STATIC_SAMPLER_DESC {
        Filter: D3D12_FILTER_MIN_MAG_MIP_LINEAR,
        AddressU: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressV: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressW: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        MipLODBias: 0.0,
        MaxAnisotropy: 0,
        ComparisonFunc: D3D12_COMPARISON_FUNC_NEVER,
        BorderColor: D3D12_STATIC_BORDER_COLOR_TRANSPARENT_BLACK,
        MinLOD: 0.0,
        MaxLOD: D3D12_FLOAT32_MAX,
        ShaderRegister: 0,
        RegisterSpace: 0,
        ShaderVisibility: visibility,
    }
}

pub struct RootSignature {
    root_signature: ID3D12RootSignature,
}

impl RootSignature {
    pub fn get(&self) -> &ID3D12RootSignature {
        &self.root_signature
    }

    pub fn set_graphics(&self, command_list: &ID3D12GraphicsCommandList) {
        unsafe { command_list.SetGraphicsRootSignature(&self.root_signature) };
    }

    pub fn set_compute(&self, command_list: &ID3D12GraphicsCommandList) {
        unsafe { command_list.SetComputeRootSignature(&self.root_signature) };
    }
}
