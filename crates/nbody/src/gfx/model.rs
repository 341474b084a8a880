#[cfg(windows)]
use windows::Win32::Graphics::Direct3D12::*;

#[cfg(windows)]
use super::d3d12::buffer::{self, ConstantBuffer, IndexBuffer, VertexBuffer};
#[cfg(windows)]
use crate::error::Result;
use super::math::Mat4;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex {
        position: [0.0, 2.5, 0.0],
        uv: [0.5, 0.0],
    },
    Vertex {
        position: [2.5, -2.0, 0.0],
        uv: [1.0, 1.0],
    },
    Vertex {
        position: [-2.5, -2.0, 0.0],
        uv: [0.0, 1.0],
    },
];

pub const TRIANGLE_INDICES: [u16; 3] = [0, 1, 2];

/// Contents of the triangle's constant buffer, `b0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneConstants {
    pub view_projection: [[f32; 4]; 4],
    /// 0 shows the first texture, 1 the second.
    pub texture_blend: f32,
    pub _pad: [f32; 3],
}

impl SceneConstants {
    pub fn new(view_projection: Mat4, texture_blend: f32) -> Self {
        Self {
            view_projection: view_projection.to_cols_array_2d(),
            texture_blend: texture_blend.clamp(0.0, 1.0),
            _pad: [0.0; 3],
        }
    }
}

/// Cross-fade weight between the two textures at `seconds`, cycling every `period`.
pub fn texture_blend(seconds: f64, period: f64) -> f32 {
    let phase = (seconds / period).fract() * std::f64::consts::TAU;
    (0.5 - 0.5 * phase.cos()) as f32
}

/// The textured triangle with its per-frame constants.
#[cfg(windows)]
pub struct Model {
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    constant_buffer: ConstantBuffer,
}

#[cfg(windows)]
impl Model {
    /// Records the vertex and index uploads on `command_list`.
    pub fn new(device: &ID3D12Device2, command_list: &ID3D12GraphicsCommandList) -> Result<Self> {
        let vertex_buffer = buffer::create_vertex_buffer(
            device,
            command_list,
            &TRIANGLE_VERTICES,
            "triangle::vertex_buffer",
        )?;
        let index_buffer = buffer::create_index_buffer(
            device,
            command_list,
            &TRIANGLE_INDICES,
            "triangle::index_buffer",
        )?;
        let constant_buffer = buffer::create_constant_buffer_for_root(
            device,
            std::mem::size_of::<SceneConstants>(),
            "triangle::constant_buffer",
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            constant_buffer,
        })
    }

    pub fn update(&mut self, constants: &SceneConstants, frame_index: usize) -> Result<()> {
        self.constant_buffer.set_constant_buffer_data(constants, frame_index)
    }

    pub fn bind_buffers(
        &self,
        command_list: &ID3D12GraphicsCommandList,
        root_index: u32,
        frame_index: usize,
    ) -> Result<()> {
        buffer::bind_vertex_buffer(command_list, 0, &self.vertex_buffer);
        buffer::bind_index_buffer(command_list, &self.index_buffer);
        self.constant_buffer
            .bind_constant_buffer_for_root(command_list, root_index, frame_index)
    }

    pub fn draw(&self, command_list: &ID3D12GraphicsCommandList) {
        unsafe { command_list.DrawIndexedInstanced(self.index_buffer.index_count(), 1, 0, 0, 0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_input_layout() {
        // POSITION float3 + TEXCOORD float2
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE_VERTICES).len(), 60);
    }

    #[test]
    fn indices_reference_existing_vertices() {
        assert!(TRIANGLE_INDICES
            .iter()
            .all(|&i| (i as usize) < TRIANGLE_VERTICES.len()));
    }

    #[test]
    fn constants_fill_whole_registers() {
        assert_eq!(std::mem::size_of::<SceneConstants>() % 16, 0);
    }

    #[test]
    fn constants_are_column_major() {
        let m = Mat4::from_translation(crate::gfx::math::Vec3::new(1.0, 2.0, 3.0));
        let constants = SceneConstants::new(m, 2.0);
        assert_eq!(constants.view_projection[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(constants.texture_blend, 1.0);
    }

    #[test]
    fn blend_cycles_between_textures() {
        assert!(texture_blend(0.0, 4.0).abs() < 1e-6);
        assert!((texture_blend(2.0, 4.0) - 1.0).abs() < 1e-6);
        assert!(texture_blend(4.0, 4.0).abs() < 1e-6);
        assert!((texture_blend(1.0, 4.0) - 0.5).abs() < 1e-6);
    }
}
