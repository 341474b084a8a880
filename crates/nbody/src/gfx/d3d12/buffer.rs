//! Vertex, index and per-frame constant buffers.
//!
//! Vertex and index data go through an upload heap into a default-heap buffer; the
//! copy is recorded on the caller's command list, so the upload heap is kept next to
//! the buffer until that list has executed. Constant buffers live in an upload heap
//! that stays mapped, with one 256-byte aligned slot per frame buffer.

#[cfg(windows)]
use windows::Win32::Graphics::{Direct3D12::*, Dxgi::Common::*};

#[cfg(windows)]
use super::{barrier, resource};
use super::FRAME_BUFFER_COUNT;
use crate::error::{Error, Result};
use crate::gfx::math::align_up;

pub const CONSTANT_BUFFER_ALIGNMENT: u64 =
    D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT as u64;

#[cfg(not(windows))]
const D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT: u32 = 256;

/// Placement of the per-frame slots inside one constant buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferLayout {
    slot_size: u64,
    slot_count: u32,
}

impl ConstantBufferLayout {
    pub fn new(data_size: usize, slot_count: usize) -> Self {
        Self {
            slot_size: align_up((data_size as u64).max(1), CONSTANT_BUFFER_ALIGNMENT),
            slot_count: slot_count as u32,
        }
    }

    pub fn per_frame(data_size: usize) -> Self {
        Self::new(data_size, FRAME_BUFFER_COUNT)
    }

    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    pub fn total_size(&self) -> u64 {
        self.slot_size * u64::from(self.slot_count)
    }

    /// Byte offset of the slot written for `frame_index`.
    pub fn offset(&self, frame_index: usize) -> Result<u64> {
        if frame_index >= self.slot_count as usize {
            return Err(Error::FrameIndexOutOfRange {
                index: frame_index,
                count: self.slot_count,
            });
        }
        Ok(self.slot_size * frame_index as u64)
    }

    /// Rejects writes that would spill into the next frame's slot.
    pub fn check_write(&self, size: usize) -> Result<()> {
        if size as u64 > self.slot_size {
            return Err(Error::ConstantBufferOverflow {
                size,
                capacity: self.slot_size,
            });
        }
        Ok(())
    }
}

#[cfg(windows)]
pub struct VertexBuffer {
    _buffer: ID3D12Resource,
    _upload_heap: ID3D12Resource,
    view: D3D12_VERTEX_BUFFER_VIEW,
}

#[cfg(windows)]
impl VertexBuffer {
    pub fn view(&self) -> &D3D12_VERTEX_BUFFER_VIEW {
        &self.view
    }
}

#[cfg(windows)]
pub struct IndexBuffer {
    _buffer: ID3D12Resource,
    _upload_heap: ID3D12Resource,
    view: D3D12_INDEX_BUFFER_VIEW,
    index_count: u32,
}

#[cfg(windows)]
impl IndexBuffer {
    pub fn view(&self) -> &D3D12_INDEX_BUFFER_VIEW {
        &self.view
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(windows)]
pub struct ConstantBuffer {
    buffer: ID3D12Resource,
    mapped: std::ptr::NonNull<u8>,
    layout: ConstantBufferLayout,
}

/// Copies `data` into a default-heap buffer through a new upload heap and leaves the
/// buffer in `final_state`.
#[cfg(windows)]
fn create_default_buffer(
    device: &ID3D12Device2,
    command_list: &ID3D12GraphicsCommandList,
    data: &[u8],
    final_state: D3D12_RESOURCE_STATES,
    name: &str,
) -> Result<(ID3D12Resource, ID3D12Resource)> {
    let upload_heap = resource::create_upload_buffer(device, data, &format!("{name}::upload_heap"))?;

    let buffer = resource::create_buffer(
        device,
        data.len() as u64,
        D3D12_HEAP_TYPE_DEFAULT,
        D3D12_RESOURCE_FLAG_NONE,
        D3D12_RESOURCE_STATE_COMMON,
        name,
    )?;

    unsafe {
        command_list.CopyBufferRegion(&buffer, 0, &upload_heap, 0, data.len() as u64);
        command_list.ResourceBarrier(&[barrier::transition(
            &buffer,
            D3D12_RESOURCE_STATE_COPY_DEST,
            final_state,
        )]);
    }

    Ok((buffer, upload_heap))
}

#[cfg(windows)]
pub fn create_vertex_buffer<T: bytemuck::Pod>(
    device: &ID3D12Device2,
    command_list: &ID3D12GraphicsCommandList,
    vertices: &[T],
    name: &str,
) -> Result<VertexBuffer> {
    let data: &[u8] = bytemuck::cast_slice(vertices);
    let (buffer, upload_heap) = create_default_buffer(
        device,
        command_list,
        data,
        D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER,
        name,
    )?;

    let view = D3D12_VERTEX_BUFFER_VIEW {
        BufferLocation: unsafe { buffer.GetGPUVirtualAddress() },
        SizeInBytes: data.len() as u32,
        StrideInBytes: std::mem::size_of::<T>() as u32,
    };

    Ok(VertexBuffer {
        _buffer: buffer,
        _upload_heap: upload_heap,
        view,
    })
}

/// Only 16 and 32 bit indices can be bound.
pub fn check_index_size(index_size: usize) -> Result<()> {
    match index_size {
        2 | 4 => Ok(()),
        size => Err(Error::InvalidArgument(format!(
            "{size} byte indices are not supported"
        ))),
    }
}

#[cfg(windows)]
fn index_format(index_size: usize) -> Result<DXGI_FORMAT> {
    check_index_size(index_size)?;
    Ok(if index_size == 2 {
        DXGI_FORMAT_R16_UINT
    } else {
        DXGI_FORMAT_R32_UINT
    })
}

#[cfg(windows)]
pub fn create_index_buffer<T: bytemuck::Pod>(
    device: &ID3D12Device2,
    command_list: &ID3D12GraphicsCommandList,
    indices: &[T],
    name: &str,
) -> Result<IndexBuffer> {
    let format = index_format(std::mem::size_of::<T>())?;

    let data: &[u8] = bytemuck::cast_slice(indices);
    let (buffer, upload_heap) = create_default_buffer(
        device,
        command_list,
        data,
        D3D12_RESOURCE_STATE_INDEX_BUFFER,
        name,
    )?;

    let view = D3D12_INDEX_BUFFER_VIEW {
        BufferLocation: unsafe { buffer.GetGPUVirtualAddress() },
        SizeInBytes: data.len() as u32,
        Format: format,
    };

    Ok(IndexBuffer {
        _buffer: buffer,
        _upload_heap: upload_heap,
        view,
        index_count: indices.len() as u32,
    })
}

#[cfg(windows)]
pub fn create_constant_buffer_for_root(
    device: &ID3D12Device2,
    data_size: usize,
    name: &str,
) -> Result<ConstantBuffer> {
    let layout = ConstantBufferLayout::per_frame(data_size);
    let buffer = resource::create_buffer(
        device,
        layout.total_size(),
        D3D12_HEAP_TYPE_UPLOAD,
        D3D12_RESOURCE_FLAG_NONE,
        D3D12_RESOURCE_STATE_GENERIC_READ,
        name,
    )?;
    let mapped = resource::map_persistent(&buffer)?;

    Ok(ConstantBuffer {
        buffer,
        mapped,
        layout,
    })
}

#[cfg(windows)]
impl ConstantBuffer {
    pub fn set_constant_buffer_data<T: bytemuck::Pod>(
        &mut self,
        data: &T,
        frame_index: usize,
    ) -> Result<()> {
        let bytes = bytemuck::bytes_of(data);
        self.layout.check_write(bytes.len())?;

        let offset = self.layout.offset(frame_index)? as usize;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.as_ptr().add(offset), bytes.len());
        }
        Ok(())
    }

    pub fn gpu_address(&self, frame_index: usize) -> Result<u64> {
        let offset = self.layout.offset(frame_index)?;
        let base = unsafe { self.buffer.GetGPUVirtualAddress() };
        Ok(base + offset)
    }

    pub fn bind_constant_buffer_for_root(
        &self,
        command_list: &ID3D12GraphicsCommandList,
        root_index: u32,
        frame_index: usize,
    ) -> Result<()> {
        let address = self.gpu_address(frame_index)?;
        unsafe { command_list.SetGraphicsRootConstantBufferView(root_index, address) };
        Ok(())
    }
}

#[cfg(windows)]
pub fn bind_vertex_buffer(command_list: &ID3D12GraphicsCommandList, slot: u32, buffer: &VertexBuffer) {
    unsafe { command_list.IASetVertexBuffers(slot, Some(&[*buffer.view()])) };
}

#[cfg(windows)]
pub fn bind_index_buffer(command_list: &ID3D12GraphicsCommandList, buffer: &IndexBuffer) {
    unsafe { command_list.IASetIndexBuffer(Some(buffer.view())) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_256_byte_aligned() {
        let layout = ConstantBufferLayout::new(80, 3);
        assert_eq!(layout.slot_size(), 256);
        assert_eq!(layout.total_size(), 768);
        assert_eq!(layout.offset(0).unwrap(), 0);
        assert_eq!(layout.offset(2).unwrap(), 512);

        let layout = ConstantBufferLayout::new(300, 2);
        assert_eq!(layout.slot_size(), 512);
        assert_eq!(layout.offset(1).unwrap(), 512);
    }

    #[test]
    fn frame_index_past_last_slot_is_rejected() {
        let layout = ConstantBufferLayout::per_frame(64);
        assert!(layout.offset(FRAME_BUFFER_COUNT - 1).is_ok());

        let err = layout.offset(FRAME_BUFFER_COUNT).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameIndexOutOfRange { index, count }
                if index == FRAME_BUFFER_COUNT && count == FRAME_BUFFER_COUNT as u32
        ));
        assert!(layout.offset(usize::MAX).is_err());
    }

    #[test]
    fn only_16_and_32_bit_indices() {
        assert!(check_index_size(std::mem::size_of::<u16>()).is_ok());
        assert!(check_index_size(std::mem::size_of::<u32>()).is_ok());

        let err = check_index_size(std::mem::size_of::<u8>()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(err.to_string(), "1 byte indices are not supported");
    }

    #[test]
    fn one_slot_per_frame_buffer() {
        let layout = ConstantBufferLayout::per_frame(64);
        assert_eq!(layout.total_size(), 256 * FRAME_BUFFER_COUNT as u64);
    }

    #[test]
    fn empty_data_still_gets_a_slot() {
        let layout = ConstantBufferLayout::new(0, 1);
        assert_eq!(layout.slot_size(), 256);
    }

    #[test]
    fn oversized_writes_are_rejected() {
        let layout = ConstantBufferLayout::new(80, 2);
        assert!(layout.check_write(80).is_ok());
        assert!(layout.check_write(256).is_ok());
        assert!(matches!(
            layout.check_write(257),
            Err(Error::ConstantBufferOverflow {
                size: 257,
                capacity: 256
            })
        ));
    }
}
