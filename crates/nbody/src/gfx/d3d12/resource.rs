use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::texture::check_texture_size;
use super::util::set_name;
use crate::error::{Error, Result};

pub fn create_buffer(
    device: &ID3D12Device2,
    size: u64,
    heap_type: D3D12_HEAP_TYPE,
    flags: D3D12_RESOURCE_FLAGS,
    init_state: D3D12_RESOURCE_STATES,
    name: &str,
) -> Result<ID3D12Resource> {
    let properties = heap_properties(heap_type);
    let desc = buffer_desc(size, flags);
    let mut buffer: Option<ID3D12Resource> = None;
    unsafe {
        device.CreateCommittedResource(
            &properties,
            D3D12_HEAP_FLAG_NONE,
            &desc,
            init_state,
            None,
            &mut buffer,
        )
    }?;
    let buffer = buffer.ok_or_else(|| windows::core::Error::from(windows::Win32::Foundation::E_POINTER))?;

    set_name(&buffer, name)?;
    tracing::debug!(name, size, "Created buffer");

    Ok(buffer)
}

/// Creates an upload-heap buffer holding a copy of `data`.
pub fn create_upload_buffer(device: &ID3D12Device2, data: &[u8], name: &str) -> Result<ID3D12Resource> {
    let buffer = create_buffer(
        device,
        data.len() as u64,
        D3D12_HEAP_TYPE_UPLOAD,
        D3D12_RESOURCE_FLAG_NONE,
        D3D12_RESOURCE_STATE_GENERIC_READ,
        name,
    )?;

    write_bytes(&buffer, 0, data)?;

    Ok(buffer)
}

/// Copies `data` into a CPU-visible buffer at `offset` bytes.
pub fn write_bytes(buffer: &ID3D12Resource, offset: usize, data: &[u8]) -> Result<()> {
    let mut mapped = std::ptr::null_mut();
    unsafe {
        // the CPU does not read from this resource
        let read_range = D3D12_RANGE { Begin: 0, End: 0 };
        buffer.Map(0, Some(&read_range), Some(&mut mapped))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), (mapped as *mut u8).add(offset), data.len());
        buffer.Unmap(0, None);
    }
    Ok(())
}

/// Maps an upload-heap buffer for the rest of its lifetime.
pub fn map_persistent(buffer: &ID3D12Resource) -> Result<std::ptr::NonNull<u8>> {
    let mut mapped = std::ptr::null_mut();
    let read_range = D3D12_RANGE { Begin: 0, End: 0 };
    unsafe { buffer.Map(0, Some(&read_range), Some(&mut mapped)) }?;
    std::ptr::NonNull::new(mapped as *mut u8)
        .ok_or_else(|| Error::Graphics(windows::Win32::Foundation::E_POINTER.into()))
}

pub fn create_texture2d(
    device: &ID3D12Device2,
    size: (u32, u32),
    format: DXGI_FORMAT,
    resource_flags: D3D12_RESOURCE_FLAGS,
    init_state: D3D12_RESOURCE_STATES,
    clear_value: Option<*const D3D12_CLEAR_VALUE>,
    name: &str,
) -> Result<ID3D12Resource> {
    let (width, height) = size;
    check_texture_size(width, height)?;

    let properties = heap_properties(D3D12_HEAP_TYPE_DEFAULT);
    let desc = texture2d_desc(format, width.into(), height, resource_flags);

    let mut texture: Option<ID3D12Resource> = None;
    unsafe {
        device.CreateCommittedResource(
            &properties,
            D3D12_HEAP_FLAG_NONE,
            &desc,
            init_state,
            clear_value,
            &mut texture,
        )
    }?;
    let texture = texture.ok_or_else(|| windows::core::Error::from(windows::Win32::Foundation::E_POINTER))?;

    set_name(&texture, name)?;
    tracing::debug!(name, width, height, "Created texture");

    Ok(texture)
}

fn heap_properties(heap_type: D3D12_HEAP_TYPE) -> D3D12_HEAP_PROPERTIES {
    D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
        MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
        CreationNodeMask: 1,
        VisibleNodeMask: 1,
    }
}

fn buffer_desc(buffer_size: u64, flags: D3D12_RESOURCE_FLAGS) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Alignment: 0,
        Width: buffer_size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        Flags: flags,
    }
}

fn texture2d_desc(
    format: DXGI_FORMAT,
    width: u64,
    height: u32,
    flags: D3D12_RESOURCE_FLAGS,
) -> D3D12_RESOURCE_DESC {
    D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        Alignment: 0,
        Width: width,
        Height: height,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: format,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: flags,
    }
}
