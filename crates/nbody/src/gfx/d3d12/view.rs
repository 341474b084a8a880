#[cfg(windows)]
use windows::Win32::Graphics::Direct3D12::*;

#[cfg(windows)]
use super::util::set_name;
use crate::error::{Error, Result};

/// Slot arithmetic of a descriptor heap: descriptors are `increment` bytes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLayout {
    increment: u32,
    capacity: u32,
}

impl DescriptorLayout {
    pub fn new(increment: u32, capacity: u32) -> Self {
        Self {
            increment,
            capacity,
        }
    }

    /// Byte offset of slot `index` from the start of the heap.
    pub fn offset(&self, index: u32) -> Result<u64> {
        if index >= self.capacity {
            return Err(Error::DescriptorOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(u64::from(self.increment) * u64::from(index))
    }
}

#[cfg(windows)]
pub struct DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    layout: DescriptorLayout,
    shader_visible: bool,
}

#[cfg(windows)]
impl DescriptorHeap {
    pub fn build(
        device: &ID3D12Device2,
        heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
        capacity: u32,
        flags: D3D12_DESCRIPTOR_HEAP_FLAGS,
        name: &str,
    ) -> Result<Self> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            NumDescriptors: capacity,
            Type: heap_type,
            Flags: flags,
            ..Default::default()
        };

        let heap: ID3D12DescriptorHeap = unsafe { device.CreateDescriptorHeap(&desc) }?;
        set_name(&heap, name)?;

        let increment = unsafe { device.GetDescriptorHandleIncrementSize(heap_type) };

        Ok(Self {
            heap,
            layout: DescriptorLayout::new(increment, capacity),
            shader_visible: (flags & D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE)
                == D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
        })
    }

    pub fn cpu_handle(&self, index: u32) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        let mut handle = unsafe { self.heap.GetCPUDescriptorHandleForHeapStart() };
        handle.ptr += self.layout.offset(index)? as usize;
        Ok(handle)
    }

    pub fn gpu_handle(&self, index: u32) -> Result<D3D12_GPU_DESCRIPTOR_HANDLE> {
        debug_assert!(self.shader_visible);
        let mut handle = unsafe { self.heap.GetGPUDescriptorHandleForHeapStart() };
        handle.ptr += self.layout.offset(index)?;
        Ok(handle)
    }

    pub fn create_rtv(
        &self,
        device: &ID3D12Device2,
        index: u32,
        resource: &ID3D12Resource,
    ) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        let handle = self.cpu_handle(index)?;
        unsafe { device.CreateRenderTargetView(resource, None, handle) };
        Ok(handle)
    }

    pub fn create_dsv(
        &self,
        device: &ID3D12Device2,
        index: u32,
        resource: &ID3D12Resource,
        desc: &D3D12_DEPTH_STENCIL_VIEW_DESC,
    ) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        let handle = self.cpu_handle(index)?;
        unsafe { device.CreateDepthStencilView(resource, Some(desc), handle) };
        Ok(handle)
    }

    pub fn create_srv(
        &self,
        device: &ID3D12Device2,
        index: u32,
        resource: &ID3D12Resource,
        desc: &D3D12_SHADER_RESOURCE_VIEW_DESC,
    ) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        let handle = self.cpu_handle(index)?;
        unsafe { device.CreateShaderResourceView(resource, Some(desc), handle) };
        Ok(handle)
    }

    /// Binds this heap and points the graphics root parameter `root_index` at its first slot.
    pub fn set_root_descriptor_table(
        &self,
        command_list: &ID3D12GraphicsCommandList,
        root_index: u32,
    ) -> Result<()> {
        let gpu_handle = self.gpu_handle(0)?;
        unsafe {
            command_list.SetDescriptorHeaps(&[Some(self.heap.clone())]);
            command_list.SetGraphicsRootDescriptorTable(root_index, gpu_handle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_step_by_increment() {
        let layout = DescriptorLayout::new(32, 3);
        assert_eq!(layout.offset(0).unwrap(), 0);
        assert_eq!(layout.offset(2).unwrap(), 64);
    }

    #[test]
    fn index_past_capacity_is_rejected() {
        let layout = DescriptorLayout::new(32, 2);
        let err = layout.offset(2).unwrap_err();
        assert!(matches!(
            err,
            Error::DescriptorOutOfRange {
                index: 2,
                capacity: 2
            }
        ));
    }
}
