use windows::core::Interface;
use windows::Win32::Foundation::{self, HWND};
use windows::Win32::Graphics::{
    Direct3D12::*,
    Dxgi::{Common::*, *},
};

use super::{util::set_name, view::DescriptorHeap, FRAME_BUFFER_COUNT};
use crate::error::Result;

pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// The swap chain, its back buffers and one render target view per back buffer.
pub struct SwapChain {
    swap_chain: IDXGISwapChain4,
    frame_buffers: Vec<ID3D12Resource>,
    rtv_heap: DescriptorHeap,
    frame_index: usize,
    tearing_supported: bool,
}

impl SwapChain {
    pub fn build(
        device: &ID3D12Device2,
        factory: &IDXGIFactory6,
        command_queue: &ID3D12CommandQueue,
        hwnd: HWND,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let tearing_supported = check_tearing_support(factory);
        let flags = if tearing_supported {
            DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
        } else {
            DXGI_SWAP_CHAIN_FLAG(0)
        };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: BACK_BUFFER_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Stereo: false.into(),
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: FRAME_BUFFER_COUNT as u32,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            AlphaMode: DXGI_ALPHA_MODE_UNSPECIFIED,
            Flags: flags.0 as u32,
        };

        let swap_chain =
            unsafe { factory.CreateSwapChainForHwnd(command_queue, hwnd, &desc, None, None) }?;

        // no Alt+Enter fullscreen toggle
        unsafe { factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER) }?;

        let swap_chain = swap_chain.cast::<IDXGISwapChain4>()?;

        let rtv_heap = DescriptorHeap::build(
            device,
            D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            FRAME_BUFFER_COUNT as u32,
            D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
            "rtv_heap",
        )?;

        let frame_buffers = (0..FRAME_BUFFER_COUNT)
            .map(|i| -> Result<ID3D12Resource> {
                let buffer: ID3D12Resource = unsafe { swap_chain.GetBuffer(i as u32) }?;
                set_name(&buffer, &format!("frame_buffer[{i}]"))?;
                rtv_heap.create_rtv(device, i as u32, &buffer)?;
                Ok(buffer)
            })
            .collect::<Result<Vec<_>>>()?;

        let frame_index = unsafe { swap_chain.GetCurrentBackBufferIndex() } as usize;

        tracing::debug!(width, height, tearing_supported, "Created swap chain");

        Ok(Self {
            swap_chain,
            frame_buffers,
            rtv_heap,
            frame_index,
            tearing_supported,
        })
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn back_buffer(&self) -> &ID3D12Resource {
        &self.frame_buffers[self.frame_index]
    }

    /// Heap start plus `increment × frame_index`.
    pub fn back_buffer_rtv(&self) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.rtv_heap.cpu_handle(self.frame_index as u32)
    }

    pub fn present(&self, vsync: bool) -> Result<()> {
        let sync_interval = if vsync { 1 } else { 0 };
        let present_flags = if self.tearing_supported && !vsync {
            DXGI_PRESENT_ALLOW_TEARING
        } else {
            DXGI_PRESENT(0)
        };

        unsafe { self.swap_chain.Present(sync_interval, present_flags) }.ok()?;
        Ok(())
    }

    pub fn update_frame_index(&mut self) {
        self.frame_index = unsafe { self.swap_chain.GetCurrentBackBufferIndex() } as usize;
    }
}

fn check_tearing_support(factory: &IDXGIFactory6) -> bool {
    let mut allow_tearing = Foundation::FALSE;

    unsafe {
        factory.CheckFeatureSupport(
            DXGI_FEATURE_PRESENT_ALLOW_TEARING,
            &mut allow_tearing.0 as *mut std::ffi::c_int as *mut std::ffi::c_void,
            core::mem::size_of_val(&allow_tearing) as u32,
        )
    }
    .is_ok_and(|_| allow_tearing.as_bool())
}
