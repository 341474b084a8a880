use windows::core::Interface;
use windows::Win32::Graphics::{
    Direct3D::*,
    Direct3D12::*,
    Dxgi::{Common::*, *},
};

use super::util::set_name;
use crate::error::{Error, Result};

/// Feature levels tried on every hardware adapter, best first.
const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 2] = [D3D_FEATURE_LEVEL_12_1, D3D_FEATURE_LEVEL_11_1];

pub fn create_factory(enable_debug_layer: bool, enable_gpu_validation: bool) -> Result<IDXGIFactory6> {
    let enable_debug_layer = enable_debug_layer || enable_gpu_validation;
    if enable_debug_layer {
        let mut debug: Option<ID3D12Debug1> = None;
        match unsafe { D3D12GetDebugInterface(&mut debug) }.map(|()| debug) {
            Ok(Some(debug)) => unsafe {
                debug.EnableDebugLayer();
                debug.SetEnableGPUBasedValidation(enable_gpu_validation);
                tracing::info!(gpu_validation = enable_gpu_validation, "Enabled the debug layer");
            },
            Ok(None) => tracing::warn!("The debug layer is not available"),
            Err(e) => tracing::warn!("Failed to enable the debug layer: {e}"),
        }
    }

    let flags = if enable_debug_layer {
        DXGI_CREATE_FACTORY_DEBUG
    } else {
        DXGI_CREATE_FACTORY_FLAGS(0)
    };

    Ok(unsafe { CreateDXGIFactory2(flags) }?)
}

fn hardware_adapters(factory: &IDXGIFactory6) -> Vec<(IDXGIAdapter1, DXGI_ADAPTER_DESC1)> {
    let mut adapters = Vec::new();
    let mut index = 0;
    while let Ok(adapter) = unsafe {
        factory.EnumAdapterByGpuPreference::<IDXGIAdapter1>(index, DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE)
    } {
        index += 1;

        let Ok(desc) = (unsafe { adapter.GetDesc1() }) else {
            continue;
        };
        let adapter_flag = DXGI_ADAPTER_FLAG(desc.Flags as i32);
        if (adapter_flag & DXGI_ADAPTER_FLAG_SOFTWARE) != DXGI_ADAPTER_FLAG_NONE {
            // WARP is only the last resort
            continue;
        }
        adapters.push((adapter, desc));
    }
    adapters
}

fn adapter_name(desc: &DXGI_ADAPTER_DESC1) -> String {
    let len = desc
        .Description
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(desc.Description.len());
    String::from_utf16_lossy(&desc.Description[..len])
}

fn try_create_device(adapter: &IDXGIAdapter1, feature_level: D3D_FEATURE_LEVEL) -> Option<ID3D12Device2> {
    let mut device: Option<ID3D12Device2> = None;
    unsafe { D3D12CreateDevice(adapter, feature_level, &mut device) }
        .ok()
        .and(device)
}

/// Picks the highest-performance hardware adapter that supports 12.1, then 11.1, and
/// falls back to WARP.
pub fn find_and_create_device(factory: &IDXGIFactory6, enable_debug_layer: bool) -> Result<ID3D12Device2> {
    let adapters = hardware_adapters(factory);

    let found = FEATURE_LEVELS.iter().find_map(|&feature_level| {
        adapters.iter().find_map(|(adapter, desc)| {
            try_create_device(adapter, feature_level).map(|device| (device, adapter_name(desc), feature_level))
        })
    });

    let (device, name, feature_level) = match found {
        Some(found) => found,
        None => {
            tracing::warn!("No hardware adapter supports Direct3D 12, falling back to WARP");
            let warp: IDXGIAdapter1 = unsafe { factory.EnumWarpAdapter() }?;
            let desc = unsafe { warp.GetDesc1() }?;
            let device = try_create_device(&warp, D3D_FEATURE_LEVEL_11_0).ok_or(Error::NoAdapter)?;
            (device, adapter_name(&desc), D3D_FEATURE_LEVEL_11_0)
        }
    };

    tracing::info!(adapter = %name, feature_level = %format!("{:#x}", feature_level.0), "Created device");
    set_name(&device, &name)?;

    if enable_debug_layer {
        if let Err(e) = route_debug_messages(&device) {
            tracing::warn!("D3D12 debug messages will not be logged: {e}");
        }
    }

    Ok(device)
}

fn route_debug_messages(device: &ID3D12Device2) -> Result<()> {
    let info_queue = device.cast::<ID3D12InfoQueue1>()?;
    let mut _callback_cookie = 0;
    unsafe {
        let mut denied_severities = [D3D12_MESSAGE_SEVERITY_INFO];
        let mut denied_messages = [
            // issued when the initial state of a resource is not D3D12_RESOURCE_STATE_COMMON
            D3D12_MESSAGE_ID_CREATERESOURCE_STATE_IGNORED,
        ];

        let deny_list = D3D12_INFO_QUEUE_FILTER_DESC {
            NumSeverities: denied_severities.len() as u32,
            pSeverityList: denied_severities.as_mut_ptr(),
            NumIDs: denied_messages.len() as u32,
            pIDList: denied_messages.as_mut_ptr(),
            ..Default::default()
        };
        let filter = D3D12_INFO_QUEUE_FILTER {
            DenyList: deny_list,
            ..Default::default()
        };
        info_queue.PushStorageFilter(&filter)?;

        // https://github.com/microsoft/windows-rs/issues/3031
        info_queue.RegisterMessageCallback(
            Some(capture_message),
            D3D12_MESSAGE_CALLBACK_FLAG_NONE,
            std::ptr::null_mut(),
            &mut _callback_cookie,
        )?;
    }
    Ok(())
}

extern "system" fn capture_message(
    _category: D3D12_MESSAGE_CATEGORY,
    severity: D3D12_MESSAGE_SEVERITY,
    id: D3D12_MESSAGE_ID,
    description: windows::core::PCSTR,
    _context: *mut core::ffi::c_void,
) {
    // DO NOT CALL D3D FUNCTIONS IN THIS FUNCTION
    let message = match unsafe { description.to_string() } {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(target: "d3d12", "A message from D3D is corrupted: {e}");
            return;
        }
    };

    match severity {
        D3D12_MESSAGE_SEVERITY_CORRUPTION | D3D12_MESSAGE_SEVERITY_ERROR => {
            tracing::error!(target: "d3d12", id = id.0, "{message}")
        }
        D3D12_MESSAGE_SEVERITY_WARNING => tracing::warn!(target: "d3d12", id = id.0, "{message}"),
        D3D12_MESSAGE_SEVERITY_INFO => tracing::info!(target: "d3d12", id = id.0, "{message}"),
        _ => tracing::debug!(target: "d3d12", id = id.0, "{message}"),
    }
}

pub fn report_live_objects() -> Result<()> {
    unsafe {
        let debug: IDXGIDebug1 = DXGIGetDebugInterface1(0)?;
        debug.ReportLiveObjects(
            DXGI_DEBUG_ALL,
            DXGI_DEBUG_RLO_DETAIL | DXGI_DEBUG_RLO_IGNORE_INTERNAL,
        )?;
    }
    Ok(())
}
