use windows::core::{Interface, HSTRING, PCWSTR};
use windows::Win32::Graphics::{Direct3D::ID3DBlob, Direct3D12::*};

use crate::error::Result;

pub fn set_name(object: &impl Interface, name: &str) -> Result<()> {
    // https://github.com/microsoft/windows-rs/issues/973
    let name: HSTRING = name.into();
    let object: ID3D12Object = object.cast()?;
    unsafe { object.SetName(PCWSTR(name.as_ptr())) }?;
    Ok(())
}

/// Reads the text of an error blob returned by the serializer or the compiler.
pub fn blob_to_string(blob: &ID3DBlob) -> String {
    let bytes = unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
    };
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .trim_end()
        .to_string()
}

pub fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}
