use std::path::Path;

#[cfg(windows)]
use windows::Win32::Graphics::{Direct3D12::*, Dxgi::Common::*};

#[cfg(windows)]
use super::{barrier, resource, view::DescriptorHeap};
#[cfg(windows)]
use crate::gfx::registry::Registry;
use crate::error::{Error, Result};
use crate::gfx::math::align_up;

pub const TEXTURE_PITCH_ALIGNMENT: u64 = 256;
const BYTES_PER_PIXEL: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureId {
    Fatboy,
    Smiley,
}

impl TextureId {
    pub const ALL: [TextureId; 2] = [TextureId::Fatboy, TextureId::Smiley];

    pub fn file_name(self) -> &'static str {
        match self {
            TextureId::Fatboy => "fatboy.png",
            TextureId::Smiley => "smiley.png",
        }
    }
}

/// Decoded RGBA8 pixels, rows tightly packed.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub fn decode_png(bytes: &[u8]) -> image::ImageResult<Self> {
        let rgba = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    pub fn load_png(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode_png(&bytes).map_err(|source| Error::Image {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn row_size(&self) -> u64 {
        u64::from(self.width * BYTES_PER_PIXEL)
    }

    pub fn row_pitch(&self) -> u64 {
        row_pitch(self.width)
    }

    /// Copies the rows into a buffer whose rows start every `row_pitch()` bytes,
    /// the layout a texture copy reads from an upload heap.
    pub fn pack_rows(&self) -> Vec<u8> {
        let row_size = self.row_size() as usize;
        let pitch = self.row_pitch() as usize;

        let mut packed = vec![0; pitch * self.height as usize];
        for (src, dst) in self
            .pixels
            .chunks_exact(row_size)
            .zip(packed.chunks_exact_mut(pitch))
        {
            dst[..row_size].copy_from_slice(src);
        }
        packed
    }
}

pub fn check_texture_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "a {width}x{height} texture is empty"
        )));
    }
    Ok(())
}

pub fn row_pitch(width: u32) -> u64 {
    align_up(u64::from(width * BYTES_PER_PIXEL), TEXTURE_PITCH_ALIGNMENT)
}

#[cfg(windows)]
struct Texture {
    resource: ID3D12Resource,
    upload_heap: Option<ID3D12Resource>,
}

/// Textures uploaded into default-heap memory, keyed by [`TextureId`].
#[cfg(windows)]
pub struct Textures {
    textures: Registry<TextureId, Texture>,
}

#[cfg(windows)]
impl Default for Textures {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(windows)]
impl Textures {
    pub fn new() -> Self {
        Self {
            textures: Registry::new("texture"),
        }
    }

    /// Records the upload of the PNG at `path` on `command_list`. The upload heap is
    /// kept until [`Textures::release_upload_heaps`].
    pub fn load_texture(
        &mut self,
        device: &ID3D12Device2,
        command_list: &ID3D12GraphicsCommandList,
        id: TextureId,
        path: &Path,
    ) -> Result<()> {
        let image = TextureImage::load_png(path)?;
        let name = format!("{id:?}");

        let resource = resource::create_texture2d(
            device,
            (image.width, image.height),
            DXGI_FORMAT_R8G8B8A8_UNORM,
            D3D12_RESOURCE_FLAG_NONE,
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
            &name,
        )?;

        let upload_heap =
            resource::create_upload_buffer(device, &image.pack_rows(), &format!("{name}::upload_heap"))?;

        let footprint = D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
            Offset: 0,
            Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                Width: image.width,
                Height: image.height,
                Depth: 1,
                RowPitch: image.row_pitch() as u32,
            },
        };

        let dst = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&resource) },
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: 0,
            },
        };
        let src = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&upload_heap) },
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: footprint,
            },
        };

        unsafe {
            command_list.CopyTextureRegion(&dst, 0, 0, 0, &src, None);
            command_list.ResourceBarrier(&[barrier::transition(
                &resource,
                D3D12_RESOURCE_STATE_COPY_DEST,
                D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
            )]);
        }

        tracing::info!(?id, path = %path.display(), image.width, image.height, "Loaded texture");

        self.textures.insert(
            id,
            Texture {
                resource,
                upload_heap: Some(upload_heap),
            },
        )?;
        Ok(())
    }

    pub fn create_srv_from_texture(
        &self,
        device: &ID3D12Device2,
        id: TextureId,
        heap: &DescriptorHeap,
        slot: u32,
    ) -> Result<()> {
        let texture = self.textures.get(id)?;

        let desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                    PlaneSlice: 0,
                    ResourceMinLODClamp: 0.0,
                },
            },
        };

        heap.create_srv(device, slot, &texture.resource, &desc)?;
        Ok(())
    }

    /// Only valid once the command list that recorded the uploads has executed.
    pub fn release_upload_heaps(&mut self) {
        for texture in self.textures.values_mut() {
            texture.upload_heap = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, 0x80, 0xff])
        });
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn decodes_rgba_pixels() {
        let image = TextureImage::decode_png(&encode_png(3, 2)).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixels.len(), 3 * 2 * 4);
        // pixel (2, 1)
        assert_eq!(&image.pixels[(3 + 2) * 4..(3 + 2) * 4 + 4], &[2, 1, 0x80, 0xff]);
    }

    #[test]
    fn garbage_is_not_a_png() {
        assert!(TextureImage::decode_png(b"not a png").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = TextureImage::load_png(Path::new("does/not/exist.png")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn empty_textures_are_rejected() {
        assert!(check_texture_size(1, 1).is_ok());
        assert!(matches!(check_texture_size(0, 4), Err(Error::InvalidArgument(_))));
        assert!(matches!(check_texture_size(4, 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn row_pitch_is_256_aligned() {
        assert_eq!(row_pitch(1), 256);
        assert_eq!(row_pitch(64), 256);
        assert_eq!(row_pitch(65), 512);
        assert_eq!(row_pitch(256), 1024);
    }

    #[test]
    fn packed_rows_start_at_pitch_boundaries() {
        let image = TextureImage::decode_png(&encode_png(3, 2)).unwrap();
        let packed = image.pack_rows();

        assert_eq!(packed.len(), 256 * 2);
        assert_eq!(&packed[..12], &image.pixels[..12]);
        assert_eq!(&packed[256..268], &image.pixels[12..24]);
        assert!(packed[12..256].iter().all(|&b| b == 0));
    }

    #[test]
    fn bundled_textures_decode() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/textures");
        for id in TextureId::ALL {
            let image = TextureImage::load_png(&dir.join(id.file_name())).unwrap();
            assert!(image.width > 0 && image.height > 0);
            assert_eq!(image.pixels.len(), (image.width * image.height * 4) as usize);
        }
    }
}
