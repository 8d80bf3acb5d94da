//! Texel storage, render-target surfaces and filtered sampling.

use std::path::Path;

use bytemuck::{bytes_of, pod_read_unaligned, Pod};
use bytes::Bytes;
use glam::{Vec2, Vec4};
use image::{Rgb, RgbImage};
use thiserror::Error;

/// Supported texel layouts, a small subset of the DXGI format table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    Rgba32Float,
    Rgba32Uint,
    Rgb32Float,
    Rgb32Uint,
    Rgba8Uint,
    Rgb8Uint,
    Bgr8Uint,
    Depth32Float,
}

impl TexelFormat {
    pub const fn texel_size(self) -> usize {
        match self {
            Self::Rgba32Float | Self::Rgba32Uint => 16,
            Self::Rgb32Float | Self::Rgb32Uint => 12,
            Self::Rgba8Uint => 4,
            Self::Rgb8Uint | Self::Bgr8Uint => 3,
            Self::Depth32Float => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sampler2d {
    pub filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
}

impl Default for Sampler2d {
    fn default() -> Self {
        Self {
            filter: FilterMode::Nearest,
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
        }
    }
}

/// A non-owning 2D texel view over host-supplied storage.
#[derive(Clone, Debug, Default)]
pub struct Texture2d {
    format: Option<TexelFormat>,
    width: u32,
    height: u32,
    data: Bytes,
}

impl Texture2d {
    pub fn new(format: TexelFormat, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            format: Some(format),
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> Option<TexelFormat> {
        self.format
    }

    fn has_storage(&self) -> bool {
        self.format.is_some() && !self.data.is_empty() && self.width > 0 && self.height > 0
    }

    /// Reads texel `(x, y)` widened to a `Vec4`.
    ///
    /// Integer formats normalise to [0, 1] by 1/255; three-channel formats
    /// get alpha 1; `Bgr8Uint` swaps back to RGB order; depth splats across
    /// all four lanes. Out-of-storage reads yield zero.
    pub fn texel_vec4(&self, x: u32, y: u32) -> Vec4 {
        let Some(format) = self.format else {
            return Vec4::ZERO;
        };

        let size = format.texel_size();
        let offset = (x as usize + self.width as usize * y as usize) * size;
        let Some(bytes) = self.data.get(offset..offset + size) else {
            return Vec4::ZERO;
        };

        match format {
            TexelFormat::Rgba32Float => pod_read_unaligned::<Vec4>(bytes),
            TexelFormat::Rgba32Uint => {
                let [r, g, b, a] = pod_read_unaligned::<[u32; 4]>(bytes);
                Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
            }
            TexelFormat::Rgb32Float => {
                let [r, g, b] = pod_read_unaligned::<[f32; 3]>(bytes);
                Vec4::new(r, g, b, 1.0)
            }
            TexelFormat::Rgb32Uint => {
                let [r, g, b] = pod_read_unaligned::<[u32; 3]>(bytes);
                Vec4::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
            }
            TexelFormat::Rgba8Uint => {
                let [r, g, b, a] = pod_read_unaligned::<[u8; 4]>(bytes);
                Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
            }
            TexelFormat::Rgb8Uint => {
                let [r, g, b] = pod_read_unaligned::<[u8; 3]>(bytes);
                Vec4::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
            }
            TexelFormat::Bgr8Uint => {
                let [b, g, r] = pod_read_unaligned::<[u8; 3]>(bytes);
                Vec4::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
            }
            TexelFormat::Depth32Float => Vec4::splat(pod_read_unaligned::<f32>(bytes)),
        }
    }
}

/// Resolves one texel coordinate through an address mode. `None` means the
/// border mode placed the coordinate outside the texture: the sample is
/// zero.
fn apply_address(mode: AddressMode, coord: i32, size: u32) -> Option<u32> {
    let size = size as i32;
    let resolved = match mode {
        AddressMode::Wrap => coord.rem_euclid(size),
        AddressMode::Mirror => {
            let m = coord.rem_euclid(2 * size);
            if m < size {
                m
            } else {
                2 * size - 1 - m
            }
        }
        AddressMode::Clamp => coord.clamp(0, size - 1),
        AddressMode::Border => {
            if (0..size).contains(&coord) {
                coord
            } else {
                return None;
            }
        }
    };

    Some(resolved as u32)
}

fn sample_corner(texture: &Texture2d, sampler: Sampler2d, x: i32, y: i32) -> Vec4 {
    let Some(x) = apply_address(sampler.address_u, x, texture.width) else {
        return Vec4::ZERO;
    };
    let Some(y) = apply_address(sampler.address_v, y, texture.height) else {
        return Vec4::ZERO;
    };

    texture.texel_vec4(x, y)
}

fn sample_nearest(texture: &Texture2d, uv: Vec2) -> Vec4 {
    let u = uv.x * texture.width as f32 - 0.5;
    let v = uv.y * texture.height as f32 - 0.5;

    let x = (u.round() as i32).clamp(0, texture.width as i32 - 1) as u32;
    let y = (v.round() as i32).clamp(0, texture.height as i32 - 1) as u32;

    texture.texel_vec4(x, y)
}

fn sample_bilinear(texture: &Texture2d, sampler: Sampler2d, uv: Vec2) -> Vec4 {
    let u = uv.x * texture.width as f32 - 0.5;
    let v = uv.y * texture.height as f32 - 0.5;

    let x = u.floor() as i32;
    let y = v.floor() as i32;

    let u_ratio = u - x as f32;
    let v_ratio = v - y as f32;

    let lb = sample_corner(texture, sampler, x, y);
    let rb = sample_corner(texture, sampler, x + 1, y);
    let lt = sample_corner(texture, sampler, x, y + 1);
    let rt = sample_corner(texture, sampler, x + 1, y + 1);

    let bottom = lb.lerp(rb, u_ratio);
    let top = lt.lerp(rt, u_ratio);
    bottom.lerp(top, v_ratio)
}

/// Fetches from `texture` at `uv` through `sampler`.
///
/// Textures without storage sample as zero, as do the mip-map filter modes
/// (mip chains are never generated).
pub fn sample(texture: &Texture2d, sampler: Sampler2d, uv: Vec2) -> Vec4 {
    if !texture.has_storage() {
        return Vec4::ZERO;
    }

    match sampler.filter {
        FilterMode::Nearest => sample_nearest(texture, uv),
        FilterMode::Linear => sample_bilinear(texture, sampler, uv),
        _ => Vec4::ZERO,
    }
}

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("cannot encode {0:?} surfaces")]
    Unsupported(TexelFormat),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// An owned render-target surface; the color and depth targets of the
/// output merger are two of these.
#[derive(Clone, Debug)]
pub struct Surface {
    format: TexelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(format: TexelFormat, width: u32, height: u32) -> Self {
        let data = vec![0; width as usize * height as usize * format.texel_size()];
        Self {
            format,
            width,
            height,
            data,
        }
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * self.format.texel_size(), 0);
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (x as usize + self.width as usize * y as usize) * self.format.texel_size()
    }

    pub fn read<T: Pod>(&self, x: u32, y: u32) -> T {
        let at = self.offset(x, y);
        pod_read_unaligned(&self.data[at..at + size_of::<T>()])
    }

    pub fn write<T: Pod>(&mut self, x: u32, y: u32, value: T) {
        debug_assert_eq!(size_of::<T>(), self.format.texel_size());
        let at = self.offset(x, y);
        self.data[at..at + size_of::<T>()].copy_from_slice(bytes_of(&value));
    }

    /// A sampleable view of this surface's current contents.
    pub fn to_texture(&self) -> Texture2d {
        Texture2d::new(
            self.format,
            self.width,
            self.height,
            Bytes::copy_from_slice(&self.data),
        )
    }

    /// Encodes the surface as an 8-bit-per-channel BMP. Color surfaces clamp
    /// each channel into [0, 255]; depth surfaces write grayscale. Row 0 of
    /// the surface is the bottom of the image.
    pub fn save_bmp(&self, path: impl AsRef<Path>) -> Result<(), PresentError> {
        let mut img = RgbImage::new(self.width.max(1), self.height.max(1));

        for y in 0..self.height {
            for x in 0..self.width {
                let pixel = match self.format {
                    TexelFormat::Rgb32Float => {
                        let [r, g, b] = self.read::<[f32; 3]>(x, y);
                        Rgb([to_u8(r), to_u8(g), to_u8(b)])
                    }
                    TexelFormat::Depth32Float => {
                        let gray = to_u8(self.read::<f32>(x, y));
                        Rgb([gray, gray, gray])
                    }
                    format => return Err(PresentError::Unsupported(format)),
                };

                img.put_pixel(x, self.height - y - 1, pixel);
            }
        }

        img.save_with_format(path, image::ImageFormat::Bmp)?;
        Ok(())
    }
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use bytemuck::cast_slice;
    use bytes::Bytes;
    use glam::{Vec2, Vec3, Vec4};

    use super::{
        sample, AddressMode, FilterMode, Sampler2d, Surface, TexelFormat, Texture2d,
    };

    fn quad_texture() -> Texture2d {
        let texels = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        Texture2d::new(
            TexelFormat::Rgb32Float,
            2,
            2,
            Bytes::copy_from_slice(cast_slice(&texels)),
        )
    }

    fn linear_sampler() -> Sampler2d {
        Sampler2d {
            filter: FilterMode::Linear,
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
        }
    }

    #[test]
    fn bilinear_center_blends_all_four_texels() {
        let out = sample(&quad_texture(), linear_sampler(), Vec2::splat(0.5));
        assert!((out - Vec4::new(0.25, 0.25, 0.25, 1.0)).abs().max_element() < 1e-6);
    }

    #[test]
    fn nearest_picks_the_closest_texel() {
        let sampler = Sampler2d::default();
        let out = sample(&quad_texture(), sampler, Vec2::new(0.75, 0.25));
        assert_eq!(out, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn missing_storage_samples_zero() {
        let texture = Texture2d::default();
        assert_eq!(sample(&texture, linear_sampler(), Vec2::splat(0.5)), Vec4::ZERO);
    }

    #[test]
    fn mipmap_filters_sample_zero() {
        let sampler = Sampler2d {
            filter: FilterMode::LinearMipmapLinear,
            ..linear_sampler()
        };
        assert_eq!(sample(&quad_texture(), sampler, Vec2::splat(0.5)), Vec4::ZERO);
    }

    #[test]
    fn border_mode_fades_to_zero_outside() {
        let sampler = Sampler2d {
            filter: FilterMode::Linear,
            address_u: AddressMode::Border,
            address_v: AddressMode::Border,
        };

        // Sampling at the very corner blends three border (zero) taps with
        // one real texel.
        let out = sample(&quad_texture(), sampler, Vec2::new(0.0, 0.0));
        assert!((out.w - 0.25).abs() < 1e-6);
    }

    #[test]
    fn integer_formats_normalize_and_bgr_reorders() {
        let texel: [u8; 3] = [255, 0, 127];

        let rgb = Texture2d::new(TexelFormat::Rgb8Uint, 1, 1, Bytes::copy_from_slice(&texel));
        let value = rgb.texel_vec4(0, 0);
        assert!((value.x - 1.0).abs() < 1e-6);
        assert_eq!(value.y, 0.0);
        assert!((value.z - 127.0 / 255.0).abs() < 1e-6);

        let bgr = Texture2d::new(TexelFormat::Bgr8Uint, 1, 1, Bytes::copy_from_slice(&texel));
        let value = bgr.texel_vec4(0, 0);
        assert!((value.x - 127.0 / 255.0).abs() < 1e-6);
        assert!((value.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wrap_and_mirror_addressing() {
        use super::apply_address;

        assert_eq!(apply_address(AddressMode::Wrap, -1, 4), Some(3));
        assert_eq!(apply_address(AddressMode::Wrap, 5, 4), Some(1));

        assert_eq!(apply_address(AddressMode::Mirror, -1, 4), Some(0));
        assert_eq!(apply_address(AddressMode::Mirror, 4, 4), Some(3));
        assert_eq!(apply_address(AddressMode::Mirror, 5, 4), Some(2));

        assert_eq!(apply_address(AddressMode::Clamp, -3, 4), Some(0));
        assert_eq!(apply_address(AddressMode::Clamp, 9, 4), Some(3));

        assert_eq!(apply_address(AddressMode::Border, 2, 4), Some(2));
        assert_eq!(apply_address(AddressMode::Border, 4, 4), None);
    }

    #[test]
    fn bmp_encode_writes_both_target_kinds() {
        let dir = std::env::temp_dir();

        let mut color = Surface::new(TexelFormat::Rgb32Float, 2, 2);
        color.write(0, 0, [1.0f32, 0.5, 2.0]);
        color.save_bmp(dir.join("soft_device_color_test.bmp")).unwrap();

        let mut depth = Surface::new(TexelFormat::Depth32Float, 2, 2);
        depth.write(1, 1, 0.25f32);
        depth.save_bmp(dir.join("soft_device_depth_test.bmp")).unwrap();

        // Integer surfaces have no encode path.
        let other = Surface::new(TexelFormat::Rgba8Uint, 1, 1);
        assert!(other.save_bmp(dir.join("soft_device_bad_test.bmp")).is_err());
    }

    #[test]
    fn surface_read_write_round_trip() {
        let mut surface = Surface::new(TexelFormat::Depth32Float, 4, 4);
        surface.write(2, 1, 0.5f32);

        assert_eq!(surface.read::<f32>(2, 1), 0.5);
        assert_eq!(surface.read::<f32>(0, 0), 0.0);

        surface.clear();
        assert_eq!(surface.read::<f32>(2, 1), 0.0);
    }
}
