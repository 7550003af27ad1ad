//! Pixel surfaces: raw images, sampled/written textures and materials

use std::path::Path;
use std::sync::{Arc, Weak};

use crate::error::AssetError;

use super::math::{IVec2, Vec2};
use super::types::{AddressMode, Color, LinearColor, SampleFilter, TextureFormat};

/// Raw pixel buffer addressed by (x, y) and bytes per pixel
///
/// Channel order is R, G, B, A. One byte per pixel stores a single channel
/// that reads back as gray.
#[derive(Debug, Clone, Default)]
pub struct Image {
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    pixels: Vec<u8>,
}

impl Image {
    pub fn new(width: usize, height: usize, bits_per_pixel: usize) -> Self {
        let bytes_per_pixel = bits_per_pixel >> 3;
        Self {
            width,
            height,
            bytes_per_pixel,
            pixels: vec![0; width * height * bytes_per_pixel],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    pub fn pitch(&self) -> usize {
        self.width * self.bytes_per_pixel
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if self.pixels.is_empty() || x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.pitch() + x * self.bytes_per_pixel)
    }

    /// Get pixel at x,y coordinates (black when out of range)
    pub fn get_pixel(&self, x: i32, y: i32) -> Color {
        let Some(idx) = self.offset(x, y) else {
            return Color::BLACK;
        };
        let p = &self.pixels[idx..idx + self.bytes_per_pixel];
        match self.bytes_per_pixel {
            1 => Color::new(p[0], p[0], p[0]),
            2 => Color::new(p[0], p[1], 0),
            3 => Color::new(p[0], p[1], p[2]),
            _ => Color::with_alpha(p[0], p[1], p[2], p[3]),
        }
    }

    /// Set pixel at x,y coordinates (ignored when out of range)
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let Some(idx) = self.offset(x, y) else {
            return;
        };
        let bpp = self.bytes_per_pixel;
        let bytes = color.to_bytes();
        self.pixels[idx..idx + bpp].copy_from_slice(&bytes[..bpp.min(4)]);
    }

    pub fn clear(&mut self, color: Color) {
        let bpp = self.bytes_per_pixel;
        if bpp == 0 {
            return;
        }
        let bytes = color.to_bytes();
        for px in self.pixels.chunks_exact_mut(bpp) {
            px.copy_from_slice(&bytes[..bpp.min(4)]);
        }
    }
}

/// Pack an RGBA color bit-for-bit into an f32
pub fn pack_float(color: Color) -> f32 {
    f32::from_bits(color.to_u32())
}

/// Unpack an f32 stored with [`pack_float`] back into its RGBA bytes
pub fn unpack_float(data: f32) -> Color {
    Color::from_u32(data.to_bits())
}

/// Fold a UV coordinate into [0, 1] according to the address mode
pub fn adjust_address(uv: Vec2, mode: AddressMode) -> Vec2 {
    let fold = |c: f32| match mode {
        AddressMode::Clamp => c.clamp(0.0, 1.0),
        AddressMode::Wrap => c.rem_euclid(1.0),
        AddressMode::Mirror => {
            let m = c.rem_euclid(2.0);
            if m > 1.0 {
                2.0 - m
            } else {
                m
            }
        }
        AddressMode::MirrorOnce => {
            if c > -1.0 && c < 0.0 {
                -c
            } else if c > 1.0 && c < 2.0 {
                2.0 - c
            } else {
                c.clamp(0.0, 1.0)
            }
        }
    };
    Vec2::new(fold(uv.x), fold(uv.y))
}

/// A pixel surface used as render target, depth buffer or sampled input
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    format: TextureFormat,
    image: Image,
}

impl Texture {
    /// Allocate a zeroed texture sized for the format's bit depth
    pub fn new(width: usize, height: usize, format: TextureFormat) -> Self {
        Self {
            name: String::new(),
            format,
            image: Image::new(width, height, format.bits_per_pixel()),
        }
    }

    /// Load texture from an image file, format detected from its contents
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_bytes(&bytes, name)
    }

    /// Load texture from raw encoded bytes
    pub fn from_bytes(bytes: &[u8], name: String) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)?;
        let mut tex = Self::from_rgba(img.to_rgba8());
        tex.name = name;
        Ok(tex)
    }

    fn from_rgba(rgba: image::RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        let mut tex = Self::new(width as usize, height as usize, TextureFormat::R8G8B8A8Unorm);
        tex.image.pixels = rgba.into_raw();
        tex
    }

    /// Create a checkerboard test texture
    pub fn checkerboard(width: usize, height: usize, color1: Color, color2: Color) -> Self {
        let mut tex = Self::new(width, height, TextureFormat::R8G8B8A8Unorm);
        for y in 0..height {
            for x in 0..width {
                let checker = ((x / 4) + (y / 4)) % 2 == 0;
                tex.image
                    .set_pixel(x as i32, y as i32, if checker { color1 } else { color2 });
            }
        }
        tex.name = "checkerboard".to_string();
        tex
    }

    /// Write the surface to an image file, format chosen by extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), AssetError> {
        let (w, h) = (self.image.width as u32, self.image.height as u32);
        let color_type = match self.image.bytes_per_pixel {
            1 => image::ExtendedColorType::L8,
            3 => image::ExtendedColorType::Rgb8,
            4 => image::ExtendedColorType::Rgba8,
            bpp => {
                return Err(AssetError::Invalid {
                    path: path.as_ref().display().to_string(),
                    reason: format!("cannot encode {} bytes per pixel", bpp),
                })
            }
        };
        image::save_buffer(path, &self.image.pixels, w, h, color_type)?;
        Ok(())
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.image.width
    }

    pub fn height(&self) -> usize {
        self.image.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.image.width as f32, self.image.height as f32)
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Raw pixel bytes, row-major from the top-left
    pub fn pixels(&self) -> &[u8] {
        self.image.pixels()
    }

    pub fn get_pixel(&self, xy: IVec2) -> Color {
        self.image.get_pixel(xy.x, xy.y)
    }

    /// Sample a color at normalized UV coordinates
    pub fn sample_color(&self, uv: Vec2, address: AddressMode, filter: SampleFilter) -> LinearColor {
        LinearColor::from(unpack_float(self.sample_data(uv, address, filter)))
    }

    /// Sample a scalar at normalized UV coordinates, bit-packed in the pixel
    pub fn sample_data(&self, uv: Vec2, address: AddressMode, filter: SampleFilter) -> f32 {
        let uv = adjust_address(uv, address);
        let max_x = self.image.width.saturating_sub(1) as f32;
        let max_y = self.image.height.saturating_sub(1) as f32;
        let x = uv.x * max_x;
        let y = uv.y * max_y;

        match filter {
            SampleFilter::Point => pack_float(self.image.get_pixel(x.round() as i32, y.round() as i32)),
            SampleFilter::Linear => {
                let x0 = x as i32;
                let y0 = y as i32;
                let x1 = (x0 + 1).min(max_x as i32);
                let y1 = (y0 + 1).min(max_y as i32);
                let dx = x - x0 as f32;
                let dy = y - y0 as f32;

                let c00 = LinearColor::from(self.image.get_pixel(x0, y0));
                let c10 = LinearColor::from(self.image.get_pixel(x1, y0));
                let c01 = LinearColor::from(self.image.get_pixel(x0, y1));
                let c11 = LinearColor::from(self.image.get_pixel(x1, y1));

                let c0 = c00 * (1.0 - dx) + c10 * dx;
                let c1 = c01 * (1.0 - dx) + c11 * dx;
                pack_float((c0 * (1.0 - dy) + c1 * dy).to_color())
            }
        }
    }

    /// Read back a scalar written with [`Texture::write_data`]
    pub fn read_data(&self, xy: IVec2) -> f32 {
        pack_float(self.image.get_pixel(xy.x, xy.y))
    }

    pub fn write_color(&mut self, xy: IVec2, color: LinearColor) {
        self.image.set_pixel(xy.x, xy.y, color.to_color());
    }

    pub fn write_data(&mut self, xy: IVec2, data: f32) {
        self.image.set_pixel(xy.x, xy.y, unpack_float(data));
    }

    pub fn clear_color(&mut self, color: Color) {
        self.image.clear(color);
    }

    pub fn clear_data(&mut self, value: f32) {
        self.image.clear(unpack_float(value));
    }
}

/// Ordered list of texture references, diffuse at slot 0
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    textures: Vec<Weak<Texture>>,
}

impl Material {
    pub const DIFFUSE_SLOT: usize = 0;

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            textures: Vec::new(),
        }
    }

    pub fn add_texture(&mut self, texture: Weak<Texture>) {
        self.textures.push(texture);
    }

    pub fn texture(&self, slot: usize) -> Option<Arc<Texture>> {
        self.textures.get(slot).and_then(Weak::upgrade)
    }

    pub fn diffuse(&self) -> Option<Arc<Texture>> {
        self.texture(Self::DIFFUSE_SLOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_colors() -> Texture {
        let mut tex = Texture::new(2, 2, TextureFormat::R8G8B8A8Unorm);
        tex.write_color(IVec2::new(0, 0), Color::new(200, 0, 0).into());
        tex.write_color(IVec2::new(1, 0), Color::new(0, 100, 0).into());
        tex.write_color(IVec2::new(0, 1), Color::new(0, 0, 40).into());
        tex.write_color(IVec2::new(1, 1), Color::new(100, 100, 100).into());
        tex
    }

    #[test]
    fn test_create_sizes_by_format() {
        assert_eq!(Texture::new(4, 2, TextureFormat::R8G8B8A8Unorm).pixels().len(), 32);
        assert_eq!(Texture::new(4, 2, TextureFormat::R8Unorm).pixels().len(), 8);
        assert_eq!(Texture::new(4, 2, TextureFormat::Unknown).pixels().len(), 0);
    }

    #[test]
    fn test_unknown_format_is_inert() {
        let mut tex = Texture::new(4, 4, TextureFormat::Unknown);
        tex.write_color(IVec2::new(1, 1), LinearColor::WHITE);
        tex.clear_color(Color::WHITE);
        assert_eq!(tex.get_pixel(IVec2::new(1, 1)), Color::BLACK);
    }

    #[test]
    fn test_bilinear_center_is_average() {
        let tex = four_colors();
        let c = tex
            .sample_color(Vec2::new(0.5, 0.5), AddressMode::Clamp, SampleFilter::Linear)
            .to_color();
        assert_eq!(c, Color::new(75, 50, 35));
    }

    #[test]
    fn test_point_sample_corners() {
        let tex = four_colors();
        let c = tex
            .sample_color(Vec2::new(1.0, 0.0), AddressMode::Clamp, SampleFilter::Point)
            .to_color();
        assert_eq!(c, Color::new(0, 100, 0));
    }

    #[test]
    fn test_address_modes() {
        let wrap = adjust_address(Vec2::new(1.25, -0.25), AddressMode::Wrap);
        assert!((wrap.x - 0.25).abs() < 0.0001);
        assert!((wrap.y - 0.75).abs() < 0.0001);

        let clamp = adjust_address(Vec2::new(1.25, -0.25), AddressMode::Clamp);
        assert_eq!(clamp, Vec2::new(1.0, 0.0));

        let mirror = adjust_address(Vec2::new(1.25, 2.5), AddressMode::Mirror);
        assert!((mirror.x - 0.75).abs() < 0.0001);
        assert!((mirror.y - 0.5).abs() < 0.0001);

        let once = adjust_address(Vec2::new(-0.25, 3.5), AddressMode::MirrorOnce);
        assert!((once.x - 0.25).abs() < 0.0001);
        assert!((once.y - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_data_roundtrip() {
        let mut depth = Texture::new(3, 3, TextureFormat::R32Float);
        depth.clear_data(1.0);
        assert_eq!(depth.read_data(IVec2::new(2, 2)), 1.0);
        depth.write_data(IVec2::new(1, 1), 0.375);
        assert_eq!(depth.read_data(IVec2::new(1, 1)), 0.375);
        let sampled = depth.sample_data(Vec2::new(0.5, 0.5), AddressMode::Clamp, SampleFilter::Point);
        assert_eq!(sampled, 0.375);
    }

    #[test]
    fn test_out_of_range_write_is_skipped() {
        let mut tex = Texture::new(2, 2, TextureFormat::R8G8B8A8Unorm);
        tex.write_color(IVec2::new(5, 0), LinearColor::WHITE);
        tex.write_color(IVec2::new(-1, 0), LinearColor::WHITE);
        assert!(tex.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_save_and_reload_png() {
        let path = std::env::temp_dir().join(format!("bonnie_tex_{}.png", std::process::id()));
        let mut tex = Texture::new(2, 2, TextureFormat::R8G8B8A8Unorm);
        tex.clear_color(Color::BLACK);
        tex.write_color(IVec2::new(1, 0), LinearColor::from(Color::RED));
        tex.save(&path).unwrap();

        let loaded = Texture::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.width(), 2);
        assert_eq!(loaded.get_pixel(IVec2::new(1, 0)), Color::RED);
        assert_eq!(loaded.get_pixel(IVec2::new(0, 1)), Color::BLACK);
        assert!(loaded.name.starts_with("bonnie_tex_"));
    }

    #[test]
    fn test_bad_bytes_are_image_error() {
        assert!(matches!(
            Texture::from_bytes(b"not an image", "junk".to_string()),
            Err(AssetError::Image(_))
        ));
    }

    #[test]
    fn test_material_expired_texture() {
        let tex = Arc::new(Texture::new(1, 1, TextureFormat::R8G8B8A8Unorm));
        let mut mat = Material::new("m");
        mat.add_texture(Arc::downgrade(&tex));
        assert!(mat.diffuse().is_some());
        drop(tex);
        assert!(mat.diffuse().is_none());
    }
}
