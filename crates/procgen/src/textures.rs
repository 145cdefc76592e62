//! Preview textures generated from height maps.
//! CPU-side RGBA8 buffers; uploading them is the renderer's business.

use crate::heightmap::HeightMap;

/// RGBA pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: (r.clamp(0.0, 1.0) * 255.0) as u8,
            g: (g.clamp(0.0, 1.0) * 255.0) as u8,
            b: (b.clamp(0.0, 1.0) * 255.0) as u8,
            a: 255,
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Generated texture data.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Pixel>,
}

impl TextureData {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Pixel::new(0, 0, 0, 255); (width * height) as usize],
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = pixel;
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize]
        } else {
            Pixel::new(0, 0, 0, 255)
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&pixel.to_bytes());
        }
        bytes
    }
}

/// Pass an externally supplied color map through as a texture.
pub fn texture_from_color_map(colors: &[Pixel], width: u32, height: u32) -> TextureData {
    debug_assert_eq!(colors.len(), (width * height) as usize);
    TextureData {
        width,
        height,
        pixels: colors.to_vec(),
    }
}

/// Grayscale visualization of a height map: black at the recorded
/// minimum, white at the recorded maximum.
pub fn texture_from_height_map(height_map: &HeightMap) -> TextureData {
    let width = height_map.values.width() as u32;
    let height = height_map.values.height() as u32;
    let span = height_map.max_value - height_map.min_value;

    let mut texture = TextureData::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = height_map.values.get(x as usize, y as usize);
            let t = if span > f32::EPSILON {
                (value - height_map.min_value) / span
            } else {
                0.0
            };
            texture.set_pixel(x, y, Pixel::from_rgb(t, t, t));
        }
    }
    texture
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::NoiseMap;

    #[test]
    fn height_map_texture_spans_black_to_white() {
        let mut values = NoiseMap::new(2, 2);
        values.set(0, 0, 0.0);
        values.set(1, 0, 5.0);
        values.set(0, 1, 10.0);
        values.set(1, 1, 2.5);
        let height_map = HeightMap {
            values,
            min_value: 0.0,
            max_value: 10.0,
        };

        let texture = texture_from_height_map(&height_map);
        assert_eq!(texture.get_pixel(0, 0), Pixel::new(0, 0, 0, 255));
        assert_eq!(texture.get_pixel(0, 1), Pixel::new(255, 255, 255, 255));
        assert_eq!(texture.get_pixel(1, 0).r, 127);
    }

    #[test]
    fn bytes_are_rgba_interleaved() {
        let mut texture = TextureData::new(1, 2);
        texture.set_pixel(0, 0, Pixel::new(1, 2, 3, 4));
        texture.set_pixel(0, 1, Pixel::new(5, 6, 7, 8));
        assert_eq!(texture.to_bytes(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn color_map_passthrough_keeps_order() {
        let colors = vec![
            Pixel::new(255, 0, 0, 255),
            Pixel::new(0, 255, 0, 255),
        ];
        let texture = texture_from_color_map(&colors, 2, 1);
        assert_eq!(texture.get_pixel(0, 0).r, 255);
        assert_eq!(texture.get_pixel(1, 0).g, 255);
    }
}
