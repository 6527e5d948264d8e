//! Turns a hand-drawn canvas (dark ink on white) into a `[1, 28, 28, 1]` model input.
//!
//! The drawing is cropped to its ink, rescaled so its longer side fills a fixed
//! box, re-centered on a white canvas of the same size, block-averaged down
//! to 28x28 and finally inverted so ink becomes bright, like MNIST.

use crate::data::{
    loader::{IMAGE_COLS, IMAGE_ROWS},
    DataError,
};

pub const CANVAS_SIZE: usize = 280;
pub const BIN_SIZE: usize = 10;
pub const BOUNDING_BOX_LENGTH: usize = 190;
pub const INK_THRESHOLD: f32 = 0.01;

const WHITE: u8 = 255;

/// Inclusive pixel bounds of the ink in an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }
}

/// Single-channel 8-bit image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, DataError> {
        if pixels.len() != width * height || pixels.is_empty() {
            return Err(DataError::ImageSize {
                len: pixels.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// All-white image
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![WHITE; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, value: u8) {
        self.pixels[y * self.width + x] = value;
    }

    /// Bounds of every pixel darker than `threshold * 255`.
    ///
    /// A blank image collapses to the single center pixel.
    pub fn bounding_box(&self, threshold: f32) -> BoundingBox {
        let cutoff = threshold * 255.0;
        let mut bounds: Option<BoundingBox> = None;

        for y in 0..self.height {
            for x in 0..self.width {
                if (self.pixel(x, y) as f32) >= cutoff {
                    continue;
                }
                bounds = Some(match bounds {
                    None => BoundingBox { min_x: x, min_y: y, max_x: x, max_y: y },
                    Some(b) => BoundingBox {
                        min_x: b.min_x.min(x),
                        min_y: b.min_y.min(y),
                        max_x: b.max_x.max(x),
                        max_y: b.max_y.max(y),
                    },
                });
            }
        }

        bounds.unwrap_or(BoundingBox {
            min_x: self.width / 2,
            min_y: self.height / 2,
            max_x: self.width / 2,
            max_y: self.height / 2,
        })
    }

    /// Crops to the ink, scales it so the longer side is `scaled_length`
    /// (aspect kept, nearest neighbour) and centers it on a white canvas of the same size.
    pub fn scaled_center(&self, scaled_length: usize, threshold: f32) -> GrayImage {
        let bounds = self.bounding_box(threshold);
        let (box_w, box_h) = (bounds.width(), bounds.height());
        let scale = scaled_length as f32 / box_w.max(box_h) as f32;
        let scaled_w = (box_w as f32 * scale) as usize;
        let scaled_h = (box_h as f32 * scale) as usize;

        let offset_x = self.width.saturating_sub(scaled_w) / 2;
        let offset_y = self.height.saturating_sub(scaled_h) / 2;

        let mut out = GrayImage::blank(self.width, self.height);
        for dy in 0..scaled_h.min(self.height - offset_y) {
            let src_y = bounds.min_y + dy * box_h / scaled_h;
            for dx in 0..scaled_w.min(self.width - offset_x) {
                let src_x = bounds.min_x + dx * box_w / scaled_w;
                out.set_pixel(offset_x + dx, offset_y + dy, self.pixel(src_x, src_y));
            }
        }
        out
    }

    /// Downsizes by averaging `bin_rows x bin_cols` blocks; trailing partial blocks are dropped.
    /// Returns `(rows, cols, values)` with values still in `[0, 255]`.
    pub fn bin_block_average(&self, bin_rows: usize, bin_cols: usize) -> (usize, usize, Vec<f32>) {
        let rows = self.height / bin_rows;
        let cols = self.width / bin_cols;
        let block = (bin_rows * bin_cols) as f32;

        let mut values = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let mut sum = 0.0f32;
                for y in row * bin_rows..(row + 1) * bin_rows {
                    for x in col * bin_cols..(col + 1) * bin_cols {
                        sum += self.pixel(x, y) as f32;
                    }
                }
                values.push(sum / block);
            }
        }
        (rows, cols, values)
    }
}

/// Maps `[0, 255]` to `[0, 1]`, optionally inverting so dark ink ends up near 1.
pub fn normalize_gray(values: &[f32], invert: bool) -> Vec<f32> {
    values
        .iter()
        .map(|&v| {
            let v = v / 255.0;
            if invert { 1.0 - v } else { v }
        })
        .collect()
}

/// Canvas-to-model preprocessing settings
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingPreprocessor {
    pub scaled_length: usize,
    pub bin_size: usize,
    pub threshold: f32,
    pub invert: bool,
}

impl Default for DrawingPreprocessor {
    /// Settings for a 280x280 canvas
    fn default() -> Self {
        Self {
            scaled_length: BOUNDING_BOX_LENGTH,
            bin_size: BIN_SIZE,
            threshold: INK_THRESHOLD,
            invert: true,
        }
    }
}

impl DrawingPreprocessor {
    /// Returns the 784 values of a `[1, 28, 28, 1]` input.
    pub fn prepare(&self, image: &GrayImage) -> Result<Vec<f32>, DataError> {
        let centered = image.scaled_center(self.scaled_length, self.threshold);
        let (rows, cols, values) = centered.bin_block_average(self.bin_size, self.bin_size);
        if rows != IMAGE_ROWS || cols != IMAGE_COLS {
            return Err(DataError::BadDimensions { rows, cols });
        }
        Ok(normalize_gray(&values, self.invert))
    }
}
