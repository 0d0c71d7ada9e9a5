//! Height Field
//!
//! CPU copy of one offscreen displacement pass. A field is never mutated;
//! regeneration builds a new one and swaps it in whole, so a reader holding
//! an `Arc<HeightField>` always sees a complete pass.

use std::sync::Arc;

use crate::error::OutOfRangeQueryError;
use crate::render::PixelLayout;

/// Height returned for queries outside the field.
pub const NO_HEIGHT: f32 = -999_999.0;

/// Anything that can answer "how high is the ground at (x, y)".
pub trait HeightSampler {
    /// Ground height at world `(x, y)`, or [`NO_HEIGHT`] outside the field.
    fn sample_height(&self, x: f32, y: f32) -> f32;
}

/// One height sample per world unit over a `width` x `height` plane centred
/// on the origin.
#[derive(Clone, Debug)]
pub struct HeightField {
    width: u32,
    height: u32,
    layout: PixelLayout,
    pixels: Arc<[f32]>,
    version: u64,
}

impl HeightField {
    /// Wrap the readback of pass `version`.
    pub fn new(width: u32, height: u32, layout: PixelLayout, pixels: Arc<[f32]>, version: u64) -> Self {
        Self {
            width,
            height,
            layout,
            pixels,
            version,
        }
    }

    /// Field with no samples yet; every query is out of range.
    pub fn empty(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self::new(width, height, layout, Arc::from(Vec::<f32>::new()), 0)
    }

    /// Buffer index of the height sample for world `(x, y)`.
    ///
    /// `x_index = floor(x + width / 2)`, `y_index = floor(y + height / 2)`.
    /// Either index falling outside the plane, or the sample falling outside
    /// the buffer, is out of range.
    pub fn index_of(&self, x: f32, y: f32) -> Result<usize, OutOfRangeQueryError> {
        let fx = (x + self.width as f32 / 2.0).floor();
        let fy = (y + self.height as f32 / 2.0).floor();
        let channels = self.layout.channels_per_pixel as i64;

        let (x_index, y_index) = if fx.is_finite() && fy.is_finite() {
            (fx as i64, fy as i64)
        } else {
            (-1, -1)
        };
        let index = y_index * self.width as i64 * channels
            + x_index * channels
            + self.layout.height_channel as i64;

        let in_plane = (0..self.width as i64).contains(&x_index)
            && (0..self.height as i64).contains(&y_index);
        if !in_plane || index < 0 || index as usize >= self.pixels.len() {
            return Err(OutOfRangeQueryError {
                x,
                y,
                x_index,
                y_index,
                index,
                len: self.pixels.len(),
            });
        }
        Ok(index as usize)
    }

    /// Raw height at `(x, y)`, or why it could not be read.
    pub fn try_query(&self, x: f32, y: f32) -> Result<f32, OutOfRangeQueryError> {
        self.index_of(x, y).map(|i| self.pixels[i])
    }

    /// Raw height at `(x, y)`. Out-of-range queries are logged and return
    /// [`NO_HEIGHT`].
    pub fn query(&self, x: f32, y: f32) -> f32 {
        match self.try_query(x, y) {
            Ok(h) => h,
            Err(err) => {
                log::error!("[HeightField] {err}");
                NO_HEIGHT
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Pass number this field came from; 0 for an empty field.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pixels(&self) -> &Arc<[f32]> {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

impl HeightSampler for HeightField {
    fn sample_height(&self, x: f32, y: f32) -> f32 {
        self.query(x, y)
    }
}
