//! Per-pixel sample placement driven by a [`LowDiscrepancySequence`].
//! Grounded in `iris_camera/image_sampler.c` and `iris_camera/pixel_sampler.c`.

use rand::{Error as RandError, RngCore};

use crate::error::{Error, Result};
use crate::sequence::LowDiscrepancySequence;

/// A view of an [`ImageSampler`]'s positioned sequence as an RNG, for
/// integrators that need dimensions beyond the pixel and lens samples
/// `next` already drew. Grounded in `iris_camera_toolkit/low_discrepancy_image_sampler.c`'s
/// `LowDiscrepancyImageSamplerRandom`, which hands back a `RANDOM` wrapping
/// the same (non-owned) sequence the sampler uses internally, rather than an
/// independent source of entropy.
pub struct PixelRng<'a> {
    sequence: &'a mut dyn LowDiscrepancySequence,
}

impl<'a> RngCore for PixelRng<'a> {
    fn next_u32(&mut self) -> u32 {
        let value = self.sequence.next_f64().unwrap_or(0.0);
        (value * u32::MAX as f64) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let high = self.next_u32() as u64;
        let low = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// One placed sample: pixel-space coordinates, the footprint a ray
/// differential should use at that sample, and (if the camera has a finite
/// aperture) a point on the lens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    pub pixel_u: f64,
    pub pixel_v: f64,
    pub dpixel_u: f64,
    pub dpixel_v: f64,
    pub lens_u: Option<f64>,
    pub lens_v: Option<f64>,
}

/// Places `samples_per_pixel` samples inside each pixel of an image of
/// `num_columns` by `num_rows` pixels, using a low-discrepancy sequence to
/// decorrelate the pixel and (optional) lens dimensions.
pub struct ImageSampler {
    sequence: Box<dyn LowDiscrepancySequence>,
    num_columns: u32,
    num_rows: u32,
    samples_per_pixel: u32,
    sample_lens: bool,
    dpixel_u: f64,
    dpixel_v: f64,
}

impl ImageSampler {
    pub fn new(sequence: Box<dyn LowDiscrepancySequence>, sample_lens: bool) -> ImageSampler {
        ImageSampler {
            sequence,
            num_columns: 0,
            num_rows: 0,
            samples_per_pixel: 0,
            sample_lens,
            dpixel_u: 1.0,
            dpixel_v: 1.0,
        }
    }

    /// Configures the sampler for an image of the given dimensions and a
    /// requested number of samples per pixel, which is rounded up to the
    /// next perfect square so the two pixel dimensions can be stratified
    /// independently. Returns the (possibly rounded-up) samples per pixel
    /// actually in effect.
    pub fn start(
        &mut self,
        num_columns: u32,
        num_rows: u32,
        requested_samples_per_pixel: u32,
    ) -> Result<u32> {
        if num_columns == 0 || num_rows == 0 {
            return Err(Error::InvalidArgument(0));
        }
        if requested_samples_per_pixel == 0 {
            return Err(Error::InvalidArgument(2));
        }

        let side = (requested_samples_per_pixel as f64).sqrt().ceil() as u32;
        let samples_per_pixel = side * side;

        self.num_columns = num_columns;
        self.num_rows = num_rows;
        self.samples_per_pixel = samples_per_pixel;
        self.dpixel_u = 1.0 / (num_columns as f64 * (samples_per_pixel as f64).sqrt());
        self.dpixel_v = 1.0 / (num_rows as f64 * (samples_per_pixel as f64).sqrt());

        Ok(samples_per_pixel)
    }

    /// Places one sample at `sample` (in `0..samples_per_pixel`) within pixel
    /// `(column, row)`, drawing the pixel (and, if enabled, lens) dimensions
    /// from the sequence. The sequence is left started and positioned right
    /// after those dimensions; use [`ImageSampler::pixel_rng`] to keep
    /// drawing from it for dimensions beyond this call's.
    pub fn next(&mut self, column: u32, row: u32, sample: u32) -> Result<PixelSample> {
        if column >= self.num_columns || row >= self.num_rows {
            return Err(Error::InvalidArgument(0));
        }
        if sample >= self.samples_per_pixel {
            return Err(Error::InvalidArgument(2));
        }

        let index = self.sequence.compute_index(
            column,
            self.num_columns,
            row,
            self.num_rows,
            sample,
            self.samples_per_pixel,
        )?;
        self.sequence.start(index)?;

        let pixel_u = column as f64 + self.sequence.next_f64()?;
        let pixel_v = row as f64 + self.sequence.next_f64()?;

        let (lens_u, lens_v) = if self.sample_lens {
            (Some(self.sequence.next_f64()?), Some(self.sequence.next_f64()?))
        } else {
            (None, None)
        };

        Ok(PixelSample {
            pixel_u,
            pixel_v,
            dpixel_u: self.dpixel_u,
            dpixel_v: self.dpixel_v,
            lens_u,
            lens_v,
        })
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    /// A view of this sampler's sequence as an RNG, positioned wherever the
    /// most recent [`ImageSampler::next`] left it (dimension 4 if lens
    /// sampling is enabled, dimension 2 otherwise). Borrows the sampler
    /// mutably so no other sequence access can interleave with it.
    pub fn pixel_rng(&mut self) -> PixelRng<'_> {
        PixelRng {
            sequence: self.sequence.as_mut(),
        }
    }

    /// An independent sampler with the same configuration, for handing to
    /// another worker thread.
    pub fn duplicate(&self) -> ImageSampler {
        ImageSampler {
            sequence: self.sequence.duplicate(),
            num_columns: self.num_columns,
            num_rows: self.num_rows,
            samples_per_pixel: self.samples_per_pixel,
            sample_lens: self.sample_lens,
            dpixel_u: self.dpixel_u,
            dpixel_v: self.dpixel_v,
        }
    }
}
