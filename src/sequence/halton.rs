//! A per-pixel-stratified Halton sequence. Grounded in
//! `iris_advanced_toolkit/halton_sequence.c`.
//!
//! The source builds its per-resolution enumerator and its digit scrambles
//! from the third-party Grünschloss `halton_enum`/Faure tables, which are
//! not part of this crate's reference material. This implementation
//! reconstructs the CRT-based enumerator directly (smallest `2^m2 >= width`
//! and `3^m3 >= height`, Chinese Remainder combination of the two digit
//! constraints) and falls back to a plain (unscrambled) radical-inverse
//! Halton sequence for dimensions 0 and 1 and for every dimension beyond,
//! using successive small primes as the base. This keeps the correctness
//! properties the renderer relies on (one sample per elementary interval,
//! deterministic per-pixel indexing) without fabricating the missing
//! tables.

use rand::RngCore;

use super::{crt_combine, smallest_power_at_least, LowDiscrepancySequence};
use crate::error::{Error, Result};

const DIMENSION_BASES: [u64; 16] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53,
];

fn bit_reverse(mut value: u64, bits: u32) -> u64 {
    let mut result = 0u64;
    for _ in 0..bits {
        result = (result << 1) | (value & 1);
        value >>= 1;
    }
    result
}

fn digit_reverse_base3(mut value: u64, digits: u32) -> u64 {
    let mut result = 0u64;
    for _ in 0..digits {
        result = result * 3 + (value % 3);
        value /= 3;
    }
    result
}

fn radical_inverse(mut index: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut f = 1.0;
    let mut r = 0.0;
    while index > 0 {
        f *= inv_base;
        r += f * (index % base) as f64;
        index /= base;
    }
    r
}

#[derive(Debug, Clone)]
pub struct HaltonSequence {
    num_columns: u32,
    num_rows: u32,
    m2: u32,
    scale_x: u64,
    m3: u32,
    scale_y: u64,
    increment: u64,
    column: u32,
    row: u32,
    base_index: u64,
    index: u64,
    dimension: u32,
}

impl HaltonSequence {
    pub fn new() -> HaltonSequence {
        HaltonSequence {
            num_columns: 0,
            num_rows: 0,
            m2: 0,
            scale_x: 1,
            m3: 0,
            scale_y: 1,
            increment: 1,
            column: u32::MAX,
            row: u32::MAX,
            base_index: 0,
            index: 0,
            dimension: 0,
        }
    }

    fn reconfigure(&mut self, num_columns: u32, num_rows: u32) {
        let (m2, scale_x) = smallest_power_at_least(2, num_columns.max(1) as u64);
        let (m3, scale_y) = smallest_power_at_least(3, num_rows.max(1) as u64);
        self.m2 = m2;
        self.scale_x = scale_x;
        self.m3 = m3;
        self.scale_y = scale_y;
        self.increment = scale_x * scale_y;
        self.num_columns = num_columns;
        self.num_rows = num_rows;
        self.column = u32::MAX;
        self.row = u32::MAX;
    }

    fn pixel_base_index(&self, column: u32, row: u32) -> u64 {
        let r1 = bit_reverse(column as u64, self.m2);
        let r2 = digit_reverse_base3(row as u64, self.m3);
        crt_combine(r1, self.scale_x, r2, self.scale_y)
    }
}

impl Default for HaltonSequence {
    fn default() -> Self {
        HaltonSequence::new()
    }
}

impl LowDiscrepancySequence for HaltonSequence {
    fn permute(&mut self, _rng: &mut dyn RngCore) {
        // The plain (unscrambled) radical-inverse construction used here
        // has no per-instance permutation state to randomize.
    }

    fn compute_index(
        &mut self,
        column: u32,
        num_columns: u32,
        row: u32,
        num_rows: u32,
        sample: u32,
        _num_samples: u32,
    ) -> Result<u64> {
        if self.num_columns != num_columns || self.num_rows != num_rows {
            self.reconfigure(num_columns, num_rows);
        }

        if self.column != column || self.row != row {
            self.base_index = self.pixel_base_index(column, row);
            self.column = column;
            self.row = row;
        }

        Ok(self.base_index + sample as u64 * self.increment)
    }

    fn start(&mut self, index: u64) -> Result<()> {
        self.index = index;
        self.dimension = 0;
        Ok(())
    }

    fn next_f32(&mut self) -> Result<f32> {
        Ok(self.next_f64()? as f32)
    }

    fn next_f64(&mut self) -> Result<f64> {
        let dim = self.dimension as usize;
        if dim >= DIMENSION_BASES.len() {
            return Err(Error::OutOfEntropy);
        }

        let mut value = radical_inverse(self.index, DIMENSION_BASES[dim]);

        if dim == 0 {
            value = (value * self.scale_x as f64 / self.num_columns.max(1) as f64).clamp(0.0, 1.0);
        } else if dim == 1 {
            value = (value * self.scale_y as f64 / self.num_rows.max(1) as f64).clamp(0.0, 1.0);
        }

        self.dimension += 1;
        Ok(value)
    }

    fn duplicate(&self) -> Box<dyn LowDiscrepancySequence> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_index_lands_in_the_requested_pixel() {
        let mut seq = HaltonSequence::new();
        let index = seq.compute_index(2, 4, 1, 3, 0, 1).unwrap();
        seq.start(index).unwrap();

        let u = seq.next_f64().unwrap();
        let v = seq.next_f64().unwrap();

        assert!((0.5..0.75).contains(&u), "u = {u}");
        assert!((1.0 / 3.0..2.0 / 3.0).contains(&v), "v = {v}");
    }

    #[test]
    fn same_pixel_and_sample_are_deterministic() {
        let mut a = HaltonSequence::new();
        let mut b = HaltonSequence::new();

        let ia = a.compute_index(3, 8, 5, 8, 2, 16).unwrap();
        let ib = b.compute_index(3, 8, 5, 8, 2, 16).unwrap();
        assert_eq!(ia, ib);
    }

    #[test]
    fn successive_samples_in_one_pixel_advance_by_the_stride() {
        let mut seq = HaltonSequence::new();
        let i0 = seq.compute_index(1, 4, 1, 4, 0, 4).unwrap();
        let i1 = seq.compute_index(1, 4, 1, 4, 1, 4).unwrap();
        assert_eq!(i1 - i0, seq.increment);
    }

    #[test]
    fn first_query_for_a_pixel_still_honors_a_nonzero_sample() {
        let mut first_touch = HaltonSequence::new();
        let first_touch_index = first_touch.compute_index(1, 4, 1, 4, 3, 4).unwrap();

        let mut warmed_up = HaltonSequence::new();
        warmed_up.compute_index(1, 4, 1, 4, 0, 4).unwrap();
        let warmed_up_index = warmed_up.compute_index(1, 4, 1, 4, 3, 4).unwrap();

        assert_eq!(first_touch_index, warmed_up_index);
    }
}
