//! Row-to-row correlation rectifier

use std::sync::Arc;

use arraydeque::ArrayDeque;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::page::Page;
use crate::waveform::start_black_pixels;

/// Aligns each row with the rows above it
///
/// The rectifier remembers the last five rectified rows. For
/// every new row it tries all circular offsets and keeps the one
/// which agrees best with the remembered rows. Before the first
/// row, the memory is seeded with the textbook start-phasing
/// row: black for 2182/2300 of the line, then white.
///
/// Agreement over all offsets is computed at once by circular
/// cross-correlation in the frequency domain.
#[derive(Clone, Debug, Default)]
pub struct ImageRectifier {}

impl ImageRectifier {
    /// New rectifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Rectify `page` in place
    ///
    /// Returns the left rotation applied to each row. A page
    /// with no columns is left alone.
    pub fn rectify(&self, page: &mut Page) -> Vec<usize> {
        let width = page.width();
        if width == 0 {
            return vec![0; page.height()];
        }

        let mut planner = FftPlanner::<f32>::new();
        let mut corr = Correlator {
            forward: planner.plan_fft_forward(width),
            inverse: planner.plan_fft_inverse(width),
            row: vec![Complex::default(); width],
            reference: vec![Complex::default(); width],
        };

        let seed: Vec<f32> = (0..width)
            .map(|x| {
                if x < start_black_pixels(width) {
                    1.0
                } else {
                    -1.0
                }
            })
            .collect();
        let mut lookback: ArrayDeque<Vec<f32>, LOOKBACK, arraydeque::Wrapping> =
            ArrayDeque::new();
        for _i in 0..LOOKBACK {
            let _ = lookback.push_back(seed.clone());
        }

        let mut offsets = Vec::with_capacity(page.height());
        for y in 0..page.height() {
            let signs: Vec<f32> = page
                .row(y)
                .iter()
                .map(|px| if *px < 128 { 1.0 } else { -1.0 })
                .collect();
            let offset = corr.best_offset(&signs, lookback.iter());
            page.rotate_row_left(y, offset);

            let mut aligned = signs;
            aligned.rotate_left(offset);
            let _ = lookback.push_back(aligned);
            offsets.push(offset);
        }

        debug!(
            "rectify: correlated {} rows of {} px",
            page.height(),
            width
        );
        offsets
    }
}

// rows of memory
const LOOKBACK: usize = 5;

struct Correlator {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    row: Vec<Complex<f32>>,
    reference: Vec<Complex<f32>>,
}

impl Correlator {
    // left rotation of `row` which best matches the sum of `refs`
    fn best_offset<'a, I>(&mut self, row: &[f32], refs: I) -> usize
    where
        I: Iterator<Item = &'a Vec<f32>>,
    {
        for (out, v) in self.row.iter_mut().zip(row.iter()) {
            *out = Complex::new(*v, 0.0);
        }
        self.reference
            .iter_mut()
            .for_each(|v| *v = Complex::default());
        for r in refs {
            for (out, v) in self.reference.iter_mut().zip(r.iter()) {
                out.re += *v;
            }
        }

        self.forward.process(&mut self.row);
        self.forward.process(&mut self.reference);
        for (a, b) in self.row.iter_mut().zip(self.reference.iter()) {
            *a *= b.conj();
        }
        self.inverse.process(&mut self.row);

        // corr[k] = Σ row[x + k]·ref[x]
        let mut best = 0;
        let mut best_val = f32::MIN;
        for (k, v) in self.row.iter().enumerate() {
            if v.re > best_val {
                best_val = v.re;
                best = k;
            }
        }
        best
    }
}
