//! Zero-crossing frequency counter
//!
//! Estimates the instantaneous frequency of the audio signal from
//! the spacing of its zero crossings. The zero line is re-centred
//! from sliding extrema of the waveform, which also provide an
//! amplitude estimate.

use arraydeque::ArrayDeque;

/// One frequency estimate, taken at a zero crossing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyReading {
    /// Instantaneous frequency (Hz)
    pub frequency: f32,

    /// Peak-to-peak amplitude, in input units
    pub amplitude: f32,

    /// Monotonic time (µs)
    pub time: i64,
}

/// Half-wave frequency counter
///
/// Each zero crossing is located by linear interpolation
/// between the two samples which straddle the zero line. The
/// distance between successive crossings is one half-wave.
#[derive(Clone, Debug)]
pub struct FrequencyCounter {
    sample_rate: u32,

    // previous sample, relative to zero
    prev: f32,

    // fractional samples since the last crossing
    run_length: f32,

    // estimated zero line
    zero: f32,

    // peak-to-peak amplitude
    amplitude: f32,

    // last frequency estimate
    frequency: f32,

    // lifetime sample count
    count: u64,

    max: SlidingExtremum,
    min: SlidingExtremum,
}

impl FrequencyCounter {
    /// New counter for input at `sample_rate` Hz
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            prev: 0.0,
            run_length: 0.0,
            zero: 0.0,
            amplitude: 0.0,
            frequency: 0.0,
            count: 0,
            max: SlidingExtremum::default(),
            min: SlidingExtremum::default(),
        }
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        *self = Self::new(self.sample_rate);
    }

    /// Process one sample
    ///
    /// Returns a reading if this sample completes a half-wave.
    pub fn input(&mut self, sample: f32) -> Option<FrequencyReading> {
        self.count += 1;
        let now = sample - self.zero;
        let mut out = None;
        if (now >= 0.0) != (self.prev >= 0.0) {
            let an = now.abs();
            let s = an + self.prev.abs();
            let half_length = self.run_length - an / s;
            self.run_length = 1.0 + an / s;
            if half_length > 0.0 {
                self.frequency = 0.5f32 / (half_length / self.sample_rate as f32);
                out = Some(FrequencyReading {
                    frequency: self.frequency,
                    amplitude: self.amplitude,
                    time: self.micros(),
                });
            }
            if self.max.count() > Self::MIN_EXTREMA && self.min.count() > Self::MIN_EXTREMA {
                let (ma, mi) = (self.max.max(), self.min.min());
                self.amplitude = ma - mi;
                self.zero = (ma + mi) / 2.0;
            }
        } else {
            self.run_length += 1.0;
        }
        self.prev = now;
        if now >= 0.0 {
            self.max.push(sample);
        } else {
            self.min.push(sample);
        }
        out
    }

    /// Last frequency estimate (Hz)
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Peak-to-peak amplitude estimate
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Current zero line
    pub fn zero(&self) -> f32 {
        self.zero
    }

    /// Lifetime sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Time of the most recent sample (µs)
    pub fn micros(&self) -> i64 {
        crate::waveform::micros(self.count, self.sample_rate)
    }

    // extrema required before the zero line is re-centred
    const MIN_EXTREMA: usize = 10;
}

// Sliding window over the most recent samples on one side
// of the zero line
#[derive(Clone, Debug, Default)]
struct SlidingExtremum {
    window: ArrayDeque<f32, EXTREMA_WINDOW, arraydeque::Wrapping>,
}

const EXTREMA_WINDOW: usize = 15;

impl SlidingExtremum {
    fn push(&mut self, sample: f32) {
        let _ = self.window.push_back(sample);
    }

    fn count(&self) -> usize {
        self.window.len()
    }

    fn max(&self) -> f32 {
        self.window.iter().fold(f32::MIN, |acc, v| acc.max(*v))
    }

    fn min(&self) -> f32 {
        self.window.iter().fold(f32::MAX, |acc, v| acc.min(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::waveform::modulate_tones;

    #[test]
    fn test_sliding_extremum() {
        let mut uut = SlidingExtremum::default();
        for i in 0..20 {
            uut.push(i as f32);
        }
        assert_eq!(EXTREMA_WINDOW, uut.count());
        assert_eq!(19.0, uut.max());
        assert_eq!(5.0, uut.min());
    }

    #[test]
    fn test_counts_tones() {
        let input = modulate_tones(&[(1500.0, 20_000), (2300.0, 20_000)], 11025);
        let mut uut = FrequencyCounter::new(11025);
        let readings: Vec<FrequencyReading> =
            input.iter().filter_map(|sa| uut.input(*sa)).collect();

        let black: Vec<f32> = readings
            .iter()
            .filter(|r| r.time > 2_000 && r.time < 18_000)
            .map(|r| r.frequency)
            .collect();
        let white: Vec<f32> = readings
            .iter()
            .filter(|r| r.time > 22_000 && r.time < 38_000)
            .map(|r| r.frequency)
            .collect();

        let last = readings.last().expect("no readings");
        assert_eq!(last.frequency, uut.frequency());

        assert!(!black.is_empty());
        assert!(!white.is_empty());
        for f in black {
            assert_approx_eq!(f, 1500.0f32, 60.0);
        }
        for f in white {
            assert_approx_eq!(f, 2300.0f32, 150.0);
        }
        assert_approx_eq!(uut.amplitude(), 16384.0f32, 2500.0);
        assert_eq!(input.len() as u64, uut.count());
    }

    #[test]
    fn test_offset_zero_line() {
        // a DC offset is removed once extrema are known
        let input: Vec<f32> = modulate_tones(&[(1500.0, 20_000)], 11025)
            .into_iter()
            .map(|sa| sa + 2000.0)
            .collect();
        let mut uut = FrequencyCounter::new(11025);
        let mut last = None;
        for sa in &input {
            if let Some(reading) = uut.input(*sa) {
                last = Some(reading);
            }
        }
        assert_approx_eq!(uut.zero(), 2000.0f32, 500.0);
        assert_approx_eq!(last.expect("no reading").frequency, 1500.0f32, 60.0);
    }
}
