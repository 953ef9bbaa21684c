//! Waveform parameters for HF radio facsimile
//!
//! All times in this crate are monotonic microsecond counts
//! derived from the input sample counter.

/// Nominal line length at 120 lines per minute (µs)
pub const LINE_LEN: i64 = 500_000;

/// Start-phasing black portion, numerator
///
/// A start-phasing line is black for `2182/2300` of the line
/// and white for the remainder.
pub const START_DARK_NUM: i64 = 2182;

/// Start-phasing black portion, denominator
pub const START_DARK_DEN: i64 = 2300;

/// Stop tone period (µs)
///
/// The stop tone alternates black and white at 450 Hz,
/// i.e. 225 full periods per nominal line.
pub const STOP_PERIOD: i64 = LINE_LEN / 225;

/// Stop tone black portion, numerator
pub const STOP_DARK_NUM: i64 = 7;

/// Stop tone black portion, denominator
pub const STOP_DARK_DEN: i64 = 20;

/// Nominal black tone (Hz)
pub const BLACK_HZ: f32 = 1500.0;

/// Nominal white tone (Hz)
pub const WHITE_HZ: f32 = 2300.0;

/// Anything below this frequency is a start/control tone (Hz)
pub const START_LIMIT_HZ: f32 = 1100.0;

/// Anything at or above this frequency is white (Hz)
pub const WHITE_LIMIT_HZ: f32 = 1900.0;

/// Default index of cooperation
pub const IOC_576: u32 = 576;

/// Image width, in pixels, for the given index of cooperation
///
/// The scanned line is `π × IOC` pixels long.
pub fn pixels_per_line(ioc: u32) -> usize {
    (std::f64::consts::PI * ioc as f64).round() as usize
}

/// Convert a lifetime sample count to microseconds
#[inline]
pub fn micros(sample_count: u64, rate: u32) -> i64 {
    (1_000_000u64 * sample_count / rate as u64) as i64
}

/// Width of the start-phasing black portion, in pixels
pub fn start_black_pixels(width: usize) -> usize {
    width * START_DARK_NUM as usize / START_DARK_DEN as usize
}

/// Width of the start-phasing white pulse, in pixels
pub fn start_white_pixels(width: usize) -> usize {
    width - start_black_pixels(width)
}

/// True if `value` is within `percent` of `expected`
#[inline]
pub fn is_about(expected: i64, value: i64, percent: i64) -> bool {
    (value - expected).abs() * 100 <= expected.abs() * percent
}

/// Continuous-phase FM tone generator
///
/// This method is designed for use in tests. Each run of
/// `(frequency, duration_us)` is synthesized at the sampling
/// rate `fs` with a full-scale `i16`-like amplitude.
#[cfg(test)]
pub fn modulate_tones(runs: &[(f32, i64)], fs: u32) -> Vec<f32> {
    const TWOPI: f64 = 2.0f64 * std::f64::consts::PI;

    let mut out = vec![];
    let mut phase = 0.0f64;
    let mut elapsed_us = 0i64;
    let mut sample = 0u64;
    for (freq, duration) in runs {
        elapsed_us += duration;
        let rad_per_sa = TWOPI * (*freq as f64) / (fs as f64);
        while micros(sample, fs) < elapsed_us {
            phase += rad_per_sa;
            if phase > TWOPI {
                phase -= TWOPI;
            }
            out.push((8192.0f64 * phase.sin()) as f32);
            sample += 1;
        }
    }
    out
}

/// Tone runs for `count` start-phasing lines
///
/// Each line is black for `2182/2300` of `line_len` and white
/// for the rest. Runs are `(frequency, duration_us)`.
#[cfg(test)]
pub fn phasing_runs(count: usize, line_len: i64) -> Vec<(f32, i64)> {
    let black = line_len * START_DARK_NUM / START_DARK_DEN;
    let mut out = vec![];
    for _i in 0..count {
        out.push((BLACK_HZ, black));
        out.push((WHITE_HZ, line_len - black));
    }
    out
}

/// Tone runs for a stop tone lasting `duration` µs
#[cfg(test)]
pub fn stop_runs(duration: i64) -> Vec<(f32, i64)> {
    let black = STOP_PERIOD * STOP_DARK_NUM / STOP_DARK_DEN;
    let mut out = vec![];
    let mut elapsed = 0;
    while elapsed < duration {
        out.push((BLACK_HZ, black));
        out.push((WHITE_HZ, STOP_PERIOD - black));
        elapsed += STOP_PERIOD;
    }
    out
}

/// Tone events from contiguous `(tone, span)` runs
///
/// The first run begins at `start`.
#[cfg(test)]
pub fn events_from_runs(start: i64, runs: &[(crate::Tone, i64)]) -> Vec<crate::ToneEvent> {
    let mut out = vec![];
    let mut begin = start;
    for (tone, span) in runs {
        out.push(crate::ToneEvent::new(*tone, begin, begin + span, 1.0, 0));
        begin += span;
    }
    out
}

/// Tone events for `count` start-phasing lines beginning at `start`
#[cfg(test)]
pub fn phasing_events(start: i64, count: usize, line_len: i64) -> Vec<crate::ToneEvent> {
    let black = line_len * START_DARK_NUM / START_DARK_DEN;
    let mut runs = vec![];
    for _i in 0..count {
        runs.push((crate::Tone::Black, black));
        runs.push((crate::Tone::White, line_len - black));
    }
    events_from_runs(start, &runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixels_per_line() {
        assert_eq!(1810, pixels_per_line(IOC_576));
        assert_eq!(1715, start_black_pixels(1808));
        assert_eq!(93, start_white_pixels(1808));
    }

    #[test]
    fn test_micros() {
        assert_eq!(0, micros(0, 11025));
        assert_eq!(1_000_000, micros(11025, 11025));
        assert_eq!(500_000, micros(5512, 11024));
    }

    #[test]
    fn test_is_about() {
        assert!(is_about(500_000, 505_000, 1));
        assert!(is_about(500_000, 495_000, 1));
        assert!(!is_about(500_000, 505_001, 1));
        assert!(is_about(50, 57, 15));
        assert!(!is_about(50, 58, 15));
    }

    #[test]
    fn test_modulate_tones() {
        let out = modulate_tones(&[(1500.0, 1000), (2300.0, 1000)], 10000);
        assert_eq!(out.len(), 20);
        assert!(out.iter().all(|sa| sa.abs() <= 8192.0));
    }
}
