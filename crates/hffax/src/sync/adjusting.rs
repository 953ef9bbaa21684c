//! Self-adjusting start detection

use super::ratio::PhasingLines;
use super::StartDetector;
use crate::adjuster::LineAdjuster;
use crate::tone::ToneEvent;
use crate::waveform::LINE_LEN;

/// Start detection by line length estimation
///
/// Phasing lines are qualified by their black/white ratio, as
/// in the [`RatioDetector`](super::RatioDetector). Instead of a
/// simple average, each line is offered to a [`LineAdjuster`]
/// with its phasing error. The adjuster refines the line length
/// and fits the start of line over many lines, which tolerates
/// a transmitter whose line rate is slightly off nominal.
#[derive(Clone, Debug)]
pub struct AdjustingDetector {
    pairs: PhasingLines,
    adjuster: LineAdjuster,
}

impl AdjustingDetector {
    /// New detector
    pub fn new() -> Self {
        Self {
            pairs: PhasingLines::default(),
            adjuster: LineAdjuster::new(LINE_LEN),
        }
    }
}

impl Default for AdjustingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StartDetector for AdjustingDetector {
    fn input(&mut self, event: &ToneEvent) -> bool {
        match self.pairs.input(event) {
            Some(line) => {
                let error = u32::try_from(line.error).unwrap_or(u32::MAX);
                self.adjuster.update(error, line.begin)
            }
            None => false,
        }
    }

    fn line_length(&self) -> i64 {
        self.adjuster.line_length()
    }

    fn start_of_line(&self) -> i64 {
        self.adjuster.start_of_line()
    }

    fn reset(&mut self) {
        self.pairs.reset();
        self.adjuster.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::phasing_events;

    #[test]
    fn test_slow_transmitter() {
        // 0.1% slow: still passes the ratio check
        let line_len = 500_500;
        let start = 40_000;
        let mut uut = AdjustingDetector::new();
        let mut lock = None;
        for (i, evt) in phasing_events(start, 8, line_len).iter().enumerate() {
            if uut.input(evt) && lock.is_none() {
                lock = Some(i);
            }
        }
        assert_eq!(Some(5), lock);
        assert_eq!(line_len, uut.line_length());
        assert!((uut.start_of_line() - start).abs() <= 2);

        uut.reset();
        assert_eq!(LINE_LEN, uut.line_length());
    }
}
