//! Ratio-based start detection

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

use super::{correct, StartDetector};
use crate::tone::{Tone, ToneEvent};
use crate::waveform::{is_about, LINE_LEN, START_DARK_DEN, START_DARK_NUM};

/// One candidate start-phasing line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PhasingLine {
    /// Start of the black portion (µs)
    pub begin: i64,

    /// Black plus white (µs)
    pub length: i64,

    /// Black portion (µs)
    pub black: i64,

    /// Distance from an ideal phasing line (µs)
    pub error: i64,
}

/// Pairs black and white runs into phasing lines
#[derive(Clone, Debug, Default)]
pub(crate) struct PhasingLines {
    black: Option<ToneEvent>,
}

impl PhasingLines {
    pub fn reset(&mut self) {
        self.black = None;
    }

    /// Returns a line when a BLACK run is followed by a WHITE
    /// run in phasing proportions
    pub fn input(&mut self, event: &ToneEvent) -> Option<PhasingLine> {
        match event.tone {
            Tone::Black => {
                self.black = Some(*event);
                None
            }
            Tone::White => {
                let black = self.black.take()?;
                let length = event.end - black.begin;
                if check(black.span, length) {
                    Some(PhasingLine {
                        begin: black.begin,
                        length,
                        black: black.span,
                        error: phasing_error(black.span, length),
                    })
                } else {
                    None
                }
            }
            _ => {
                self.black = None;
                None
            }
        }
    }
}

/// True if `black` µs out of `length` µs looks like phasing
///
/// Accepts when the black fraction is within 1% of 2182/2300
/// and the line length is within 1% of nominal.
pub fn check(black: i64, length: i64) -> bool {
    if length <= 0 || !is_about(LINE_LEN, length, 1) {
        return false;
    }
    let expect = length * START_DARK_NUM;
    (black * START_DARK_DEN - expect).abs() * 100 <= expect
}

// distance of a line from ideal phasing (µs)
fn phasing_error(black: i64, length: i64) -> i64 {
    (length - LINE_LEN).abs() + (black - length * START_DARK_NUM / START_DARK_DEN).abs()
}

/// Start detection by black/white ratio
///
/// Every BLACK run followed by a WHITE run is a candidate
/// phasing line. Lines which [pass](fn.check.html) update the
/// average line length. The start of line follows the line with
/// the lowest phasing error seen so far. The detector is
/// confident after three lines.
#[derive(Clone, Debug, Default)]
pub struct RatioDetector {
    pairs: PhasingLines,
    lines: u32,
    length_sum: i64,
    best_error: Option<i64>,
    start_of_line: Option<i64>,
}

impl RatioDetector {
    /// New detector
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of phasing lines seen
    pub fn lines(&self) -> u32 {
        self.lines
    }

    // phasing lines required for lock
    const MIN_LINES: u32 = 3;
}

impl StartDetector for RatioDetector {
    fn input(&mut self, event: &ToneEvent) -> bool {
        let line = match self.pairs.input(event) {
            Some(line) => line,
            None => return false,
        };

        self.lines += 1;
        self.length_sum += line.length;
        if self.best_error.map(|best| line.error < best).unwrap_or(true) {
            self.best_error = Some(line.error);
            self.start_of_line = Some(match self.start_of_line {
                Some(current) => correct(current, line.begin),
                None => line.begin,
            });
        }

        trace!(
            "ratio: line {}: black {} of {} µs, error {}",
            self.lines,
            line.black,
            line.length,
            line.error
        );
        self.lines >= Self::MIN_LINES
    }

    fn line_length(&self) -> i64 {
        if self.lines > 0 {
            self.length_sum / self.lines as i64
        } else {
            LINE_LEN
        }
    }

    fn start_of_line(&self) -> i64 {
        self.start_of_line.unwrap_or(0)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::{events_from_runs, phasing_events};

    #[test]
    fn test_check() {
        assert!(check(474_347, 500_000));
        assert!(check(479_000, 505_000));
        assert!(check(474_347 + 4_700, 500_000));
        assert!(!check(474_347 + 4_800, 500_000));
        assert!(!check(450_000, 500_000));
        assert!(!check(480_000, 506_000));
        assert!(!check(470_000, 494_000));
        assert!(!check(0, 0));
    }

    #[test]
    fn test_phasing_error() {
        assert_eq!(0, phasing_error(474_347, 500_000));
        assert_eq!(1_849, phasing_error(474_447, 501_000));
    }

    #[test]
    fn test_pairs() {
        let mut uut = PhasingLines::default();
        let evts = phasing_events(1000, 2, LINE_LEN);
        let lines: Vec<PhasingLine> = evts.iter().filter_map(|e| uut.input(e)).collect();
        assert_eq!(2, lines.len());
        assert_eq!(1000, lines[0].begin);
        assert_eq!(1000 + LINE_LEN, lines[1].begin);
        assert_eq!(LINE_LEN, lines[0].length);

        // a control tone breaks the pair
        let evts = events_from_runs(
            0,
            &[
                (Tone::Black, 474_347),
                (Tone::Start, 100),
                (Tone::White, 25_653),
            ],
        );
        assert!(evts.iter().all(|e| uut.input(e).is_none()));
    }

    #[test]
    fn test_locks_after_three_lines() {
        let mut uut = RatioDetector::new();
        let evts = phasing_events(30_000, 4, LINE_LEN);
        let ready: Vec<bool> = evts.iter().map(|e| uut.input(e)).collect();
        assert_eq!(
            vec![false, false, false, false, false, true, false, true],
            ready
        );
        assert_eq!(4, uut.lines());
        assert_eq!(LINE_LEN, uut.line_length());
        assert_eq!(30_000, uut.start_of_line());

        uut.reset();
        assert_eq!(0, uut.lines());
        assert_eq!(0, uut.start_of_line());
    }

    #[test]
    fn test_follows_best_line() {
        let mut uut = RatioDetector::new();
        let mut runs = vec![];
        // a sloppy line, then a perfect one
        runs.push((Tone::Black, 476_000));
        runs.push((Tone::White, 25_000));
        runs.push((Tone::Black, 474_347));
        runs.push((Tone::White, 25_653));
        let evts = events_from_runs(0, &runs);
        for evt in &evts {
            uut.input(evt);
        }
        assert_eq!(2, uut.lines());

        // equivalent to 501_000, nearest to 0
        assert_eq!(1_000, uut.start_of_line());
        assert_eq!((501_000 + 500_000) / 2, uut.line_length());
    }
}
