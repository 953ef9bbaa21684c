//! Self-adjusting line length estimator

use arrayvec::ArrayVec;

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

use crate::bestfit::BestFitLine;

// maximum number of candidate line starts
const MAX_CANDIDATES: usize = 100;

/// Line-start estimator
///
/// The adjuster is fed line-start candidates: times at which a
/// new scan line is believed to begin, each with an error
/// score. It estimates the actual line length and the start of
/// line from the candidates it has seen.
///
/// * A candidate which arrives within 500 µs of the previous
///   one refines it. The candidate with the lower error wins.
/// * Lines 2 through 4 set the line length to the average of
///   all measured lengths which are within ±1000 µs of nominal.
/// * From line 5 onward, the start of line is the intercept of
///   a best-fit line through (line number, start time).
///
/// The adjuster is ready once three lines are confirmed.
#[derive(Clone, Debug)]
pub struct LineAdjuster {
    initial_length: i64,
    line_length: i64,
    start_of_line: i64,
    candidates: ArrayVec<Candidate, MAX_CANDIDATES>,
    lengths: ArrayVec<i64, { MAX_CANDIDATES - 1 }>,
    fit: BestFitLine,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    start: i64,
    error: u32,
}

impl LineAdjuster {
    /// New adjuster for a nominal line length (µs)
    pub fn new(initial_length: i64) -> Self {
        assert!(initial_length > 0);
        Self {
            initial_length,
            line_length: initial_length,
            start_of_line: 0,
            candidates: ArrayVec::new(),
            lengths: ArrayVec::new(),
            fit: BestFitLine::new(),
        }
    }

    /// Forget all candidates
    pub fn reset(&mut self) {
        self.line_length = self.initial_length;
        self.start_of_line = 0;
        self.candidates.clear();
        self.lengths.clear();
        self.fit.reset();
    }

    /// Offer a line-start candidate
    ///
    /// `errors` is the candidate's error score, lower being
    /// better. `time` is the candidate line start (µs).
    /// Returns true once more than two lines are known.
    pub fn update(&mut self, errors: u32, time: i64) -> bool {
        let candidate = Candidate {
            start: time,
            error: errors,
        };
        match self.candidates.last().copied() {
            Some(last) if time - last.start < Self::REFINE_WINDOW => {
                if errors <= last.error {
                    let end = self.candidates.len() - 1;
                    self.candidates[end] = candidate;
                }
            }
            Some(_) if self.candidates.is_full() => {
                trace!("adjuster: candidate table full");
            }
            Some(_) => {
                self.calc();
                self.candidates.push(candidate);
            }
            None => self.candidates.push(candidate),
        }
        self.candidates.len() > 2
    }

    /// Estimated line length (µs)
    pub fn line_length(&self) -> i64 {
        self.line_length
    }

    /// Estimated start of line (µs)
    ///
    /// Valid once [`update()`](#method.update) has returned true.
    pub fn start_of_line(&self) -> i64 {
        self.start_of_line
    }

    /// Line number of the most recent candidate
    pub fn first_line(&self) -> i64 {
        self.candidates
            .last()
            .map(|c| self.line(c.start))
            .unwrap_or(0)
    }

    /// Number of confirmed line starts
    pub fn lines(&self) -> usize {
        self.candidates.len()
    }

    // re-estimate from all complete lines
    fn calc(&mut self) {
        let index = self.candidates.len();
        self.start_of_line = self.candidates[0].start;
        if index < 2 {
            return;
        }

        let prev_start = self.start_of_line;
        let prev_length = self.line_length;
        let before = self.candidates[index - 2].start;
        self.lengths.push(self.candidates[index - 1].start - before);
        self.fit.add(self.line(before) as f64, before as f64);

        if index < 5 {
            self.line_length = self.average_length();
        } else {
            self.start_of_line = self.fit.y(0.0) as i64;
            self.line_length = self.average_length();
        }

        if prev_length != self.line_length {
            trace!(
                "adjuster: line length {} → {}",
                prev_length,
                self.line_length
            );
        }
        if prev_start != self.start_of_line {
            trace!(
                "adjuster: start of line moved {} µs",
                self.start_of_line - prev_start
            );
        }
    }

    // line number of `time`, with a small allowance for early starts
    fn line(&self, time: i64) -> i64 {
        (time - self.start_of_line + Self::DELTA) / self.initial_length
    }

    fn average_length(&self) -> i64 {
        let (sum, count) = self
            .lengths
            .iter()
            .filter(|len| self.near_line_length(**len))
            .fold((0i64, 0i64), |(sum, count), len| (sum + len, count + 1));
        if count > 0 {
            sum / count
        } else {
            self.initial_length
        }
    }

    #[inline]
    fn near_line_length(&self, value: i64) -> bool {
        (self.initial_length - value).abs() < Self::DELTA
    }

    // tolerance for line lengths and line numbering (µs)
    const DELTA: i64 = 1000;

    // candidates closer than this refine the previous one (µs)
    const REFINE_WINDOW: i64 = 500;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::LINE_LEN;

    #[test]
    fn test_ready_on_third_line() {
        let mut uut = LineAdjuster::new(LINE_LEN);
        assert!(!uut.update(5, 0));
        assert!(!uut.update(3, 500_000));
        assert!(uut.update(2, 999_000));
        assert!((uut.line_length() - LINE_LEN).abs() <= 1000);
        assert_eq!(0, uut.start_of_line());
        assert_eq!(2, uut.first_line());

        // 499_000 is not within DELTA of nominal and is ignored
        assert!(uut.update(1, 1_500_000));
        assert_eq!(LINE_LEN, uut.line_length());
        assert_eq!(4, uut.lines());
    }

    #[test]
    fn test_refines_candidate() {
        let mut uut = LineAdjuster::new(LINE_LEN);
        uut.update(5, 1000);
        // lower error, close by: replaces
        uut.update(2, 1200);
        // higher error: ignored
        uut.update(9, 1300);
        assert_eq!(1, uut.lines());

        uut.update(0, 501_400);
        uut.update(0, 1_001_600);
        assert_eq!(1200, uut.start_of_line());
        assert_eq!(500_200, uut.line_length());
    }

    #[test]
    fn test_best_fit_start() {
        let mut uut = LineAdjuster::new(LINE_LEN);
        let true_start = 20_000i64;
        let true_len = 500_300i64;
        for line in 0..8 {
            uut.update(0, true_start + line * true_len);
        }
        assert_eq!(8, uut.lines());
        assert!((uut.line_length() - true_len).abs() <= 1);
        assert!((uut.start_of_line() - true_start).abs() <= 2);

        uut.reset();
        assert_eq!(0, uut.lines());
        assert_eq!(LINE_LEN, uut.line_length());
    }
}
