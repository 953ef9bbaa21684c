//! Correlation-based start detection

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

use super::StartDetector;
use crate::adjuster::LineAdjuster;
use crate::matcher::StartMatcher;
use crate::tone::{Tone, ToneEvent};
use crate::waveform::LINE_LEN;

/// Start detection by pattern correlation
///
/// Every tone event is scored against the start-phasing
/// pattern. Each WHITE→BLACK transition whose preceding line
/// matched the pattern with fewer than 10 errors is a line-start
/// candidate. Candidates feed a [`LineAdjuster`], and the
/// detector is confident once the adjuster is ready.
#[derive(Clone, Debug)]
pub struct MatcherDetector {
    matcher: StartMatcher,
    adjuster: LineAdjuster,
    last_tone: Option<Tone>,
    min_errors: u32,
}

impl MatcherDetector {
    /// New detector
    pub fn new() -> Self {
        let matcher = StartMatcher::start_phasing();
        Self {
            min_errors: matcher.size() as u32,
            matcher,
            adjuster: LineAdjuster::new(LINE_LEN),
            last_tone: None,
        }
    }

    /// Lowest error count seen at a line start
    pub fn min_errors(&self) -> u32 {
        self.min_errors
    }

    // errors which permit a line-start candidate
    const START_MAX_ERRORS: u32 = 10;
}

impl Default for MatcherDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StartDetector for MatcherDetector {
    fn input(&mut self, event: &ToneEvent) -> bool {
        let mut ready = false;
        if event.tone == Tone::Black && self.last_tone == Some(Tone::White) {
            let errors = self.matcher.errors();
            if errors < self.min_errors {
                trace!("matcher: new minimum {} errors", errors);
                self.min_errors = errors;
            }
            if errors < Self::START_MAX_ERRORS {
                ready = self.adjuster.update(errors, event.begin);
            }
        }

        self.matcher.input_event(event);
        self.last_tone = Some(event.tone);
        ready
    }

    fn line_length(&self) -> i64 {
        self.adjuster.line_length()
    }

    fn start_of_line(&self) -> i64 {
        self.adjuster.start_of_line()
    }

    fn reset(&mut self) {
        self.matcher.reset();
        self.adjuster.reset();
        self.last_tone = None;
        self.min_errors = self.matcher.size() as u32;
    }
}
