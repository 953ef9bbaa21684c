//! Periodic pattern matching
//!
//! The [`PatternMatcher`] scores how well a stream of black/white
//! decisions follows a periodic reference pattern: black for the
//! first `dark` µs of every `period`, white for the remainder.
//! The score is the number of mismatches among the last `N`
//! outcomes. A score near zero indicates that the pattern is
//! present.
//!
//! Two reference patterns are used by the synchronizer:
//!
//! * [`StartMatcher`]: the start-phasing signal, one period per
//!   line and black for 2182/2300 of it.
//! * [`StopMatcher`]: the stop tone, 225 periods per line and
//!   black for 7/20 of each.

use arraydeque::ArrayDeque;

use crate::tone::ToneEvent;
use crate::waveform::{
    LINE_LEN, START_DARK_DEN, START_DARK_NUM, STOP_DARK_DEN, STOP_DARK_NUM, STOP_PERIOD,
};

/// Start-phasing matcher: one outcome per millisecond, one line deep
pub type StartMatcher = PatternMatcher<500>;

/// Stop-tone matcher: one outcome per 100 µs, 0.1 seconds deep
pub type StopMatcher = PatternMatcher<1000>;

/// Rolling periodic pattern matcher
///
/// The reference is anchored at every WHITE→BLACK transition
/// that is observed. At most one outcome is recorded per `step`
/// µs, which makes the score independent of how often the
/// matcher is called.
///
/// After a [`reset()`](#method.reset), every slot of the window
/// counts as a mismatch. A score below `N` therefore requires
/// actual matching input.
#[derive(Clone, Debug)]
pub struct PatternMatcher<const N: usize> {
    // reference period (µs)
    period: i64,

    // black portion of each period (µs)
    dark: i64,

    // minimum time between outcomes (µs)
    step: i64,

    // start of the current reference period
    anchor: Option<i64>,

    // last decision seen
    last_black: bool,

    // time of the last recorded outcome
    last_outcome: Option<i64>,

    // true for each mismatch
    history: ArrayDeque<bool, N, arraydeque::Wrapping>,

    // count of true in history
    errors: u32,
}

impl<const N: usize> PatternMatcher<N> {
    /// New matcher
    ///
    /// The pattern is black for `dark` µs out of every `period`
    /// µs. Outcomes are recorded at most once every `step` µs.
    pub fn new(period: i64, dark: i64, step: i64) -> Self {
        assert!(period > 0 && step > 0);
        let mut out = Self {
            period,
            dark: i64::clamp(dark, 0, period),
            step,
            anchor: None,
            last_black: false,
            last_outcome: None,
            history: ArrayDeque::new(),
            errors: 0,
        };
        out.reset();
        out
    }

    /// Clear the window
    ///
    /// Every slot becomes a mismatch.
    pub fn reset(&mut self) {
        self.history.clear();
        for _i in 0..N {
            let _ = self.history.push_back(true);
        }
        self.errors = N as u32;
        self.anchor = None;
        self.last_black = false;
        self.last_outcome = None;
    }

    /// Match one decision
    ///
    /// `is_black` is the decision at `time` (µs). Returns the
    /// number of mismatches in the window.
    pub fn input(&mut self, is_black: bool, time: i64) -> u32 {
        if is_black && !self.last_black {
            self.anchor = Some(time);
        }
        self.last_black = is_black;

        match self.last_outcome {
            Some(last) if time - last < self.step => return self.errors,
            _ => self.last_outcome = Some(time),
        }

        let mismatch = match self.expect_black(time) {
            Some(expect) => expect != is_black,
            None => true,
        };
        if let Some(aged) = self.history.push_back(mismatch) {
            self.errors -= aged as u32;
        }
        self.errors += mismatch as u32;
        self.errors
    }

    /// Match every step of a tone run
    ///
    /// Returns the number of mismatches in the window after
    /// the run.
    pub fn input_event(&mut self, event: &ToneEvent) -> u32 {
        let is_black = event.tone.is_black();
        let mut time = event.begin;
        while time < event.end {
            self.input(is_black, time);
            time += self.step;
        }
        self.errors
    }

    /// Mismatches in the window
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Window size, in outcomes
    pub fn size(&self) -> usize {
        N
    }

    /// Start of the current reference period, if any
    pub fn anchor(&self) -> Option<i64> {
        self.anchor
    }

    /// Reference period (µs)
    pub fn period(&self) -> i64 {
        self.period
    }

    // expected decision at `time`, if the reference is anchored
    #[inline]
    fn expect_black(&self, time: i64) -> Option<bool> {
        let anchor = self.anchor?;
        Some((time - anchor).rem_euclid(self.period) < self.dark)
    }
}

impl StartMatcher {
    /// Matcher for the start-phasing signal
    pub fn start_phasing() -> Self {
        Self::new(
            LINE_LEN,
            LINE_LEN * START_DARK_NUM / START_DARK_DEN,
            Self::START_STEP,
        )
    }

    // one outcome per millisecond
    const START_STEP: i64 = 1000;
}

impl StopMatcher {
    /// Matcher for the stop tone
    pub fn stop_phasing() -> Self {
        Self::new(
            STOP_PERIOD,
            STOP_PERIOD * STOP_DARK_NUM / STOP_DARK_DEN,
            Self::STOP_STEP,
        )
    }

    const STOP_STEP: i64 = 100;
}
