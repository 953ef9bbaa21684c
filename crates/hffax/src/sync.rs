//! Line synchronization
//!
//! The [`FaxSynchronizer`] locks onto the start-phasing signal
//! that begins every fax transmission. Once locked, it knows the
//! [`LineGeometry`]: how long each scan line is and when line
//! zero began. The geometry maps any tone time to an image
//! (row, column).
//!
//! Locking is delegated to a [`StartDetector`]. Three strategies
//! are available, selected by [`DetectorKind`]:
//!
//! * `ratio`: checks the black/white proportions of each line
//! * `matcher`: correlates against the phasing pattern
//! * `adjusting`: ratio-qualified lines refined by a
//!   least-squares line estimator
//!
//! After lock, the first 60 rows remain phasing territory and
//! continue to refine the geometry. Later rows are watched for
//! the stop tone.

#[cfg(not(test))]
use log::{debug, info};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;

use strum_macros::{Display, EnumString};

use crate::matcher::StopMatcher;
use crate::tone::ToneEvent;
use crate::waveform::LINE_LEN;

mod adjusting;
mod matched;
mod ratio;

pub use adjusting::AdjustingDetector;
pub use matched::MatcherDetector;
pub use ratio::RatioDetector;

/// Start-phasing detection strategy
///
/// Each strategy consumes corrected tone events and reports
/// when it is confident that it knows the line geometry.
pub trait StartDetector: std::fmt::Debug {
    /// Process one tone event
    ///
    /// Returns true if the detector is confident in its line
    /// geometry and this event confirmed or refined it.
    fn input(&mut self, event: &ToneEvent) -> bool;

    /// Estimated line length (µs)
    fn line_length(&self) -> i64;

    /// Estimated start of some line (µs)
    fn start_of_line(&self) -> i64;

    /// Forget everything
    fn reset(&mut self);
}

impl<D> StartDetector for Box<D>
where
    D: StartDetector + ?Sized,
{
    fn input(&mut self, event: &ToneEvent) -> bool {
        (**self).input(event)
    }

    fn line_length(&self) -> i64 {
        (**self).line_length()
    }

    fn start_of_line(&self) -> i64 {
        (**self).start_of_line()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Start detector selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DetectorKind {
    /// Black/white ratio of each phasing line
    Ratio,

    /// Pattern correlation
    #[default]
    Matcher,

    /// Ratio-qualified lines with a line length estimator
    Adjusting,
}

impl DetectorKind {
    /// Create a detector of this kind
    pub fn build(self) -> Box<dyn StartDetector + Send> {
        match self {
            DetectorKind::Ratio => Box::new(RatioDetector::new()),
            DetectorKind::Matcher => Box::new(MatcherDetector::new()),
            DetectorKind::Adjusting => Box::new(AdjustingDetector::new()),
        }
    }
}

/// Scan line timing
///
/// Maps a time `t` (µs) to an image position. Line `k` begins
/// at `start_of_line + k·line_length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineGeometry {
    /// Line length (µs), always positive
    pub line_length: i64,

    /// Start of line zero (µs)
    pub start_of_line: i64,
}

impl LineGeometry {
    /// New geometry
    ///
    /// Returns `None` unless `line_length` is positive.
    pub fn new(line_length: i64, start_of_line: i64) -> Option<Self> {
        if line_length > 0 {
            Some(Self {
                line_length,
                start_of_line,
            })
        } else {
            None
        }
    }

    /// Row of time `t`
    ///
    /// Negative for times before line zero.
    #[inline]
    pub fn line(&self, t: i64) -> i64 {
        (t - self.start_of_line).div_euclid(self.line_length)
    }

    /// Column of time `t`, for an image `width` pixels wide
    #[inline]
    pub fn column(&self, width: usize, t: i64) -> usize {
        let into_line = (t - self.start_of_line).rem_euclid(self.line_length);
        (width as i64 * into_line / self.line_length) as usize
    }

    /// Row and column of time `t`
    #[inline]
    pub fn position(&self, width: usize, t: i64) -> (i64, usize) {
        (self.line(t), self.column(width, t))
    }

    /// Ensure that line zero begins at or before `t`
    ///
    /// If line zero begins after `t`, it moves back by whole
    /// lines. Row numbers shift; columns are unchanged.
    pub fn starting_before(&self, t: i64) -> Self {
        let start = t - (t - self.start_of_line).rem_euclid(self.line_length);
        Self {
            line_length: self.line_length,
            start_of_line: i64::min(start, self.start_of_line),
        }
    }
}

/// Synchronizer state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SyncState {
    /// Idle, awaiting input
    Stopped,

    /// Searching for start phasing
    Syncing,

    /// Line geometry is known
    Started,
}

/// Why a page ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum StopReason {
    /// The stop tone was detected
    #[strum(serialize = "stop tone")]
    StopTone,

    /// Stopped by the caller
    #[strum(serialize = "requested")]
    Requested,

    /// The audio source ended
    #[strum(serialize = "end of input")]
    EndOfInput,
}

/// Synchronizer output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// Lock acquired with the given geometry
    Started(LineGeometry),

    /// Geometry refined during the phasing rows
    Adjusted(LineGeometry),

    /// Lock lost
    Stopped(StopReason),
}

/// Start/stop state machine for one page at a time
///
/// Tone events go to start detection while not started, and
/// while they fall within the first 60 rows of the page. Every
/// event after the start also goes to the stop-tone matcher.
/// When the stop matcher reports fewer than 300 mismatches, the
/// page ends.
///
/// Once stopped, the synchronizer is reset and begins to
/// search for the next page.
#[derive(Debug)]
pub struct FaxSynchronizer {
    detector: Box<dyn StartDetector + Send>,
    stop_matcher: StopMatcher,
    state: SyncState,
    geometry: Option<LineGeometry>,
}

impl FaxSynchronizer {
    /// New synchronizer using the given start detector
    pub fn new(detector: Box<dyn StartDetector + Send>) -> Self {
        Self {
            detector,
            stop_matcher: StopMatcher::stop_phasing(),
            state: SyncState::Stopped,
            geometry: None,
        }
    }

    /// Current state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Line geometry, if started
    pub fn geometry(&self) -> Option<LineGeometry> {
        self.geometry
    }

    /// Process one corrected tone event
    pub fn input(&mut self, event: &ToneEvent) -> Option<SyncEvent> {
        match (self.state, self.geometry) {
            (SyncState::Started, Some(geom)) => {
                if let Some(stopped) = self.watch_stop(event) {
                    Some(stopped)
                } else if geom.line(event.begin) < Self::SYNC_LINES {
                    self.resync(event, geom)
                } else {
                    None
                }
            }
            _ => {
                if self.state == SyncState::Stopped {
                    debug!("sync: searching for start phasing");
                    self.state = SyncState::Syncing;
                }
                if self.detector.input(event) {
                    let geom = self.detected_geometry(event)?;
                    info!(
                        "sync: started, line length {} µs, start of line {}",
                        geom.line_length, geom.start_of_line
                    );
                    self.start(geom);
                    Some(SyncEvent::Started(geom))
                } else {
                    None
                }
            }
        }
    }

    /// Begin a page with known geometry
    pub fn start(&mut self, geometry: LineGeometry) {
        self.stop_matcher.reset();
        self.geometry = Some(geometry);
        self.state = SyncState::Started;
    }

    /// End the current page, if any
    ///
    /// Resets the synchronizer to search for a new page.
    /// Returns [`SyncEvent::Stopped`] if a page was in progress.
    pub fn stop(&mut self, reason: StopReason) -> Option<SyncEvent> {
        let was_started = self.state == SyncState::Started;
        self.reset();
        if was_started {
            info!("sync: stopped: {}", reason);
            Some(SyncEvent::Stopped(reason))
        } else {
            None
        }
    }

    /// Reset to the idle state
    pub fn reset(&mut self) {
        self.detector.reset();
        self.stop_matcher.reset();
        self.geometry = None;
        self.state = SyncState::Stopped;
    }

    // start detection continues during the phasing rows
    fn resync(&mut self, event: &ToneEvent, current: LineGeometry) -> Option<SyncEvent> {
        if !self.detector.input(event) {
            return None;
        }
        let geom = self.detected_geometry(event)?;
        if geom == current {
            return None;
        }

        // keep row numbering stable
        let geom = LineGeometry {
            line_length: geom.line_length,
            start_of_line: correct_modulo(
                current.start_of_line,
                geom.start_of_line,
                geom.line_length,
            ),
        };
        if geom == current {
            return None;
        }
        debug!(
            "sync: adjusted, line length {} µs, start of line {}",
            geom.line_length, geom.start_of_line
        );
        self.geometry = Some(geom);
        Some(SyncEvent::Adjusted(geom))
    }

    fn watch_stop(&mut self, event: &ToneEvent) -> Option<SyncEvent> {
        let errors = self.stop_matcher.input_event(event);
        if errors < Self::STOP_MAX_ERRORS {
            debug!("sync: stop tone with {} errors", errors);
            self.stop(StopReason::StopTone)
        } else {
            None
        }
    }

    fn detected_geometry(&self, event: &ToneEvent) -> Option<LineGeometry> {
        LineGeometry::new(self.detector.line_length(), self.detector.start_of_line())
            .map(|geom| geom.starting_before(event.begin))
    }

    // rows at the top of the page which may contain phasing
    const SYNC_LINES: i64 = 60;

    // stop matcher errors which indicate a stop tone
    const STOP_MAX_ERRORS: u32 = 300;
}

/// Move a start of line without renumbering lines
///
/// Returns the time which is equivalent to `better`, modulo
/// the nominal line length, and nearest to `current`. The
/// result never differs from `current` by more than half a
/// line.
pub fn correct(current: i64, better: i64) -> i64 {
    correct_modulo(current, better, LINE_LEN)
}

fn correct_modulo(current: i64, better: i64, period: i64) -> i64 {
    let d = (better - current).rem_euclid(period);
    if d > period / 2 {
        current + d - period
    } else {
        current + d
    }
}
