//! Tone classification
//!
//! The [`ToneClassifier`] turns instantaneous frequency readings
//! into runs of discrete [`Tone`] symbols. A [`ToneEvent`] is
//! emitted on every symbol change and describes the run which
//! just ended.

use strum_macros::{AsRefStr, Display};

use crate::waveform::{START_LIMIT_HZ, WHITE_LIMIT_HZ};

/// Discrete fax tone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Tone {
    /// Black picture element, 1500 Hz nominal
    Black,

    /// White picture element, 2300 Hz nominal
    White,

    /// Control tone below the picture band
    Start,

    /// Stop control tone
    Stop,

    /// No valid frequency estimate
    Unknown,
}

impl Tone {
    /// Classify an instantaneous frequency, in Hz
    ///
    /// * below 1100 Hz → `Start`
    /// * 1100 Hz up to 1900 Hz → `Black`
    /// * 1900 Hz and above → `White`
    ///
    /// Frequencies which are not finite and positive are
    /// `Unknown`.
    pub fn from_frequency(hz: f32) -> Tone {
        if !hz.is_finite() || hz <= 0.0 {
            Tone::Unknown
        } else if hz < START_LIMIT_HZ {
            Tone::Start
        } else if hz < WHITE_LIMIT_HZ {
            Tone::Black
        } else {
            Tone::White
        }
    }

    /// True for `Black`
    #[inline]
    pub fn is_black(self) -> bool {
        self == Tone::Black
    }
}

/// A run of one tone
///
/// Times are in microseconds. `span` is always `end - begin`.
/// `error` is the total time of noise which was absorbed into
/// this run by the [`LineCorrector`](crate::LineCorrector).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneEvent {
    /// Tone of the run
    pub tone: Tone,

    /// Start time (µs)
    pub begin: i64,

    /// End time (µs)
    pub end: i64,

    /// Duration (µs)
    pub span: i64,

    /// Mean signal amplitude during the run
    pub amplitude: f32,

    /// Absorbed noise (µs)
    pub error: i64,
}

impl ToneEvent {
    /// New event from `begin` to `end`
    pub fn new(tone: Tone, begin: i64, end: i64, amplitude: f32, error: i64) -> Self {
        Self {
            tone,
            begin,
            end,
            span: end - begin,
            amplitude,
            error,
        }
    }
}

/// Edge-triggered tone classifier
///
/// Consecutive identical readings collapse into a single run.
/// When the classified tone changes, the run of the previous
/// tone is reported.
#[derive(Clone, Debug, Default)]
pub struct ToneClassifier {
    // tone of the open run
    last: Option<Tone>,

    // start of the open run
    begin: i64,

    // amplitude accumulator for the open run
    amplitude_sum: f64,
    readings: u32,
}

impl ToneClassifier {
    /// New classifier with no open run
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Tone of the currently open run, if any
    pub fn tone(&self) -> Option<Tone> {
        self.last
    }

    /// Classify a frequency reading
    ///
    /// Accepts the instantaneous `frequency` (Hz), signal
    /// `amplitude`, and monotonic `time` (µs). Returns the
    /// completed run if the tone changed.
    pub fn input(&mut self, frequency: f32, amplitude: f32, time: i64) -> Option<ToneEvent> {
        let tone = Tone::from_frequency(frequency);
        match self.last {
            Some(last) if last == tone => {
                self.accumulate(amplitude);
                None
            }
            Some(_) => {
                let out = self.close(time);
                self.open(tone, amplitude, time);
                out
            }
            None => {
                self.open(tone, amplitude, time);
                None
            }
        }
    }

    /// Close the open run at `time`
    ///
    /// Used at the end of input. The classifier is left with
    /// no open run.
    pub fn flush(&mut self, time: i64) -> Option<ToneEvent> {
        let out = self.close(time);
        self.reset();
        out
    }

    fn open(&mut self, tone: Tone, amplitude: f32, time: i64) {
        self.last = Some(tone);
        self.begin = time;
        self.amplitude_sum = 0.0;
        self.readings = 0;
        self.accumulate(amplitude);
    }

    #[inline]
    fn accumulate(&mut self, amplitude: f32) {
        self.amplitude_sum += amplitude as f64;
        self.readings += 1;
    }

    fn close(&self, time: i64) -> Option<ToneEvent> {
        let tone = self.last?;
        let amplitude = (self.amplitude_sum / u32::max(self.readings, 1) as f64) as f32;
        Some(ToneEvent::new(tone, self.begin, time, amplitude, 0))
    }
}
