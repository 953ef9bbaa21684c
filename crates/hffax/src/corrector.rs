//! Run-length noise correction
//!
//! Radio noise flips isolated readings between black and
//! white. The [`LineCorrector`] folds short flips into the
//! surrounding run so that downstream blocks see clean runs.

use crate::tone::{Tone, ToneEvent};

/// Absorbs short noise runs into the dominant run
///
/// The corrector keeps one open run. An incoming event of the
/// same tone extends it. An event of a different tone is
/// treated as noise and absorbed if it is shorter than
/// 1000 µs *and* the run's error ratio, in permille, stays
/// below 20 after absorbing it. Otherwise the open run is
/// complete and is emitted.
#[derive(Clone, Debug, Default)]
pub struct LineCorrector {
    run: Option<Run>,
}

#[derive(Clone, Copy, Debug)]
struct Run {
    tone: Tone,
    begin: i64,
    length: i64,
    error: i64,

    // span-weighted amplitude sum, excluding absorbed noise
    amplitude_sum: f64,
    amplitude_weight: i64,
}

impl LineCorrector {
    /// New corrector with no open run
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the open run
    pub fn reset(&mut self) {
        self.run = None;
    }

    /// Process a classified tone run
    ///
    /// Returns the previous run, corrected, once it is known
    /// to be complete.
    pub fn input(&mut self, event: &ToneEvent) -> Option<ToneEvent> {
        let run = match self.run.as_mut() {
            Some(run) => run,
            None => {
                self.run = Some(Run::open(event));
                return None;
            }
        };

        if event.tone == run.tone {
            run.length += event.span;
            run.amplitude_sum += event.amplitude as f64 * event.span as f64;
            run.amplitude_weight += event.span;
            None
        } else if Self::is_noise(run, event.span) {
            run.length += event.span;
            run.error += event.span;
            None
        } else {
            let out = run.emit();
            self.run = Some(Run::open(event));
            Some(out)
        }
    }

    /// Emit the open run, if any
    ///
    /// Used at the end of input. The corrector is left empty.
    pub fn flush(&mut self) -> Option<ToneEvent> {
        self.run.take().map(|run| run.emit())
    }

    #[inline]
    fn is_noise(run: &Run, span: i64) -> bool {
        run.length > 0
            && span < Self::MAX_NOISE_SPAN
            && 1000 * (run.error + span) / run.length < Self::MAX_ERROR_PERMILLE
    }

    // longest run that may be absorbed as noise (µs)
    const MAX_NOISE_SPAN: i64 = 1000;

    // absorbed time may not reach this fraction of the run, in permille
    const MAX_ERROR_PERMILLE: i64 = 20;
}

impl Run {
    fn open(event: &ToneEvent) -> Self {
        Self {
            tone: event.tone,
            begin: event.begin,
            length: event.span,
            error: event.error,
            amplitude_sum: event.amplitude as f64 * event.span as f64,
            amplitude_weight: event.span,
        }
    }

    fn emit(&self) -> ToneEvent {
        let amplitude = if self.amplitude_weight > 0 {
            (self.amplitude_sum / self.amplitude_weight as f64) as f32
        } else {
            0.0
        };
        ToneEvent::new(
            self.tone,
            self.begin,
            self.begin + self.length,
            amplitude,
            self.error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::events_from_runs;

    fn correct_all(events: &[ToneEvent]) -> Vec<ToneEvent> {
        let mut uut = LineCorrector::new();
        let mut out: Vec<ToneEvent> = events.iter().filter_map(|e| uut.input(e)).collect();
        out.extend(uut.flush());
        out
    }

    #[test]
    fn test_first_event_opens_run() {
        let mut uut = LineCorrector::new();
        let evts = events_from_runs(0, &[(Tone::White, 300)]);
        assert_eq!(None, uut.input(&evts[0]));
        let out = uut.flush().expect("expected open run");
        assert_eq!(Tone::White, out.tone);
        assert_eq!(300, out.span);
        assert_eq!(0, out.error);
        assert_eq!(None, uut.flush());
    }

    #[test]
    fn test_absorbs_spike() {
        let evts = events_from_runs(
            1000,
            &[
                (Tone::Black, 100_000),
                (Tone::White, 500),
                (Tone::Black, 50_000),
                (Tone::White, 20_000),
            ],
        );
        let out = correct_all(&evts);
        assert_eq!(2, out.len());
        assert_eq!(Tone::Black, out[0].tone);
        assert_eq!(1000, out[0].begin);
        assert_eq!(150_500, out[0].span);
        assert_eq!(151_500, out[0].end);
        assert_eq!(500, out[0].error);
        assert_eq!(1.0, out[0].amplitude);
        assert_eq!(Tone::White, out[1].tone);
        assert_eq!(151_500, out[1].begin);
        assert_eq!(0, out[1].error);
    }

    #[test]
    fn test_absorbs_until_error_limit() {
        // 1000*(0+400)/20000 = 20 → not below the limit
        let evts = events_from_runs(0, &[(Tone::White, 20_000), (Tone::Black, 400)]);
        let out = correct_all(&evts);
        assert_eq!(2, out.len());

        // 1000*(0+399)/20000 = 19 → absorbed
        let evts = events_from_runs(0, &[(Tone::White, 20_000), (Tone::Black, 399)]);
        let out = correct_all(&evts);
        assert_eq!(1, out.len());
        assert_eq!(399, out[0].error);

        // error accumulates: the second spike pushes the ratio over
        let evts = events_from_runs(
            0,
            &[
                (Tone::White, 20_000),
                (Tone::Black, 300),
                (Tone::White, 100),
                (Tone::Black, 300),
                (Tone::White, 10_000),
            ],
        );
        let out = correct_all(&evts);
        assert_eq!(3, out.len());
        assert_eq!(Tone::White, out[0].tone);
        assert_eq!(20_400, out[0].span);
        assert_eq!(300, out[0].error);
        assert_eq!(Tone::Black, out[1].tone);
        assert_eq!(300, out[1].span);
    }

    #[test]
    fn test_long_runs_pass() {
        let evts = events_from_runs(
            0,
            &[
                (Tone::Black, 474_347),
                (Tone::White, 25_653),
                (Tone::Black, 474_347),
            ],
        );
        let out = correct_all(&evts);
        assert_eq!(evts, out);
    }
}
