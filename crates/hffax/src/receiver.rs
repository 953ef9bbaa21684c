//! Full receiver chain

#[cfg(not(test))]
use log::{info, trace};

#[cfg(test)]
use std::println as trace;
#[cfg(test)]
use std::println as info;

use std::convert::From;
use std::iter::{IntoIterator, Iterator};

use crate::builder::FaxReceiverBuilder;
use crate::corrector::LineCorrector;
use crate::detect::SignalDetector;
use crate::freqcount::FrequencyCounter;
use crate::page::Page;
use crate::render::Renderer;
use crate::sync::{FaxSynchronizer, LineGeometry, StopReason, SyncEvent};
use crate::tone::{ToneClassifier, ToneEvent};

/// Receiver event
///
/// Emitted by the [`SourceIter`](struct.SourceIter.html)
/// whenever a page begins, changes geometry, or ends.
#[derive(Clone, Debug, PartialEq)]
pub enum FaxEvent {
    /// Start phasing detected; a new page begins
    PageStarted(LineGeometry),

    /// Line geometry refined during the phasing rows
    Adjusted(LineGeometry),

    /// Page complete
    ///
    /// The page ended with a stop tone, an explicit
    /// [`stop()`](struct.FaxReceiver.html#method.stop), or
    /// the end of input.
    PageReady(Page),
}

/// A complete weatherfax receiver chain
///
/// The receive chain takes `f32` audio samples and
/// performs the following operations:
///
/// 1. Zero-crossing frequency estimation
/// 2. Classification into black, white, and control tones
/// 3. Run-length noise correction
/// 4. Start phasing detection and line synchronization
/// 5. Rendering of white runs onto the page
///
/// An optional signal detector runs on a separate thread and
/// reports whether fax tones are present.
///
/// To create the receiver, first create its Builder:
///
/// ```
/// use hffax::FaxReceiverBuilder;
///
/// let mut builder = FaxReceiverBuilder::default();
/// let receiver = builder.build();
/// assert_eq!(receiver.input_rate(), 11025);
/// ```
///
/// See [module documentation](index.html) for details.
#[derive(Debug)]
pub struct FaxReceiver {
    counter: FrequencyCounter,
    classifier: ToneClassifier,
    corrector: LineCorrector,
    sync: FaxSynchronizer,
    renderer: Renderer,
    signal: Option<SignalDetector>,
    signal_present: Option<bool>,
    input_rate: u32,
}

impl FaxReceiver {
    /// Receive fax pages from a source of audio
    ///
    /// Bind an iterator which will consume the `input` and
    /// produce [`FaxEvent`](enum.FaxEvent.html)s.
    ///
    /// The `input` must be f32 PCM mono audio at the
    /// [`input_rate()`](#method.input_rate) for this receiver.
    /// Sound cards commonly output audio samples in `i16`
    /// format. You must perform the conversion to floating-point
    /// yourself, if needed. It is unnecessary to scale the
    /// converted values.
    ///
    /// The iterator will consume as many samples of `input`
    /// that are required to produce the next event. It will
    /// return `None` if the input is exhausted and there
    /// are no new events. A page in progress at the end of
    /// input is *not* emitted; call
    /// [`flush()`](#method.flush) to obtain it.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter<'rx, I, T>(&'rx mut self, input: I) -> SourceIter<'rx, T>
    where
        I: IntoIterator<Item = f32> + IntoIterator<IntoIter = T>,
        T: Iterator<Item = f32>,
    {
        SourceIter {
            source: input.into_iter(),
            receiver: self,
        }
    }

    /// Input sampling rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Image width, in pixels
    pub fn width(&self) -> usize {
        self.renderer.width()
    }

    /// Lifetime total input sample counter
    pub fn input_sample_counter(&self) -> u64 {
        self.counter.count()
    }

    /// Line geometry of the page in progress, if any
    pub fn geometry(&self) -> Option<LineGeometry> {
        self.sync.geometry()
    }

    /// True if the signal detector last reported fax tones
    ///
    /// Returns `None` if the signal detector is disabled or
    /// has not yet reported.
    pub fn signal_present(&self) -> Option<bool> {
        self.signal_present
    }

    /// Clear all states and reset to zero initial conditions
    ///
    /// Any page in progress is discarded.
    pub fn reset(&mut self) {
        self.counter.reset();
        self.classifier.reset();
        self.corrector.reset();
        self.sync.reset();
        let _ = self.renderer.finish();
        if self.signal.is_some() {
            self.signal = Some(SignalDetector::new(self.input_rate));
        }
        self.signal_present = None;
    }

    /// End the page in progress
    ///
    /// Returns the page, if one was in progress and anything
    /// was painted on it. The receiver goes back to searching
    /// for start phasing.
    pub fn stop(&mut self) -> Option<Page> {
        self.end_page(StopReason::Requested)
    }

    /// Flush buffered tones and emit the last page
    ///
    /// The classifier and corrector each hold back the run in
    /// progress until the tone changes. At the end of input,
    /// this method pushes those runs through the chain and then
    /// finishes the page in progress. Returns the last page
    /// completed, if any. The signal detector, if enabled,
    /// reports its remaining results and stops until the next
    /// [`reset()`](#method.reset).
    ///
    /// You probably want to [`reset()`](#method.reset) after
    /// calling this method.
    pub fn flush(&mut self) -> Option<Page> {
        let mut out = None;
        let now = self.counter.micros();
        let held = self
            .classifier
            .flush(now)
            .and_then(|evt| self.corrector.input(&evt));
        for evt in held.into_iter().chain(self.corrector.flush()) {
            if let Some(FaxEvent::PageReady(page)) = self.process_tone(&evt) {
                out = Some(page);
            }
        }
        if let Some(page) = self.end_page(StopReason::EndOfInput) {
            out = Some(page);
        }
        if let Some(signal) = &mut self.signal {
            for det in signal.finish() {
                trace!("signal: {:?}", det);
                self.signal_present = Some(det.present);
            }
        }
        out
    }

    // Process a single audio sample
    #[inline]
    fn process_sample(&mut self, sa: f32) -> Option<FaxEvent> {
        if self.signal.is_some() {
            self.process_signal(sa);
        }

        let reading = self.counter.input(sa)?;
        let tone = self
            .classifier
            .input(reading.frequency, reading.amplitude, reading.time)?;
        let corrected = self.corrector.input(&tone)?;
        self.process_tone(&corrected)
    }

    // Synchronize and render one corrected tone run
    fn process_tone(&mut self, event: &ToneEvent) -> Option<FaxEvent> {
        match self.sync.input(event) {
            Some(SyncEvent::Started(geom)) => {
                self.renderer.start(geom);
                self.renderer.tone(event);
                Some(FaxEvent::PageStarted(geom))
            }
            Some(SyncEvent::Adjusted(geom)) => {
                self.renderer.set_geometry(geom);
                self.renderer.tone(event);
                Some(FaxEvent::Adjusted(geom))
            }
            Some(SyncEvent::Stopped(_)) => self.renderer.finish().map(FaxEvent::PageReady),
            None => {
                self.renderer.tone(event);
                None
            }
        }
    }

    // Stop the synchronizer and take the page
    fn end_page(&mut self, reason: StopReason) -> Option<Page> {
        self.sync.stop(reason)?;
        self.renderer.finish()
    }

    // Feed the signal detector and log changes in its verdict
    fn process_signal(&mut self, sa: f32) {
        let signal = match &mut self.signal {
            Some(signal) => signal,
            None => return,
        };
        signal.input(&[sa]);
        if self.counter.count() % SignalDetector::BLOCK_LEN as u64 != 0 {
            return;
        }

        while let Some(det) = signal.poll() {
            if self.signal_present != Some(det.present) {
                if det.present {
                    info!(
                        "signal: fax tones present (band ratio {:.2})",
                        det.band_ratio
                    );
                } else {
                    info!("signal: fax tones absent (band ratio {:.2})", det.band_ratio);
                }
            }
            self.signal_present = Some(det.present);
        }
        if signal.dropped() > 0 && signal.dropped() % Self::DROP_LOG_INTERVAL == 0 {
            trace!("signal: {} blocks dropped", signal.dropped());
        }
    }

    // Log dropped detector blocks about this often
    const DROP_LOG_INTERVAL: u64 = 100;
}

impl From<&FaxReceiverBuilder> for FaxReceiver {
    /// Create the fax receiver from its Builder
    fn from(cfg: &FaxReceiverBuilder) -> Self {
        let input_rate = cfg.input_rate();
        let signal = if cfg.signal_detector() {
            Some(SignalDetector::new(input_rate))
        } else {
            None
        };

        Self {
            counter: FrequencyCounter::new(input_rate),
            classifier: ToneClassifier::new(),
            corrector: LineCorrector::new(),
            sync: FaxSynchronizer::new(cfg.detector().build()),
            renderer: Renderer::new(cfg.width()),
            signal,
            signal_present: None,
            input_rate,
        }
    }
}

/// Sample source iterator
///
/// This iterator is bound to a source of mono f32 PCM
/// audio samples. Calling the `next()` method will
/// return the next [`FaxEvent`](enum.FaxEvent.html)
/// from the receiver or `None` if the available samples
/// have been consumed without any new events.
#[derive(Debug)]
pub struct SourceIter<'rx, I>
where
    I: Iterator<Item = f32>,
{
    source: I,
    receiver: &'rx mut FaxReceiver,
}

impl<'rx, I> Iterator for SourceIter<'rx, I>
where
    I: Iterator<Item = f32>,
{
    type Item = FaxEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for sa in &mut self.source {
            if let Some(out) = self.receiver.process_sample(sa) {
                match &out {
                    FaxEvent::PageReady(page) => info!(
                        "receiver [{:<14}]: page ready, {}×{}",
                        self.receiver.input_sample_counter(),
                        page.width(),
                        page.height()
                    ),
                    evt => info!(
                        "receiver [{:<14}]: {:?}",
                        self.receiver.input_sample_counter(),
                        evt
                    ),
                }
                return Some(out);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::page::{BLACK, WHITE};
    use crate::sync::DetectorKind;
    use crate::waveform::{
        modulate_tones, phasing_runs, stop_runs, BLACK_HZ, LINE_LEN, WHITE_HZ,
    };

    const FS: u32 = 11025;
    const WIDTH: usize = 200;

    // white leader, start phasing, a half-white image, stop tone
    fn transmission(phasing_lines: usize, image_lines: usize, stop: bool) -> Vec<f32> {
        let mut runs = vec![(WHITE_HZ, 1_000_000)];
        runs.extend(phasing_runs(phasing_lines, LINE_LEN));
        for _i in 0..image_lines {
            runs.push((WHITE_HZ, LINE_LEN / 2));
            runs.push((BLACK_HZ, LINE_LEN / 2));
        }
        if stop {
            runs.extend(stop_runs(5_000_000));
            runs.push((WHITE_HZ, 1_000_000));
        }
        modulate_tones(&runs, FS)
    }

    fn receiver(detector: DetectorKind) -> FaxReceiver {
        FaxReceiverBuilder::new(FS)
            .with_width(WIDTH)
            .with_detector(detector)
            .build()
    }

    fn check_page(page: &Page) {
        assert_eq!(WIDTH, page.width());
        assert!(
            page.height() >= 70 && page.height() <= 82,
            "unexpected height {}",
            page.height()
        );

        // image rows are white on the left and black on the right
        let row = page.row(40);
        assert_eq!(WHITE, row[WIDTH / 4]);
        assert_eq!(BLACK, row[3 * WIDTH / 4]);
    }

    #[test]
    fn test_receive_page() {
        for detector in [
            DetectorKind::Matcher,
            DetectorKind::Ratio,
            DetectorKind::Adjusting,
        ] {
            let audio = transmission(20, 60, true);
            let mut rx = receiver(detector);
            let events: Vec<FaxEvent> = rx.iter(audio.into_iter()).collect();

            let geom = match events.first() {
                Some(FaxEvent::PageStarted(geom)) => *geom,
                other => panic!("{}: expected page start, got {:?}", detector, other),
            };
            assert!((geom.line_length - LINE_LEN).abs() <= 5_000);

            let pages: Vec<&Page> = events
                .iter()
                .filter_map(|evt| match evt {
                    FaxEvent::PageReady(page) => Some(page),
                    _ => None,
                })
                .collect();
            assert_eq!(1, pages.len(), "{}", detector);
            check_page(pages[0]);
            assert!(matches!(events.last(), Some(FaxEvent::PageReady(_))));

            // nothing left over
            assert_eq!(None, rx.flush());
            assert_eq!(None, rx.geometry());
        }
    }

    #[test]
    fn test_short_page_ends_at_stop_tone() {
        let audio = transmission(10, 20, true);
        let mut rx = receiver(DetectorKind::Ratio);
        let events: Vec<FaxEvent> = rx.iter(audio.into_iter()).collect();
        assert!(matches!(events.first(), Some(FaxEvent::PageStarted(_))));

        let pages: Vec<&Page> = events
            .iter()
            .filter_map(|evt| match evt {
                FaxEvent::PageReady(page) => Some(page),
                _ => None,
            })
            .collect();
        assert_eq!(1, pages.len());

        // phasing and image rows only; no stop tone rows
        let height = pages[0].height();
        assert!(height >= 20 && height <= 32, "unexpected height {}", height);
        let row = pages[0].row(height - 3);
        assert_eq!(WHITE, row[WIDTH / 4]);
        assert_eq!(BLACK, row[3 * WIDTH / 4]);
        assert_eq!(None, rx.flush());
    }

    #[test]
    fn test_flush_finishes_page() {
        let audio = transmission(20, 60, false);
        let mut rx = receiver(DetectorKind::default());
        let events: Vec<FaxEvent> = rx.iter(audio.into_iter()).collect();
        assert!(matches!(events.first(), Some(FaxEvent::PageStarted(_))));
        assert!(!events
            .iter()
            .any(|evt| matches!(evt, FaxEvent::PageReady(_))));
        assert!(rx.geometry().is_some());

        let page = rx.flush().expect("no page");
        check_page(&page);
        assert_eq!(None, rx.geometry());
    }

    #[test]
    fn test_stop_and_reset() {
        let audio = transmission(20, 10, false);
        let mut rx = receiver(DetectorKind::Ratio);
        let events: Vec<FaxEvent> = rx.iter(audio.into_iter()).collect();
        assert!(matches!(events.first(), Some(FaxEvent::PageStarted(_))));

        let page = rx.stop().expect("no page");
        assert_eq!(WIDTH, page.width());
        assert_eq!(None, rx.stop());

        rx.reset();
        assert_eq!(0, rx.input_sample_counter());
        assert_eq!(None, rx.flush());
    }

    #[test]
    fn test_signal_detector() {
        let audio = transmission(20, 4, false);
        let mut rx = FaxReceiverBuilder::new(FS)
            .with_width(WIDTH)
            .with_signal_detector(true)
            .build();
        assert_eq!(None, rx.signal_present());
        let _events: Vec<FaxEvent> = rx.iter(audio.into_iter()).collect();
        let _ = rx.flush();
        assert!(rx.signal_present().is_some());
    }

    #[test]
    fn test_noise_only() {
        let audio = modulate_tones(&[(800.0, 2_000_000), (WHITE_HZ, 2_000_000)], FS);
        let mut rx = receiver(DetectorKind::default());
        assert_eq!(0, rx.iter(audio.into_iter()).count());
        assert_eq!(None, rx.flush());
    }
}
