use crate::receiver::FaxReceiver;
use crate::sync::DetectorKind;
use crate::waveform::{pixels_per_line, IOC_576};

/// Builds a weatherfax receiver
///
/// The builder comes with a sensible set of default options.
/// All you really need to provide is the input sampling
/// rate. The [`FaxReceiver`](struct.FaxReceiver.html) was
/// designed around a sampling rate of 11025 Hz, but any
/// rate comfortably above twice the white tone frequency
/// will do.
///
/// The API specified by the builder is part of this crate's
/// API. The actual default values are *not*, however, and
/// are subject to revision in any minor release. If you
/// care very strongly about a setting, be sure to configure
/// it here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaxReceiverBuilder {
    input_rate: u32,
    width: usize,
    detector: DetectorKind,
    signal_detector: bool,
}

impl FaxReceiverBuilder {
    /// New receiver chain with "sensible" defaults
    ///
    /// The only mandatory parameter is the input sampling
    /// rate, in Hz.
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate: u32::max(input_rate, Self::MIN_INPUT_RATE),
            width: pixels_per_line(IOC_576),
            detector: DetectorKind::default(),
            signal_detector: false,
        }
    }

    /// Build a receiver chain
    ///
    /// Once built, the receiver chain is immediately ready to
    /// process samples.
    pub fn build(&self) -> FaxReceiver {
        FaxReceiver::from(self)
    }

    /// Image width, in pixels
    ///
    /// Each received line is scaled to `width` pixels. The
    /// width is clamped to at least 64 pixels.
    pub fn with_width(&mut self, width: usize) -> &mut Self {
        self.width = usize::max(width, Self::MIN_WIDTH);
        self
    }

    /// Image width from an index of cooperation
    ///
    /// The width is `π × ioc`. The standard IOC for HF
    /// weatherfax is 576.
    pub fn with_ioc(&mut self, ioc: u32) -> &mut Self {
        self.with_width(pixels_per_line(ioc))
    }

    /// Start-phasing detector
    ///
    /// Selects the algorithm which recognizes start phasing
    /// and estimates the line geometry. See
    /// [`DetectorKind`](enum.DetectorKind.html).
    pub fn with_detector(&mut self, detector: DetectorKind) -> &mut Self {
        self.detector = detector;
        self
    }

    /// Enable or disable the background signal detector
    ///
    /// The signal detector reports whether audio in the fax
    /// band is present. Its findings are logged and do not
    /// affect page capture. It runs on its own thread.
    pub fn with_signal_detector(&mut self, enable: bool) -> &mut Self {
        self.signal_detector = enable;
        self
    }

    /// Input sampling rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Image width, in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Start-phasing detector
    pub fn detector(&self) -> DetectorKind {
        self.detector
    }

    /// True if the signal detector is enabled
    pub fn signal_detector(&self) -> bool {
        self.signal_detector
    }

    // white tone must be well below Nyquist
    const MIN_INPUT_RATE: u32 = 8000;

    const MIN_WIDTH: usize = 64;
}

impl std::default::Default for FaxReceiverBuilder {
    fn default() -> Self {
        Self::new(11025)
    }
}
