//! # hffax: HF Radio Facsimile Demodulation
//!
//! This crate provides a demodulator for HF radio facsimile, better
//! known as *weatherfax*. Coastal and military stations broadcast
//! weather charts as audio-frequency tones on the HF bands. This
//! crate turns the audio into page images.
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! This crate has not been certified for any purpose. Do not rely on
//! it for navigation or for the safety of life at sea. Always have an
//! official source of weather information available.
//!
//! ## Example
//!
//! You will first need to recover *audio* from an HF receiver tuned
//! to a fax station in upper sideband, about 1.9 kHz below the
//! published carrier frequency. Obtaining the audio is beyond the
//! scope of this crate. If you have a stereo signal, mix to mono
//! first.
//!
//! ```
//! use hffax::{DetectorKind, FaxEvent, FaxReceiverBuilder};
//!
//! # let some_audio_source_iterator = || std::iter::once(0.0f32);
//! #
//! // create a FaxReceiver with your audio sampling rate
//! let mut rx = FaxReceiverBuilder::new(11025)
//!     .with_ioc(576)                       // image width is π × IOC pixels
//!     .with_detector(DetectorKind::Matcher) // start phasing detector
//!     .build();
//!
//! // let audiosrc be an iterator which outputs audio samples,
//! // such as a BufReader bound to stdin or a file, in f32
//! // format at the sampling rate (here 11025 Hz)
//! let audiosrc = some_audio_source_iterator();
//! for evt in rx.iter(audiosrc) {
//!     match evt {
//!         FaxEvent::PageStarted(geom) => {
//!             println!("page started, line length {} µs", geom.line_length);
//!         }
//!         FaxEvent::PageReady(page) => {
//!             println!("page complete: {}×{}", page.width(), page.height());
//!         }
//!         _ => {}
//!     }
//! }
//!
//! // the last page ends with the audio
//! if let Some(page) = rx.flush() {
//!     println!("page complete: {}×{}", page.width(), page.height());
//! }
//! ```
//!
//! The digital receiver is created via a
//! [builder](struct.FaxReceiverBuilder.html).
//!
//! The [`FaxReceiver`](struct.FaxReceiver.html) binds by iterator to any
//! source of `f32` PCM mono (1-channel) audio samples. If you're using `i16`
//! samples (as most sound cards do), you'll need to cast them to `f32`.
//! There is no need to scale them.
//!
//! ## Rectification
//!
//! If the receiver's sound card clock and the transmitter disagree about
//! the length of a line, the page comes out skewed: each row begins a
//! little to the left or right of the one above it. Many charts carry a
//! dark calibration bar down one side, and the
//! [`FaxRectifier`](struct.FaxRectifier.html) uses it to straighten the
//! page.
//!
//! ```
//! use hffax::{FaxRectifier, Page, RectifyErr};
//!
//! let mut page = Page::new(10, 10);
//! let err = FaxRectifier::new().rectify(&mut page).unwrap_err();
//! assert!(matches!(err, RectifyErr::TooSmall { .. }));
//! ```
//!
//! The [`ImageRectifier`](struct.ImageRectifier.html) is a simpler
//! alternative which does not need a bar.
//!
//! ## Background
//!
//! A fax transmission is a sequence of scan lines, usually two per
//! second. Black and white are sent as tones of 1500 Hz and 2300 Hz,
//! with grays in between. Each transmission begins with *start
//! phasing*: lines which are almost entirely black, with a short white
//! pulse at the end. Phasing tells the receiver when each line begins.
//! A *stop tone*, alternating black and white 225 times per line,
//! ends the transmission.
//!
//! The width of the image, in pixels, is π times the *index of
//! cooperation* (IOC). Nearly all weatherfax stations use IOC 576.

mod adjuster;
mod bestfit;
mod builder;
mod corrector;
mod detect;
mod freqcount;
mod matcher;
mod page;
mod receiver;
mod rectify;
mod render;
mod sync;
mod tone;
mod waveform;

pub use adjuster::LineAdjuster;
pub use bestfit::BestFitLine;
pub use builder::FaxReceiverBuilder;
pub use corrector::LineCorrector;
pub use detect::{Detection, SignalDetector};
pub use freqcount::{FrequencyCounter, FrequencyReading};
pub use matcher::{PatternMatcher, StartMatcher, StopMatcher};
pub use page::{Page, PageSizeErr, BLACK, WHITE};
pub use receiver::{FaxEvent, FaxReceiver, SourceIter};
pub use rectify::{
    Bar, BarPolicy, BarScanner, ExpectBeginLength, ExpectLength, FaxRectifier, ImageRectifier,
    Longest, RectifyErr, RectifyReport,
};
pub use render::Renderer;
pub use sync::{
    correct, AdjustingDetector, DetectorKind, FaxSynchronizer, LineGeometry, MatcherDetector,
    RatioDetector, StartDetector, StopReason, SyncEvent, SyncState,
};
pub use tone::{Tone, ToneClassifier, ToneEvent};
pub use waveform::{pixels_per_line, IOC_576, LINE_LEN};
