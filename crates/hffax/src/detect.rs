//! Background fax signal detection
//!
//! The [`SignalDetector`] estimates whether a fax signal is
//! present by measuring how much of the audio power falls in the
//! fax band around the black and white tones. The measurement is
//! advisory: it is logged and reported, but it does not start or
//! stop page capture.
//!
//! Blocks of audio are analyzed on one background thread. The
//! job queue holds a single block. If the worker is still busy
//! when the next block is ready, that block is dropped.

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::{self, JoinHandle};

use num_complex::Complex;
use rustfft::FftPlanner;

#[cfg(not(test))]
use log::{debug, trace};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as trace;

use crate::waveform::{micros, BLACK_HZ, WHITE_HZ};

/// One signal measurement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Time at the end of the analyzed block (µs)
    pub time: i64,

    /// Fraction of the block's power in the fax band, `0.0..=1.0`
    pub band_ratio: f32,

    /// True if the band ratio indicates a fax signal
    pub present: bool,
}

/// Advisory FFT signal detector
///
/// Feed audio with [`input()`](#method.input) and collect
/// results with [`poll()`](#method.poll). Dropping the
/// detector stops its worker thread.
#[derive(Debug)]
pub struct SignalDetector {
    sample_rate: u32,
    block: Vec<f32>,
    count: u64,
    jobs: Option<SyncSender<Job>>,
    results: Receiver<Detection>,
    worker: Option<JoinHandle<()>>,
    dropped: u64,
}

#[derive(Debug)]
struct Job {
    samples: Vec<f32>,
    time: i64,
}

impl SignalDetector {
    /// New detector for audio at `sample_rate` Hz
    ///
    /// Spawns the worker thread.
    pub fn new(sample_rate: u32) -> Self {
        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(1);
        let (result_tx, result_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("hffax-detect".to_owned())
            .spawn(move || run_worker(sample_rate, job_rx, result_tx))
            .ok();
        if worker.is_none() {
            debug!("detect: unable to spawn worker; detection disabled");
        }

        Self {
            sample_rate,
            block: Vec::with_capacity(Self::BLOCK_LEN),
            count: 0,
            jobs: worker.as_ref().map(|_| job_tx),
            results: result_rx,
            worker,
            dropped: 0,
        }
    }

    /// Accumulate audio samples
    ///
    /// Every full block is submitted to the worker, unless the
    /// worker is busy.
    pub fn input(&mut self, samples: &[f32]) {
        for sa in samples {
            self.block.push(*sa);
            self.count += 1;
            if self.block.len() >= Self::BLOCK_LEN {
                self.submit();
            }
        }
    }

    /// Next available measurement, if any
    pub fn poll(&mut self) -> Option<Detection> {
        match self.results.try_recv() {
            Ok(det) => Some(det),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for every submitted block to be analyzed
    ///
    /// Stops the worker and returns all outstanding results.
    pub fn finish(&mut self) -> Vec<Detection> {
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("detect: worker panicked");
            }
        }
        self.results.try_iter().collect()
    }

    /// Blocks dropped because the worker was busy
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn submit(&mut self) {
        let samples = std::mem::replace(&mut self.block, Vec::with_capacity(Self::BLOCK_LEN));
        let job = Job {
            samples,
            time: micros(self.count, self.sample_rate),
        };
        let jobs = match &self.jobs {
            Some(jobs) => jobs,
            None => return,
        };
        match jobs.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!("detect: worker busy, dropped block");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.jobs = None;
            }
        }
    }

    /// Samples per analysis block
    pub const BLOCK_LEN: usize = 4096;
}

impl Drop for SignalDetector {
    fn drop(&mut self) {
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(sample_rate: u32, jobs: Receiver<Job>, results: mpsc::Sender<Detection>) {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(SignalDetector::BLOCK_LEN);
    let mut buf = vec![Complex::default(); SignalDetector::BLOCK_LEN];

    while let Ok(job) = jobs.recv() {
        for (out, sa) in buf.iter_mut().zip(job.samples.iter()) {
            *out = Complex::new(*sa, 0.0);
        }
        fft.process(&mut buf);
        let band_ratio = band_power_ratio(&buf, sample_rate);
        let det = Detection {
            time: job.time,
            band_ratio,
            present: band_ratio >= PRESENT_RATIO,
        };
        trace!("detect: {:?}", det);
        if results.send(det).is_err() {
            break;
        }
    }
}

// fraction of spectral power in the fax band
fn band_power_ratio(spectrum: &[Complex<f32>], sample_rate: u32) -> f32 {
    let n = spectrum.len();
    let hz_per_bin = sample_rate as f32 / n as f32;
    let lo = ((BLACK_HZ - BAND_MARGIN_HZ) / hz_per_bin).floor() as usize;
    let hi = ((WHITE_HZ + BAND_MARGIN_HZ) / hz_per_bin).ceil() as usize;

    let mut total = 0.0f64;
    let mut band = 0.0f64;
    for (bin, v) in spectrum.iter().enumerate().take(n / 2).skip(1) {
        let p = v.norm_sqr() as f64;
        total += p;
        if bin >= lo && bin <= hi {
            band += p;
        }
    }
    if total > 0.0 {
        (band / total) as f32
    } else {
        0.0
    }
}

// band edges beyond the nominal tones (Hz)
const BAND_MARGIN_HZ: f32 = 200.0;

// band ratio which indicates a fax signal
const PRESENT_RATIO: f32 = 0.6;

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::modulate_tones;

    #[test]
    fn test_detects_fax_tones() {
        let audio = modulate_tones(&[(BLACK_HZ, 400_000), (WHITE_HZ, 400_000)], 11025);
        let mut uut = SignalDetector::new(11025);
        uut.input(&audio);
        let results = uut.finish();
        assert!(!results.is_empty());
        assert!(results.iter().all(|d| d.present), "{:?}", results);
        assert!(results.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_rejects_other_tones() {
        let audio = modulate_tones(&[(600.0, 800_000)], 11025);
        let mut uut = SignalDetector::new(11025);
        uut.input(&audio);
        let results = uut.finish();
        assert!(!results.is_empty());
        assert!(results.iter().all(|d| !d.present), "{:?}", results);
        assert_eq!(None, uut.poll());
    }

    #[test]
    fn test_band_ratio() {
        let mut spectrum = vec![Complex::default(); 1024];
        assert_eq!(0.0, band_power_ratio(&spectrum, 8000));

        // 1500 Hz at 8000 Hz / 1024 bins
        spectrum[192] = Complex::new(10.0, 0.0);
        spectrum[20] = Complex::new(10.0, 0.0);
        let ratio = band_power_ratio(&spectrum, 8000);
        assert!((ratio - 0.5).abs() < 1e-6);
    }
}
