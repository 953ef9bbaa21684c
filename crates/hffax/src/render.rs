//! Page rendering

#[cfg(not(test))]
use log::{debug, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

use crate::page::{Page, BLACK, WHITE};
use crate::sync::LineGeometry;
use crate::tone::{Tone, ToneEvent};

/// Paints tone events into a page
///
/// The page background is black. Each WHITE event is painted
/// from the (row, column) of its beginning to the (row, column)
/// of its end. Rows in between are painted across their full
/// width. Events of other tones only advance the row count.
///
/// Storage for `2 × width` rows is allocated when a page
/// starts, which permits pages twice as tall as they are wide.
/// Anything beyond that is clipped.
#[derive(Clone, Debug)]
pub struct Renderer {
    width: usize,
    geometry: Option<LineGeometry>,
    pixels: Vec<u8>,
    rows: usize,
    clipped: bool,
}

impl Renderer {
    /// New renderer for pages `width` pixels wide
    pub fn new(width: usize) -> Self {
        assert!(width > 0);
        Self {
            width,
            geometry: None,
            pixels: Vec::new(),
            rows: 0,
            clipped: false,
        }
    }

    /// Page width, in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row capacity of a page
    pub fn capacity(&self) -> usize {
        2 * self.width
    }

    /// Rows painted so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// True if a page is in progress
    pub fn is_active(&self) -> bool {
        self.geometry.is_some()
    }

    /// Begin a new page
    ///
    /// Any page in progress is discarded.
    pub fn start(&mut self, geometry: LineGeometry) {
        self.pixels.clear();
        self.pixels.resize(self.capacity() * self.width, BLACK);
        self.geometry = Some(geometry);
        self.rows = 0;
        self.clipped = false;
    }

    /// Replace the line geometry of the current page
    pub fn set_geometry(&mut self, geometry: LineGeometry) {
        if self.geometry.is_some() {
            self.geometry = Some(geometry);
        }
    }

    /// Paint one tone event
    pub fn tone(&mut self, event: &ToneEvent) {
        let geom = match self.geometry {
            Some(geom) => geom,
            None => return,
        };

        let (mut row0, mut col0) = geom.position(self.width, event.begin);
        let (row1, col1) = geom.position(self.width, event.end);
        if row1 < 0 {
            return;
        }
        if row0 < 0 {
            row0 = 0;
            col0 = 0;
        }

        let capacity = self.capacity() as i64;
        if row1 >= capacity && !self.clipped {
            warn!("render: page exceeds {} rows; clipping", capacity);
            self.clipped = true;
        }
        let last_row = i64::min(row1, capacity - 1);
        let touched = if col1 == 0 { row1 } else { row1 + 1 };
        self.rows = usize::max(self.rows, i64::clamp(touched, 0, capacity) as usize);

        if event.tone != Tone::White {
            return;
        }

        for row in row0..=last_row {
            let begin = if row == row0 { col0 } else { 0 };
            let end = if row == row1 { col1 } else { self.width };
            if begin < end {
                let offset = row as usize * self.width;
                self.pixels[offset + begin..offset + end].fill(WHITE);
            }
        }
    }

    /// Finish the current page
    ///
    /// Returns the page, cropped to the rows painted, or `None`
    /// if no page is in progress or nothing was painted.
    pub fn finish(&mut self) -> Option<Page> {
        self.geometry.take()?;
        let rows = std::mem::take(&mut self.rows);
        let mut pixels = std::mem::take(&mut self.pixels);
        if rows == 0 {
            return None;
        }

        pixels.truncate(rows * self.width);
        debug!("render: page complete, {}×{}", self.width, rows);
        Page::from_raw(self.width, rows, pixels).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::events_from_runs;

    #[test]
    fn test_paints_white() {
        // 10 µs per pixel
        let geom = LineGeometry::new(100, 1000).expect("bad geometry");
        let mut uut = Renderer::new(10);
        assert_eq!(None, uut.finish());
        uut.start(geom);
        assert!(uut.is_active());

        let evts = events_from_runs(
            1000,
            &[
                (Tone::Black, 20),
                (Tone::White, 30),
                (Tone::Black, 80),
                (Tone::White, 170),
            ],
        );
        for evt in &evts {
            uut.tone(evt);
        }
        assert_eq!(3, uut.rows());

        let page = uut.finish().expect("no page");
        assert!(!uut.is_active());
        assert_eq!(10, page.width());
        assert_eq!(3, page.height());
        assert_eq!(&[0, 0, 255, 255, 255, 0, 0, 0, 0, 0], page.row(0));
        assert_eq!(&[0, 0, 0, 255, 255, 255, 255, 255, 255, 255], page.row(1));
        assert_eq!(&[255; 10], page.row(2));
    }

    #[test]
    fn test_clips_tall_pages() {
        let geom = LineGeometry::new(100, 0).expect("bad geometry");
        let mut uut = Renderer::new(4);
        uut.start(geom);
        let evts = events_from_runs(-50, &[(Tone::White, 2_000)]);
        uut.tone(&evts[0]);
        let page = uut.finish().expect("no page");
        assert_eq!(8, page.height());
        assert!(page.pixels().iter().all(|px| *px == WHITE));
    }

    #[test]
    fn test_inactive_ignores_events() {
        let mut uut = Renderer::new(4);
        let evts = events_from_runs(0, &[(Tone::White, 2_000)]);
        uut.tone(&evts[0]);
        assert_eq!(0, uut.rows());
        assert_eq!(None, uut.finish());
    }
}
