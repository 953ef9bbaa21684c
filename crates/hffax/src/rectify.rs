//! Image rectification
//!
//! Received pages are often skewed. If the receiver's idea of
//! the line length differs from the transmitter's, even by a few
//! parts per million, each row starts a little earlier or later
//! than the one above it. Many fax charts carry a dark calibration
//! bar at the same position on every row; the bar makes the skew
//! visible and correctable.
//!
//! The [`FaxRectifier`] works in several passes:
//!
//! 1. Find the top block of start-phasing rows, if any.
//! 2. Estimate the length of the calibration bar from a
//!    histogram of bar scans over bands of four rows.
//! 3. Scan each row for the bar. Contiguous runs of rows with a
//!    bar form *parts*.
//! 4. Fit a straight line of bar end vs. row over each part.
//!    Parts which do not fit are bisected, and good halves steal
//!    rows from bad ones.
//! 5. Rotate every row of every good part left by its fitted bar
//!    end. The bar then lines up with the right edge of the page.
//!
//! The [`ImageRectifier`] is a simpler alternative which aligns
//! each row with the rows above it by correlation.

#[cfg(not(test))]
use log::{debug, info};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;

use std::ops::Range;

use thiserror::Error;

use crate::page::Page;
use crate::waveform::{is_about, start_black_pixels, start_white_pixels};

mod bar;
mod correlate;
mod parts;

pub use bar::{Bar, BarPolicy, BarScanner, ExpectBeginLength, ExpectLength, Longest};
pub use correlate::ImageRectifier;

use parts::{settle, PartFit};

/// Rectification failed
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RectifyErr {
    /// The page is too small to contain a calibration bar
    #[error("page of {width}×{height} pixels is too small to rectify")]
    TooSmall {
        /// Page width
        width: usize,
        /// Page height
        height: usize,
    },

    /// No calibration bar was found
    #[error("no calibration bar found")]
    NoBar,
}

/// Summary of a rectification pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RectifyReport {
    /// Last row of the start-phasing block, if found
    pub top_block: Option<usize>,

    /// Estimated calibration bar length, in pixels
    pub bar_length: usize,

    /// Parts which were rectified, as row ranges
    pub parts: Vec<Range<usize>>,
}

impl RectifyReport {
    /// Total rows rectified
    pub fn rows(&self) -> usize {
        self.parts.iter().map(|p| p.len()).sum()
    }
}

/// Calibration-bar rectifier
#[derive(Clone, Debug, Default)]
pub struct FaxRectifier {}

impl FaxRectifier {
    /// New rectifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Rectify `page` in place
    ///
    /// Rows outside of any good part are left untouched.
    pub fn rectify(&self, page: &mut Page) -> Result<RectifyReport, RectifyErr> {
        let (width, height) = (page.width(), page.height());
        if width < Self::MIN_WIDTH || height <= Self::BAND {
            return Err(RectifyErr::TooSmall { width, height });
        }

        let top_block = find_top_block(page);
        debug!("rectify: top block ends at {:?}", top_block);
        let first = top_block.map(|t| t + 1).unwrap_or(0);

        let bar_length = find_bar_length(page, first).ok_or(RectifyErr::NoBar)?;
        debug!("rectify: bar length is {} px", bar_length);

        let ends = find_bar_ends(page, first, bar_length);
        let mut work = runs(&ends);
        work.reverse();

        let mut fits: Vec<PartFit> = vec![];
        while let Some(rows) = work.pop() {
            settle(&ends, rows, &mut fits);
        }

        for fit in &fits {
            for y in fit.rows.clone() {
                let shift = fit.end_at(y).rem_euclid(width as i64) as usize;
                page.rotate_row_left(y, shift);
            }
        }

        let report = RectifyReport {
            top_block,
            bar_length,
            parts: fits.into_iter().map(|f| f.rows).collect(),
        };
        info!(
            "rectify: {} of {} rows in {} parts",
            report.rows(),
            height,
            report.parts.len()
        );
        Ok(report)
    }

    // rows scanned together
    const BAND: usize = 4;

    const MIN_WIDTH: usize = 32;
}

// Last row of the start-phasing block at the top of the page
fn find_top_block(page: &Page) -> Option<usize> {
    const BAND: usize = FaxRectifier::BAND;
    const SEARCH_ROWS: usize = 100;

    let expect = start_black_pixels(page.width()) as i64;
    let mut tolerant = BarScanner::new(page.width(), 1, Longest);
    let mut strict = BarScanner::new(page.width(), 0, Longest);
    let is_phasing = |scanner: &mut BarScanner<Longest>, line: usize| {
        scanner
            .max_bar(page, line, BAND)
            .map(|bar| is_about(expect, bar.length as i64, 10))
            .unwrap_or(false)
    };

    let limit = usize::min(SEARCH_ROWS, page.height());
    let mut top = None;
    let mut line = 0;
    while line + BAND <= limit {
        if is_phasing(&mut tolerant, line) {
            top = Some(line + BAND - 1);
            line += BAND;
        } else if top.is_some() {
            // the block may end partway through this band
            for back in 1..BAND {
                if is_phasing(&mut strict, line - back) {
                    return Some(line - back + BAND - 1);
                }
            }
            return top;
        } else {
            line += 1;
        }
    }
    top
}

// Most common bar length below the top block
fn find_bar_length(page: &Page, first: usize) -> Option<usize> {
    const BAND: usize = FaxRectifier::BAND;

    let width = page.width();
    let min_len = width / 60;
    let max_len = width / 8;
    let mut scanner = BarScanner::new(
        width,
        1,
        ExpectBeginLength {
            length: start_white_pixels(width),
            begin: start_black_pixels(width),
        },
    );

    let mut count = vec![0u32; max_len];
    let mut line = first;
    while line + BAND <= page.height() {
        if let Some(bar) = scanner.max_bar(page, line, BAND) {
            if bar.length > min_len && bar.length < max_len {
                count[bar.length] += 1;
            }
        }
        line += BAND;
    }

    let mut best = None;
    let mut max = 0;
    for (len, n) in count.iter().enumerate() {
        if *n > max {
            max = *n;
            best = Some(len);
        }
    }
    best
}

// Unwrapped bar end for each row, if the row has a bar
fn find_bar_ends(page: &Page, first: usize, bar_length: usize) -> Vec<Option<i64>> {
    const ERR_PERCENT: i64 = 15;

    let width = page.width() as i64;
    let mut scanner = BarScanner::new(page.width(), 0, ExpectLength(bar_length));
    let mut out = vec![None; page.height()];
    let mut prev: Option<i64> = None;
    for (y, slot) in out.iter_mut().enumerate().skip(first) {
        let bar = scanner
            .max_bar(page, y, 1)
            .filter(|bar| is_about(bar_length as i64, bar.length as i64, ERR_PERCENT));
        *slot = bar.map(|bar| {
            let mut end = bar.end() as i64;
            if let Some(prev) = prev {
                while end - prev > width / 2 {
                    end -= width;
                }
                while prev - end > width / 2 {
                    end += width;
                }
            }
            end
        });
        prev = *slot;
    }
    out
}

// Contiguous runs of rows with a bar
fn runs(ends: &[Option<i64>]) -> Vec<Range<usize>> {
    let mut out = vec![];
    let mut start = None;
    for (y, end) in ends.iter().enumerate() {
        match (start, end) {
            (None, Some(_)) => start = Some(y),
            (Some(s), None) => {
                out.push(s..y);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(s..ends.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::page::{BLACK, WHITE};

    const WIDTH: usize = 400;
    const HEIGHT: usize = 128;
    const TOP: usize = 8;
    const BAR: usize = 10;

    // phasing rows, then a skewed bar on white
    fn skewed_page(begin: impl Fn(usize) -> usize) -> Page {
        let mut page = Page::from_raw(WIDTH, HEIGHT, vec![WHITE; WIDTH * HEIGHT]).expect("size");
        let black = start_black_pixels(WIDTH);
        for y in 0..HEIGHT {
            let row = page.row_mut(y);
            if y < TOP {
                row[..black].fill(BLACK);
            } else {
                let b = begin(y);
                for x in b..b + BAR {
                    row[x % WIDTH] = BLACK;
                }
            }
        }
        page
    }

    fn assert_aligned(page: &Page, rows: Range<usize>) {
        for y in rows {
            let row = page.row(y);
            assert!(
                row[WIDTH - BAR..].iter().all(|px| *px == BLACK),
                "row {} not aligned",
                y
            );
            assert_eq!(WHITE, row[WIDTH - BAR - 1], "row {}", y);
            assert_eq!(BAR, row.iter().filter(|px| **px == BLACK).count());
        }
    }

    #[test]
    fn test_runs() {
        let ends = vec![None, Some(1), Some(2), None, None, Some(3)];
        assert_eq!(vec![1..3, 5..6], runs(&ends));
        assert!(runs(&[None, None]).is_empty());
    }

    #[test]
    fn test_top_block() {
        let page = skewed_page(|y| y + 22);
        assert_eq!(Some(TOP - 1), find_top_block(&page));

        let plain = Page::from_raw(WIDTH, 16, vec![WHITE; WIDTH * 16]).expect("size");
        assert_eq!(None, find_top_block(&plain));
    }

    #[test]
    fn test_rectify_skew() {
        let mut page = skewed_page(|y| y + 22);
        let report = FaxRectifier::new().rectify(&mut page).expect("failed");
        assert_eq!(Some(TOP - 1), report.top_block);
        assert!(report.bar_length == BAR || report.bar_length == BAR - 1);
        assert_eq!(vec![TOP..HEIGHT], report.parts);
        assert_eq!(HEIGHT - TOP, report.rows());
        assert_aligned(&page, TOP..HEIGHT);

        // phasing rows are untouched
        assert_eq!(BLACK, page.row(0)[0]);
        assert_eq!(WHITE, page.row(0)[WIDTH - 1]);
    }

    #[test]
    fn test_rectify_broken_part() {
        // the bar jumps at row 80
        let mut page = skewed_page(|y| if y < 80 { y + 22 } else { y + 180 });
        let report = FaxRectifier::new().rectify(&mut page).expect("failed");
        assert_eq!(vec![TOP..80, 80..HEIGHT], report.parts);
        assert_aligned(&page, TOP..HEIGHT);
    }

    #[test]
    fn test_rectify_errors() {
        let mut page = Page::new(10, 10);
        assert_eq!(
            Err(RectifyErr::TooSmall {
                width: 10,
                height: 10
            }),
            FaxRectifier::new().rectify(&mut page)
        );

        let mut page = Page::from_raw(WIDTH, 20, vec![WHITE; WIDTH * 20]).expect("size");
        assert_eq!(Err(RectifyErr::NoBar), FaxRectifier::new().rectify(&mut page));
    }
}
