//! Calibration bar scanning
//!
//! A [`BarScanner`] looks at a horizontal band of page rows and
//! finds runs of dark columns. The row is treated as circular, so
//! a bar which crosses the right edge of the page is reported as
//! one run which begins near the right edge and wraps around.
//! When a band contains several bars, a [`BarPolicy`] chooses
//! among them.

use std::fmt::Debug;

use crate::page::Page;

/// A run of dark columns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bar {
    /// First column of the bar, always less than the page width
    pub begin: usize,

    /// Length of the bar, in pixels
    ///
    /// `begin + length` may exceed the page width if the bar
    /// wraps around.
    pub length: usize,

    /// Length of the light run which precedes the bar
    pub negative: usize,
}

impl Bar {
    /// Column one past the end of the bar, unwrapped
    pub fn end(&self) -> usize {
        self.begin + self.length
    }
}

/// Ranks candidate bars
///
/// Higher scores are better.
pub trait BarPolicy: Debug {
    /// Score a candidate bar in a page `width` pixels wide
    fn score(&self, bar: &Bar, width: usize) -> i64;
}

/// Prefer the longest bar
#[derive(Clone, Copy, Debug, Default)]
pub struct Longest;

impl BarPolicy for Longest {
    fn score(&self, bar: &Bar, _width: usize) -> i64 {
        bar.length as i64
    }
}

/// Prefer the bar nearest to an expected length
#[derive(Clone, Copy, Debug)]
pub struct ExpectLength(pub usize);

impl BarPolicy for ExpectLength {
    fn score(&self, bar: &Bar, _width: usize) -> i64 {
        -(bar.length as i64 - self.0 as i64).abs()
    }
}

/// Prefer the bar nearest to an expected length and position
///
/// Bars which follow a light run shorter than 40 pixels are
/// penalized. Such bars are usually fragments of image content
/// rather than the calibration bar.
#[derive(Clone, Copy, Debug)]
pub struct ExpectBeginLength {
    /// Expected length, in pixels
    pub length: usize,

    /// Expected first column
    pub begin: usize,
}

impl ExpectBeginLength {
    const SHORT_GAP: usize = 40;
    const SHORT_GAP_PENALTY: i64 = 100;
}

impl BarPolicy for ExpectBeginLength {
    fn score(&self, bar: &Bar, width: usize) -> i64 {
        let len_err = (bar.length as i64 - self.length as i64).abs();
        let shift = (bar.begin as i64 - self.begin as i64).rem_euclid(width as i64);
        let begin_err = i64::min(shift, width as i64 - shift);
        let penalty = if bar.negative < Self::SHORT_GAP {
            Self::SHORT_GAP_PENALTY
        } else {
            0
        };
        -(len_err + begin_err + penalty)
    }
}

/// Finds dark bars in bands of page rows
///
/// A column of the band is dark if no more than
/// `vertical_error` of its pixels are light.
#[derive(Clone, Debug)]
pub struct BarScanner<P: BarPolicy> {
    width: usize,
    vertical_error: usize,
    policy: P,
    dark: Vec<bool>,
}

impl<P: BarPolicy> BarScanner<P> {
    /// New scanner for pages `width` pixels wide
    pub fn new(width: usize, vertical_error: usize, policy: P) -> Self {
        Self {
            width,
            vertical_error,
            policy,
            dark: vec![false; width],
        }
    }

    /// Ranking policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Mutable ranking policy
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Best bar in rows `first..first + rows` of `page`
    ///
    /// Returns `None` if the band contains no dark columns,
    /// extends past the bottom of the page, or if the page is
    /// not as wide as the scanner.
    pub fn max_bar(&mut self, page: &Page, first: usize, rows: usize) -> Option<Bar> {
        if rows == 0 || first + rows > page.height() || page.width() != self.width {
            return None;
        }

        let mut light = vec![0usize; self.width];
        for y in first..first + rows {
            for (x, px) in page.row(y).iter().enumerate() {
                if *px >= 128 {
                    light[x] += 1;
                }
            }
        }
        for (dark, light) in self.dark.iter_mut().zip(light.iter()) {
            *dark = *light <= self.vertical_error;
        }

        let bars = self.bars();
        let mut best: Option<(i64, Bar)> = None;
        for bar in bars {
            let score = self.policy.score(&bar, self.width);
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, bar));
            }
        }
        best.map(|(_, bar)| bar)
    }

    // all dark runs of the circular row
    fn bars(&self) -> Vec<Bar> {
        let width = self.width;
        let dark = &self.dark;

        if dark.iter().all(|d| *d) {
            return vec![Bar {
                begin: 0,
                length: width,
                negative: 0,
            }];
        }

        // begin at a light→dark edge so no run is split
        let start = match (0..width).find(|x| dark[*x] && !dark[(x + width - 1) % width]) {
            Some(start) => start,
            None => return vec![],
        };

        let mut out = vec![];
        let mut gap = 0;
        let mut x = 0;
        while x < width {
            let col = (start + x) % width;
            if dark[col] {
                let mut length = 0;
                while x < width && dark[(start + x) % width] {
                    length += 1;
                    x += 1;
                }
                out.push(Bar {
                    begin: col,
                    length,
                    negative: gap,
                });
                gap = 0;
            } else {
                gap += 1;
                x += 1;
            }
        }

        // the first bar follows the last gap
        if let Some(first) = out.first_mut() {
            first.negative = gap;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::page::{BLACK, WHITE};

    fn page_with_bars(width: usize, height: usize, bars: &[(usize, usize)]) -> Page {
        let mut page = Page::from_raw(width, height, vec![WHITE; width * height]).expect("size");
        for y in 0..height {
            let row = page.row_mut(y);
            for (begin, length) in bars {
                for x in *begin..begin + length {
                    row[x % width] = BLACK;
                }
            }
        }
        page
    }

    #[test]
    fn test_clean_bar() {
        let page = page_with_bars(300, 4, &[(100, 50)]);
        let mut uut = BarScanner::new(300, 0, Longest);
        let bar = uut.max_bar(&page, 0, 4).expect("no bar");
        assert_eq!(100, bar.begin);
        assert_eq!(50, bar.length);
        assert_eq!(250, bar.negative);
        assert_eq!(150, bar.end());

        // band runs off the page
        assert_eq!(None, uut.max_bar(&page, 1, 4));
    }

    #[test]
    fn test_wrapping_bar() {
        let page = page_with_bars(100, 2, &[(90, 20), (40, 5)]);
        let mut uut = BarScanner::new(100, 0, Longest);
        let bar = uut.max_bar(&page, 0, 2).expect("no bar");
        assert_eq!(90, bar.begin);
        assert_eq!(20, bar.length);
        assert_eq!(110, bar.end());
        assert_eq!(45, bar.negative);
    }

    #[test]
    fn test_vertical_error() {
        let mut page = page_with_bars(100, 4, &[(10, 30)]);
        // one light pixel in some columns
        page.row_mut(2)[15] = WHITE;
        page.row_mut(1)[30] = WHITE;

        let mut strict = BarScanner::new(100, 0, Longest);
        let bar = strict.max_bar(&page, 0, 4).expect("no bar");
        assert_eq!(16, bar.begin);
        assert_eq!(14, bar.length);

        let mut tolerant = BarScanner::new(100, 1, Longest);
        let bar = tolerant.max_bar(&page, 0, 4).expect("no bar");
        assert_eq!(10, bar.begin);
        assert_eq!(30, bar.length);
    }

    #[test]
    fn test_policies() {
        let page = page_with_bars(400, 1, &[(10, 80), (150, 20), (300, 24), (330, 22)]);

        let mut uut = BarScanner::new(400, 0, ExpectLength(21));
        let bar = uut.max_bar(&page, 0, 1).expect("no bar");
        assert_eq!(150, bar.begin);

        // (330, 22) is nearer in position, but follows a short gap
        let mut uut = BarScanner::new(
            400,
            0,
            ExpectBeginLength {
                length: 22,
                begin: 328,
            },
        );
        let bar = uut.max_bar(&page, 0, 1).expect("no bar");
        assert_eq!(300, bar.begin);

        uut.policy_mut().begin = 150;
        assert_eq!(150, uut.policy().begin);
        assert_eq!(22, uut.policy().length);
        let bar = uut.max_bar(&page, 0, 1).expect("no bar");
        assert_eq!(150, bar.begin);
    }

    #[test]
    fn test_empty_and_full() {
        let page = page_with_bars(50, 1, &[]);
        let mut uut = BarScanner::new(50, 0, Longest);
        assert_eq!(None, uut.max_bar(&page, 0, 1));

        let page = page_with_bars(50, 1, &[(0, 50)]);
        let bar = uut.max_bar(&page, 0, 1).expect("no bar");
        assert_eq!(0, bar.begin);
        assert_eq!(50, bar.length);
    }
}
