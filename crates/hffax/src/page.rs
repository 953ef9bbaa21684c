//! Monochrome page bitmap

use thiserror::Error;

/// Pixel value for black
pub const BLACK: u8 = 0;

/// Pixel value for white
pub const WHITE: u8 = 255;

/// A received fax page
///
/// An 8-bit grayscale bitmap stored row-major, one byte per
/// pixel. Received pages only ever contain [`BLACK`] and
/// [`WHITE`], but any gray level is accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

/// Bitmap dimensions do not match its pixel data
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("page of {width}×{height} pixels cannot hold {len} bytes")]
pub struct PageSizeErr {
    /// Requested width
    pub width: usize,
    /// Requested height
    pub height: usize,
    /// Bytes provided
    pub len: usize,
}

impl Page {
    /// All-black page
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![BLACK; width * height],
        }
    }

    /// Page from row-major pixel data
    ///
    /// `pixels` must contain exactly `width × height` bytes.
    pub fn from_raw(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, PageSizeErr> {
        if width == 0 || width.checked_mul(height) != Some(pixels.len()) {
            return Err(PageSizeErr {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixel data
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the page and return its pixel data
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// Row `y`
    ///
    /// Panics if `y` is out of range.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    /// Mutable row `y`
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }

    /// True if pixel (`x`, `y`) is dark
    #[inline]
    pub fn is_black(&self, x: usize, y: usize) -> bool {
        self.pixels[y * self.width + x] < 128
    }

    /// Rotate row `y` left by `n` pixels
    ///
    /// The pixel in column `n` moves to column zero. Rows of a
    /// zero-width page are left as they are.
    pub fn rotate_row_left(&mut self, y: usize, n: usize) {
        let width = self.width;
        if width == 0 {
            return;
        }
        self.row_mut(y).rotate_left(n % width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        let page = Page::from_raw(3, 2, vec![0, 255, 0, 255, 255, 0]).expect("bad size");
        assert_eq!(3, page.width());
        assert_eq!(2, page.height());
        assert_eq!(&[255, 255, 0], page.row(1));
        assert!(page.is_black(2, 0));
        assert!(!page.is_black(1, 0));

        let err = Page::from_raw(3, 2, vec![0; 5]).expect_err("should fail");
        assert_eq!(5, err.len);
        assert_eq!("page of 3×2 pixels cannot hold 5 bytes", err.to_string());
        assert!(Page::from_raw(0, 0, vec![]).is_err());
    }

    #[test]
    fn test_rotate_row() {
        let mut page = Page::from_raw(5, 2, (0..10).collect()).expect("bad size");
        page.rotate_row_left(1, 7);
        assert_eq!(&[0, 1, 2, 3, 4], page.row(0));
        assert_eq!(&[7, 8, 9, 5, 6], page.row(1));
        assert_eq!(10, page.into_raw().len());

        let mut empty = Page::new(0, 3);
        empty.rotate_row_left(2, 7);
        assert_eq!(3, empty.height());
        assert!(empty.row(2).is_empty());
    }
}
