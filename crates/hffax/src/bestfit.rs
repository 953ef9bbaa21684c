//! Least-squares line fit

use nalgebra::{Matrix2, Vector2};

/// Weighted least-squares straight line
///
/// Accumulates the sums of the normal equations for
/// `y = intercept + slope·x` and solves them on demand. Points
/// may be added in any order. With fewer than two distinct `x`
/// the fit degenerates to a horizontal line through the
/// weighted mean of `y`.
#[derive(Clone, Debug, Default)]
pub struct BestFitLine {
    sw: f64,
    sx: f64,
    sy: f64,
    sxx: f64,
    sxy: f64,
}

impl BestFitLine {
    /// Empty fit
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all points
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add a point with unit weight
    pub fn add(&mut self, x: f64, y: f64) {
        self.add_weighted(x, y, 1.0);
    }

    /// Add a point with weight `w`
    pub fn add_weighted(&mut self, x: f64, y: f64, w: f64) {
        self.sw += w;
        self.sx += w * x;
        self.sy += w * y;
        self.sxx += w * x * x;
        self.sxy += w * x * y;
    }

    /// Total weight of all points
    pub fn weight(&self) -> f64 {
        self.sw
    }

    /// Fitted `(intercept, slope)`
    ///
    /// Returns `None` if no points have been added.
    pub fn solve(&self) -> Option<(f64, f64)> {
        if self.sw <= 0.0 {
            return None;
        }

        let normal = Matrix2::new(self.sw, self.sx, self.sx, self.sxx);
        let rhs = Vector2::new(self.sy, self.sxy);
        match normal.lu().solve(&rhs) {
            Some(coef) if coef.iter().all(|c| c.is_finite()) => Some((coef[0], coef[1])),
            _ => Some((self.sy / self.sw, 0.0)),
        }
    }

    /// Fitted slope, or zero
    pub fn slope(&self) -> f64 {
        self.solve().map(|(_, m)| m).unwrap_or(0.0)
    }

    /// Fitted value at `x`, or zero
    pub fn y(&self, x: f64) -> f64 {
        self.solve().map(|(b, m)| b + m * x).unwrap_or(0.0)
    }
}
