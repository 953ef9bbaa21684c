//! Fitting the calibration bar over runs of rows

use std::ops::Range;

use crate::bestfit::BestFitLine;

/// A run of rows with a straight-line fit of bar end vs. row
#[derive(Clone, Debug)]
pub(crate) struct PartFit {
    /// Rows covered
    pub rows: Range<usize>,

    /// Bar end (unwrapped column) as a function of row
    pub line: BestFitLine,

    /// Mean absolute residual of the fit, in pixels
    pub residual: f64,
}

impl PartFit {
    /// Fit bar ends over `rows`
    ///
    /// `ends` is indexed by row. Rows without a bar are
    /// skipped. Returns `None` if no row has a bar.
    pub fn new(ends: &[Option<i64>], rows: Range<usize>) -> Option<Self> {
        let mut line = BestFitLine::new();
        for y in rows.clone() {
            if let Some(end) = ends[y] {
                line.add(y as f64, end as f64);
            }
        }
        line.solve()?;

        let (sum, count) = rows
            .clone()
            .filter_map(|y| ends[y].map(|end| (end as f64 - line.y(y as f64)).abs()))
            .fold((0.0f64, 0usize), |(sum, count), r| (sum + r, count + 1));
        Some(Self {
            rows,
            line,
            residual: sum / count as f64,
        })
    }

    /// True if the bar ends lie on a straight line
    pub fn is_ok(&self) -> bool {
        self.residual < MAX_RESIDUAL
    }

    /// Bar end at row `y`, rounded to the nearest column
    pub fn end_at(&self, y: usize) -> i64 {
        self.line.y(y as f64).round() as i64
    }
}

/// Split `rows` into parts with good fits
///
/// If the whole range fits, it is one part. Otherwise the
/// range is bisected, down to parts of [`MIN_ROWS`]. When one
/// half fits and the other does not, the good half steals rows
/// from the bad half, one at a time, for as long as it keeps
/// fitting. Ranges which never fit are left out.
pub(crate) fn settle(ends: &[Option<i64>], rows: Range<usize>, out: &mut Vec<PartFit>) {
    let whole = match PartFit::new(ends, rows.clone()) {
        Some(fit) => fit,
        None => return,
    };
    if whole.is_ok() {
        out.push(whole);
        return;
    }
    if rows.len() < 2 * MIN_ROWS {
        return;
    }

    let mid = rows.start + rows.len() / 2;
    let left = PartFit::new(ends, rows.start..mid);
    let right = PartFit::new(ends, mid..rows.end);
    let left_ok = left.as_ref().map(PartFit::is_ok).unwrap_or(false);
    let right_ok = right.as_ref().map(PartFit::is_ok).unwrap_or(false);

    match (left, right) {
        (Some(left), Some(right)) if left_ok && right_ok => {
            out.push(left);
            out.push(right);
        }
        (Some(left), _) if left_ok => {
            let left = steal_forward(ends, left, rows.end);
            let rest = left.rows.end..rows.end;
            out.push(left);
            settle(ends, rest, out);
        }
        (_, Some(right)) if right_ok => {
            let right = steal_backward(ends, right, rows.start);
            let rest = rows.start..right.rows.start;
            settle(ends, rest, out);
            out.push(right);
        }
        _ => {
            settle(ends, rows.start..mid, out);
            settle(ends, mid..rows.end, out);
        }
    }
}

// grow a good part downward, up to `limit`
fn steal_forward(ends: &[Option<i64>], mut good: PartFit, limit: usize) -> PartFit {
    while good.rows.end < limit {
        match PartFit::new(ends, good.rows.start..good.rows.end + 1) {
            Some(grown) if grown.is_ok() => good = grown,
            _ => break,
        }
    }
    good
}

// grow a good part upward, down to `limit`
fn steal_backward(ends: &[Option<i64>], mut good: PartFit, limit: usize) -> PartFit {
    while good.rows.start > limit {
        match PartFit::new(ends, good.rows.start - 1..good.rows.end) {
            Some(grown) if grown.is_ok() => good = grown,
            _ => break,
        }
    }
    good
}

/// Smallest part produced by bisection
pub(crate) const MIN_ROWS: usize = 20;

// mean absolute residual of a good fit (pixels)
const MAX_RESIDUAL: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: Range<usize>, offset: i64) -> impl Iterator<Item = Option<i64>> {
        rows.map(move |y| Some(y as i64 + offset))
    }

    #[test]
    fn test_fit() {
        let ends: Vec<Option<i64>> = ramp(0..30, 5).collect();
        let fit = PartFit::new(&ends, 0..30).expect("no fit");
        assert!(fit.is_ok());
        assert_eq!(105, fit.end_at(100));

        let none = vec![None; 10];
        assert!(PartFit::new(&none, 0..10).is_none());
    }

    #[test]
    fn test_settle_single() {
        let ends: Vec<Option<i64>> = ramp(0..50, 40).collect();
        let mut out = vec![];
        settle(&ends, 0..50, &mut out);
        assert_eq!(1, out.len());
        assert_eq!(0..50, out[0].rows);
    }

    #[test]
    fn test_settle_steals() {
        // break at row 70
        let ends: Vec<Option<i64>> = ramp(0..70, 10).chain(ramp(70..100, 160)).collect();
        let mut out = vec![];
        settle(&ends, 0..100, &mut out);
        let rows: Vec<Range<usize>> = out.iter().map(|p| p.rows.clone()).collect();
        assert_eq!(vec![0..70, 70..100], rows);

        // break at row 30: the right half steals
        let ends: Vec<Option<i64>> = ramp(0..30, 10).chain(ramp(30..100, 160)).collect();
        let mut out = vec![];
        settle(&ends, 0..100, &mut out);
        let rows: Vec<Range<usize>> = out.iter().map(|p| p.rows.clone()).collect();
        assert_eq!(vec![0..30, 30..100], rows);
    }

    #[test]
    fn test_settle_gives_up() {
        // alternating garbage never fits
        let ends: Vec<Option<i64>> = (0..30)
            .map(|y| Some(if y % 2 == 0 { 0 } else { 50 }))
            .collect();
        let mut out = vec![];
        settle(&ends, 0..30, &mut out);
        assert!(out.is_empty());
    }
}
