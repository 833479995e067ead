//! Hinton diagram layout.
//!
//! Every matrix entry becomes a square centred on its (row, column) position whose area is
//! proportional to the entry's magnitude.

use nalgebra::DMatrix;

/// Fill of a Hinton box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxSign {
    Positive,
    Negative,
    /// Undefined (NaN) entry
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HintonBox {
    pub row: usize,
    pub col: usize,
    /// Side length, 1 for an entry of magnitude `max_weight`
    pub size: f64,
    pub sign: BoxSign,
}

impl HintonBox {
    /// Opposite corners of the box with x the row and y the column.
    pub fn corners(&self) -> ((f64, f64), (f64, f64)) {
        let (x, y, h) = (self.row as f64, self.col as f64, self.size / 2.);
        ((x - h, y - h), (x + h, y + h))
    }
}

/// The power of two at or above the largest defined magnitude.
pub fn default_max_weight(matrix: &DMatrix<f64>) -> f64 {
    let max = matrix
        .iter()
        .filter(|w| !w.is_nan())
        .fold(0f64, |m, w| m.max(w.abs()));
    if max > 0. && max.is_finite() {
        2f64.powf(max.log2().ceil())
    } else {
        1.
    }
}

/// Boxes of a Hinton diagram, in column major order of the matrix.
///
/// A `max_weight` that is not positive and finite is replaced by [`default_max_weight`].
pub fn hinton_boxes(matrix: &DMatrix<f64>, max_weight: Option<f64>) -> Vec<HintonBox> {
    let max_weight = max_weight
        .filter(|m| *m > 0. && m.is_finite())
        .unwrap_or_else(|| default_max_weight(matrix));
    let mut boxes = Vec::with_capacity(matrix.len());
    for col in 0..matrix.ncols() {
        for row in 0..matrix.nrows() {
            let w = matrix[(row, col)];
            let (size, sign) = if w.is_nan() {
                (0., BoxSign::Blank)
            } else if w > 0. {
                ((w.abs() / max_weight).sqrt(), BoxSign::Positive)
            } else {
                ((w.abs() / max_weight).sqrt(), BoxSign::Negative)
            };
            boxes.push(HintonBox { row, col, size, sign });
        }
    }
    boxes
}
