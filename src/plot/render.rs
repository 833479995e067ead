//! SVG rendering of ellipses and Hinton diagrams with `plotters`.

use std::ops::Range;
use std::path::PathBuf;

use log::info;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::ellipse::Ellipse;
use super::figure::FigureConfig;
use super::hinton::{BoxSign, HintonBox};
use crate::error::PlotError;

/// A chart with f64 axes.
pub type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn render_error<E: ToString>(e: E) -> PlotError {
    PlotError::Render(e.to_string())
}

/// Draw the outline of `ellipse` with `n_points` vertices.
pub fn draw_ellipse<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    ellipse: &Ellipse,
    n_points: usize,
    style: ShapeStyle,
) -> Result<(), PlotError> {
    let mut outline = ellipse.boundary(n_points.max(3));
    outline.push(outline[0]);
    chart
        .draw_series(std::iter::once(PathElement::new(outline, style)))
        .map_err(render_error)?;
    Ok(())
}

/// Draw filled Hinton boxes, red for positive and green for negative entries.
pub fn draw_hinton<DB: DrawingBackend>(chart: &mut Chart<'_, DB>, boxes: &[HintonBox]) -> Result<(), PlotError> {
    chart
        .draw_series(boxes.iter().map(|b| {
            let colour = match b.sign {
                BoxSign::Positive => RED,
                BoxSign::Negative => GREEN,
                BoxSign::Blank => WHITE,
            };
            let (lo, hi) = b.corners();
            Rectangle::new([lo, hi], colour.filled())
        }))
        .map_err(render_error)?;
    Ok(())
}

/// Render an SVG figure `name` of `size` pixels into the configured figure directory.
///
/// `draw` receives the white filled root area. Returns the path written.
pub fn save_svg<F>(config: &FigureConfig, name: &str, size: (u32, u32), draw: F) -> Result<PathBuf, PlotError>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), PlotError>,
{
    let path = config.figure_path(name)?;
    {
        let root = SVGBackend::new(&path, size).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        draw(&root)?;
        root.present().map_err(render_error)?;
    }
    info!("saving image to {}", path.display());
    Ok(path)
}

/// Cartesian chart over the given ranges, without axis labels.
pub fn cartesian<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    x: Range<f64>,
    y: Range<f64>,
) -> Result<Chart<'a, DB>, PlotError> {
    ChartBuilder::on(area)
        .margin(10)
        .build_cartesian_2d(x, y)
        .map_err(render_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, Matrix2, Vector2};
    use std::fs;

    #[test]
    fn writes_svg() {
        let dir = std::env::temp_dir().join(format!("nlds_render_{}", std::process::id()));
        let config = FigureConfig::new(&dir);
        let ellipse = Ellipse::from_covariance(&Vector2::zeros(), &Matrix2::new(1., 0.5, 0.5, 1.), 2.).unwrap();
        let boxes = super::super::hinton::hinton_boxes(&DMatrix::from_row_slice(2, 2, &[1., -0.5, 0.25, 0.]), None);

        let path = save_svg(&config, "render.svg", (320, 240), |root| {
            let mut chart = cartesian(root, -4.0..4.0, -4.0..4.0)?;
            draw_ellipse(&mut chart, &ellipse, 64, BLACK.stroke_width(1))?;
            draw_hinton(&mut chart, &boxes)
        })
        .unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
