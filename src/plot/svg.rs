//! SVG figure of a lattice strain fit.
//!
//! Layout: ionic radius [Å] on x, partition coefficient on a log y-axis,
//! observations with vertical error bars, the fitted curve, the parameter
//! annotation in the lower left and the pressure label in the upper right.
//!
//! Every call builds its own drawing area on a fresh string buffer.

use std::path::Path;

use plotters::prelude::*;

use crate::domain::{FitFile, LatticeFit, PartitionSample, PhysicalConstants};
use crate::error::AppError;
use crate::fit::{fitted_grid, radius_grid};
use crate::report::{format_annotation, format_model_label, format_pressure};

/// Figure size and labels.
#[derive(Debug, Clone)]
pub struct SvgOptions {
    pub width: u32,
    pub height: u32,
    /// Y-axis label, e.g. `D(Zircon/Melt)`.
    pub phase_label: String,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 900,
            phase_label: "D(mineral/melt)".to_string(),
        }
    }
}

struct Figure<'a> {
    samples: &'a [PartitionSample],
    curve: Vec<(f64, f64)>,
    annotation: String,
    pressure: String,
    legend: String,
}

/// Render an in-memory fit to an SVG string.
pub fn render_fit_svg(
    samples: &[PartitionSample],
    fit: &LatticeFit,
    constants: &PhysicalConstants,
    opts: &SvgOptions,
) -> Result<String, AppError> {
    let lo = samples.iter().map(|s| s.radius).fold(f64::INFINITY, f64::min);
    let hi = samples.iter().map(|s| s.radius).fold(f64::NEG_INFINITY, f64::max);
    let radii = radius_grid(lo, hi, 101);
    let d = fitted_grid(fit, constants, &radii);
    draw(
        Figure {
            samples,
            curve: radii.into_iter().zip(d).collect(),
            annotation: format_annotation(fit),
            pressure: format_pressure(fit.conditions.pressure_gpa),
            legend: format_model_label(fit),
        },
        opts,
    )
}

/// Render a saved fit file to an SVG string.
pub fn render_fit_file_svg(file: &FitFile, opts: &SvgOptions) -> Result<String, AppError> {
    draw(
        Figure {
            samples: &file.samples,
            curve: file.grid.radius.iter().copied().zip(file.grid.d.iter().copied()).collect(),
            annotation: format_annotation(&file.fit),
            pressure: format_pressure(file.fit.conditions.pressure_gpa),
            legend: format_model_label(&file.fit),
        },
        opts,
    )
}

/// Write an SVG string to disk.
pub fn write_svg(path: &Path, svg: &str) -> Result<(), AppError> {
    std::fs::write(path, svg).map_err(|e| AppError::new(4, format!("Failed to write SVG '{}': {e}", path.display())))?;
    tracing::info!(path = %path.display(), "figure written");
    Ok(())
}

fn draw_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::new(4, format!("Failed to draw figure: {e}"))
}

fn draw(fig: Figure<'_>, opts: &SvgOptions) -> Result<String, AppError> {
    let curve: Vec<(f64, f64)> = fig
        .curve
        .into_iter()
        .filter(|&(r, d)| r.is_finite() && d.is_finite() && d > 0.0)
        .collect();
    let (x0, x1) = x_bounds(fig.samples, &curve);
    let (y0, y1) = y_bounds(fig.samples, &curve);

    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, (opts.width, opts.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .set_label_area_size(LabelAreaPosition::Left, 70)
            .set_label_area_size(LabelAreaPosition::Bottom, 50)
            .build_cartesian_2d(x0..x1, (y0..y1).log_scale())
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_desc("Ionic radius [Å]")
            .y_desc(opts.phase_label.as_str())
            .x_label_formatter(&|v| format!("{v:.2}"))
            .y_label_formatter(&|v| format!("{v}"))
            .axis_desc_style(("sans-serif", 18))
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(curve.iter().copied(), RED.stroke_width(2)))
            .map_err(draw_err)?
            .label(fig.legend.as_str())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

        chart
            .draw_series(fig.samples.iter().map(|s| {
                let lo = (s.d - s.sigma).max(y0);
                let hi = (s.d + s.sigma).min(y1);
                ErrorBar::new_vertical(s.radius, lo, s.d, hi, BLACK.filled(), 8)
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(
                fig.samples
                    .iter()
                    .map(|s| Circle::new((s.radius, s.d), 4, BLACK.filled())),
            )
            .map_err(draw_err)?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(draw_err)?;

        // Annotation block (lower left) and pressure label (upper right).
        let text = ("sans-serif", 18).into_font().color(&BLACK);
        let (w, h) = (opts.width as i32, opts.height as i32);
        let lines: Vec<&str> = fig.annotation.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            let y = h - 90 - 24 * (lines.len() - i) as i32;
            root.draw(&Text::new(*line, (100, y), text.clone())).map_err(draw_err)?;
        }
        root.draw(&Text::new(fig.pressure.as_str(), (w - 120, 40), text))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }
    Ok(buf)
}

fn x_bounds(samples: &[PartitionSample], curve: &[(f64, f64)]) -> (f64, f64) {
    let (lo, hi) = samples
        .iter()
        .map(|s| s.radius)
        .chain(curve.iter().map(|&(r, _)| r))
        .fold((0.8_f64, 1.3_f64), |(lo, hi), r| (lo.min(r), hi.max(r)));
    (lo, hi)
}

/// Log-axis bounds covering data and curve, rounded out to whole decades.
fn y_bounds(samples: &[PartitionSample], curve: &[(f64, f64)]) -> (f64, f64) {
    let (lo, hi) = samples
        .iter()
        .flat_map(|s| [s.d, s.d + s.sigma])
        .chain(curve.iter().map(|&(_, d)| d))
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(lo.is_finite() && hi.is_finite()) {
        return (1e-3, 10.0);
    }
    let lo = 10f64.powf(lo.log10().floor());
    let mut hi = 10f64.powf(hi.log10().ceil());
    if hi <= lo {
        hi = lo * 10.0;
    }
    (lo, hi)
}
