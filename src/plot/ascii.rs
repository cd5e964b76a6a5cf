//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid with a log₁₀ y-axis, optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed partition coefficients: `o`
//! - fitted curve: `-` line

use crate::domain::{FitFile, LatticeFit, PartitionSample, PhysicalConstants};
use crate::fit::fitted_grid;

/// Render a plot for an in-memory fit.
pub fn render_ascii_plot(
    samples: &[PartitionSample],
    fit: &LatticeFit,
    constants: &PhysicalConstants,
    width: usize,
    height: usize,
) -> String {
    let (r_min, r_max) = radius_range(samples.iter().map(|s| s.radius)).unwrap_or((0.8, 1.2));
    let n = width.max(2);
    let radii: Vec<f64> = (0..n)
        .map(|i| r_min + (r_max - r_min) * i as f64 / (n as f64 - 1.0))
        .collect();
    let d = fitted_grid(fit, constants, &radii);
    let curve: Vec<(f64, f64)> = radii.into_iter().zip(d).collect();
    render_plot(samples, &curve, r_min, r_max, width, height)
}

/// Render a plot from a saved fit file (stored samples + stored grid).
pub fn render_ascii_plot_from_fit_file(file: &FitFile, width: usize, height: usize) -> String {
    let (r_min, r_max) = radius_range(file.grid.radius.iter().copied()).unwrap_or((0.8, 1.2));
    let curve: Vec<(f64, f64)> = file
        .grid
        .radius
        .iter()
        .zip(file.grid.d.iter())
        .map(|(&r, &d)| (r, d))
        .collect();
    render_plot(&file.samples, &curve, r_min, r_max, width, height)
}

fn render_plot(
    samples: &[PartitionSample],
    curve: &[(f64, f64)],
    r_min: f64,
    r_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = samples
        .iter()
        .filter_map(|s| log10(s.d).map(|y| (s.radius, y)))
        .collect();
    let curve: Vec<(f64, f64)> = curve
        .iter()
        .filter(|(r, _)| *r >= r_min && *r <= r_max)
        .filter_map(|&(r, d)| log10(d).map(|y| (r, y)))
        .collect();

    let (y_min, y_max) = y_range(&points, &curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so that points overlay it.
    draw_curve(&mut grid, &curve, r_min, r_max, y_min, y_max);

    for &(r, y) in &points {
        let x = map_x(r, r_min, r_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: radius=[{r_min:.3}, {r_max:.3}] Å | log10 D=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn log10(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then(|| v.log10())
}

fn radius_range(radii: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = radii.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r), hi.max(r)));
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

fn y_range(points: &[(f64, f64)], curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let (lo, hi) = points
        .iter()
        .chain(curve.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(r: f64, r_min: f64, r_max: f64, width: usize) -> usize {
    let u = ((r - r_min) / (r_max - r_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top of the plot.
    (height as f64 - 1.0 - u * (height as f64 - 1.0)).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], r_min: f64, r_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(r, y) in curve {
        let x = map_x(r, r_min, r_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, row, '-');
        } else {
            grid[row][x] = '-';
        }
        prev = Some((x, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x, mut y) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let dy = -(y1 - y).abs();
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid.get_mut(y as usize).and_then(|row| row.get_mut(x as usize)) {
            if *cell == ' ' {
                *cell = ch;
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
