//! Plotters-powered lattice strain chart widget for Ratatui.
//!
//! The y-axis shows `log10 D` on a linear scale: terminal cells are too coarse
//! for a real log axis with decade labels.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A render-only chart description; all series are in `(radius, log10 D)`.
pub struct LatticeChart<'a> {
    /// Fitted curve.
    pub curve: &'a [(f64, f64)],
    /// Observed values.
    pub points: &'a [(f64, f64)],
    /// One-sigma error bars as `(radius, low, high)`.
    pub error_bars: &'a [(f64, f64, f64)],
    /// Observations more than two sigma away from the curve (subset of `points`).
    pub flagged: &'a [(f64, f64)],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: String,
}

impl<'a> Widget for LatticeChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to lay out a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(&self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.2}"))
                .y_label_formatter(&|v| format!("{v:.1}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(WHITE)
                .bold_line_style(WHITE)
                .draw()?;

            let curve_color = RGBColor(0, 255, 255);
            let bar_color = RGBColor(128, 128, 128);
            let flagged_color = RGBColor(255, 0, 0);

            chart.draw_series(LineSeries::new(self.curve.iter().copied(), &curve_color))?;

            chart.draw_series(
                self.error_bars
                    .iter()
                    .map(|&(x, lo, hi)| PathElement::new(vec![(x, lo), (x, hi)], bar_color)),
            )?;

            // `Circle` radii are mis-scaled by the ratatui backend; plain pixels render reliably.
            chart.draw_series(self.points.iter().map(|&(x, y)| Pixel::new((x, y), WHITE)))?;
            chart.draw_series(self.flagged.iter().map(|&(x, y)| Pixel::new((x, y), flagged_color)))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
