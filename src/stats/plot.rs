//! PNG export of the regression panels (optional `plot` feature).

use std::path::Path;

#[cfg(feature = "plot")]
use plotters::prelude::*;

use super::StatsError;
use super::regress::Panel;

/// Draw up to four panels as a 2x2 grid: scatter points plus the fitted line.
#[cfg(feature = "plot")]
pub fn regression_grid(panels: &[Panel], output: &Path) -> Result<(), StatsError> {
    let err = |e: &dyn std::fmt::Display| StatsError::Plot(e.to_string());

    let root = BitMapBackend::new(output, (1800, 1200)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(&e))?;
    let areas = root.split_evenly((2, 2));

    for (panel, area) in panels.iter().zip(areas.iter()) {
        let (x_min, x_max) = bounds(panel.points.iter().map(|p| p.0));
        let (y_min, y_max) = bounds(panel.points.iter().map(|p| p.1));

        let mut chart = ChartBuilder::on(area)
            .caption(panel.title, ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(|e| err(&e))?;

        chart
            .configure_mesh()
            .x_desc(panel.x_label)
            .y_desc(panel.y_label)
            .draw()
            .map_err(|e| err(&e))?;

        chart
            .draw_series(
                panel
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, BLUE.mix(0.5).filled())),
            )
            .map_err(|e| err(&e))?
            .label("Data points")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.mix(0.5).filled()));

        let fit = panel.fit;
        chart
            .draw_series(LineSeries::new(
                [(x_min, fit.predict(x_min)), (x_max, fit.predict(x_max))],
                &RED,
            ))
            .map_err(|e| err(&e))?
            .label(format!("Regression line (R²={:.2})", fit.r_squared()))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| err(&e))?;
    }

    root.present().map_err(|e| err(&e))?;
    tracing::info!(path = %output.display(), "regression plot written");
    Ok(())
}

/// Without the `plot` feature, explain how to get the PNG and carry on.
#[cfg(not(feature = "plot"))]
pub fn regression_grid(_panels: &[Panel], output: &Path) -> Result<(), StatsError> {
    tracing::warn!(path = %output.display(), "plotting requires --features plot, skipping PNG");
    Ok(())
}

/// Axis range with a 5% pad; never empty.
#[cfg_attr(not(feature = "plot"), allow(dead_code))]
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_pad_and_handle_empty() {
        assert_eq!(bounds(std::iter::empty()), (0.0, 1.0));
        let (lo, hi) = bounds([0.0, 100.0].into_iter());
        assert_eq!((lo, hi), (-5.0, 105.0));
        let (lo, hi) = bounds([3.0].into_iter());
        assert!(lo < 3.0 && hi > 3.0);
    }
}
