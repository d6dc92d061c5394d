//! Chart rendering for training diagnostics

use plotters::prelude::*;

use crate::error::{Error, Result};
use crate::model::{ClusterAssignment, ModelHandle};

/// Series palette cycled by label index.
const CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, YELLOW, MAGENTA];

fn render_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Render(e.to_string())
}

/// Plot the within-cluster sum-of-squares curve against candidate cluster
/// counts, for reading off the elbow. `curve[0]` is taken as k = 1.
pub fn render_elbow_curve(curve: &[f64], output_path: &str) -> Result<()> {
    if curve.is_empty() {
        return Err(Error::InputData("inertia curve is empty".to_string()));
    }

    let max_k = curve.len();
    let top = curve.iter().cloned().fold(f64::NEG_INFINITY, f64::max) * 1.05;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Elbow Curve", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0.5f64..(max_k as f64 + 0.5), 0f64..top.max(1.0))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("Cluster Count (k)")
        .y_desc("Within-Cluster Sum of Squares")
        .x_labels(max_k)
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(
            curve
                .iter()
                .enumerate()
                .map(|(i, &wcss)| ((i + 1) as f64, wcss)),
            &BLUE,
        ))
        .map_err(render_err)?;

    chart
        .draw_series(
            curve
                .iter()
                .enumerate()
                .map(|(i, &wcss)| Circle::new(((i + 1) as f64, wcss), 4, BLUE.filled())),
        )
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

/// Scatter the assigned customers over scaled frequency and monetary axes,
/// with centroids drawn as squares.
pub fn render_cluster_scatter(
    assignments: &[ClusterAssignment],
    model: &ModelHandle,
    output_path: &str,
) -> Result<()> {
    if assignments.is_empty() {
        return Err(Error::InputData("no assignments to plot".to_string()));
    }

    // scaled frequency on x, scaled monetary on y
    let points: Vec<(f64, f64, usize)> = assignments
        .iter()
        .map(|a| {
            let scaled = model.scale(a.features.features());
            (scaled[1], scaled[2], a.label)
        })
        .collect();

    let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min) - 0.5;
    let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max) + 0.5;
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min) - 0.5;
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max) + 0.5;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Customer Segments: Frequency vs Monetary (scaled)",
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("Frequency (scaled)")
        .y_desc("Monetary (scaled)")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(render_err)?;

    for &(x, y, label) in &points {
        let color = CLUSTER_COLORS[label % CLUSTER_COLORS.len()];
        chart
            .draw_series(std::iter::once(Circle::new((x, y), 4, color.filled())))
            .map_err(render_err)?;
    }

    for (label, centroid) in model.centroids().outer_iter().enumerate() {
        let color = CLUSTER_COLORS[label % CLUSTER_COLORS.len()];
        let (cx, cy) = (centroid[1], centroid[2]);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(cx - 0.1, cy - 0.1), (cx + 0.1, cy + 0.1)],
                color.filled(),
            )))
            .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{train, TrainConfig};
    use crate::rfm::RfmVector;
    use tempfile::tempdir;

    fn trained() -> (Vec<ClusterAssignment>, ModelHandle) {
        let table = vec![
            RfmVector { customer_id: 1, recency: 5, frequency: 20, monetary: 5_000.0 },
            RfmVector { customer_id: 2, recency: 8, frequency: 18, monetary: 4_500.0 },
            RfmVector { customer_id: 3, recency: 300, frequency: 1, monetary: 50.0 },
            RfmVector { customer_id: 4, recency: 280, frequency: 2, monetary: 80.0 },
        ];
        let outcome = train(&table, 2, &TrainConfig::default()).unwrap();
        (outcome.assignments, outcome.model)
    }

    #[test]
    fn renders_elbow_curve_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("elbow.png");
        render_elbow_curve(&[40.0, 12.0, 6.0, 4.5], path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_curve_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("elbow.png");
        assert!(render_elbow_curve(&[], path.to_str().unwrap()).is_err());
    }

    #[test]
    fn renders_cluster_scatter_png() {
        let (assignments, model) = trained();
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.png");
        render_cluster_scatter(&assignments, &model, path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }
}
