//! Chart rendering for the retention outputs using Plotters.

use std::path::Path;

use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::decision::{PriorityRow, Segment};

const SEGMENT_NAMES: [&str; 3] = ["Low", "Mid", "High"];

/// Bar fill for the top-targets chart.
const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);

fn segment_index(segment: Segment) -> usize {
    match segment {
        Segment::Low => 0,
        Segment::Mid => 1,
        Segment::High => 2,
    }
}

/// White-to-red ramp for heatmap cells; `fraction` is the cell count
/// relative to the busiest cell.
fn heat_color(fraction: f64) -> RGBColor {
    let fraction = fraction.clamp(0.0, 1.0);
    RGBColor(
        255,
        (255.0 - 205.0 * fraction) as u8,
        (255.0 - 225.0 * fraction) as u8,
    )
}

/// Render the 3x3 value-vs-risk heatmap with customer counts per cell.
///
/// # Arguments
/// * `rows` - The priority table (any order)
/// * `output_path` - Path to save the PNG chart
pub fn render_value_risk_matrix(rows: &[PriorityRow], output_path: &Path) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    if rows.is_empty() {
        root.present()?;
        println!("Value-risk matrix saved to: {}", output_path.display());
        return Ok(());
    }

    // counts[value][risk]
    let mut counts = [[0usize; 3]; 3];
    for row in rows {
        counts[segment_index(row.value_segment)][segment_index(row.risk_segment)] += 1;
    }
    let max_count = counts.iter().flatten().copied().max().unwrap_or(0).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Counts by Value and Risk Segment", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((0i32..3).into_segmented(), (0i32..3).into_segmented())?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(3)
        .y_labels(3)
        .x_desc("Churn risk segment")
        .y_desc("Value segment")
        .axis_desc_style(("sans-serif", 15))
        .x_label_formatter(&segment_label)
        .y_label_formatter(&segment_label)
        .draw()?;

    let count_style = TextStyle::from(("sans-serif", 18).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center));
    for value_idx in 0..3i32 {
        for risk_idx in 0..3i32 {
            let count = counts[value_idx as usize][risk_idx as usize];
            let fraction = count as f64 / max_count as f64;
            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(risk_idx), SegmentValue::Exact(value_idx)),
                    (SegmentValue::Exact(risk_idx + 1), SegmentValue::Exact(value_idx + 1)),
                ],
                heat_color(fraction).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                count.to_string(),
                (SegmentValue::CenterOf(risk_idx), SegmentValue::CenterOf(value_idx)),
                count_style.clone(),
            )))?;
        }
    }

    root.present()?;
    println!("Value-risk matrix saved to: {}", output_path.display());
    Ok(())
}

/// Render a horizontal bar chart of the highest-priority customers.
///
/// Rows must already be sorted by priority descending (the decision step's
/// output order); the best target is drawn at the top.
pub fn render_top_targets(
    rows: &[PriorityRow],
    top_n: usize,
    output_path: &Path,
) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let top: Vec<&PriorityRow> = rows.iter().take(top_n).collect();
    if top.is_empty() {
        root.present()?;
        println!("Top targets chart saved to: {}", output_path.display());
        return Ok(());
    }

    let n = top.len() as i32;
    let max_priority =
        top.iter().map(|row| row.priority_score).fold(f64::NEG_INFINITY, f64::max);
    let x_max = if max_priority > 0.0 { max_priority * 1.1 } else { 1.0 };

    // Segment i on the y axis holds the (n-1-i)-th ranked customer so the
    // top target ends up at the top of the chart.
    let labels: Vec<String> = top
        .iter()
        .rev()
        .map(|row| {
            format!(
                "{} ({}/{})",
                row.customer_id,
                row.value_segment.as_str(),
                row.risk_segment.as_str()
            )
        })
        .collect();

    let mut chart = ChartBuilder::on(&root)
        .caption("Top Retention Targets by Priority Score", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(180)
        .build_cartesian_2d(0f64..x_max, (0i32..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(top.len())
        .x_desc("Priority score")
        .y_desc("Customer (value/risk)")
        .axis_desc_style(("sans-serif", 15))
        .y_label_formatter(&|segment: &SegmentValue<i32>| match segment {
            SegmentValue::CenterOf(index) | SegmentValue::Exact(index) => {
                labels.get(*index as usize).cloned().unwrap_or_default()
            }
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(top.iter().enumerate().map(|(rank, row)| {
        let segment = n - 1 - rank as i32;
        Rectangle::new(
            [
                (0.0, SegmentValue::Exact(segment)),
                (row.priority_score, SegmentValue::Exact(segment + 1)),
            ],
            BAR_COLOR.filled(),
        )
    }))?;

    root.present()?;
    println!("Top targets chart saved to: {}", output_path.display());
    Ok(())
}

fn segment_label(segment: &SegmentValue<i32>) -> String {
    match segment {
        SegmentValue::CenterOf(index) | SegmentValue::Exact(index) => SEGMENT_NAMES
            .get(*index as usize)
            .map(|name| name.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}
