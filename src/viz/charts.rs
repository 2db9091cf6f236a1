//! SVG charts.

use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use super::topology::{Layout, TopologyGraph};
use crate::error::{Error, Result};
use crate::io::records::BusLoad;

const SIZE: (u32, u32) = (1000, 600);
const FONT: &str = "sans-serif";

/// Line colours, cycled.
const PALETTE: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];

/// One histogram bin; `hi` is inclusive only for the last bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Equal-width bins spanning [min, max] of `values`.
///
/// A constant sample is spread over `value ± 0.5`.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let mut out: Vec<_> = (0..bins)
        .map(|i| HistogramBin {
            lo: lo + i as f64 * width,
            hi: lo + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for &v in values {
        let i = (((v - lo) / width).floor() as usize).min(bins - 1);
        out[i].count += 1;
    }
    out
}

/// A named series for [`draw_line_chart`]; NaN values leave a gap.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(label: impl Into<String>, x: &[f64], y: &[f64]) -> Self {
        Self {
            label: label.into(),
            points: x.iter().copied().zip(y.iter().copied()).collect(),
        }
    }

    /// Maximal runs of finite points.
    fn runs(&self) -> Vec<Vec<(f64, f64)>> {
        let mut runs = vec![Vec::new()];
        for &(x, y) in &self.points {
            if x.is_finite() && y.is_finite() {
                if let Some(run) = runs.last_mut() {
                    run.push((x, y));
                }
            } else if runs.last().is_some_and(|r| !r.is_empty()) {
                runs.push(Vec::new());
            }
        }
        runs.retain(|r| !r.is_empty());
        runs
    }
}

/// Axis titles and ranges of a chart.
#[derive(Debug, Clone)]
pub struct ChartSpec<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    /// Fixed y-range; derived from the data when `None`.
    pub y_range: Option<Range<f64>>,
}

fn padded(lo: f64, hi: f64, frac: f64) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = if hi > lo { (hi - lo) * frac } else { 0.5 };
    (lo - pad)..(hi + pad)
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Draws the feeder with straight edges and labelled bus markers.
pub fn draw_topology(
    path: &Path,
    title: &str,
    graph: &TopologyGraph,
    layout: &Layout,
) -> Result<()> {
    let (x_lo, x_hi, y_lo, y_hi) = layout.bounds().ok_or(Error::EmptyResult("layout"))?;
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(Error::plot)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .build_cartesian_2d(padded(x_lo, x_hi, 0.05), padded(y_lo, y_hi, 0.1))
        .map_err(Error::plot)?;

    let mut segments = Vec::with_capacity(graph.edge_count());
    for (a, b) in graph.edge_list() {
        let (Some(&pa), Some(&pb)) = (layout.get(&a), layout.get(&b)) else {
            return Err(Error::MissingCoordinate(if layout.contains_key(&a) { b } else { a }));
        };
        segments.push(PathElement::new(vec![pa, pb], BLACK.stroke_width(1)));
    }
    chart.draw_series(segments).map_err(Error::plot)?;

    let node_style = ShapeStyle::from(&PALETTE[0]).filled();
    chart
        .draw_series(layout.iter().map(|(bus, &xy)| {
            EmptyElement::at(xy)
                + Circle::new((0, 0), 9, node_style)
                + Text::new(bus.to_string(), (-5, -5), (FONT, 10).into_font().color(&WHITE))
        }))
        .map_err(Error::plot)?;

    root.present().map_err(Error::plot)?;
    info!(file = %path.display(), "wrote topology plot");
    Ok(())
}

/// Vertical bars from `(x, height)` pairs, each `width` wide.
fn draw_bars(path: &Path, spec: &ChartSpec<'_>, bars: &[(f64, f64)], width: f64) -> Result<()> {
    let (x_lo, x_hi) = finite_bounds(bars.iter().map(|b| b.0));
    let (_, h_hi) = finite_bounds(bars.iter().map(|b| b.1));
    let y_range = spec.y_range.clone().unwrap_or(0.0..if h_hi > 0.0 { h_hi * 1.1 } else { 1.0 });

    let x_range = padded(x_lo, x_hi, 0.02);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(Error::plot)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.start - width..x_range.end + width, y_range)
        .map_err(Error::plot)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(spec.x_desc)
        .y_desc(spec.y_desc)
        .draw()
        .map_err(Error::plot)?;
    let style = ShapeStyle::from(&PALETTE[0]).filled();
    chart
        .draw_series(bars.iter().map(|&(x, h)| {
            Rectangle::new([(x - width / 2.0, 0.0), (x + width / 2.0, h)], style)
        }))
        .map_err(Error::plot)?;
    root.present().map_err(Error::plot)?;
    info!(file = %path.display(), "wrote bar chart");
    Ok(())
}

/// Active load per bus, one bar per bus id.
pub fn draw_load_bars(path: &Path, loads: &[BusLoad]) -> Result<()> {
    if loads.is_empty() {
        return Err(Error::EmptyResult("bus load table"));
    }
    let bars: Vec<_> = loads.iter().map(|l| (l.bus_id as f64, l.p_mw)).collect();
    let spec = ChartSpec {
        title: "Load Distribution Across IEEE 33 Bus Network",
        x_desc: "Bus ID",
        y_desc: "Load (MW)",
        y_range: None,
    };
    draw_bars(path, &spec, &bars, 0.8)
}

/// Histogram of bus loads with `bins` equal-width bins.
pub fn draw_load_histogram(path: &Path, loads: &[BusLoad], bins: usize) -> Result<()> {
    let values: Vec<f64> = loads.iter().map(|l| l.p_mw).collect();
    let hist = histogram_bins(&values, bins);
    let Some(first) = hist.first() else {
        return Err(Error::EmptyResult("bus load table"));
    };
    let width = first.hi - first.lo;
    let bars: Vec<_> = hist
        .iter()
        .map(|b| ((b.lo + b.hi) / 2.0, b.count as f64))
        .collect();
    let spec = ChartSpec {
        title: "Load Distribution Across Network",
        x_desc: "Load (MW)",
        y_desc: "Number of Buses",
        y_range: None,
    };
    draw_bars(path, &spec, &bars, width)
}

/// Lines with point markers; each series gets its own colour and legend entry.
pub fn draw_line_chart(path: &Path, spec: &ChartSpec<'_>, series: &[Series]) -> Result<()> {
    let all = || series.iter().flat_map(|s| s.points.iter());
    let (x_lo, x_hi) = finite_bounds(all().map(|p| p.0));
    let (y_lo, y_hi) = finite_bounds(all().map(|p| p.1));
    let y_range = spec.y_range.clone().unwrap_or_else(|| padded(y_lo, y_hi, 0.05));

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(Error::plot)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(padded(x_lo, x_hi, 0.02), y_range)
        .map_err(Error::plot)?;
    chart
        .configure_mesh()
        .x_desc(spec.x_desc)
        .y_desc(spec.y_desc)
        .draw()
        .map_err(Error::plot)?;

    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        for run in s.runs() {
            chart
                .draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))
                .map_err(Error::plot)?;
            chart
                .draw_series(run.iter().map(|&p| Circle::new(p, 3, color.filled())))
                .map_err(Error::plot)?;
        }
        chart
            .draw_series(std::iter::once(PathElement::new(
                Vec::<(f64, f64)>::new(),
                color.stroke_width(2),
            )))
            .map_err(Error::plot)?
            .label(s.label.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }
    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(Error::plot)?;
    }

    root.present().map_err(Error::plot)?;
    info!(file = %path.display(), "wrote line chart");
    Ok(())
}
