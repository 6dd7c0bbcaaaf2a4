//! PNG rendering of analysis figures.
//!
//! Figures are plain data ([`Figure`]) built by the engine from numeric
//! results; this module only draws them. Drawing happens into an in-memory
//! RGB buffer with `plotters` and is encoded with `image`. A
//! [`Figure::Panels`] splits the image into a grid and draws one child figure
//! per cell. When text cannot be drawn (no usable system font), the figure is
//! drawn again without captions, axis labels and legend.

use std::io::Cursor;

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted image side in pixels.
pub const MAX_SIDE: u32 = 8192;
/// Smallest accepted image side in pixels.
pub const MIN_SIDE: u32 = 64;

/// Fallback line colours, in order.
const PALETTE: [RGBColor; 8] = [
    RGBColor(59, 130, 246),
    RGBColor(239, 68, 68),
    RGBColor(16, 185, 129),
    RGBColor(245, 158, 11),
    RGBColor(139, 92, 246),
    RGBColor(236, 72, 153),
    RGBColor(20, 184, 166),
    RGBColor(249, 115, 22),
];

/// Lab house palette.
const HOUSE_PALETTE: [RGBColor; 6] = [
    RGBColor(0, 59, 92),
    RGBColor(226, 112, 112),
    RGBColor(72, 145, 164),
    RGBColor(237, 174, 73),
    RGBColor(101, 84, 140),
    RGBColor(120, 120, 120),
];

/// Plot settings passed with every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Produce an image at all (default: true)
    pub render: bool,
    /// Image width in pixels (default: 1200)
    pub width: u32,
    /// Image height in pixels (default: 700)
    pub height: u32,
    /// Use the house palette and heavier lines (default: false)
    pub house_style: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            render: true,
            width: 1200,
            height: 700,
            house_style: false,
        }
    }
}

impl RenderOptions {
    /// Numbers only, no image.
    pub fn disabled() -> Self {
        Self {
            render: false,
            ..Self::default()
        }
    }

    /// Set the image size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable the house style.
    pub fn with_house_style(mut self, house_style: bool) -> Self {
        self.house_style = house_style;
        self
    }

    /// Check the image size.
    pub fn validate(&self) -> Result<(), RenderError> {
        for (name, side) in [("width", self.width), ("height", self.height)] {
            if !(MIN_SIDE..=MAX_SIDE).contains(&side) {
                return Err(RenderError::Size(format!(
                    "{name} must be in {MIN_SIDE}..={MAX_SIDE}, got {side}"
                )));
            }
        }
        Ok(())
    }
}

/// Rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    /// Image size out of range
    #[error("invalid image size: {0}")]
    Size(String),
    /// Nothing to draw
    #[error("figure has no data")]
    Empty,
    /// The drawing backend failed
    #[error("drawing failed: {0}")]
    Draw(String),
    /// PNG encoding failed
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// One line of a line chart
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend label
    pub label: String,
    /// `#RRGGBB`; palette colour when absent or unparsable
    pub color: Option<String>,
    /// `(x, y)` points; non-finite points are skipped
    pub points: Vec<(f64, f64)>,
}

impl Series {
    /// A series with a palette colour.
    pub fn new(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            color: None,
            points,
        }
    }

    /// Set an explicit colour.
    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }
}

/// Axis titles shared by every figure type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Labels {
    /// Caption
    pub title: String,
    /// X axis description
    pub x: String,
    /// Y axis description
    pub y: String,
}

impl Labels {
    /// Build from three strings.
    pub fn new(title: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x: x.into(),
            y: y.into(),
        }
    }
}

/// Grouped bars: one group per category, one bar per series
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    /// Legend label of this bar series
    pub label: String,
    /// One value per category; `None` leaves a gap
    pub values: Vec<Option<f64>>,
}

/// Something to draw
#[derive(Debug, Clone, PartialEq)]
pub enum Figure {
    /// Line chart with optional vertical markers
    Lines {
        /// Titles
        labels: Labels,
        /// Lines in legend order
        series: Vec<Series>,
        /// X positions of vertical reference lines
        markers: Vec<f64>,
    },
    /// Grouped bar chart
    Bars {
        /// Titles
        labels: Labels,
        /// Category names along the x axis
        categories: Vec<String>,
        /// Bar series
        groups: Vec<BarGroup>,
        /// Y values of horizontal reference lines
        thresholds: Vec<f64>,
    },
    /// Time-frequency heat map
    Heatmap {
        /// Titles
        labels: Labels,
        /// Frame times (x)
        times: Vec<f64>,
        /// Bin frequencies (y)
        frequencies: Vec<f64>,
        /// `values[frame][bin]`
        values: Vec<Vec<f64>>,
    },
    /// Several figures on one image, two per row, in order
    Panels {
        /// Caption over the whole grid
        title: String,
        /// Child figures; an empty child leaves its cell blank
        panels: Vec<Figure>,
    },
}

/// Render a figure to PNG bytes.
pub fn render_png(figure: &Figure, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    options.validate()?;
    let (w, h) = (options.width, options.height);
    let mut rgb = vec![0u8; w as usize * h as usize * 3];

    if let Err(err) = draw(&mut rgb, figure, options, true) {
        if matches!(err, RenderError::Empty) {
            return Err(err);
        }
        tracing::debug!(%err, "drawing with text failed; retrying without text");
        rgb.fill(0);
        draw(&mut rgb, figure, options, false)?;
    }
    encode_png(rgb, w, h)
}

fn encode_png(rgb: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let img = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| RenderError::Encode("buffer does not match image size".into()))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

fn draw(buf: &mut [u8], figure: &Figure, options: &RenderOptions, text: bool) -> Result<(), RenderError> {
    draw_root(buf, figure, options, text).map_err(|e| match e {
        DrawError::Empty => RenderError::Empty,
        DrawError::Backend(msg) => RenderError::Draw(msg),
    })
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn draw_root(buf: &mut [u8], figure: &Figure, options: &RenderOptions, text: bool) -> Result<(), DrawError> {
    let root = BitMapBackend::with_buffer(buf, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_on(&root, figure, options, text)?;
    root.present()?;
    Ok(())
}

fn draw_on(area: &Area<'_>, figure: &Figure, options: &RenderOptions, text: bool) -> Result<(), DrawError> {
    match figure {
        Figure::Lines {
            labels,
            series,
            markers,
        } => draw_lines(area, labels, series, markers, options, text),
        Figure::Bars {
            labels,
            categories,
            groups,
            thresholds,
        } => draw_bars(area, labels, categories, groups, thresholds, options, text),
        Figure::Heatmap {
            labels,
            times,
            frequencies,
            values,
        } => draw_heatmap(area, labels, times, frequencies, values, options, text),
        Figure::Panels { title, panels } => draw_panels(area, title, panels, options, text),
    }
}

fn draw_panels(
    area: &Area<'_>,
    title: &str,
    panels: &[Figure],
    options: &RenderOptions,
    text: bool,
) -> Result<(), DrawError> {
    if panels.is_empty() {
        return Err(DrawError::Empty);
    }
    let area = if text {
        area.titled(title, ("sans-serif", 26))?
    } else {
        area.clone()
    };
    let cols = if panels.len() > 1 { 2 } else { 1 };
    let rows = panels.len().div_ceil(cols);

    let mut drawn = 0;
    for (cell, panel) in area.split_evenly((rows, cols)).iter().zip(panels) {
        match draw_on(cell, panel, options, text) {
            Ok(()) => drawn += 1,
            Err(DrawError::Empty) => {}
            Err(err) => return Err(err),
        }
    }
    if drawn == 0 {
        return Err(DrawError::Empty);
    }
    Ok(())
}

enum DrawError {
    Empty,
    Backend(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for DrawError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        DrawError::Backend(err.to_string())
    }
}

fn palette(options: &RenderOptions) -> &'static [RGBColor] {
    if options.house_style {
        &HOUSE_PALETTE
    } else {
        &PALETTE
    }
}

fn stroke(options: &RenderOptions) -> u32 {
    if options.house_style { 2 } else { 1 }
}

/// Parse `#RRGGBB`.
pub fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// Finite min/max of an iterator, padded so the range is never empty.
fn padded_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return None;
    }
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    Some((lo - pad, hi + pad))
}

fn draw_lines(
    area: &Area<'_>,
    labels: &Labels,
    series: &[Series],
    markers: &[f64],
    options: &RenderOptions,
    text: bool,
) -> Result<(), DrawError> {
    let points = || {
        series
            .iter()
            .flat_map(|s| s.points.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
    };
    let (x0, x1) = padded_range(points().map(|p| p.0)).ok_or(DrawError::Empty)?;
    let (y0, y1) = padded_range(points().map(|p| p.1)).ok_or(DrawError::Empty)?;

    let mut builder = ChartBuilder::on(area);
    builder.margin(12);
    if text {
        builder
            .caption(&labels.title, ("sans-serif", 22).into_font())
            .x_label_area_size(40)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1)?;

    if text {
        chart
            .configure_mesh()
            .x_desc(labels.x.as_str())
            .y_desc(labels.y.as_str())
            .draw()?;
    }

    let colors = palette(options);
    let width = stroke(options);
    for (i, s) in series.iter().enumerate() {
        let color = s
            .color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(colors[i % colors.len()]);
        let line = s
            .points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite());
        let drawn = chart.draw_series(LineSeries::new(line, color.stroke_width(width)))?;
        if text {
            drawn
                .label(s.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }

    for &m in markers.iter().filter(|m| (x0..=x1).contains(*m)) {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(m, y0), (m, y1)],
            BLACK.mix(0.5),
        )))?;
    }

    if text && series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }

    Ok(())
}

fn draw_bars(
    area: &Area<'_>,
    labels: &Labels,
    categories: &[String],
    groups: &[BarGroup],
    thresholds: &[f64],
    options: &RenderOptions,
    text: bool,
) -> Result<(), DrawError> {
    if categories.is_empty() || groups.is_empty() {
        return Err(DrawError::Empty);
    }
    let values = || {
        groups
            .iter()
            .flat_map(|g| g.values.iter().flatten())
            .chain(thresholds)
            .copied()
            .filter(|v| v.is_finite())
    };
    let top = values().fold(0.0f64, f64::max);
    let top = if top > 0.0 { top * 1.1 } else { 1.0 };
    let bottom = values().fold(0.0f64, f64::min) * 1.1;
    let n = categories.len() as f64;

    let mut builder = ChartBuilder::on(area);
    builder.margin(12);
    if text {
        builder
            .caption(&labels.title, ("sans-serif", 22).into_font())
            .x_label_area_size(40)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d(0.0..n, bottom..top)?;

    if text {
        let name_at = |x: &f64| {
            let i = x.floor() as usize;
            if (x - x.floor() - 0.5).abs() < 0.25 {
                categories.get(i).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(categories.len() * 2 + 1)
            .x_label_formatter(&name_at)
            .x_desc(labels.x.as_str())
            .y_desc(labels.y.as_str())
            .draw()?;
    }

    let colors = palette(options);
    let slot = 0.8 / groups.len() as f64;
    for (g, group) in groups.iter().enumerate() {
        let color = colors[g % colors.len()];
        let bars = group.values.iter().enumerate().filter_map(|(c, v)| {
            let v = v.filter(|v| v.is_finite())?;
            let left = c as f64 + 0.1 + g as f64 * slot;
            Some(Rectangle::new([(left, 0.0), (left + slot, v)], color.filled()))
        });
        let drawn = chart.draw_series(bars)?;
        if text {
            drawn
                .label(group.label.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }
    }

    for &t in thresholds.iter().filter(|t| t.is_finite()) {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, t), (n, t)],
            RED.mix(0.6).stroke_width(stroke(options)),
        )))?;
    }

    if text && groups.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }

    Ok(())
}

/// Map `t ∈ [0, 1]` onto a dark-blue to yellow ramp.
fn heat_color(t: f64) -> RGBColor {
    const STOPS: [(f64, f64, f64); 5] = [
        (68.0, 1.0, 84.0),
        (59.0, 82.0, 139.0),
        (33.0, 145.0, 140.0),
        (94.0, 201.0, 98.0),
        (253.0, 231.0, 37.0),
    ];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (STOPS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(STOPS.len() - 2);
    let f = pos - i as f64;
    let (a, b) = (STOPS[i], STOPS[i + 1]);
    let mix = |p: f64, q: f64| (p + (q - p) * f).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn edges(centres: &[f64]) -> Vec<f64> {
    match centres {
        [] => Vec::new(),
        [c] => vec![c - 0.5, c + 0.5],
        _ => {
            let mut e = Vec::with_capacity(centres.len() + 1);
            e.push(centres[0] - (centres[1] - centres[0]) / 2.0);
            e.extend(centres.windows(2).map(|w| (w[0] + w[1]) / 2.0));
            let n = centres.len();
            e.push(centres[n - 1] + (centres[n - 1] - centres[n - 2]) / 2.0);
            e
        }
    }
}

fn draw_heatmap(
    area: &Area<'_>,
    labels: &Labels,
    times: &[f64],
    frequencies: &[f64],
    values: &[Vec<f64>],
    options: &RenderOptions,
    text: bool,
) -> Result<(), DrawError> {
    if times.is_empty() || frequencies.is_empty() {
        return Err(DrawError::Empty);
    }
    let (lo, hi) = padded_range(values.iter().flatten().copied()).ok_or(DrawError::Empty)?;
    let t_edges = edges(times);
    let f_edges = edges(frequencies);
    let (x0, x1) = (t_edges[0], t_edges[t_edges.len() - 1]);
    let (y0, y1) = (f_edges[0], f_edges[f_edges.len() - 1]);

    let mut builder = ChartBuilder::on(area);
    builder.margin(12);
    if text {
        builder
            .caption(&labels.title, ("sans-serif", 22).into_font())
            .x_label_area_size(40)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1)?;

    let (te, fe) = (&t_edges, &f_edges);
    let cells = values.iter().enumerate().flat_map(|(t, frame)| {
        frame.iter().enumerate().filter_map(move |(f, v)| {
            if t + 1 >= te.len() || f + 1 >= fe.len() {
                return None;
            }
            let color = heat_color((v - lo) / (hi - lo));
            Some(Rectangle::new(
                [(te[t], fe[f]), (te[t + 1], fe[f + 1])],
                color.filled(),
            ))
        })
    });
    chart.draw_series(cells)?;

    if text {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(labels.x.as_str())
            .y_desc(labels.y.as_str())
            .draw()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn small() -> RenderOptions {
        RenderOptions::default().with_size(320, 200)
    }

    #[test]
    fn line_chart_is_png() {
        let fig = Figure::Lines {
            labels: Labels::new("PSD", "Frequency (Hz)", "Power"),
            series: vec![
                Series::new("a", (0..50).map(|i| (i as f64, (i as f64).sin())).collect()),
                Series::new("b", vec![(0.0, 1.0), (f64::NAN, 2.0), (49.0, -1.0)])
                    .with_color(Some("#112233".into())),
            ],
            markers: vec![10.0, 1000.0],
        };
        let png = render_png(&fig, &small()).unwrap();
        assert_eq!(png[..8], PNG_MAGIC);
    }

    #[test]
    fn bars_and_heatmap_render() {
        let bars = Figure::Bars {
            labels: Labels::new("Bands", "Band", "Relative power"),
            categories: vec!["delta".into(), "theta".into(), "alpha".into()],
            groups: vec![BarGroup {
                label: "O1".into(),
                values: vec![Some(0.2), None, Some(0.7)],
            }],
            thresholds: Vec::new(),
        };
        assert!(render_png(&bars, &small().with_house_style(true)).is_ok());

        let heat = Figure::Heatmap {
            labels: Labels::new("Spectrogram", "Time (s)", "Frequency (Hz)"),
            times: vec![0.5, 1.0, 1.5],
            frequencies: vec![1.0, 2.0, 3.0, 4.0],
            values: vec![vec![-10.0, 0.0, 5.0, 1.0]; 3],
        };
        assert!(render_png(&heat, &small()).is_ok());
    }

    #[test]
    fn panels_render_with_blank_cells() {
        let fig = Figure::Panels {
            title: "SSVEP".into(),
            panels: vec![
                Figure::Bars {
                    labels: Labels::new("SNR", "Channel", "SNR (dB)"),
                    categories: vec!["O1".into(), "O2".into()],
                    groups: vec![BarGroup {
                        label: "SNR".into(),
                        values: vec![Some(8.5), Some(-2.0)],
                    }],
                    thresholds: vec![3.0, 6.0],
                },
                Figure::Lines {
                    labels: Labels::default(),
                    series: Vec::new(),
                    markers: Vec::new(),
                },
                Figure::Lines {
                    labels: Labels::new("PCA", "Component", "Cumulative"),
                    series: vec![Series::new("cumulative", vec![(1.0, 0.6), (2.0, 1.0)])],
                    markers: Vec::new(),
                },
            ],
        };
        let png = render_png(&fig, &small().with_size(640, 480)).unwrap();
        assert_eq!(png[..8], PNG_MAGIC);

        let empty = Figure::Panels {
            title: "nothing".into(),
            panels: vec![Figure::Lines {
                labels: Labels::default(),
                series: Vec::new(),
                markers: Vec::new(),
            }],
        };
        assert!(matches!(render_png(&empty, &small()), Err(RenderError::Empty)));
    }

    #[test]
    fn empty_figure_is_an_error() {
        let fig = Figure::Lines {
            labels: Labels::default(),
            series: vec![Series::new("nan", vec![(f64::NAN, f64::NAN)])],
            markers: Vec::new(),
        };
        assert!(matches!(render_png(&fig, &small()), Err(RenderError::Empty)));
    }

    #[test]
    fn size_is_checked() {
        let fig = Figure::Lines {
            labels: Labels::default(),
            series: vec![Series::new("x", vec![(0.0, 0.0), (1.0, 1.0)])],
            markers: Vec::new(),
        };
        let err = render_png(&fig, &RenderOptions::default().with_size(10, 10)).unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#3B82F6"), Some(RGBColor(59, 130, 246)));
        assert_eq!(parse_hex_color("3B82F6"), None);
        assert_eq!(parse_hex_color("#3B82"), None);
        assert_eq!(parse_hex_color("#zz0000"), None);
    }

    #[test]
    fn heat_ramp_endpoints() {
        assert_eq!(heat_color(0.0), RGBColor(68, 1, 84));
        assert_eq!(heat_color(1.0), RGBColor(253, 231, 37));
        assert_eq!(heat_color(f64::NAN), RGBColor(68, 1, 84));
    }
}
