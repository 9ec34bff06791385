use std::io::Write;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::crs::{CrsError, Transformer, WGS84};
use super::{view::MapView, writer::escape};

/// Vertices per gridline, so curved graticules stay smooth in any display CRS.
const LINE_SAMPLES: usize = 64;

/// Which frame edges carry gridline labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLabels {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl Default for GridLabels {
    fn default() -> Self {
        Self { top: false, bottom: true, left: true, right: false }
    }
}

/// Graticule at explicit longitudes (`xlocs`) and latitudes (`ylocs`), in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gridlines {
    pub xlocs: Vec<f64>,
    pub ylocs: Vec<f64>,
    pub labels: GridLabels,
    pub font_size: f64,
}

impl Default for Gridlines {
    fn default() -> Self {
        Self {
            xlocs: vec![-8.0, -7.5, -7.0, -6.5, -6.0, -5.5],
            ylocs: vec![54.0, 54.5, 55.0, 55.5],
            labels: GridLabels::default(),
            font_size: 9.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge { Top, Bottom, Left, Right }

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GridLabel {
    pub(crate) edge: Edge,
    pub(crate) position: (f64, f64),
    pub(crate) text: String,
}

/// Screen polylines and edge labels of a graticule.
#[derive(Debug, Clone, Default)]
pub(crate) struct GridLayout {
    pub(crate) lines: Vec<Vec<(f64, f64)>>,
    pub(crate) labels: Vec<GridLabel>,
}

impl Gridlines {
    /// Project each meridian and parallel onto `view` and find where it crosses the labelled edges.
    pub(crate) fn layout(&self, view: &MapView) -> Result<GridLayout, CrsError> {
        // Lines overshoot the view so every edge crossing is a true crossing; the map clip trims them.
        let lonlat = view.extent_in(&WGS84)?;
        let (pad_x, pad_y) = (lonlat.width() * 0.05, lonlat.height() * 0.05);
        let (west, east) = (lonlat.min().x - pad_x, lonlat.max().x + pad_x);
        let (south, north) = ((lonlat.min().y - pad_y).max(-85.0), (lonlat.max().y + pad_y).min(85.0));
        let to_display = Transformer::new(&WGS84, view.crs())?;
        let frame = *view.frame();
        let mut layout = GridLayout::default();

        let sample = |from: Coord<f64>, to: Coord<f64>| -> Result<Vec<(f64, f64)>, CrsError> {
            (0..=LINE_SAMPLES)
                .map(|i| {
                    let t = i as f64 / LINE_SAMPLES as f64;
                    let c = Coord { x: from.x + (to.x - from.x) * t, y: from.y + (to.y - from.y) * t };
                    Ok(view.to_screen(to_display.transform(c)?))
                })
                .collect()
        };

        for &lon in &self.xlocs {
            let line = sample(Coord { x: lon, y: south }, Coord { x: lon, y: north })?;
            let text = format_degrees(lon, 'E', 'W');
            if self.labels.bottom {
                if let Some(x) = crossing_x(&line, frame.bottom()).filter(|x| (frame.x..=frame.right()).contains(x)) {
                    layout.labels.push(GridLabel { edge: Edge::Bottom, position: (x, frame.bottom()), text: text.clone() });
                }
            }
            if self.labels.top {
                if let Some(x) = crossing_x(&line, frame.y).filter(|x| (frame.x..=frame.right()).contains(x)) {
                    layout.labels.push(GridLabel { edge: Edge::Top, position: (x, frame.y), text });
                }
            }
            layout.lines.push(line);
        }

        for &lat in &self.ylocs {
            let line = sample(Coord { x: west, y: lat }, Coord { x: east, y: lat })?;
            let text = format_degrees(lat, 'N', 'S');
            if self.labels.left {
                if let Some(y) = crossing_y(&line, frame.x).filter(|y| (frame.y..=frame.bottom()).contains(y)) {
                    layout.labels.push(GridLabel { edge: Edge::Left, position: (frame.x, y), text: text.clone() });
                }
            }
            if self.labels.right {
                if let Some(y) = crossing_y(&line, frame.right()).filter(|y| (frame.y..=frame.bottom()).contains(y)) {
                    layout.labels.push(GridLabel { edge: Edge::Right, position: (frame.right(), y), text });
                }
            }
            layout.lines.push(line);
        }

        Ok(layout)
    }

    /// Lines go inside the map clip group; labels are drawn outside it by [`Gridlines::draw_labels`].
    pub(crate) fn draw_lines(&self, writer: &mut impl Write, layout: &GridLayout) -> std::io::Result<()> {
        writeln!(writer, r#"<g class="grid">"#)?;
        for line in &layout.lines {
            let points = line.iter()
                .map(|(x, y)| format!("{x:.3},{y:.3}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, r#"<polyline points="{points}"/>"#)?;
        }
        writeln!(writer, "</g>")
    }

    pub(crate) fn draw_labels(&self, writer: &mut impl Write, layout: &GridLayout) -> std::io::Result<()> {
        let gap = self.font_size * 0.6;
        for label in &layout.labels {
            let (x, y) = label.position;
            let (x, y, anchor, baseline) = match label.edge {
                Edge::Bottom => (x, y + gap, "middle", "hanging"),
                Edge::Top => (x, y - gap, "middle", "alphabetic"),
                Edge::Left => (x - gap, y, "end", "middle"),
                Edge::Right => (x + gap, y, "start", "middle"),
            };
            writeln!(
                writer,
                r#"<text x="{x:.3}" y="{y:.3}" font-size="{}" text-anchor="{anchor}" dominant-baseline="{baseline}">{}</text>"#,
                self.font_size,
                escape(&label.text),
            )?;
        }
        Ok(())
    }
}

/// Degree label in the usual cartographic style: "7.5°W", "54°N", "0°".
pub(crate) fn format_degrees(value: f64, positive: char, negative: char) -> String {
    let magnitude = value.abs();
    let number = if magnitude.fract() == 0.0 {
        format!("{magnitude:.0}")
    } else {
        format!("{magnitude:.4}").trim_end_matches('0').trim_end_matches('.').to_string()
    };
    match value {
        v if v > 0.0 => format!("{number}°{positive}"),
        v if v < 0.0 => format!("{number}°{negative}"),
        _ => format!("{number}°"),
    }
}

/// Screen x where a polyline crosses the horizontal line `y`.
fn crossing_x(line: &[(f64, f64)], y: f64) -> Option<f64> {
    line.windows(2).find_map(|w| {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if (y0 - y) * (y1 - y) > 0.0 || y0 == y1 { return None }
        Some(x0 + (x1 - x0) * (y - y0) / (y1 - y0))
    })
}

/// Screen y where a polyline crosses the vertical line `x`.
fn crossing_y(line: &[(f64, f64)], x: f64) -> Option<f64> {
    line.windows(2).find_map(|w| {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if (x0 - x) * (x1 - x) > 0.0 || x0 == x1 { return None }
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    })
}
