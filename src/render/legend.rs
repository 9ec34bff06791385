use std::io::Write;

use serde::{Deserialize, Serialize};

use super::{color::Rgb, view::Frame, writer::escape};

/// How an entry's swatch is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Swatch {
    #[default]
    Patch,
    Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub label: String,
    pub fill: Rgb,
    #[serde(default)]
    pub edge: Option<Rgb>,
    #[serde(default)]
    pub swatch: Swatch,
}

/// Boxed legend in the upper-left corner of the map frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Legend {
    pub title: String,
    pub entries: Vec<LegendEntry>,
    pub font_size: f64,
}

impl Default for Legend {
    fn default() -> Self {
        Self { title: "Legend".into(), entries: Vec::new(), font_size: 10.0 }
    }
}

impl Legend {
    pub(crate) fn draw(&self, writer: &mut impl Write, frame: &Frame) -> std::io::Result<()> {
        if self.entries.is_empty() { return Ok(()) }

        let font = self.font_size;
        let pad = font * 0.6;
        let row = font * 1.5;
        let swatch = font * 1.2;

        // Rough text metrics; resvg has no layout API to measure against.
        let text_width = |text: &str| text.chars().count() as f64 * font * 0.6;
        let widest = self.entries.iter()
            .map(|entry| swatch + pad + text_width(&entry.label))
            .fold(text_width(&self.title), f64::max);

        let title_rows = if self.title.is_empty() { 0.0 } else { 1.0 };
        let width = widest + 2.0 * pad;
        let height = (self.entries.len() as f64 + title_rows) * row + 2.0 * pad;
        let (x0, y0) = (frame.x + pad, frame.y + pad);

        writeln!(writer, r#"<g class="legend">"#)?;
        writeln!(
            writer,
            r##"<rect x="{x0:.3}" y="{y0:.3}" width="{width:.3}" height="{height:.3}" rx="{:.3}" fill="#ffffff" fill-opacity="0.8" stroke="#cccccc"/>"##,
            pad / 2.0,
        )?;

        let mut y = y0 + pad;
        if title_rows > 0.0 {
            writeln!(
                writer,
                r#"<text x="{:.3}" y="{:.3}" font-size="{font}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
                x0 + width / 2.0,
                y + row / 2.0,
                escape(&self.title),
            )?;
            y += row;
        }

        for entry in &self.entries {
            let cy = y + row / 2.0;
            let sx = x0 + pad;
            let edge = entry.edge.map(|c| c.to_string()).unwrap_or_else(|| "none".into());
            match entry.swatch {
                Swatch::Patch => writeln!(
                    writer,
                    r#"<rect x="{sx:.3}" y="{:.3}" width="{swatch:.3}" height="{:.3}" fill="{}" stroke="{edge}" stroke-width="0.8"/>"#,
                    cy - swatch / 3.0,
                    swatch * 2.0 / 3.0,
                    entry.fill,
                )?,
                Swatch::Marker => writeln!(
                    writer,
                    r#"<circle cx="{:.3}" cy="{cy:.3}" r="{:.3}" fill="{}" stroke="{edge}"/>"#,
                    sx + swatch / 2.0,
                    swatch / 4.0,
                    entry.fill,
                )?,
            }
            writeln!(
                writer,
                r#"<text x="{:.3}" y="{cy:.3}" font-size="{font}" dominant-baseline="middle">{}</text>"#,
                sx + swatch + pad,
                escape(&entry.label),
            )?;
            y += row;
        }

        writeln!(writer, "</g>")
    }
}
