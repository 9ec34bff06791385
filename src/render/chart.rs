use std::{io::Write, path::Path};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use super::{
    color::Rgb,
    map::Figure,
    writer::{escape, write_image, SvgWriter},
};

/// Categorical bar chart settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarChart {
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    pub color: Rgb,
    /// Bar width as a fraction of each category's slot.
    pub bar_width: f64,
    pub figure: Figure,
    pub font_size: f64,
}

impl Default for BarChart {
    fn default() -> Self {
        Self {
            title: "Number of Females tagged from each species".into(),
            xlabel: "Species".into(),
            ylabel: "Number of tags".into(),
            color: Rgb::new(0, 128, 0),
            bar_width: 0.5,
            figure: Figure { width_in: 6.4, height_in: 4.8, dpi: 100.0 },
            font_size: 10.0,
        }
    }
}

/// Round `value` to 1, 2 or 5 times a power of ten.
fn nice_step(value: f64) -> f64 {
    let magnitude = 10f64.powf(value.log10().floor());
    let fraction = value / magnitude;
    let nice = if fraction <= 1.0 { 1.0 } else if fraction <= 2.0 { 2.0 } else if fraction <= 5.0 { 5.0 } else { 10.0 };
    nice * magnitude
}

/// Y-axis ticks from zero to at least `max`, about five intervals.
pub(crate) fn y_ticks(max: f64) -> Vec<f64> {
    if max <= 0.0 { return vec![0.0, 1.0] }
    let step = nice_step(max / 5.0);
    let count = (max / step).ceil() as usize;
    (0..=count).map(|i| i as f64 * step).collect()
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.3}").trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

impl BarChart {
    /// Build the chart as an SVG document.
    pub(crate) fn svg(&self, bars: &[(String, f64)]) -> std::io::Result<Vec<u8>> {
        let (width, height) = self.figure.size();
        let font = self.font_size;
        let (left, right, top, bottom) = (font * 7.0, font * 2.0, font * 4.0, font * 5.0);
        let plot_w = (width - left - right).max(1.0);
        let plot_h = (height - top - bottom).max(1.0);
        let base = top + plot_h;

        let max = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
        let ticks = y_ticks(max);
        let y_max = ticks.last().copied().unwrap_or(1.0);
        let y_of = |value: f64| base - value / y_max * plot_h;

        let mut svg = SvgWriter::in_memory();
        svg.write_header(width, height)?;
        svg.write_styles()?;

        for &tick in &ticks {
            let y = y_of(tick);
            writeln!(svg, r##"<line x1="{:.3}" y1="{y:.3}" x2="{left:.3}" y2="{y:.3}" stroke="#000000"/>"##, left - font * 0.4)?;
            writeln!(
                svg,
                r#"<text x="{:.3}" y="{y:.3}" font-size="{font}" text-anchor="end" dominant-baseline="middle">{}</text>"#,
                left - font * 0.7,
                format_tick(tick),
            )?;
        }

        let slot = plot_w / bars.len().max(1) as f64;
        let bar_w = slot * self.bar_width.clamp(0.0, 1.0);
        for (i, (label, value)) in bars.iter().enumerate() {
            let cx = left + slot * (i as f64 + 0.5);
            let y = y_of(*value);
            writeln!(
                svg,
                r#"<rect x="{:.3}" y="{y:.3}" width="{bar_w:.3}" height="{:.3}" fill="{}"><title>{}</title></rect>"#,
                cx - bar_w / 2.0,
                base - y,
                self.color,
                escape(&format!("{label}: {}", format_tick(*value))),
            )?;
            writeln!(
                svg,
                r#"<text x="{cx:.3}" y="{:.3}" font-size="{font}" text-anchor="middle" dominant-baseline="hanging">{}</text>"#,
                base + font * 0.7,
                escape(label),
            )?;
        }

        // Axes
        writeln!(svg, r##"<path d="M{left:.3},{top:.3} L{left:.3},{base:.3} L{:.3},{base:.3}" fill="none" stroke="#000000"/>"##, left + plot_w)?;

        writeln!(
            svg,
            r#"<text x="{:.3}" y="{:.3}" font-size="{font}" text-anchor="middle">{}</text>"#,
            left + plot_w / 2.0,
            height - font * 1.5,
            escape(&self.xlabel),
        )?;
        let (yx, yy) = (font * 1.8, top + plot_h / 2.0);
        writeln!(
            svg,
            r#"<text x="{yx:.3}" y="{yy:.3}" font-size="{font}" text-anchor="middle" transform="rotate(-90 {yx:.3} {yy:.3})">{}</text>"#,
            escape(&self.ylabel),
        )?;
        writeln!(
            svg,
            r#"<text x="{:.3}" y="{:.3}" font-size="{}" text-anchor="middle">{}</text>"#,
            left + plot_w / 2.0,
            top - font * 1.5,
            font * 1.2,
            escape(&self.title),
        )?;

        svg.write_footer()?;
        Ok(svg.into_bytes())
    }
}

/// Render ordered `(category, value)` bars to a PNG or SVG file at `path`.
pub fn render_bar_chart(chart: &BarChart, bars: &[(String, f64)], path: &Path) -> Result<()> {
    let fail = |reason: String| Error::Render { path: path.to_path_buf(), reason };
    if let Some((label, value)) = bars.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
        return Err(fail(format!("bar {label:?} has invalid value {value}")));
    }

    info!("[render] bar chart with {} bars -> {}", bars.len(), path.display());
    let svg = chart.svg(bars).map_err(|e| fail(e.to_string()))?;
    write_image(&svg, path, chart.figure.dpi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_round_numbers() {
        assert_eq!(y_ticks(59.0), vec![0.0, 20.0, 40.0, 60.0]);
        assert_eq!(y_ticks(4.0), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(y_ticks(0.0), vec![0.0, 1.0]);
        assert_eq!(y_ticks(2.0).last(), Some(&2.0));
    }

    #[test]
    fn bars_keep_order_and_color() {
        let bars = vec![("Flapperskate".to_string(), 3.0), ("Spurdog".to_string(), 2.0)];
        let svg = String::from_utf8(BarChart::default().svg(&bars).unwrap()).unwrap();

        assert_eq!(svg.matches("fill=\"#008000\"").count(), 2);
        assert!(svg.find(">Flapperskate<").unwrap() < svg.find(">Spurdog<").unwrap());
        assert!(svg.contains("Number of tags"));
        assert!(svg.contains("rotate(-90"));
    }

    #[test]
    fn taller_bar_for_larger_value() {
        let bars = vec![("a".to_string(), 1.0), ("b".to_string(), 4.0)];
        let svg = String::from_utf8(BarChart::default().svg(&bars).unwrap()).unwrap();
        let heights = svg.match_indices("<rect x=")
            .map(|(i, _)| {
                let rest = &svg[i..];
                let start = rest.find("height=\"").unwrap() + 8;
                let end = start + rest[start..].find('"').unwrap();
                rest[start..end].parse::<f64>().unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(heights.len(), 2);
        assert!(heights[1] > heights[0] * 3.9);
    }

    #[test]
    fn rejects_negative_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let result = render_bar_chart(&BarChart::default(), &[("a".into(), -1.0)], &path);
        assert!(matches!(result, Err(Error::Render { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        render_bar_chart(&BarChart::default(), &[("Spurdog".into(), 2.0)], &path).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
