use std::io::Write;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::crs::{Crs, CrsError, Transformer, WGS84};
use super::{view::MapView, writer::escape};

/// Scale bar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBar {
    /// Bar length in `unit`s.
    pub length: f64,
    /// Unit label, e.g. "km".
    pub unit: String,
    /// Metres per `unit`.
    pub unit_meters: f64,
    /// Anchor of the bar's right end, as fractions of the view (x from left, y from bottom).
    pub location: (f64, f64),
    /// Thickness of the bar in screen units.
    pub line_width: f64,
    pub font_size: f64,
}

impl Default for ScaleBar {
    fn default() -> Self {
        Self {
            length: 20.0,
            unit: "km".into(),
            unit_meters: 1000.0,
            location: (0.85, 0.05),
            line_width: 4.0,
            font_size: 8.0,
        }
    }
}

/// Screen geometry of a scale bar: left end (0), midpoint (length / 2) and right end (length).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBarGeometry {
    pub start: (f64, f64),
    pub middle: (f64, f64),
    pub end: (f64, f64),
    /// Local Transverse Mercator the bar was measured in.
    pub local_crs: Crs,
}

impl ScaleBar {
    /// Place the bar on `view`.
    ///
    /// The visible extent is taken to lon/lat, a Transverse Mercator is centred on its
    /// mid-longitude at the anchor's latitude, and the bar is laid out in that metric
    /// system from the anchor leftward. The result moves with the view while always
    /// spanning `length` real-world units.
    pub fn geometry(&self, view: &MapView) -> Result<ScaleBarGeometry, CrsError> {
        let lonlat = view.extent_in(&WGS84)?;
        let lon_0 = (lonlat.min().x + lonlat.max().x) / 2.0;
        let lat_0 = lonlat.min().y + lonlat.height() * self.location.1;
        let local_crs = Crs::transverse_mercator(lon_0, lat_0);

        let local = view.extent_in(&local_crs)?;
        let x = local.min().x + local.width() * self.location.0;
        let y = local.min().y + local.height() * self.location.1;
        let meters = self.length * self.unit_meters;

        let to_display = Transformer::new(&local_crs, view.crs())?;
        let screen = |dx: f64| -> Result<(f64, f64), CrsError> {
            Ok(view.to_screen(to_display.transform(Coord { x: x - meters + dx, y })?))
        };

        Ok(ScaleBarGeometry {
            start: screen(0.0)?,
            middle: screen(meters / 2.0)?,
            end: screen(meters)?,
            local_crs,
        })
    }

    /// Draw a two-tone bar over a black underlay: black on the half next to the anchor,
    /// white on the far half. Labels sit at 0, half and full length.
    pub(crate) fn draw(&self, writer: &mut impl Write, geometry: &ScaleBarGeometry) -> std::io::Result<()> {
        let ScaleBarGeometry { start, middle, end, .. } = *geometry;
        let inner = self.line_width;
        let outer = self.line_width * 1.5;

        let line = |writer: &mut dyn Write, a: (f64, f64), b: (f64, f64), color: &str, width: f64| {
            writeln!(
                writer,
                r#"<line x1="{:.3}" y1="{:.3}" x2="{:.3}" y2="{:.3}" stroke="{color}" stroke-width="{width}"/>"#,
                a.0, a.1, b.0, b.1,
            )
        };

        writeln!(writer, r#"<g class="scalebar">"#)?;
        line(writer, start, end, "#000000", outer)?;
        line(writer, middle, end, "#000000", inner)?;
        line(writer, start, middle, "#ffffff", inner)?;

        let offset = outer + self.font_size;
        for ((x, y), value) in [(start, 0.0), (middle, self.length / 2.0), (end, self.length)] {
            writeln!(
                writer,
                r#"<text x="{x:.3}" y="{:.3}" font-size="{}" text-anchor="middle">{}</text>"#,
                y + offset,
                self.font_size,
                escape(&format!("{} {}", format_length(value), self.unit)),
            )?;
        }
        writeln!(writer, "</g>")
    }
}

/// Whole numbers without a decimal point, others with up to two decimals.
fn format_length(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}").trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::Rect;

    use super::*;
    use crate::{crs::WORLD_MERCATOR, render::view::Frame};

    fn view_of(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> MapView {
        let lonlat = Rect::new(Coord { x: lon_min, y: lat_min }, Coord { x: lon_max, y: lat_max });
        let transformer = Transformer::new(&WGS84, &WORLD_MERCATOR).unwrap();
        let extent = crate::render::view::reproject_rect(&lonlat, &transformer).unwrap();
        MapView::new(WORLD_MERCATOR, extent, Frame { x: 50.0, y: 50.0, width: 1000.0, height: 1000.0 })
    }

    /// Ground distance between two screen points, measured in the bar's local metric CRS.
    fn ground_length(view: &MapView, geometry: &ScaleBarGeometry, a: (f64, f64), b: (f64, f64)) -> f64 {
        let to_local = Transformer::new(view.crs(), &geometry.local_crs).unwrap();
        let a = to_local.transform(view.from_screen(a)).unwrap();
        let b = to_local.transform(view.from_screen(b)).unwrap();
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn bar_spans_requested_length() {
        let view = view_of(-8.0, 54.0, -5.5, 55.5);
        let bar = ScaleBar::default();
        let geometry = bar.geometry(&view).unwrap();

        assert_relative_eq!(ground_length(&view, &geometry, geometry.start, geometry.end), 20_000.0, max_relative = 1e-6);
        assert_relative_eq!(ground_length(&view, &geometry, geometry.start, geometry.middle), 10_000.0, max_relative = 1e-6);
        assert!(geometry.start.0 < geometry.middle.0 && geometry.middle.0 < geometry.end.0);
    }

    #[test]
    fn bar_is_anchored_relative_to_frame() {
        let view = view_of(-8.0, 54.0, -5.5, 55.5);
        let geometry = ScaleBar::default().geometry(&view).unwrap();
        let frame = view.frame();

        let fx = (geometry.end.0 - frame.x) / frame.width;
        let fy = (frame.bottom() - geometry.end.1) / frame.height;
        assert!((fx - 0.85).abs() < 0.02, "x fraction {fx}");
        assert!((fy - 0.05).abs() < 0.02, "y fraction {fy}");
    }

    #[test]
    fn zoom_changes_screen_length_but_not_ground_length() {
        let bar = ScaleBar::default();
        let wide = view_of(-8.0, 54.0, -5.5, 55.5);
        let tight = view_of(-7.0, 54.5, -6.0, 55.1);

        let g_wide = bar.geometry(&wide).unwrap();
        let g_tight = bar.geometry(&tight).unwrap();

        let screen = |g: &ScaleBarGeometry| g.end.0 - g.start.0;
        assert!(screen(&g_tight) > screen(&g_wide) * 1.5);

        assert_relative_eq!(ground_length(&wide, &g_wide, g_wide.start, g_wide.end), 20_000.0, max_relative = 1e-6);
        assert_relative_eq!(ground_length(&tight, &g_tight, g_tight.start, g_tight.end), 20_000.0, max_relative = 1e-6);
    }

    #[test]
    fn labels_cover_zero_half_and_full() {
        let view = view_of(-8.0, 54.0, -5.5, 55.5);
        let bar = ScaleBar::default();
        let mut out = Vec::new();
        bar.draw(&mut out, &bar.geometry(&view).unwrap()).unwrap();
        let svg = String::from_utf8(out).unwrap();
        for label in ["0 km", "10 km", "20 km"] {
            assert!(svg.contains(label), "missing {label}");
        }
        assert!(svg.contains("#ffffff"));
    }

    #[test]
    fn length_formatting() {
        assert_eq!(format_length(20.0), "20");
        assert_eq!(format_length(2.5), "2.5");
        assert_eq!(format_length(0.25), "0.25");
    }
}
