use std::{io::Write, path::Path};

use geo::{Coord, Rect};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    collection::FeatureCollection,
    crs::{Crs, CrsError, Transformer, WORLD_MERCATOR},
    error::{Error, Result},
};
use super::{
    color::Rgb,
    grid::Gridlines,
    legend::Legend,
    path::{geometry_points, geometry_to_path, is_areal},
    scalebar::ScaleBar,
    view::{reproject_rect, Frame, MapView},
    writer::{escape, write_image, SvgWriter, UNITS_PER_INCH},
};

/// Page size and resolution of a rendered figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Figure {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
}

impl Default for Figure {
    fn default() -> Self {
        Self { width_in: 15.0, height_in: 15.0, dpi: 300.0 }
    }
}

impl Figure {
    /// Size in SVG user units.
    pub(crate) fn size(&self) -> (f64, f64) {
        (self.width_in * UNITS_PER_INCH, self.height_in * UNITS_PER_INCH)
    }
}

/// Fill and outline of a polygon layer. Linear geometries use only the edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonStyle {
    pub fill: Rgb,
    #[serde(default)]
    pub edge: Option<Rgb>,
    #[serde(default = "PolygonStyle::default_line_width")]
    pub line_width: f64,
}

impl PolygonStyle {
    fn default_line_width() -> f64 { 1.0 }
}

/// Circle markers for a point layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: Rgb,
    #[serde(default = "MarkerStyle::default_radius")]
    pub radius: f64,
}

impl MarkerStyle {
    fn default_radius() -> f64 { 4.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerStyle {
    Polygon(PolygonStyle),
    Marker(MarkerStyle),
}

/// One collection drawn on the map, in draw order.
#[derive(Debug, Clone)]
pub struct MapLayer<'a> {
    pub collection: &'a FeatureCollection,
    pub style: LayerStyle,
}

/// Which layers define the visible extent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtentSource {
    /// Union of every layer's bounds.
    #[default]
    All,
    /// Bounds of the layer whose collection has this name.
    Layer(String),
}

/// Everything about a map except its layers.
#[derive(Debug, Clone)]
pub struct MapSpec {
    pub display_crs: Crs,
    pub figure: Figure,
    pub title: String,
    pub title_font_size: f64,
    pub legend: Legend,
    pub scale_bar: Option<ScaleBar>,
    pub gridlines: Option<Gridlines>,
    pub extent: ExtentSource,
}

impl Default for MapSpec {
    fn default() -> Self {
        Self {
            display_crs: WORLD_MERCATOR,
            figure: Figure::default(),
            title: String::new(),
            title_font_size: 14.0,
            legend: Legend { title: String::new(), entries: Vec::new(), font_size: 10.0 },
            scale_bar: Some(ScaleBar::default()),
            gridlines: Some(Gridlines::default()),
            extent: ExtentSource::All,
        }
    }
}

/// Page margins around the map frame, in user units.
const MARGIN: f64 = 60.0;

fn projection_error(dataset: &str) -> impl Fn(CrsError) -> Error + '_ {
    move |e| Error::Projection { dataset: dataset.to_string(), reason: e.to_string() }
}

/// Bounds of the extent layers, taken into the display CRS.
fn display_extent(spec: &MapSpec, layers: &[MapLayer<'_>]) -> Result<Rect<f64>> {
    let sources = layers.iter()
        .filter(|layer| match &spec.extent {
            ExtentSource::All => true,
            ExtentSource::Layer(name) => layer.collection.name() == name,
        })
        .collect::<Vec<_>>();

    if let ExtentSource::Layer(name) = &spec.extent {
        if sources.is_empty() {
            return Err(Error::Config(format!("map extent layer {name:?} is not among the map layers")));
        }
    }

    let mut extent: Option<Rect<f64>> = None;
    for layer in sources {
        let collection = layer.collection;
        let Some(bounds) = collection.bounds() else { continue };
        let crs = collection.crs().ok_or_else(|| Error::Projection {
            dataset: collection.name().to_string(),
            reason: "source CRS is unknown".into(),
        })?;
        let transformer = Transformer::new(crs, &spec.display_crs).map_err(projection_error(collection.name()))?;
        let bounds = reproject_rect(&bounds, &transformer).map_err(projection_error(collection.name()))?;
        extent = Some(match extent {
            None => bounds,
            Some(e) => Rect::new(
                Coord { x: e.min().x.min(bounds.min().x), y: e.min().y.min(bounds.min().y) },
                Coord { x: e.max().x.max(bounds.max().x), y: e.max().y.max(bounds.max().y) },
            ),
        });
    }

    extent.ok_or_else(|| Error::Config("map has no features to define its extent".into()))
}

fn draw_layer(writer: &mut impl Write, view: &MapView, layer: &MapLayer<'_>) -> Result<()> {
    let collection = layer.collection.to_crs(view.crs())?;
    let screen = |coord: Coord<f64>| view.to_screen(coord);
    let render_error = |e: std::io::Error| Error::Render { path: Default::default(), reason: e.to_string() };

    writeln!(writer, r#"<g class="layer" data-name="{}">"#, escape(collection.name())).map_err(render_error)?;
    for geometry in collection.geometries() {
        match layer.style {
            LayerStyle::Polygon(style) => {
                let d = geometry_to_path(geometry, &screen);
                if d.is_empty() { continue }
                let fill = if is_areal(geometry) { style.fill.to_string() } else { "none".into() };
                writeln!(
                    writer,
                    r#"<path d="{d}" fill="{fill}" fill-rule="evenodd" stroke="{}" stroke-width="{}"/>"#,
                    style.edge.unwrap_or(style.fill),
                    style.line_width,
                ).map_err(render_error)?;
            }
            LayerStyle::Marker(style) => {
                for point in geometry_points(geometry) {
                    let (x, y) = screen(point.0);
                    writeln!(
                        writer,
                        r#"<circle cx="{x:.3}" cy="{y:.3}" r="{}" fill="{}"/>"#,
                        style.radius,
                        style.color,
                    ).map_err(render_error)?;
                }
            }
        }
    }
    writeln!(writer, "</g>").map_err(render_error)?;

    debug!("[render] drew layer {} ({} features)", collection.name(), collection.len());
    Ok(())
}

/// Build the map as an SVG document.
pub(crate) fn map_svg(spec: &MapSpec, layers: &[MapLayer<'_>]) -> Result<Vec<u8>> {
    let extent = display_extent(spec, layers)?;
    let (width, height) = spec.figure.size();
    let title_band = if spec.title.is_empty() { 0.0 } else { spec.title_font_size * 2.5 };
    let available = Frame {
        x: MARGIN,
        y: MARGIN + title_band,
        width: (width - 2.0 * MARGIN).max(1.0),
        height: (height - 2.0 * MARGIN - title_band).max(1.0),
    };
    let view = MapView::new(spec.display_crs, extent, available);
    let frame = *view.frame();

    let grid = spec.gridlines.as_ref()
        .map(|grid| grid.layout(&view).map(|layout| (grid, layout)))
        .transpose()
        .map_err(projection_error("gridlines"))?;
    let scale_bar = spec.scale_bar.as_ref()
        .map(|bar| bar.geometry(&view).map(|geometry| (bar, geometry)))
        .transpose()
        .map_err(projection_error("scale bar"))?;

    let render_error = |e: std::io::Error| Error::Render { path: Default::default(), reason: e.to_string() };
    let mut svg = SvgWriter::in_memory();
    svg.write_header(width, height).map_err(render_error)?;
    svg.write_styles().map_err(render_error)?;
    writeln!(
        svg,
        r#"<clipPath id="map-clip"><rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}"/></clipPath>"#,
        frame.x, frame.y, frame.width, frame.height,
    ).map_err(render_error)?;

    writeln!(svg, r#"<g clip-path="url(#map-clip)">"#).map_err(render_error)?;
    for layer in layers {
        draw_layer(&mut svg, &view, layer)?;
    }
    if let Some((grid, layout)) = &grid {
        grid.draw_lines(&mut svg, layout).map_err(render_error)?;
    }
    writeln!(svg, "</g>").map_err(render_error)?;

    writeln!(
        svg,
        r#"<rect class="frame" x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}"/>"#,
        frame.x, frame.y, frame.width, frame.height,
    ).map_err(render_error)?;

    if let Some((grid, layout)) = &grid {
        grid.draw_labels(&mut svg, layout).map_err(render_error)?;
    }
    if let Some((bar, geometry)) = &scale_bar {
        bar.draw(&mut svg, geometry).map_err(render_error)?;
    }
    spec.legend.draw(&mut svg, &frame).map_err(render_error)?;

    if !spec.title.is_empty() {
        writeln!(
            svg,
            r#"<text x="{:.3}" y="{:.3}" font-size="{}" text-anchor="middle">{}</text>"#,
            frame.x + frame.width / 2.0,
            frame.y - spec.title_font_size,
            spec.title_font_size,
            escape(&spec.title),
        ).map_err(render_error)?;
    }

    svg.write_footer().map_err(render_error)?;
    Ok(svg.into_bytes())
}

/// Render `layers` (in draw order) to a PNG or SVG file at `path`.
///
/// Each layer is projected from its own CRS into `spec.display_crs`. The output file is
/// replaced only once the whole image has been produced.
pub fn render_map(spec: &MapSpec, layers: &[MapLayer<'_>], path: &Path) -> Result<()> {
    info!("[render] map with {} layers -> {}", layers.len(), path.display());
    let svg = map_svg(spec, layers).map_err(|e| match e {
        Error::Render { reason, .. } => Error::Render { path: path.to_path_buf(), reason },
        other => other,
    })?;
    write_image(&svg, path, spec.figure.dpi)
}

#[cfg(test)]
mod tests {
    use geo::{point, polygon, Geometry};
    use polars::df;

    use super::*;
    use crate::render::legend::{LegendEntry, Swatch};

    fn square(name: &str, size: f64) -> FeatureCollection {
        let (x0, y0) = (600_000.0, 6_000_000.0);
        let geometry: Geometry<f64> = polygon![
            (x: x0, y: y0), (x: x0 + size, y: y0), (x: x0 + size, y: y0 + size), (x: x0, y: y0 + size),
        ].into();
        FeatureCollection::new(name, Some(Crs::Epsg(32629)), vec![geometry], df!["fid" => [0u32]].unwrap()).unwrap()
    }

    fn tags() -> FeatureCollection {
        FeatureCollection::new(
            "tags",
            Some(Crs::Epsg(32629)),
            vec![point!(x: 605_000.0, y: 6_005_000.0).into(), point!(x: 606_000.0, y: 6_004_000.0).into()],
            df!["fid" => [0u32, 1]].unwrap(),
        ).unwrap()
    }

    fn spec() -> MapSpec {
        MapSpec {
            title: "Tags & areas".into(),
            figure: Figure { width_in: 4.0, height_in: 4.0, dpi: 50.0 },
            legend: Legend {
                title: "Legend".into(),
                entries: vec![LegendEntry { label: "Tags".into(), fill: Rgb::new(220, 20, 60), edge: None, swatch: Swatch::Patch }],
                font_size: 10.0,
            },
            gridlines: Some(Gridlines { xlocs: vec![-5.5, -5.4], ylocs: vec![54.1], ..Gridlines::default() }),
            scale_bar: Some(ScaleBar { length: 2.0, ..ScaleBar::default() }),
            ..MapSpec::default()
        }
    }

    #[test]
    fn svg_contains_every_element() {
        let outline = square("outline", 20_000.0);
        let points = tags();
        let layers = [
            MapLayer { collection: &outline, style: LayerStyle::Polygon(PolygonStyle { fill: Rgb::new(216, 191, 216), edge: Some(Rgb::BLACK), line_width: 1.0 }) },
            MapLayer { collection: &points, style: LayerStyle::Marker(MarkerStyle { color: Rgb::new(220, 20, 60), radius: 4.0 }) },
        ];
        let svg = String::from_utf8(map_svg(&spec(), &layers).unwrap()).unwrap();

        assert!(svg.contains("fill=\"#d8bfd8\""));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("Tags &amp; areas"));
        assert!(svg.contains(">Legend<"));
        assert!(svg.contains("class=\"scalebar\""));
        assert!(svg.contains("clip-path=\"url(#map-clip)\""));
        assert!(svg.find("data-name=\"outline\"").unwrap() < svg.find("data-name=\"tags\"").unwrap());
    }

    #[test]
    fn extent_follows_named_layer() {
        let small = square("small", 1_000.0);
        let large = square("large", 50_000.0);
        let style = LayerStyle::Polygon(PolygonStyle { fill: Rgb::WHITE, edge: None, line_width: 1.0 });
        let layers = [MapLayer { collection: &large, style }, MapLayer { collection: &small, style }];

        let all = display_extent(&MapSpec::default(), &layers).unwrap();
        let named = display_extent(&MapSpec { extent: ExtentSource::Layer("small".into()), ..MapSpec::default() }, &layers).unwrap();
        assert!(named.width() < all.width() / 10.0);

        let missing = MapSpec { extent: ExtentSource::Layer("nope".into()), ..MapSpec::default() };
        assert!(matches!(display_extent(&missing, &layers), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_crs_is_a_projection_error() {
        let data = df!["fid" => [0u32]].unwrap();
        let orphan = FeatureCollection::new("orphan", None, vec![point!(x: 1.0, y: 1.0).into()], data).unwrap();
        let layers = [MapLayer { collection: &orphan, style: LayerStyle::Marker(MarkerStyle { color: Rgb::BLACK, radius: 2.0 }) }];
        assert!(matches!(map_svg(&MapSpec::default(), &layers), Err(Error::Projection { .. })));
    }

    #[test]
    fn failed_render_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let layers: [MapLayer<'_>; 0] = [];
        assert!(render_map(&spec(), &layers, &path).is_err());
        assert!(!path.exists());
    }
}
