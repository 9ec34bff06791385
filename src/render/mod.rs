//! Map and chart output as SVG, rasterised to PNG with resvg.

mod chart;
mod color;
mod grid;
mod legend;
mod map;
mod path;
mod scalebar;
mod view;
mod writer;

pub use chart::{render_bar_chart, BarChart};
pub use color::Rgb;
pub(crate) use color::golden_angle_color;
pub(crate) use writer::write_atomic;
pub use grid::{GridLabels, Gridlines};
pub use legend::{Legend, LegendEntry, Swatch};
pub use map::{render_map, ExtentSource, Figure, LayerStyle, MapLayer, MapSpec, MarkerStyle, PolygonStyle};
pub use scalebar::{ScaleBar, ScaleBarGeometry};
pub use view::{Frame, MapView};
