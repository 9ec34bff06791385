#![doc = "mpatrack public API"]
mod aggregate;
mod collection;
mod config;
mod crs;
mod error;
mod join;
mod pipeline;
mod render;

#[doc(inline)]
pub use aggregate::{group_by, value_count, value_counts, AggregateRow, Tabulation};

#[doc(inline)]
pub use collection::{same_crs, Feature, FeatureCollection, Summary, FID_COLUMN};

#[doc(inline)]
pub use config::{ChartCfg, CrsCheckCfg, DatasetCfg, JoinCfg, MapCfg, MapLayerCfg, PipelineCfg};

#[doc(inline)]
pub use crs::{Crs, CrsError, Transformer, WGS84, WORLD_MERCATOR};

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use join::{sjoin, JoinHow, JoinOptions, JoinRecord, JoinedTable, Predicate};

#[doc(inline)]
pub use pipeline::{CrsCheck, DatasetReport, JoinReport, Pipeline, PipelineContext, Report};

#[doc(inline)]
pub use render::{
    render_bar_chart, render_map, BarChart, ExtentSource, Figure, Frame, GridLabels, Gridlines,
    LayerStyle, Legend, LegendEntry, MapLayer, MapSpec, MapView, MarkerStyle, PolygonStyle, Rgb,
    ScaleBar, ScaleBarGeometry, Swatch,
};
