//! TOML configuration for a pipeline run.
//!
//! Every constant of the tagging analysis (dataset paths, CRS codes, colours,
//! labels, joins, outputs) lives here. `PipelineCfg::default()` reproduces the
//! Northern Ireland shark, skate and ray study.

use std::{collections::{BTreeMap, BTreeSet}, fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::{
    crs::Crs,
    error::{Error, Result},
    join::JoinOptions,
    render::{
        BarChart, ExtentSource, Figure, Gridlines, LayerStyle, Legend, LegendEntry, MarkerStyle,
        PolygonStyle, Rgb, ScaleBar,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineCfg {
    /// Directory dataset paths are relative to.
    pub data_dir: PathBuf,
    /// Directory output paths are relative to.
    pub output_dir: PathBuf,
    /// EPSG code every dataset is normalized to before joining.
    pub analysis_crs: u32,
    #[serde(rename = "dataset")]
    pub datasets: Vec<DatasetCfg>,
    /// Pairs of dataset names whose CRSs are compared and reported after normalization.
    #[serde(rename = "crs_check")]
    pub crs_checks: Vec<CrsCheckCfg>,
    pub map: MapCfg,
    #[serde(rename = "join")]
    pub joins: Vec<JoinCfg>,
    pub chart: ChartCfg,
    /// CSV export of every join's grouped rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabulation: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCfg {
    pub name: String,
    pub path: PathBuf,
    /// EPSG code to assume when the `.prj` is missing or unrecognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsCheckCfg {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayerCfg {
    pub dataset: String,
    /// Falls back to a marker in a generated colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<LayerStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapCfg {
    pub enabled: bool,
    pub output: PathBuf,
    /// EPSG code of the display projection.
    pub display_crs: u32,
    pub title: String,
    pub title_font_size: f64,
    pub figure: Figure,
    pub extent: ExtentSource,
    /// Layers in draw order.
    #[serde(rename = "layer")]
    pub layers: Vec<MapLayerCfg>,
    pub legend: Legend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_bar: Option<ScaleBar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridlines: Option<Gridlines>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCfg {
    /// Name used in reports and as the chart category.
    pub label: String,
    pub left: String,
    pub right: String,
    #[serde(flatten)]
    pub options: JoinOptions,
    /// Column renames applied to the joined table (old name → new name).
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
    /// Column of ones added after the join, summed per group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
    pub group_by: String,
    #[serde(default)]
    pub sum_columns: Vec<String>,
    pub filter_column: String,
    pub filter_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartCfg {
    pub enabled: bool,
    pub output: PathBuf,
    /// Join labels to plot, in bar order. Empty plots every join in configuration order.
    pub bars: Vec<String>,
    #[serde(flatten)]
    pub style: BarChart,
}

fn polygon(fill: &str, edge: Option<&str>, line_width: f64) -> LayerStyle {
    LayerStyle::Polygon(PolygonStyle {
        fill: Rgb::parse(fill).unwrap_or(Rgb::BLACK),
        edge: edge.and_then(Rgb::parse),
        line_width,
    })
}

fn marker(color: &str) -> LayerStyle {
    LayerStyle::Marker(MarkerStyle { color: Rgb::parse(color).unwrap_or(Rgb::BLACK), radius: 4.0 })
}

fn entry(label: &str, fill: &str) -> LegendEntry {
    LegendEntry {
        label: label.into(),
        fill: Rgb::parse(fill).unwrap_or(Rgb::BLACK),
        edge: Some(Rgb::BLACK),
        swatch: Default::default(),
    }
}

fn dataset(name: &str, path: &str) -> DatasetCfg {
    DatasetCfg { name: name.into(), path: Path::new("Shapefiles").join(path), crs: None }
}

fn tag_join(label: &str, right: &str) -> JoinCfg {
    JoinCfg {
        label: label.into(),
        left: "mpas".into(),
        right: right.into(),
        options: JoinOptions::default(),
        renames: BTreeMap::from([
            ("Sex__M_F_U".to_string(), "Male_Female".to_string()),
            ("Decimal_De".to_string(), "DD".to_string()),
        ]),
        constant: Some("const".into()),
        group_by: "Species".into(),
        sum_columns: vec!["const".into()],
        filter_column: "Male_Female".into(),
        filter_value: "F".into(),
    }
}

impl Default for PipelineCfg {
    fn default() -> Self {
        let check = |left: &str, right: &str| CrsCheckCfg { left: left.into(), right: right.into() };
        Self {
            data_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            analysis_crs: 32629,
            datasets: vec![
                dataset("outline", "NI_Outline.shp"),
                dataset("mpas", "UKSeaMap 2018 NI Inshore Clip.shp"),
                dataset("flapperskate", "Flapperskate.shp"),
                dataset("sshound", "SSHound.shp"),
                dataset("spurdog", "Spurdog.shp"),
                dataset("thornback", "Thornback.shp"),
            ],
            crs_checks: vec![
                check("outline", "mpas"),
                check("flapperskate", "spurdog"),
                check("spurdog", "mpas"),
            ],
            map: MapCfg::default(),
            joins: vec![tag_join("Spurdog", "spurdog"), tag_join("Flapperskate", "flapperskate")],
            chart: ChartCfg::default(),
            tabulation: None,
        }
    }
}

impl Default for MapCfg {
    fn default() -> Self {
        let layer = |dataset: &str, style: LayerStyle| MapLayerCfg { dataset: dataset.into(), style: Some(style) };
        Self {
            enabled: true,
            output: PathBuf::from("map.png"),
            display_crs: 3395,
            title: "Map of Shark, Skate and Ray tagging locations off the NI Coast".into(),
            title_font_size: 14.0,
            figure: Figure::default(),
            extent: ExtentSource::Layer("mpas".into()),
            layers: vec![
                layer("outline", polygon("thistle", Some("black"), 1.0)),
                layer("mpas", polygon("paleturquoise", Some("paleturquoise"), 1.0)),
                layer("flapperskate", marker("darkmagenta")),
                layer("sshound", marker("g")),
                layer("spurdog", marker("crimson")),
                layer("thornback", marker("orange")),
            ],
            legend: Legend {
                title: "Legend".into(),
                entries: vec![
                    entry("Flapperskate", "darkmagenta"),
                    entry("Starry-Smooth Hound", "g"),
                    entry("Spurdog", "crimson"),
                    entry("Thornback", "orange"),
                    entry("Marine Protected Areas", "paleturquoise"),
                    entry("Northern Ireland Outline", "thistle"),
                ],
                font_size: 10.0,
            },
            scale_bar: Some(ScaleBar::default()),
            gridlines: Some(Gridlines::default()),
        }
    }
}

impl Default for ChartCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            output: PathBuf::from("females_by_species.png"),
            bars: vec!["Flapperskate".into(), "Spurdog".into()],
            style: BarChart::default(),
        }
    }
}

/// EPSG code → CRS, rejecting codes that cannot be transformed.
pub(crate) fn supported_crs(code: u32, what: &str) -> Result<Crs> {
    let crs = Crs::Epsg(code);
    match crs.proj4() {
        Some(_) => Ok(crs),
        None => Err(Error::Config(format!("{what}: unsupported CRS EPSG:{code}"))),
    }
}

impl PipelineCfg {
    /// Read and validate a TOML configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
            .map_err(|e| match e {
                Error::Config(reason) => Error::Config(format!("{}: {reason}", path.display())),
                other => other,
            })
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The defaults as a TOML document, for use as a starting template.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetCfg> {
        self.datasets.iter().find(|dataset| dataset.name == name)
    }

    /// Check cross references and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for dataset in &self.datasets {
            if !names.insert(dataset.name.as_str()) {
                return Err(Error::Config(format!("dataset {:?} is defined twice", dataset.name)));
            }
            if let Some(code) = dataset.crs {
                supported_crs(code, &format!("dataset {:?}", dataset.name))?;
            }
        }

        let known = |name: &str, what: &str| -> Result<()> {
            if names.contains(name) { return Ok(()) }
            Err(Error::Config(format!("{what} refers to unknown dataset {name:?}")))
        };

        supported_crs(self.analysis_crs, "analysis_crs")?;
        for check in &self.crs_checks {
            known(&check.left, "crs_check")?;
            known(&check.right, "crs_check")?;
        }

        if self.map.enabled {
            supported_crs(self.map.display_crs, "map.display_crs")?;
            for layer in &self.map.layers {
                known(&layer.dataset, "map layer")?;
            }
            if let ExtentSource::Layer(name) = &self.map.extent {
                if !self.map.layers.iter().any(|layer| &layer.dataset == name) {
                    return Err(Error::Config(format!("map extent layer {name:?} is not a map layer")));
                }
            }
            check_figure(&self.map.figure, "map.figure")?;
            if let Some(bar) = &self.map.scale_bar {
                if !(bar.length > 0.0 && bar.unit_meters > 0.0) {
                    return Err(Error::Config("map.scale_bar: length and unit_meters must be positive".into()));
                }
            }
        }

        let mut labels = BTreeSet::new();
        for join in &self.joins {
            known(&join.left, &format!("join {:?}", join.label))?;
            known(&join.right, &format!("join {:?}", join.label))?;
            if !labels.insert(join.label.as_str()) {
                return Err(Error::Config(format!("join label {:?} is used twice", join.label)));
            }
        }

        if self.chart.enabled {
            for bar in &self.chart.bars {
                if !labels.contains(bar.as_str()) {
                    return Err(Error::Config(format!("chart bar {bar:?} does not name a join")));
                }
            }
            if !(self.chart.style.bar_width > 0.0 && self.chart.style.bar_width <= 1.0) {
                return Err(Error::Config("chart.bar_width must be in (0, 1]".into()));
            }
            check_figure(&self.chart.style.figure, "chart.figure")?;
        }

        Ok(())
    }
}

fn check_figure(figure: &Figure, what: &str) -> Result<()> {
    if figure.width_in > 0.0 && figure.height_in > 0.0 && figure.dpi > 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{what}: width_in, height_in and dpi must be positive")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineCfg::default().validate().unwrap();
    }

    #[test]
    fn default_toml_parses_back_to_defaults() {
        let text = PipelineCfg::default_toml().unwrap();
        assert!(text.contains("analysis_crs = 32629"));
        assert_eq!(PipelineCfg::from_toml(&text).unwrap(), PipelineCfg::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = PipelineCfg::from_toml(r#"
            analysis_crs = 32630

            [map]
            enabled = false
        "#).unwrap();
        assert_eq!(config.analysis_crs, 32630);
        assert!(!config.map.enabled);
        assert_eq!(config.joins.len(), 2);
        assert_eq!(config.chart.style.bar_width, 0.5);
    }

    #[test]
    fn join_tables_parse() {
        let config = PipelineCfg::from_toml(r##"
            crs_check = []

            [[dataset]]
            name = "areas"
            path = "areas.shp"

            [[dataset]]
            name = "tags"
            path = "tags.shp"
            crs = 4326

            [map]
            enabled = false

            [chart]
            bars = ["Tags"]
            color = "#336699"

            [[join]]
            label = "Tags"
            left = "areas"
            right = "tags"
            right_suffix = "r"
            renames = { Sex__M_F_U = "Male_Female" }
            group_by = "Species"
            filter_column = "Male_Female"
            filter_value = "F"
        "##).unwrap();

        assert_eq!(config.datasets[1].crs, Some(4326));
        assert_eq!(config.joins[0].options.right_suffix, "r");
        assert_eq!(config.joins[0].options.left_suffix, "left");
        assert_eq!(config.joins[0].renames["Sex__M_F_U"], "Male_Female");
        assert_eq!(config.chart.style.color, Rgb::new(0x33, 0x66, 0x99));
    }

    #[test]
    fn unknown_references_are_rejected() {
        let mut config = PipelineCfg::default();
        config.joins[0].right = "whales".into();
        assert!(matches!(config.validate(), Err(Error::Config(reason)) if reason.contains("whales")));

        let mut config = PipelineCfg::default();
        config.chart.bars.push("Thornback".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn unsupported_crs_is_rejected() {
        let mut config = PipelineCfg::default();
        config.analysis_crs = 9999;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
