//! Load → normalize → map → join → aggregate → chart, driven by a [`PipelineCfg`].

use std::{collections::BTreeMap, fmt, path::PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    aggregate::{group_by, value_count, AggregateRow, Tabulation},
    collection::FeatureCollection,
    config::{supported_crs, JoinCfg, PipelineCfg},
    crs::{crs_label, Crs},
    error::{Error, Result},
    join::{sjoin, JoinedTable},
    render::{golden_angle_color, render_bar_chart, render_map, LayerStyle, MapLayer, MapSpec, MarkerStyle},
};

/// One loaded dataset, as reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub name: String,
    pub path: PathBuf,
    pub records: usize,
    pub source_crs: String,
    pub crs: String,
}

/// Outcome of comparing two datasets' CRSs after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsCheck {
    pub left: String,
    pub right: String,
    pub left_crs: String,
    pub right_crs: String,
    pub same: bool,
}

/// Outcome of one configured join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinReport {
    pub label: String,
    pub left: String,
    pub right: String,
    pub records: usize,
    pub columns: Vec<String>,
    pub group_by: String,
    pub groups: Vec<AggregateRow>,
    pub filter_column: String,
    pub filter_value: String,
    pub filter_count: usize,
}

/// Everything a run found and wrote.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Report {
    pub analysis_crs: String,
    pub datasets: Vec<DatasetReport>,
    pub crs_checks: Vec<CrsCheck>,
    pub joins: Vec<JoinReport>,
    pub outputs: Vec<PathBuf>,
}

impl Report {
    pub fn join(&self, label: &str) -> Option<&JoinReport> {
        self.joins.iter().find(|join| join.label == label)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dataset in &self.datasets {
            writeln!(f, "{}: {} records, {} -> {}", dataset.name, dataset.records, dataset.source_crs, dataset.crs)?;
        }
        for check in &self.crs_checks {
            if check.same {
                writeln!(f, "The {} and {} crs are the same: {} {}", check.left, check.right, check.left_crs, check.right_crs)?;
            } else {
                writeln!(f, "The {} and {} crs differ: {} {}", check.left, check.right, check.left_crs, check.right_crs)?;
            }
        }
        for join in &self.joins {
            writeln!(f, "{} ({} x {}): {} records", join.label, join.left, join.right, join.records)?;
            for group in &join.groups {
                let sums = group.sums.iter()
                    .map(|(column, sum)| format!("{column}={sum}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(f, "    {} = {}: {} records {}", join.group_by, group.key, group.count, sums)?;
            }
            writeln!(f, "    {} == {:?}: {}", join.filter_column, join.filter_value, join.filter_count)?;
        }
        for output in &self.outputs {
            writeln!(f, "wrote {}", output.display())?;
        }
        Ok(())
    }
}

/// State threaded through the stages of one run.
pub struct PipelineContext {
    config: PipelineCfg,
    analysis_crs: Crs,
    /// Normalized collections by dataset name.
    collections: BTreeMap<String, FeatureCollection>,
    tabulations: Vec<Tabulation>,
    report: Report,
}

impl PipelineContext {
    pub fn config(&self) -> &PipelineCfg { &self.config }

    pub fn collection(&self, name: &str) -> Result<&FeatureCollection> {
        self.collections.get(name)
            .ok_or_else(|| Error::Config(format!("dataset {name:?} is not loaded")))
    }

    /// Load every dataset and normalize it to the analysis CRS.
    fn load(&mut self) -> Result<()> {
        for dataset in &self.config.datasets {
            let path = self.config.data_dir.join(&dataset.path);
            let mut collection = FeatureCollection::from_shapefile(&dataset.name, &path)?;
            let source_crs = collection.crs().copied();

            if let Some(code) = dataset.crs {
                let assumed = supported_crs(code, &format!("dataset {:?}", dataset.name))?;
                match source_crs {
                    None => collection = collection.with_crs(assumed),
                    Some(crs) if crs != assumed => warn!(
                        "[load] {}: .prj declares {crs}, ignoring configured {assumed}",
                        dataset.name,
                    ),
                    Some(_) => {}
                }
            }

            let normalized = collection.to_crs(&self.analysis_crs)?;
            info!("[load] {}: {} records, {} -> {}", dataset.name, normalized.len(), crs_label(collection.crs()), self.analysis_crs);

            self.report.datasets.push(DatasetReport {
                name: dataset.name.clone(),
                path,
                records: normalized.len(),
                source_crs: crs_label(collection.crs()),
                crs: crs_label(normalized.crs()),
            });
            self.collections.insert(dataset.name.clone(), normalized);
        }
        Ok(())
    }

    /// Compare the configured pairs of normalized datasets.
    fn check_crs(&mut self) -> Result<()> {
        for check in &self.config.crs_checks {
            let left = self.collection(&check.left)?;
            let right = self.collection(&check.right)?;
            let same = crate::collection::same_crs(left, right);
            if !same {
                warn!("[project] {} and {} do not share a CRS", check.left, check.right);
            }
            let result = CrsCheck {
                left: check.left.clone(),
                right: check.right.clone(),
                left_crs: crs_label(left.crs()),
                right_crs: crs_label(right.crs()),
                same,
            };
            self.report.crs_checks.push(result);
        }
        Ok(())
    }

    fn map_spec(&self) -> Result<MapSpec> {
        let map = &self.config.map;
        Ok(MapSpec {
            display_crs: supported_crs(map.display_crs, "map.display_crs")?,
            figure: map.figure,
            title: map.title.clone(),
            title_font_size: map.title_font_size,
            legend: map.legend.clone(),
            scale_bar: map.scale_bar.clone(),
            gridlines: map.gridlines.clone(),
            extent: map.extent.clone(),
        })
    }

    fn render_map(&mut self) -> Result<()> {
        if !self.config.map.enabled {
            debug!("[render] map disabled");
            return Ok(());
        }

        let path = self.config.output_dir.join(&self.config.map.output);
        {
            let spec = self.map_spec()?;
            let layers = self.config.map.layers.iter()
                .enumerate()
                .map(|(i, layer)| Ok(MapLayer {
                    collection: self.collection(&layer.dataset)?,
                    style: layer.style.unwrap_or(LayerStyle::Marker(MarkerStyle { color: golden_angle_color(i), radius: 4.0 })),
                }))
                .collect::<Result<Vec<_>>>()?;
            render_map(&spec, &layers, &path)?;
        }
        self.report.outputs.push(path);
        Ok(())
    }

    fn join(&self, join: &JoinCfg) -> Result<JoinedTable> {
        let left = self.collection(&join.left)?;
        let right = self.collection(&join.right)?;

        let mut table = sjoin(left, right, &join.options)?;
        let renames = join.renames.iter().collect::<Vec<_>>();
        table.rename_columns(&renames)?;
        if let Some(constant) = &join.constant {
            table.with_constant(constant, 1)?;
        }
        Ok(table)
    }

    /// Run every join, group its records and count the filter value.
    fn analyse(&mut self) -> Result<()> {
        for join in &self.config.joins {
            let table = self.join(join)?;
            info!("[join] {}: {} records from {} x {}", join.label, table.len(), join.left, join.right);
            debug!("[join] {}:\n{}", join.label, table.data());

            let sum_columns = join.sum_columns.iter().map(String::as_str).collect::<Vec<_>>();
            let groups = group_by(&table, &join.group_by, &sum_columns)?;
            let filter_count = value_count(&table, &join.filter_column, &join.filter_value)?;
            debug!("[aggregate] {}: {} groups, {} == {:?}: {filter_count}", join.label, groups.len(), join.filter_column, join.filter_value);

            self.tabulations.push(Tabulation {
                name: join.label.clone(),
                key: join.group_by.clone(),
                rows: groups.clone(),
            });
            self.report.joins.push(JoinReport {
                label: join.label.clone(),
                left: join.left.clone(),
                right: join.right.clone(),
                records: table.len(),
                columns: table.columns(),
                group_by: join.group_by.clone(),
                groups,
                filter_column: join.filter_column.clone(),
                filter_value: join.filter_value.clone(),
                filter_count,
            });
        }
        Ok(())
    }

    /// Bars of filter counts, in the configured order.
    pub(crate) fn chart_bars(&self) -> Result<Vec<(String, f64)>> {
        let joins = &self.report.joins;
        if self.config.chart.bars.is_empty() {
            return Ok(joins.iter().map(|join| (join.label.clone(), join.filter_count as f64)).collect());
        }
        self.config.chart.bars.iter()
            .map(|label| {
                let join = self.report.join(label)
                    .ok_or_else(|| Error::Config(format!("chart bar {label:?} does not name a join")))?;
                Ok((join.label.clone(), join.filter_count as f64))
            })
            .collect()
    }

    fn render_chart(&mut self) -> Result<()> {
        if !self.config.chart.enabled {
            debug!("[render] chart disabled");
            return Ok(());
        }
        let bars = self.chart_bars()?;
        let path = self.config.output_dir.join(&self.config.chart.output);
        render_bar_chart(&self.config.chart.style, &bars, &path)?;
        self.report.outputs.push(path);
        Ok(())
    }

    fn write_tabulation(&mut self) -> Result<()> {
        let Some(output) = &self.config.tabulation else { return Ok(()) };
        let path = self.config.output_dir.join(output);

        let mut tabulations = self.tabulations.iter();
        let Some(first) = tabulations.next() else { return Ok(()) };
        let mut df = first.to_dataframe()?;
        for tabulation in tabulations {
            df.vstack_mut(&tabulation.to_dataframe()?).map_err(Error::data("aggregate"))?;
        }

        Tabulation::write_dataframe(&mut df, &path)?;
        info!("[aggregate] wrote {} rows to {}", df.height(), path.display());
        self.report.outputs.push(path);
        Ok(())
    }
}

/// A configured run.
pub struct Pipeline {
    context: PipelineContext,
}

impl Pipeline {
    pub fn new(config: PipelineCfg) -> Result<Self> {
        config.validate()?;
        let analysis_crs = supported_crs(config.analysis_crs, "analysis_crs")?;
        Ok(Self {
            context: PipelineContext {
                report: Report { analysis_crs: analysis_crs.to_string(), ..Report::default() },
                config,
                analysis_crs,
                collections: BTreeMap::new(),
                tabulations: Vec::new(),
            },
        })
    }

    /// Run every stage in order. Any error aborts before later stages.
    pub fn run(mut self) -> Result<Report> {
        let context = &mut self.context;
        info!("[pipeline] loading {} datasets", context.config.datasets.len());
        context.load()?;
        context.check_crs()?;
        context.render_map()?;
        info!("[pipeline] running {} joins", context.config.joins.len());
        context.analyse()?;
        context.render_chart()?;
        context.write_tabulation()?;
        info!("[pipeline] done");
        Ok(self.context.report)
    }
}
