use std::path::PathBuf;

/// Errors raised by the load → normalize → join → aggregate → render pipeline.
///
/// None of these are recoverable mid-run: every variant names the dataset,
/// column or stage at fault so the caller can abort with a useful message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dataset is missing, unreadable, or holds shapes we cannot use.
    #[error("[load] failed to load dataset '{dataset}' from {}: {reason}", path.display())]
    Load {
        dataset: String,
        path: PathBuf,
        reason: String,
    },

    /// The source CRS is unknown, or a coordinate failed to transform.
    #[error("[project] dataset '{dataset}': {reason}")]
    Projection { dataset: String, reason: String },

    /// The two sides of a spatial join are not in one shared CRS.
    #[error("[join] cannot join '{left}' ({left_crs}) with '{right}' ({right_crs}): CRS mismatch")]
    Join {
        left: String,
        left_crs: String,
        right: String,
        right_crs: String,
    },

    /// A referenced attribute column does not exist.
    #[error("[aggregate] column {column:?} not found in '{table}' (available: {available})")]
    AttributeMissing {
        table: String,
        column: String,
        available: String,
    },

    /// The output image could not be produced or written.
    #[error("[render] failed to write {}: {reason}", path.display())]
    Render { path: PathBuf, reason: String },

    /// The pipeline configuration is invalid.
    #[error("[config] {0}")]
    Config(String),

    /// An attribute table operation failed.
    #[error("[{stage}] attribute table error: {source}")]
    Data {
        stage: &'static str,
        #[source]
        source: polars::error::PolarsError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap a polars failure with the stage it happened in.
    pub(crate) fn data(stage: &'static str) -> impl FnOnce(polars::error::PolarsError) -> Self {
        move |source| Self::Data { stage, source }
    }
}
