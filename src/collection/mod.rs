mod collection;
mod io;
mod proj;

pub use collection::{Feature, FeatureCollection, Summary};
pub(crate) use collection::geometry_kind;
pub use io::FID_COLUMN;
pub use proj::same_crs;
