mod shapefile;

pub use shapefile::FID_COLUMN;
