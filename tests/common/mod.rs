#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mpatrack::{Crs, Transformer, WGS84};
use shapefile::{
    dbase::{FieldName, FieldValue, Record, TableWriterBuilder},
    Point, Polygon, PolygonRing,
};

pub const UTM29N_PRJ: &str = r#"PROJCS["WGS 84 / UTM zone 29N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",-9],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1],AUTHORITY["EPSG","32629"]]"#;

pub const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// South-west corner of the test study area, UTM zone 29N metres.
pub const ORIGIN: (f64, f64) = (600_000.0, 6_050_000.0);

/// A tagged animal: UTM offset from ORIGIN in metres, species, sex.
pub struct Tag {
    pub dx: f64,
    pub dy: f64,
    pub species: &'static str,
    pub sex: &'static str,
}

pub fn tag(dx: f64, dy: f64, species: &'static str, sex: &'static str) -> Tag {
    Tag { dx, dy, species, sex }
}

fn field(name: &str) -> FieldName {
    FieldName::try_from(name).unwrap()
}

/// Axis-aligned rectangle in UTM 29N, as a single-polygon shapefile with a `Name` field.
pub fn write_rectangle(dir: &Path, file: &str, name: &str, (dx0, dy0): (f64, f64), (dx1, dy1): (f64, f64)) -> PathBuf {
    let path = dir.join(file);
    let (x0, y0) = (ORIGIN.0 + dx0, ORIGIN.1 + dy0);
    let (x1, y1) = (ORIGIN.0 + dx1, ORIGIN.1 + dy1);
    let ring = vec![
        Point::new(x0, y0), Point::new(x0, y1), Point::new(x1, y1), Point::new(x1, y0), Point::new(x0, y0),
    ];

    {
        let table = TableWriterBuilder::new().add_character_field(field("Name"), 50);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
        let mut record = Record::default();
        record.insert("Name".to_string(), FieldValue::Character(Some(name.to_string())));
        writer.write_shape_and_record(&Polygon::new(PolygonRing::Outer(ring)), &record).unwrap();
    }
    std::fs::write(path.with_extension("prj"), UTM29N_PRJ).unwrap();
    path
}

/// Point shapefile with `Species`, `Sex__M_F_U` and `Decimal_De` fields.
///
/// With `geographic`, positions are converted to WGS 84 lon/lat and the `.prj` says so,
/// so loading exercises normalization back to UTM.
pub fn write_tags(dir: &Path, file: &str, tags: &[Tag], geographic: bool) -> PathBuf {
    let path = dir.join(file);
    let to_lonlat = Transformer::new(&Crs::Epsg(32629), &WGS84).unwrap();

    {
        let table = TableWriterBuilder::new()
            .add_character_field(field("Species"), 30)
            .add_character_field(field("Sex__M_F_U"), 1)
            .add_numeric_field(field("Decimal_De"), 12, 6);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();

        for tag in tags {
            let mut coord = geo::Coord { x: ORIGIN.0 + tag.dx, y: ORIGIN.1 + tag.dy };
            if geographic {
                coord = to_lonlat.transform(coord).unwrap();
            }
            let mut record = Record::default();
            record.insert("Species".to_string(), FieldValue::Character(Some(tag.species.to_string())));
            record.insert("Sex__M_F_U".to_string(), FieldValue::Character(Some(tag.sex.to_string())));
            record.insert("Decimal_De".to_string(), FieldValue::Numeric(Some(coord.y)));
            writer.write_shape_and_record(&Point::new(coord.x, coord.y), &record).unwrap();
        }
    }

    let prj = if geographic { WGS84_PRJ } else { UTM29N_PRJ };
    std::fs::write(path.with_extension("prj"), prj).unwrap();
    path
}
