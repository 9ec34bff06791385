use std::{fmt, sync::OnceLock};

use geo::Coord;
use proj4rs::{proj::Proj as Proj4, transform::transform};
use regex::Regex;

/// A coordinate reference system the pipeline knows how to transform.
///
/// CRSs compare by identity (EPSG code, or the origin of a local Transverse
/// Mercator), never by the spelling of their definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crs {
    /// An EPSG-registered CRS. Only the codes listed in [`Crs::proj4`] can be transformed.
    Epsg(u32),
    /// WGS 84 Transverse Mercator centred on the given lon/lat (metres, scale factor 1).
    TransverseMercator { lon_0: f64, lat_0: f64 },
}

/// WGS 84 longitude/latitude.
pub const WGS84: Crs = Crs::Epsg(4326);

/// WGS 84 World Mercator, the default display projection.
pub const WORLD_MERCATOR: Crs = Crs::Epsg(3395);

impl Crs {
    /// WGS 84 / UTM for the given zone and hemisphere (EPSG 326zz / 327zz).
    pub fn utm(zone: u32, north: bool) -> Self {
        Crs::Epsg(if north { 32600 } else { 32700 } + zone.clamp(1, 60))
    }

    /// WGS 84 / UTM zone containing a lon/lat position.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32;
        Self::utm(zone, lat >= 0.0)
    }

    /// Local Transverse Mercator centred at (lon_0, lat_0).
    #[inline]
    pub fn transverse_mercator(lon_0: f64, lat_0: f64) -> Self {
        Crs::TransverseMercator { lon_0, lat_0 }
    }

    /// EPSG code, if this CRS has one.
    #[inline]
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::TransverseMercator { .. } => None,
        }
    }

    /// True for angular (lon/lat, degrees) systems.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Epsg(4326 | 4258 | 4269 | 4937))
    }

    /// PROJ.4 definition, or None for codes outside the supported set.
    pub fn proj4(&self) -> Option<String> {
        let code = match self {
            Crs::TransverseMercator { lon_0, lat_0 } => {
                return Some(format!("+proj=tmerc +lat_0={lat_0} +lon_0={lon_0} +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs"));
            }
            Crs::Epsg(code) => *code,
        };

        let proj = match code {
            4326 => "+proj=longlat +datum=WGS84 +no_defs".into(),
            4258 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs".into(),
            4269 | 4937 => "+proj=longlat +datum=NAD83 +no_defs".into(),
            3395 => "+proj=merc +lon_0=0 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs".into(),
            3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs".into(),
            27700 => "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy \
                      +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs".into(),
            29902 | 29903 => "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1.000035 +x_0=200000 +y_0=250000 +ellps=mod_airy \
                              +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs".into(),
            2157 => "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=0.99982 +x_0=600000 +y_0=750000 +ellps=GRS80 \
                     +towgs84=0,0,0,0,0,0,0 +units=m +no_defs".into(),
            32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", code - 32600),
            32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs", code - 32700),
            26901..=26923 => format!("+proj=utm +zone={} +datum=NAD83 +units=m +no_defs", code - 26900),
            _ => return None,
        };
        Some(proj)
    }

    /// Identify the CRS described by the WKT of a shapefile `.prj` sidecar.
    ///
    /// The outermost EPSG authority wins; ESRI-flavoured WKT without
    /// authorities falls back to well-known PROJCS/GEOGCS names.
    pub fn from_prj(wkt: &str) -> Option<Self> {
        static AUTHORITY: OnceLock<Regex> = OnceLock::new();
        static NAME: OnceLock<Regex> = OnceLock::new();
        static UTM: OnceLock<Regex> = OnceLock::new();

        let authority = AUTHORITY.get_or_init(|| {
            Regex::new(r#"(?i)AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
        });
        if let Some(code) = authority.captures_iter(wkt).last()
            .and_then(|caps| caps[1].parse::<u32>().ok()) {
            return Some(Crs::Epsg(code));
        }

        let name = NAME.get_or_init(|| {
            Regex::new(r#"^\s*(?:PROJCS|GEOGCS|PROJCRS|GEOGCRS)\[\s*"([^"]+)""#).expect("valid regex")
        });
        let name = name.captures(wkt)?[1]
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        let utm = UTM.get_or_init(|| {
            Regex::new(r"^(wgs(?:19)?84|nad(?:19)?83)utmzone(\d{1,2})([ns])$").expect("valid regex")
        });
        if let Some(caps) = utm.captures(&name) {
            let zone = caps[2].parse::<u32>().ok()?;
            let north = &caps[3] == "n";
            return match (&caps[1], north) {
                (datum, true) if datum.starts_with("nad") => Some(Crs::Epsg(26900 + zone)),
                _ => Some(Crs::utm(zone, north)),
            };
        }

        let code = match name.as_str() {
            "gcswgs1984" | "wgs84" | "wgs1984" => 4326,
            "gcsetrs1989" | "etrs89" => 4258,
            "gcsnorthamerican1983" | "nad83" => 4269,
            "britishnationalgrid" | "osgb1936britishnationalgrid" => 27700,
            "tm65irishgrid" => 29902,
            "tm75irishgrid" => 29903,
            "irenet95irishtransversemercator" => 2157,
            "wgs1984webmercatorauxiliarysphere" | "wgs84pseudomercator" => 3857,
            "wgs1984worldmercator" | "wgs84worldmercator" => 3395,
            _ => return None,
        };
        Some(Crs::Epsg(code))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::TransverseMercator { lon_0, lat_0 } => write!(f, "TM(lon_0={lon_0:.4}, lat_0={lat_0:.4})"),
        }
    }
}

/// Display helper for an optional CRS.
pub(crate) fn crs_label(crs: Option<&Crs>) -> String {
    crs.map(Crs::to_string).unwrap_or_else(|| "unknown CRS".into())
}

/// Failure to build or apply a coordinate transform.
#[derive(Debug, thiserror::Error)]
pub enum CrsError {
    #[error("unsupported CRS {0}")]
    Unsupported(Crs),

    #[error("failed to build PROJ.4 definition for {crs}: {reason}")]
    Definition { crs: Crs, reason: String },

    #[error("failed to transform ({x}, {y}) from {from} to {to}: {reason}")]
    Transform { x: f64, y: f64, from: Crs, to: Crs, reason: String },
}

/// A reusable transform between two supported CRSs.
pub struct Transformer {
    from: Crs,
    to: Crs,
    projs: Option<(Proj4, Proj4)>, // None for the identity transform
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self, CrsError> {
        /// Build a proj4rs projection for a supported CRS.
        fn build(crs: &Crs) -> Result<Proj4, CrsError> {
            let definition = crs.proj4().ok_or(CrsError::Unsupported(*crs))?;
            Proj4::from_proj_string(&definition)
                .map_err(|e| CrsError::Definition { crs: *crs, reason: e.to_string() })
        }

        // Still validate both ends so an unsupported code never slips through as identity.
        let source = build(from)?;
        let target = build(to)?;

        Ok(Self {
            from: *from,
            to: *to,
            projs: (from != to).then_some((source, target)),
        })
    }

    #[inline] pub fn source(&self) -> &Crs { &self.from }

    #[inline] pub fn target(&self) -> &Crs { &self.to }

    #[inline] pub fn is_identity(&self) -> bool { self.projs.is_none() }

    /// Transform one coordinate; geographic ends are in degrees.
    pub fn transform(&self, coord: Coord<f64>) -> Result<Coord<f64>, CrsError> {
        let Some((source, target)) = &self.projs else { return Ok(coord) };

        let mut point = if self.from.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        let fail = |reason: String| CrsError::Transform {
            x: coord.x, y: coord.y, from: self.from, to: self.to, reason,
        };

        transform(source, target, &mut point).map_err(|e| fail(e.to_string()))?;

        let out = if self.to.is_geographic() {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        };

        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(fail("non-finite result".into()));
        }
        Ok(out)
    }
}
