use geo::{Coord, Rect};

use crate::crs::{Crs, CrsError, Transformer};

/// Number of samples per rectangle edge when reprojecting an extent.
const EDGE_SAMPLES: usize = 32;

/// Screen-space rectangle (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    #[inline] pub fn right(&self) -> f64 { self.x + self.width }

    #[inline] pub fn bottom(&self) -> f64 { self.y + self.height }
}

/// A projected map view: the visible extent in the display CRS, fitted into a screen frame.
#[derive(Debug, Clone)]
pub struct MapView {
    crs: Crs,
    extent: Rect<f64>,
    frame: Frame,
    scale: f64, // screen units per display-CRS unit
}

impl MapView {
    /// Fit `extent` (display-CRS units) into `available`, preserving aspect ratio and centring.
    pub fn new(crs: Crs, extent: Rect<f64>, available: Frame) -> Self {
        let scale = (available.width / extent.width().max(f64::EPSILON))
            .min(available.height / extent.height().max(f64::EPSILON));
        let (width, height) = (extent.width() * scale, extent.height() * scale);
        let frame = Frame {
            x: available.x + (available.width - width) / 2.0,
            y: available.y + (available.height - height) / 2.0,
            width,
            height,
        };
        Self { crs, extent, frame, scale }
    }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn extent(&self) -> &Rect<f64> { &self.extent }

    #[inline] pub fn frame(&self) -> &Frame { &self.frame }

    /// Display-CRS coordinate → screen (x, y).
    #[inline]
    pub fn to_screen(&self, coord: Coord<f64>) -> (f64, f64) {
        let x = self.frame.x + (coord.x - self.extent.min().x) * self.scale;
        let y = self.frame.y + (self.extent.max().y - coord.y) * self.scale; // invert vertically
        (x, y)
    }

    /// Screen (x, y) → display-CRS coordinate.
    #[inline]
    pub fn from_screen(&self, (x, y): (f64, f64)) -> Coord<f64> {
        Coord {
            x: self.extent.min().x + (x - self.frame.x) / self.scale,
            y: self.extent.max().y - (y - self.frame.y) / self.scale,
        }
    }

    /// Bounds of the visible extent expressed in another CRS.
    pub fn extent_in(&self, target: &Crs) -> Result<Rect<f64>, CrsError> {
        reproject_rect(&self.extent, &Transformer::new(&self.crs, target)?)
    }
}

/// Reproject a rectangle by sampling its edges, returning the bounds of the result.
pub(crate) fn reproject_rect(rect: &Rect<f64>, transformer: &Transformer) -> Result<Rect<f64>, CrsError> {
    if transformer.is_identity() { return Ok(*rect) }

    let (min, max) = (rect.min(), rect.max());
    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

    let mut lo = Coord { x: f64::INFINITY, y: f64::INFINITY };
    let mut hi = Coord { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY };
    for i in 0..=EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        let samples = [
            Coord { x: lerp(min.x, max.x, t), y: min.y },
            Coord { x: lerp(min.x, max.x, t), y: max.y },
            Coord { x: min.x, y: lerp(min.y, max.y, t) },
            Coord { x: max.x, y: lerp(min.y, max.y, t) },
        ];
        for sample in samples {
            let c = transformer.transform(sample)?;
            lo = Coord { x: lo.x.min(c.x), y: lo.y.min(c.y) };
            hi = Coord { x: hi.x.max(c.x), y: hi.y.max(c.y) };
        }
    }
    Ok(Rect::new(lo, hi))
}
