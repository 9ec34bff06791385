use geo::Rect;
use rstar::{RTreeObject, AABB};

/// R-tree entry: the envelope of one right-hand feature.
#[derive(Debug, Clone)]
pub(super) struct FeatureEnvelope {
    feature: usize,
    envelope: AABB<[f64; 2]>,
}

impl FeatureEnvelope {
    pub(super) fn new(feature: usize, rect: Rect<f64>) -> Self {
        Self { feature, envelope: envelope(rect) }
    }

    pub(super) fn feature(&self) -> usize { self.feature }
}

impl RTreeObject for FeatureEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope { self.envelope }
}

pub(super) fn envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(rect.min().into(), rect.max().into())
}
