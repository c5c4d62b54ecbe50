//! Geometry values and exact-equality hashing.
//!
//! This module provides:
//! - WKT parsing to `geo_types::Geometry`
//! - Bounding-box computation for datastream observed areas
//! - An exact-equality key for feature-of-interest deduplication
//!
//! # Design
//!
//! The WKT text is kept as the source of truth; no normalization happens at
//! parse time. That keeps the dedup key simple (hash the WKT string
//! directly, verify by byte comparison) and allows normalization to be added
//! later.
//!
//! Equality is therefore **exact**: two geometries that are conceptually
//! identical but not byte-for-byte identical (e.g. differing float
//! rendering) are distinct. No tolerance is applied; see DESIGN.md.

use crate::error::{Error, Result};
use geo::line_measures::LengthMeasurable;
use geo::{BoundingRect, Centroid, Distance, Euclidean, Intersects, Within};
use geo_types::{Geometry, Point};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BBox {
    /// Compute from a geometry. Returns `None` for empty geometries.
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        let rect = geom.bounding_rect()?;
        Some(Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }
}

/// A geometry with its WKT source text.
///
/// The WKT string is the identity of the value: `eq_exact` and
/// `equality_key` both operate on the raw text, not the parsed form.
#[derive(Debug, Clone)]
pub struct GeometryValue {
    wkt: String,
    geom: Geometry<f64>,
}

impl GeometryValue {
    /// Parse a WKT string, keeping the text as source of truth.
    pub fn parse(wkt: &str) -> Result<Self> {
        let geom = parse_wkt(wkt)?;
        Ok(Self {
            wkt: wkt.to_string(),
            geom,
        })
    }

    /// The WKT source text.
    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    /// The parsed geometry.
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geom
    }

    /// Bounding box, if the geometry is non-empty.
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_geometry(&self.geom)
    }

    /// Exact equality: byte comparison of the WKT text.
    pub fn eq_exact(&self, other: &GeometryValue) -> bool {
        self.wkt == other.wkt
    }

    /// Hash key for dedup indexes. Collisions must be resolved with
    /// `eq_exact` before treating two values as the same geometry.
    pub fn equality_key(&self) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        self.wkt.hash(&mut hasher);
        hasher.finish()
    }

    /// Distance between this geometry and another, via centroids.
    ///
    /// Note: this is Euclidean distance in coordinate units; for spherical,
    /// you'd use geodesic.
    pub fn distance(&self, other: &GeometryValue) -> Option<f64> {
        let a = self.geom.centroid()?;
        let b = other.geom.centroid()?;
        Some(Euclidean.distance(a, b))
    }

    /// Length of the geometry (linestrings only).
    ///
    /// Note: Euclidean length in coordinate units.
    pub fn length(&self) -> Option<f64> {
        match &self.geom {
            Geometry::LineString(ls) => Some(ls.length(&Euclidean)),
            Geometry::MultiLineString(mls) => Some(mls.length(&Euclidean)),
            _ => None,
        }
    }

    /// Whether this geometry intersects another.
    pub fn intersects(&self, other: &GeometryValue) -> bool {
        self.geom.intersects(&other.geom)
    }

    /// Whether this geometry lies within another.
    pub fn within(&self, other: &GeometryValue) -> bool {
        self.geom.is_within(&other.geom)
    }

    /// Centroid, if the geometry is non-empty.
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geom.centroid()
    }
}

impl PartialEq for GeometryValue {
    fn eq(&self, other: &Self) -> bool {
        self.eq_exact(other)
    }
}

impl Serialize for GeometryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wkt)
    }
}

impl<'de> Deserialize<'de> for GeometryValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GeometryValue::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse WKT string to geo-types Geometry.
pub fn parse_wkt(wkt_text: &str) -> Result<Geometry<f64>> {
    use std::str::FromStr;
    wkt::Wkt::from_str(wkt_text)
        .map_err(|e| Error::geometry(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| Error::geometry(format!("{:?}", e)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let g = GeometryValue::parse("POINT(8.0 51.9)").unwrap();
        assert!(matches!(g.geometry(), Geometry::Point(_)));
    }

    #[test]
    fn test_parse_polygon_bbox() {
        let g = GeometryValue::parse("POLYGON((0 0, 10 0, 10 20, 0 20, 0 0))").unwrap();
        let bbox = g.bbox().unwrap();
        assert_eq!(bbox.min_lng, 0.0);
        assert_eq!(bbox.max_lng, 10.0);
        assert_eq!(bbox.min_lat, 0.0);
        assert_eq!(bbox.max_lat, 20.0);
    }

    #[test]
    fn test_reject_malformed() {
        assert!(GeometryValue::parse("POINT(oops)").is_err());
    }

    #[test]
    fn test_equality_is_exact() {
        let a = GeometryValue::parse("POINT(1 2)").unwrap();
        let b = GeometryValue::parse("POINT(1 2)").unwrap();
        let c = GeometryValue::parse("POINT(1.0 2.0)").unwrap();
        assert!(a.eq_exact(&b));
        assert_eq!(a.equality_key(), b.equality_key());
        // Conceptually the same point, but not byte-identical WKT.
        assert!(!a.eq_exact(&c));
    }

    #[test]
    fn test_within_and_intersects() {
        let point = GeometryValue::parse("POINT(5 5)").unwrap();
        let poly = GeometryValue::parse("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))").unwrap();
        assert!(point.within(&poly));
        assert!(point.intersects(&poly));
        let outside = GeometryValue::parse("POINT(50 50)").unwrap();
        assert!(!outside.within(&poly));
    }

    #[test]
    fn test_bbox_union() {
        let a = GeometryValue::parse("POINT(0 0)").unwrap().bbox().unwrap();
        let b = GeometryValue::parse("POINT(10 20)").unwrap().bbox().unwrap();
        let u = a.union(&b);
        assert_eq!(u.min_lng, 0.0);
        assert_eq!(u.max_lng, 10.0);
        assert_eq!(u.max_lat, 20.0);
    }
}
