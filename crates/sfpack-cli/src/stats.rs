//! Size and accuracy report for one input document.

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;

use sfpack::codec::flatten;
use sfpack::{CoordEncoding, Document, EncodeOptions, Geometry, decode, encode_with_options};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeReport {
    pub srid: u32,
    pub scale: i64,
    pub geojson_bytes: usize,
    pub geojson_zstd_bytes: usize,
    pub encoded_bytes: usize,
    pub encoded_zstd_bytes: usize,
    /// Encoded size over compact GeoJSON size.
    pub ratio: f64,
    pub max_coordinate_error: f64,
    /// Upper bound on `max_coordinate_error` implied by the scale.
    pub error_bound: f64,
}

/// Encodes `document` and compares it against the compact GeoJSON text.
pub fn size_report(value: &Value, document: &Document, options: EncodeOptions) -> Result<SizeReport> {
    let geojson = serde_json::to_vec(value)?;
    let encoded = encode_with_options(document, options)?;
    let decoded = decode(&encoded)?;

    let error_bound = match options.coords {
        CoordEncoding::Float => 0.0,
        CoordEncoding::QuantizedDelta => options.frame.scale.max_error(),
    };
    Ok(SizeReport {
        srid: options.frame.srid,
        scale: options.frame.scale.get(),
        geojson_bytes: geojson.len(),
        geojson_zstd_bytes: zstd::encode_all(geojson.as_slice(), ZSTD_LEVEL)?.len(),
        encoded_bytes: encoded.len(),
        encoded_zstd_bytes: zstd::encode_all(encoded.as_slice(), ZSTD_LEVEL)?.len(),
        ratio: encoded.len() as f64 / geojson.len().max(1) as f64,
        max_coordinate_error: max_coordinate_error(document, &decoded)?,
        error_bound,
    })
}

fn geometries(document: &Document) -> Vec<&Geometry> {
    match document {
        Document::Geometry(g) => vec![g],
        Document::Feature(f) => f.geometry.iter().collect(),
        Document::GeometryCollection(gc) => gc.geometries.iter().collect(),
        Document::FeatureCollection(fc) => fc.features.iter().flat_map(|f| &f.geometry).collect(),
    }
}

/// Largest absolute ordinate difference between two documents of the same
/// structure. Ring closures are ignored.
pub fn max_coordinate_error(original: &Document, decoded: &Document) -> Result<f64> {
    let original = geometries(original);
    let decoded = geometries(decoded);
    if original.len() != decoded.len() {
        bail!(
            "decoded {} geometries, expected {}",
            decoded.len(),
            original.len()
        );
    }

    let mut max = 0.0f64;
    for (index, (a, b)) in original.iter().zip(&decoded).enumerate() {
        let a = flatten(a)?;
        let b = flatten(b)?;
        if a.kind != b.kind
            || a.part_sizes != b.part_sizes
            || a.poly_ring_counts != b.poly_ring_counts
        {
            bail!("geometry {index} changed structure");
        }
        for (p, q) in a.points.iter().zip(&b.points) {
            max = max.max((p.x - q.x).abs()).max((p.y - q.y).abs());
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::geojson::parse_document;

    #[test]
    fn test_report_within_bound() {
        let value = json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[4.900000049, 52.37], [4.95, 52.380000051]]
            },
            "properties": { "name": "A10" }
        });
        let document = parse_document(&value).unwrap();
        let options = EncodeOptions::new(4326, 10_000_000).unwrap();

        let report = size_report(&value, &document, options).unwrap();
        assert!(report.encoded_bytes < report.geojson_bytes);
        assert!(report.max_coordinate_error > 0.0);
        assert!(report.max_coordinate_error <= report.error_bound + 1e-12);
        assert_eq!(report.scale, 10_000_000);
    }

    #[test]
    fn test_float_mode_is_exact() {
        let value = json!({ "type": "Point", "coordinates": [0.1, 0.2] });
        let document = parse_document(&value).unwrap();
        let options = EncodeOptions::default().coords(CoordEncoding::Float);

        let report = size_report(&value, &document, options).unwrap();
        assert_eq!(report.max_coordinate_error, 0.0);
        assert_eq!(report.error_bound, 0.0);
    }

    #[test]
    fn test_open_and_closed_rings_compare_equal() {
        let open = Document::Geometry(Geometry::Polygon(vec![vec![
            sfpack::Coord::new(0.0, 0.0),
            sfpack::Coord::new(1.0, 0.0),
            sfpack::Coord::new(1.0, 1.0),
        ]]));
        let closed = Document::Geometry(Geometry::Polygon(vec![vec![
            sfpack::Coord::new(0.0, 0.0),
            sfpack::Coord::new(1.0, 0.0),
            sfpack::Coord::new(1.0, 1.0),
            sfpack::Coord::new(0.0, 0.0),
        ]]));
        assert_eq!(max_coordinate_error(&open, &closed).unwrap(), 0.0);
    }

    #[test]
    fn test_regrouped_rings_are_a_structure_change() {
        let outer = vec![
            sfpack::Coord::new(0.0, 0.0),
            sfpack::Coord::new(10.0, 0.0),
            sfpack::Coord::new(10.0, 10.0),
            sfpack::Coord::new(0.0, 0.0),
        ];
        let inner = vec![
            sfpack::Coord::new(2.0, 2.0),
            sfpack::Coord::new(4.0, 2.0),
            sfpack::Coord::new(4.0, 4.0),
            sfpack::Coord::new(2.0, 2.0),
        ];
        let with_hole = Document::Geometry(Geometry::MultiPolygon(vec![vec![
            outer.clone(),
            inner.clone(),
        ]]));
        let split = Document::Geometry(Geometry::MultiPolygon(vec![vec![outer], vec![inner]]));

        let err = max_coordinate_error(&with_hole, &split).unwrap_err();
        assert!(err.to_string().contains("changed structure"));
    }
}
