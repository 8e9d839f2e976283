use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::IngestionError;

pub type Properties = Map<String, Value>;

/// The properties of a GeoJSON FeatureCollection, in feature order.
/// Geometry stays with the geospatial engine; only attributes are needed here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryCollection {
    pub features: Vec<Properties>,
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Properties>,
}

impl BoundaryCollection {
    pub fn new(features: Vec<Properties>) -> Self {
        Self { features }
    }

    pub fn from_geojson_slice(bytes: &[u8]) -> Result<Self, IngestionError> {
        let raw: RawCollection = serde_json::from_slice(bytes)
            .map_err(|e| IngestionError::Parse { what: "boundary collection", message: e.to_string() })?;
        Ok(Self {
            features: raw.features.into_iter().map(|f| f.properties.unwrap_or_default()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Numeric property, accepting JSON numbers and numeric strings.
pub fn number_property(props: &Properties, key: &str) -> Option<f64> {
    match props.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integer identifier such as a FIPS code. `"01001"` and `1001` are the same id.
pub fn identifier_property(props: &Properties, key: &str) -> Option<u64> {
    match props.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => parse_identifier(s),
        _ => None,
    }
}

pub fn string_property(props: &Properties, key: &str) -> Option<String> {
    props.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Parse a table identifier cell; leading zeros are insignificant.
pub fn parse_identifier(s: &str) -> Option<u64> {
    s.trim().parse().ok()
}
