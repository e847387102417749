//! The subset of GeoJSON the listing map reads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "nullable")]
    pub properties: Properties,
}

/// A position as written in GeoJSON, `[longitude, latitude, ...]`.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Position,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    /// Any geometry the map does not render.
    #[serde(other)]
    Other,
}

/// Every property is optional, rendering only looks at which are present.
/// A value of an unexpected type never fails the document: strings accept
/// any scalar, numbers accept numeric strings and drop anything else.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Properties {
    /// Shared with the listing UI, numbers are read as their decimal text.
    #[serde(deserialize_with = "text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text")]
    pub link: Option<String>,
    #[serde(deserialize_with = "text")]
    pub about: Option<String>,
    #[serde(deserialize_with = "text")]
    pub address: Option<String>,
    #[serde(deserialize_with = "text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "text")]
    pub url: Option<String>,
    pub price: Option<Value>,
    #[serde(deserialize_with = "number")]
    pub stars: Option<f64>,
    #[serde(deserialize_with = "text")]
    pub image: Option<String>,
    #[serde(deserialize_with = "text")]
    pub marker: Option<String>,
    #[serde(rename = "isActive", deserialize_with = "truthy")]
    pub is_active: bool,
    #[serde(deserialize_with = "text")]
    pub stroke: Option<String>,
    #[serde(rename = "stroke-width", deserialize_with = "number")]
    pub stroke_width: Option<f64>,
    #[serde(rename = "stroke-opacity", deserialize_with = "number")]
    pub stroke_opacity: Option<f64>,
    #[serde(deserialize_with = "text")]
    pub fill: Option<String>,
    #[serde(rename = "fill-opacity", deserialize_with = "number")]
    pub fill_opacity: Option<f64>,
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

impl Properties {
    /// Whether any property a popup can show is present.
    pub fn is_descriptive(&self) -> bool {
        [
            &self.name,
            &self.about,
            &self.address,
            &self.email,
            &self.phone,
            &self.url,
            &self.image,
        ]
        .into_iter()
        .any(filled)
            || self.price_text().is_some_and(|p| !p.is_empty())
            || self.stars.is_some_and(|s| s != 0.0)
    }

    /// The price the way it is printed in tooltips and popups. Falsy
    /// prices (`0`, `false`, `""`) are treated as missing.
    pub fn price_text(&self) -> Option<String> {
        match self.price.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}
