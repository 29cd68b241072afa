//! GeoPDF metadata dictionaries.
//!
//! A [`GeoDict`] is the `/LGIDict` attached to a page; its `Projection` entry is
//! a [`Projection`] dictionary. Both are built from plain-key overrides merged
//! onto a fixed set of defaults and never fail to construct. Whether a GeoDict
//! is usable is answered by [`Validatable::is_valid`].

use std::collections::BTreeMap;

use lopdf::{Dictionary, Object, StringFormat};

use crate::error::{GeoPdfError, Result};

/// Anything that can report whether it is fit to be written.
pub trait Validatable {
    fn is_valid(&self) -> bool;
}

/// A metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// PDF text string, `(...)`.
    Text(String),
    /// PDF name, `/...`.
    Name(String),
    Number(f64),
    Dict(Dict),
    Projection(Projection),
    Geo(Box<GeoDict>),
    Array(Vec<Value>),
}

impl Value {
    pub fn name(name: impl Into<String>) -> Self {
        Value::Name(name.into())
    }

    /// The validity capability of this value, if it has one.
    pub fn as_validatable(&self) -> Option<&dyn Validatable> {
        match self {
            Value::Projection(p) => Some(p),
            Value::Geo(g) => Some(g.as_ref()),
            _ => None,
        }
    }

    pub fn to_object(&self) -> Object {
        match self {
            Value::Text(s) => Object::String(s.as_bytes().to_vec(), StringFormat::Literal),
            Value::Name(n) => Object::Name(n.as_bytes().to_vec()),
            Value::Number(n) => number_object(*n),
            Value::Dict(d) => Object::Dictionary(d.to_dictionary()),
            Value::Projection(p) => Object::Dictionary(p.0.to_dictionary()),
            Value::Geo(g) => Object::Dictionary(g.0.to_dictionary()),
            Value::Array(items) => Object::Array(items.iter().map(Value::to_object).collect()),
        }
    }
}

// Integral values are written as PDF integers. Everything else becomes an
// lopdf `Real`, which is an f32: about 7 significant digits, so a longitude
// like -77.123456789 is rounded to roughly 1e-5 degrees. Coordinates that need
// full precision (Registration pairs are conventionally strings) should be
// passed as `Value::Text`, which is written verbatim.
fn number_object(n: f64) -> Object {
    if n.fract() == 0.0 && n.abs() < (1i64 << 53) as f64 {
        Object::Integer(n as i64)
    } else {
        Object::Real(n as f32)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

impl From<Projection> for Value {
    fn from(p: Projection) -> Self {
        Value::Projection(p)
    }
}

impl From<GeoDict> for Value {
    fn from(g: GeoDict) -> Self {
        Value::Geo(Box::new(g))
    }
}

/// Plain key/value node. Keys are stored without the leading `/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: BTreeMap<String, Value>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (key, value) in &self.entries {
            dict.set(key.as_str(), value.to_object());
        }
        dict
    }

    /// Shallow merge: every override replaces the entry of the same key.
    fn merged<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in overrides {
            self.insert(key, value);
        }
        self
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Dict::new().merged(iter)
    }
}

/// `/Projection` dictionary describing datum and projection type.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection(Dict);

impl Projection {
    pub fn new<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Projection(Self::defaults().merged(overrides))
    }

    fn defaults() -> Dict {
        let mut d = Dict::new();
        d.insert("ProjectionType", "GEOGRAPHIC");
        d.insert("Type", Value::name("Projection"));
        d
    }

    pub fn entries(&self) -> &Dict {
        &self.0
    }
}

impl Validatable for Projection {
    fn is_valid(&self) -> bool {
        true
    }
}

/// The `/LGIDict` georeferencing dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDict(Dict);

impl GeoDict {
    /// Builds a GeoDict from defaults plus `overrides`.
    ///
    /// Overrides replace top-level entries wholesale; an overridden
    /// `Projection` does not inherit the default datum.
    pub fn new<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        GeoDict(Self::defaults().merged(overrides))
    }

    fn defaults() -> Dict {
        let mut d = Dict::new();
        d.insert("Type", "LGIDict");
        d.insert("Version", "2.1");
        d.insert("Projection", Projection::new([("Datum", "WE")]));
        d
    }

    pub fn entries(&self) -> &Dict {
        &self.0
    }

    pub fn to_object(&self) -> Object {
        Object::Dictionary(self.0.to_dictionary())
    }
}

impl Validatable for GeoDict {
    fn is_valid(&self) -> bool {
        if !self.0.contains_key("Registration") && !self.0.contains_key("CTM") {
            return false;
        }
        self.0
            .iter()
            .filter_map(|(_, value)| value.as_validatable())
            .all(|v| v.is_valid())
    }
}

// ========== JSON overrides ==========

/// Reads GeoDict overrides from a JSON object.
///
/// Strings become text strings, numbers become numbers, arrays and objects
/// nest. An object under a `Projection` key becomes a [`Projection`] with its
/// own defaults filled in.
pub fn overrides_from_json(json: serde_json::Value) -> Result<Vec<(String, Value)>> {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let value = value_from_json(&key, value)?;
                Ok((key, value))
            })
            .collect(),
        other => Err(GeoPdfError::InvalidOverride {
            key: String::new(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

fn value_from_json(key: &str, json: serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;

    match json {
        Json::String(s) => Ok(Value::Text(s)),
        Json::Number(n) => n.as_f64().map(Value::Number).ok_or_else(|| GeoPdfError::InvalidOverride {
            key: key.to_string(),
            reason: format!("number {n} is out of range"),
        }),
        Json::Array(items) => items
            .into_iter()
            .map(|item| value_from_json(key, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Json::Object(map) => {
            let entries = map
                .into_iter()
                .map(|(k, v)| {
                    let v = value_from_json(&k, v)?;
                    Ok((k, v))
                })
                .collect::<Result<Vec<_>>>()?;
            if key == "Projection" {
                Ok(Value::Projection(Projection::new(entries)))
            } else {
                Ok(Value::Dict(entries.into_iter().collect()))
            }
        }
        Json::Bool(_) | Json::Null => Err(GeoPdfError::InvalidOverride {
            key: key.to_string(),
            reason: "booleans and null have no metadata form".to_string(),
        }),
    }
}
