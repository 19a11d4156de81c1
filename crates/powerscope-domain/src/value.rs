//! Field values and attribute maps

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a single model field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean mode switch (`ciMode`, `deltaMode`)
    Flag(bool),
    /// Numeric parameter
    Number(f64),
    /// Enumerated or free-text parameter
    Text(String),
}

impl FieldValue {
    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Flag value, if this is a flag
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Flag(_) => "flag",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(v) => write!(f, "{}", v),
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// Field name → value map used for updates and snapshots
pub type Attribs = BTreeMap<String, FieldValue>;

/// Build an [`Attribs`] map from key/value pairs
///
/// # Examples
///
/// ```
/// use powerscope_domain::{attribs, FieldValue};
///
/// let a = attribs([("n", 40.0)]);
/// assert_eq!(a["n"], FieldValue::Number(40.0));
/// ```
pub fn attribs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Attribs
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_deserialize() {
        let a: Attribs = serde_json::from_str(r#"{"n": 33, "ciMode": true, "design": "paired"}"#).unwrap();
        assert_eq!(a["n"], FieldValue::Number(33.0));
        assert_eq!(a["ciMode"], FieldValue::Flag(true));
        assert_eq!(a["design"].as_text(), Some("paired"));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.804), 0.8);
        assert_eq!(round2(1.2345), 1.23);
        assert_eq!(round2(round2(0.125)), round2(0.125));
    }
}
