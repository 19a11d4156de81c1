//! Auxiliary overlay models
//!
//! An [`Extra`] varies exactly one field of its parent model so an additional
//! curve can be drawn on the same axes.

use crate::error::ModelError;
use crate::observable::{ChangeEvent, ChangeRecorder, ChangeValue};
use crate::value::{round2, Attribs, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Plain `{which: value}` snapshot of an extra
///
/// Serialized as a single-key object, e.g. `{"n": 50}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, f64>", try_from = "BTreeMap<String, f64>")]
pub struct ExtraAttribs {
    /// Name of the free field
    pub which: String,
    /// Its value
    pub value: f64,
}

impl ExtraAttribs {
    /// Create a snapshot
    pub fn new(which: impl Into<String>, value: f64) -> Self {
        Self {
            which: which.into(),
            value,
        }
    }
}

impl From<ExtraAttribs> for BTreeMap<String, f64> {
    fn from(extra: ExtraAttribs) -> Self {
        BTreeMap::from([(extra.which, extra.value)])
    }
}

impl TryFrom<BTreeMap<String, f64>> for ExtraAttribs {
    type Error = String;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!("extra must have exactly one field, got {}", map.len()));
        }
        let (which, value) = map
            .into_iter()
            .next()
            .ok_or_else(|| "extra has no field".to_string())?;
        Ok(Self { which, value })
    }
}

/// Observable auxiliary model with a single free field
#[derive(Debug, Clone)]
pub struct Extra {
    which: String,
    value: f64,
    recorder: ChangeRecorder,
}

impl Extra {
    /// Create an extra varying `which`
    pub fn new(which: impl Into<String>, value: f64) -> Self {
        Self {
            which: which.into(),
            value,
            recorder: ChangeRecorder::new(),
        }
    }

    /// Build from an attribute map holding exactly one numeric field
    pub fn from_attribs(attribs: &Attribs) -> Result<Self, ModelError> {
        let (which, value) = single_number(attribs)?;
        Ok(Self::new(which, value))
    }

    /// Build from a snapshot
    pub fn from_snapshot(attribs: &ExtraAttribs) -> Self {
        Self::new(attribs.which.clone(), attribs.value)
    }

    /// Free field name
    pub fn which(&self) -> &str {
        &self.which
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Assign a new value to the free field
    ///
    /// The free field itself can never change: any other key is
    /// `InvalidKey`.
    pub fn update(&mut self, attribs: &Attribs, emit: bool) -> Result<Option<ChangeEvent>, ModelError> {
        let (which, value) = single_number(attribs)?;
        if which != self.which {
            return Err(ModelError::InvalidKey(which.to_string()));
        }
        if value != self.value {
            self.value = value;
            self.recorder.record(which, ChangeValue::Number(value));
        }
        Ok(if emit { self.recorder.emit(false) } else { None })
    }

    /// Plain snapshot
    pub fn attribs(&self) -> ExtraAttribs {
        ExtraAttribs::new(self.which.clone(), self.value)
    }

    /// Copy with the value rounded like its field: up for sample sizes,
    /// otherwise to two decimals
    pub fn round(&self, sample_size: bool) -> Extra {
        let value = if sample_size {
            self.value.ceil()
        } else {
            round2(self.value)
        };
        Extra::new(self.which.clone(), value)
    }

    /// Subscribe to this extra's change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.recorder.subscribe()
    }
}

fn single_number(attribs: &Attribs) -> Result<(&str, f64), ModelError> {
    if attribs.len() > 1 {
        let keys: Vec<&str> = attribs.keys().map(String::as_str).collect();
        return Err(ModelError::MutualExclusivity(format!(
            "an extra varies one field, got {}",
            keys.join(", ")
        )));
    }
    let (key, value) = attribs
        .iter()
        .next()
        .ok_or_else(|| ModelError::InvalidKey(String::new()))?;
    match value {
        FieldValue::Number(v) => Ok((key.as_str(), *v)),
        other => Err(ModelError::InvalidValue {
            key: key.clone(),
            reason: format!("expected number, got {}", other.type_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::attribs;

    #[test]
    fn test_serialized_as_single_key() {
        let json = serde_json::to_string(&ExtraAttribs::new("n", 50.0)).unwrap();
        assert_eq!(json, r#"{"n":50.0}"#);
        let parsed: ExtraAttribs = serde_json::from_str(r#"{"power": 0.9}"#).unwrap();
        assert_eq!(parsed, ExtraAttribs::new("power", 0.9));
        assert!(serde_json::from_str::<ExtraAttribs>(r#"{"n": 1, "power": 0.9}"#).is_err());
    }

    #[test]
    fn test_from_attribs_rejects_two_fields() {
        let err = Extra::from_attribs(&attribs([("n", 10.0), ("power", 0.8)])).unwrap_err();
        assert!(matches!(err, ModelError::MutualExclusivity(_)));
    }

    #[test]
    fn test_update_emits_forwardable_change() {
        let mut extra = Extra::new("n", 40.0);
        let mut rx = extra.subscribe();
        extra.update(&attribs([("n", 50.0)]), true).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.changes["n"], ChangeValue::Number(50.0));
        assert_eq!(extra.value(), 50.0);
    }

    #[test]
    fn test_update_rejects_other_field() {
        let mut extra = Extra::new("n", 40.0);
        let err = extra.update(&attribs([("power", 0.5)]), true).unwrap_err();
        assert_eq!(err, ModelError::InvalidKey("power".to_string()));
        let err = extra.update(&attribs([("n", "many")]), true).unwrap_err();
        assert!(matches!(err, ModelError::InvalidValue { .. }));
    }

    #[test]
    fn test_round() {
        assert_eq!(Extra::new("n", 32.01).round(true).value(), 33.0);
        assert_eq!(Extra::new("power", 0.8049).round(false).value(), 0.8);
    }
}
