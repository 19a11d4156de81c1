//! Append-only change history

use powerscope_domain::{FieldValue, ModelAttribs};
use serde::{Deserialize, Serialize};

/// What happened to a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    /// Model added
    Add,
    /// Model removed
    Remove,
    /// Model edited and re-solved
    Change,
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Kind of change
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    /// Model position at the time of the change
    pub index: usize,
    /// Field the user edited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Model attributes after the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ModelAttribs>,
}

impl HistoryEntry {
    /// Model added with `params`
    pub fn add(index: usize, params: ModelAttribs) -> Self {
        Self {
            kind: HistoryKind::Add,
            index,
            key: None,
            params: Some(params),
        }
    }

    /// Model removed
    pub fn remove(index: usize) -> Self {
        Self {
            kind: HistoryKind::Remove,
            index,
            key: None,
            params: None,
        }
    }

    /// `key` edited, leaving the model at `params`
    pub fn change(index: usize, key: impl Into<String>, params: ModelAttribs) -> Self {
        Self {
            kind: HistoryKind::Change,
            index,
            key: Some(key.into()),
            params: Some(params),
        }
    }

    /// Human-readable one-liner; `html` wraps code fragments in spans
    pub fn describe(&self, html: bool) -> String {
        let code = |s: &str| {
            if html {
                format!("<span class=\"code\">{}</span>", s)
            } else {
                s.to_string()
            }
        };
        let number = self.index + 1;
        let params = self.params.as_ref().map(params_to_string).unwrap_or_default();
        match self.kind {
            HistoryKind::Add => format!("Added model #{}: {}", number, code(&params)),
            HistoryKind::Remove => format!("Removed model #{}", number),
            HistoryKind::Change => format!(
                "Changed {} in model #{}: {}",
                code(self.key.as_deref().unwrap_or_default()),
                number,
                code(&params)
            ),
        }
    }
}

/// `{ "output": "power", "alpha": 0.05, ... }` without the mode flags
fn params_to_string(params: &ModelAttribs) -> String {
    let mut parts = vec![format!("\"output\": \"{}\"", params.output)];
    for (key, value) in &params.values {
        if key == "ciMode" || key == "deltaMode" {
            continue;
        }
        match value {
            FieldValue::Text(v) => parts.push(format!("\"{}\": \"{}\"", key, v)),
            other => parts.push(format!("\"{}\": {}", key, other)),
        }
    }
    format!("{{ {} }}", parts.join(", "))
}
