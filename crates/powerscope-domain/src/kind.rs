//! Model kinds, outputs and their field schemas

use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of power-analysis model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// Two-sample or paired t-test
    #[serde(rename = "ttest")]
    TTest,
    /// z-test
    #[serde(rename = "ztest")]
    ZTest,
    /// Dichotomous outcome
    #[serde(rename = "dichot")]
    Dichot,
}

/// The field currently solved for by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Output {
    /// Sample size
    #[serde(rename = "n", alias = "sampleSize")]
    SampleSize,
    /// Sample size from a target confidence interval width
    #[serde(rename = "nByCI")]
    SampleSizeByCi,
    /// Power
    #[serde(rename = "power")]
    Power,
    /// Detectable alternative
    #[serde(rename = "delta", alias = "detAlt")]
    DetectableAlternative,
}

impl Output {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Output::SampleSize => "n",
            Output::SampleSizeByCi => "nByCI",
            Output::Power => "power",
            Output::DetectableAlternative => "delta",
        }
    }

    /// Parse a wire name (accepts the dichotomous aliases)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "n" | "sampleSize" => Some(Output::SampleSize),
            "nByCI" => Some(Output::SampleSizeByCi),
            "power" => Some(Output::Power),
            "delta" | "detAlt" => Some(Output::DetectableAlternative),
            _ => None,
        }
    }

    /// Whether this output belongs to the sample-size family
    pub fn is_sample_size(&self) -> bool {
        matches!(self, Output::SampleSize | Output::SampleSizeByCi)
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Output {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid output: {}", s))
    }
}

/// How a field's values are typed and rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Plain number, rounded to two decimals
    Number,
    /// Sample-size-like number, always rounded up
    SampleSize,
    /// Boolean mode switch
    Flag,
    /// Free text
    Text,
    /// One of a fixed set of names
    Choice(&'static [&'static str]),
}

impl FieldClass {
    /// Whether the field holds a number
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldClass::Number | FieldClass::SampleSize)
    }
}

/// Declared field of a model kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as used on the wire
    pub name: &'static str,
    /// Value class
    pub class: FieldClass,
}

const fn field(name: &'static str, class: FieldClass) -> FieldSpec {
    FieldSpec { name, class }
}

const TTEST_FIELDS: &[FieldSpec] = &[
    field("design", FieldClass::Text),
    field("alpha", FieldClass::Number),
    field("sigma", FieldClass::Number),
    field("delta", FieldClass::Number),
    field("power", FieldClass::Number),
    field("n", FieldClass::SampleSize),
    field("ci", FieldClass::Number),
    field("ciMode", FieldClass::Flag),
    field("deltaMode", FieldClass::Flag),
];

const ZTEST_FIELDS: &[FieldSpec] = &[
    field("alpha", FieldClass::Number),
    field("sigma", FieldClass::Number),
    field("delta", FieldClass::Number),
    field("power", FieldClass::Number),
    field("n", FieldClass::SampleSize),
    field("ci", FieldClass::Number),
    field("ciMode", FieldClass::Flag),
    field("deltaMode", FieldClass::Flag),
];

/// Allowed values of the dichotomous `matched` field
pub const DICHOT_MATCHED: &[&str] = &["matched", "independent"];
/// Allowed values of the dichotomous `case` field
pub const DICHOT_CASE: &[&str] = &["caseControl", "prospective"];
/// Allowed values of the dichotomous `method` field
pub const DICHOT_METHOD: &[&str] = &["chiSquare", "fishers"];
/// Allowed values of the dichotomous `expressed` field
pub const DICHOT_EXPRESSED: &[&str] =
    &["failureRates", "relativeRisk", "twoProportions", "oddsRatio"];

const DICHOT_FIELDS: &[FieldSpec] = &[
    field("matched", FieldClass::Choice(DICHOT_MATCHED)),
    field("case", FieldClass::Choice(DICHOT_CASE)),
    field("method", FieldClass::Choice(DICHOT_METHOD)),
    field("expressed", FieldClass::Choice(DICHOT_EXPRESSED)),
    field("alpha", FieldClass::Number),
    field("power", FieldClass::Number),
    field("phi", FieldClass::Number),
    field("p0", FieldClass::Number),
    field("p1", FieldClass::Number),
    field("r", FieldClass::Number),
    field("n", FieldClass::SampleSize),
    field("m", FieldClass::Number),
    field("psi", FieldClass::Number),
];

const CI_EXCLUSIVE: &[&str] = &["n", "ci"];
const DELTA_EXCLUSIVE: &[&str] = &["power", "delta"];

impl ModelKind {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::TTest => "ttest",
            ModelKind::ZTest => "ztest",
            ModelKind::Dichot => "dichot",
        }
    }

    /// Parse a wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ttest" => Some(ModelKind::TTest),
            "ztest" => Some(ModelKind::ZTest),
            "dichot" => Some(ModelKind::Dichot),
            _ => None,
        }
    }

    /// Every declared field of this kind
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            ModelKind::TTest => TTEST_FIELDS,
            ModelKind::ZTest => ZTEST_FIELDS,
            ModelKind::Dichot => DICHOT_FIELDS,
        }
    }

    /// Look up a declared field
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Outputs this kind can be solved for
    pub fn outputs(&self) -> &'static [Output] {
        match self {
            ModelKind::TTest | ModelKind::ZTest => &[
                Output::SampleSize,
                Output::SampleSizeByCi,
                Output::Power,
                Output::DetectableAlternative,
            ],
            ModelKind::Dichot => &[
                Output::SampleSize,
                Output::Power,
                Output::DetectableAlternative,
            ],
        }
    }

    /// Groups of fields that may not be edited together under `output`
    ///
    /// `n` and `ci` both pin the sample size; while solving by CI width,
    /// `power` and `delta` both pin the alternative.
    pub fn exclusive_groups(&self, output: Output) -> Vec<&'static [&'static str]> {
        match self {
            ModelKind::TTest | ModelKind::ZTest => {
                let mut groups = vec![CI_EXCLUSIVE];
                if output == Output::SampleSizeByCi {
                    groups.push(DELTA_EXCLUSIVE);
                }
                groups
            }
            ModelKind::Dichot => Vec::new(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid model kind: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_parse_aliases() {
        assert_eq!(Output::parse("sampleSize"), Some(Output::SampleSize));
        assert_eq!(Output::parse("detAlt"), Some(Output::DetectableAlternative));
        assert_eq!(Output::parse("nByCI"), Some(Output::SampleSizeByCi));
        assert_eq!(Output::parse("bogus"), None);
        assert_eq!(ModelKind::parse("dichot"), Some(ModelKind::Dichot));
        assert_eq!("ztest".parse::<ModelKind>(), Ok(ModelKind::ZTest));
    }

    #[test]
    fn test_sample_size_family() {
        assert!(Output::SampleSize.is_sample_size());
        assert!(Output::SampleSizeByCi.is_sample_size());
        assert!(!Output::Power.is_sample_size());
    }

    #[test]
    fn test_field_schemas() {
        assert_eq!(ModelKind::TTest.field("n").unwrap().class, FieldClass::SampleSize);
        assert!(ModelKind::ZTest.field("design").is_none());
        assert!(ModelKind::Dichot.field("psi").is_some());
        assert!(ModelKind::Dichot.field("sigma").is_none());
    }

    #[test]
    fn test_exclusive_groups_follow_output() {
        assert_eq!(ModelKind::TTest.exclusive_groups(Output::Power).len(), 1);
        assert_eq!(ModelKind::TTest.exclusive_groups(Output::SampleSizeByCi).len(), 2);
        assert!(ModelKind::Dichot.exclusive_groups(Output::Power).is_empty());
    }

    #[test]
    fn test_output_serde_names() {
        let json = serde_json::to_string(&Output::SampleSizeByCi).unwrap();
        assert_eq!(json, "\"nByCI\"");
        let parsed: Output = serde_json::from_str("\"detAlt\"").unwrap();
        assert_eq!(parsed, Output::DetectableAlternative);
    }
}
