//! Power-analysis models
//!
//! One [`Model`] type serves every [`ModelKind`]; the kind's field schema
//! decides which keys are accepted, how values are typed and how they round.
//!
//! ## Mutation rules
//!
//! - Every key of an update is validated before the first assignment
//! - Only fields whose value actually changes are recorded
//! - One update produces at most one notification
//! - Changing the output never re-derives dependent fields; that is the
//!   solver's job

use crate::error::ModelError;
use crate::extra::{Extra, ExtraAttribs};
use crate::id::ModelId;
use crate::kind::{FieldClass, FieldSpec, ModelKind, Output};
use crate::observable::{
    ChangeEvent, ChangeRecord, ChangeRecorder, ChangeValue, CollectionChange,
};
use crate::plot::PlotData;
use crate::traits::SolverResponse;
use crate::value::{round2, Attribs, FieldValue};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Field name used for the output in update maps and change records
pub const OUTPUT_KEY: &str = "output";
/// Field name used for the extras collection in change records
pub const EXTRA_KEY: &str = "extra";

/// Plain serializable snapshot of a model, as sent to the solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAttribs {
    /// Model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Field being solved for
    pub output: Output,
    /// Auxiliary overlays
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ExtraAttribs>,
    /// Every declared field that has a value
    #[serde(flatten)]
    pub values: Attribs,
}

impl ModelAttribs {
    /// Snapshot without id or extras
    pub fn new(output: Output, values: Attribs) -> Self {
        Self {
            id: None,
            output,
            extra: Vec::new(),
            values,
        }
    }

    /// Numeric value of a field
    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(FieldValue::as_number)
    }
}

/// Observable power-analysis model
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    kind: ModelKind,
    name: String,
    output: Output,
    values: Attribs,
    extras: Vec<Extra>,
    extra_subs: Vec<broadcast::Receiver<ChangeEvent>>,
    plot: PlotData,
    recorder: ChangeRecorder,
}

impl Model {
    /// Create a model from initial values
    ///
    /// Construction is not a change: nothing is recorded or emitted.
    /// Unlike [`Model::update`], mutually-exclusive fields may all be present
    /// since a solved model carries every field.
    pub fn new(kind: ModelKind, output: Output, values: Attribs) -> Result<Self, ModelError> {
        check_output(kind, output)?;
        for (key, value) in &values {
            let spec = kind.field(key).ok_or_else(|| ModelError::InvalidKey(key.clone()))?;
            check_value(spec, value)?;
        }

        let mut model = Self {
            id: ModelId::new(),
            kind,
            name: String::new(),
            output,
            values: Attribs::new(),
            extras: Vec::new(),
            extra_subs: Vec::new(),
            plot: PlotData::default(),
            recorder: ChangeRecorder::new(),
        };
        model.recorder.suppress();
        for (key, value) in values {
            model.assign(key, value);
        }
        model.recorder.resume();
        model.recorder.clear();
        Ok(model)
    }

    /// Create a model from a snapshot, including its extras
    pub fn from_attribs(kind: ModelKind, attribs: &ModelAttribs) -> Result<Self, ModelError> {
        let mut model = Self::new(kind, attribs.output, attribs.values.clone())?;
        if let Some(id) = &attribs.id {
            model.id = ModelId::from_string(id).map_err(|reason| ModelError::InvalidValue {
                key: "id".to_string(),
                reason,
            })?;
        }
        for extra in &attribs.extra {
            model.add_extra(Extra::from_snapshot(extra), false)?;
        }
        model.recorder.clear();
        Ok(model)
    }

    /// Stable identifier
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Model kind
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename (not an observable field)
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Field being solved for
    pub fn output(&self) -> Output {
        self.output
    }

    /// Current field values
    pub fn values(&self) -> &Attribs {
        &self.values
    }

    /// Value of one field
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Numeric value of one field
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_number)
    }

    /// Flag value of one field
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(FieldValue::as_flag)
    }

    /// Text value of one field
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Auxiliary overlays
    pub fn extras(&self) -> &[Extra] {
        &self.extras
    }

    /// Plot data from the last solver round trip
    pub fn plot(&self) -> &PlotData {
        &self.plot
    }

    /// Last emitted change batch
    pub fn previous_changes(&self) -> &ChangeRecord {
        self.recorder.previous()
    }

    /// Subscribe to this model's change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.recorder.subscribe()
    }

    /// Apply a user edit
    ///
    /// Accepts declared field names plus `"output"`. Returns the recorded
    /// batch; with `emit` set the batch is also published and reset.
    pub fn update(&mut self, attribs: &Attribs, emit: bool) -> Result<ChangeRecord, ModelError> {
        let output = self.validate(attribs)?;

        if let Some(output) = output {
            self.set_output(output);
        }
        for (key, value) in attribs {
            if key != OUTPUT_KEY {
                self.assign(key.clone(), value.clone());
            }
        }

        let changes = self.recorder.pending().clone();
        if emit {
            self.recorder.emit(false);
        }
        Ok(changes)
    }

    /// Round incoming numbers like [`Model::round`] does, then update
    pub fn round_update(&mut self, attribs: &Attribs, emit: bool) -> Result<ChangeRecord, ModelError> {
        let rounded = self.round_attribs(attribs);
        self.update(&rounded, emit)
    }

    /// Round the numbers in an edit the way [`Model::round`] would
    pub fn round_attribs(&self, attribs: &Attribs) -> Attribs {
        attribs
            .iter()
            .map(|(key, value)| {
                let value = match (self.kind.field(key), value) {
                    (Some(spec), FieldValue::Number(v)) => FieldValue::Number(round_field(spec, *v)),
                    _ => value.clone(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Copy with numbers rounded to two decimals and sample sizes rounded up
    ///
    /// # Examples
    ///
    /// ```
    /// use powerscope_domain::{attribs, Model, ModelKind, Output};
    ///
    /// let model = Model::new(ModelKind::TTest, Output::Power, attribs([("n", 32.01), ("power", 0.8049)])).unwrap();
    /// let rounded = model.round();
    /// assert_eq!(rounded.number("n"), Some(33.0));
    /// assert_eq!(rounded.number("power"), Some(0.8));
    /// ```
    pub fn round(&self) -> Model {
        let mut rounded = self.clone();
        for (key, value) in rounded.values.iter_mut() {
            let Some(spec) = self.kind.field(key) else {
                continue;
            };
            if let FieldValue::Number(v) = *value {
                *value = FieldValue::Number(round_field(spec, v));
            }
        }
        let extras: Vec<Extra> = self
            .extras
            .iter()
            .map(|e| e.round(self.is_sample_size_field(e.which())))
            .collect();
        rounded.set_extras(extras);
        rounded.recorder.clear();
        rounded
    }

    /// Plain snapshot for the solver and the history log
    pub fn attribs(&self) -> ModelAttribs {
        ModelAttribs {
            id: Some(self.id.to_string()),
            output: self.output,
            extra: self.extras.iter().map(Extra::attribs).collect(),
            values: self.values.clone(),
        }
    }

    /// Attributes plus plot data, in the shape the solver returns them
    pub fn snapshot(&self) -> SolverResponse {
        SolverResponse {
            model: self.attribs(),
            data: self.plot.clone(),
        }
    }

    /// Replace everything with a solver result
    ///
    /// Never merges field by field: fields missing from the response are
    /// cleared. The notification carries `recalculation = true`.
    pub fn replace_from_solver(&mut self, response: &SolverResponse) -> Option<ChangeEvent> {
        self.replace_wholesale(response);
        self.recorder.emit(true)
    }

    /// Roll back to a snapshot taken with [`Model::snapshot`]
    pub fn restore(&mut self, snapshot: &SolverResponse) -> Option<ChangeEvent> {
        self.replace_wholesale(snapshot);
        self.recorder.emit(true)
    }

    /// Name of the field currently solved for
    pub fn output_field(&self) -> Option<&'static str> {
        match self.output {
            Output::SampleSize | Output::SampleSizeByCi => Some("n"),
            Output::Power => Some("power"),
            Output::DetectableAlternative => self.det_alt_param(),
        }
    }

    /// Name of the detectable-alternative field
    ///
    /// `delta` for t- and z-tests. Dichotomous models use `psi` when matched,
    /// otherwise the field named by how the alternative is expressed.
    pub fn det_alt_param(&self) -> Option<&'static str> {
        match self.kind {
            ModelKind::TTest | ModelKind::ZTest => Some("delta"),
            ModelKind::Dichot => match self.text("matched") {
                Some("matched") => Some("psi"),
                Some("independent") => match self.text("expressed") {
                    Some("twoProportions") => Some("p1"),
                    Some("oddsRatio") => Some("psi"),
                    Some("relativeRisk") => Some("r"),
                    _ => None,
                },
                _ => None,
            },
        }
    }

    /// Value of the detectable-alternative field
    pub fn det_alt(&self) -> Option<f64> {
        self.det_alt_param().and_then(|p| self.number(p))
    }

    /// Current confidence interval
    ///
    /// Uses the solver's interval when present, otherwise
    /// `[delta - ci/2, delta + ci/2]`.
    pub fn ci_interval(&self) -> Option<[f64; 2]> {
        if let Some(ci) = self.plot.ci {
            return Some(ci);
        }
        let delta = self.number("delta")?;
        let width = self.number("ci")?;
        Some([delta - width / 2.0, delta + width / 2.0])
    }

    /// Check whether an extra varying `which` may be added
    pub fn can_add_extra(&self, which: &str) -> Result<(), ModelError> {
        self.check_extra(which, None)
    }

    /// Append an extra
    pub fn add_extra(&mut self, extra: Extra, emit: bool) -> Result<ChangeRecord, ModelError> {
        self.check_extra(extra.which(), None)?;
        self.recorder.record_collection(
            EXTRA_KEY,
            CollectionChange::Append {
                value: extra.attribs(),
            },
        );
        self.extra_subs.push(extra.subscribe());
        self.extras.push(extra);
        Ok(self.finish_batch(emit))
    }

    /// Remove the extra at `index`
    pub fn remove_extra(&mut self, index: usize, emit: bool) -> Result<ChangeRecord, ModelError> {
        self.check_index(index)?;
        self.extras.remove(index);
        self.extra_subs.remove(index);
        self.recorder
            .record_collection(EXTRA_KEY, CollectionChange::Remove { index });
        Ok(self.finish_batch(emit))
    }

    /// Swap the extra at `index` for another
    pub fn replace_extra(
        &mut self,
        index: usize,
        extra: Extra,
        emit: bool,
    ) -> Result<ChangeRecord, ModelError> {
        self.check_index(index)?;
        self.check_extra(extra.which(), Some(index))?;
        self.recorder.record_collection(
            EXTRA_KEY,
            CollectionChange::Replace {
                index,
                value: extra.attribs(),
            },
        );
        self.extra_subs[index] = extra.subscribe();
        self.extras[index] = extra;
        Ok(self.finish_batch(emit))
    }

    /// Edit the extra at `index`; its own change is forwarded into this
    /// model's batch as `{index, change}`
    pub fn update_extra(
        &mut self,
        index: usize,
        attribs: &Attribs,
        emit: bool,
    ) -> Result<ChangeRecord, ModelError> {
        self.check_index(index)?;
        self.extras[index].update(attribs, true)?;
        self.forward_extra_changes();
        Ok(self.finish_batch(emit))
    }

    fn finish_batch(&mut self, emit: bool) -> ChangeRecord {
        let changes = self.recorder.pending().clone();
        if emit {
            self.recorder.emit(false);
        }
        changes
    }

    fn forward_extra_changes(&mut self) {
        let mut forwarded = Vec::new();
        for (index, rx) in self.extra_subs.iter_mut().enumerate() {
            while let Ok(event) = rx.try_recv() {
                forwarded.push(CollectionChange::Forward {
                    index,
                    change: event.changes,
                });
            }
        }
        for change in forwarded {
            self.recorder.record_collection(EXTRA_KEY, change);
        }
    }

    fn validate(&self, attribs: &Attribs) -> Result<Option<Output>, ModelError> {
        let mut output = None;
        for (key, value) in attribs {
            if key == OUTPUT_KEY {
                output = Some(parse_output(self.kind, value)?);
                continue;
            }
            let spec = self
                .kind
                .field(key)
                .ok_or_else(|| ModelError::InvalidKey(key.clone()))?;
            check_value(spec, value)?;
        }

        let effective = output.unwrap_or(self.output);
        for group in self.kind.exclusive_groups(effective) {
            let present: Vec<&str> = group
                .iter()
                .copied()
                .filter(|k| attribs.contains_key(*k))
                .collect();
            if present.len() > 1 {
                return Err(ModelError::MutualExclusivity(present.join(", ")));
            }
        }
        Ok(output)
    }

    fn check_extra(&self, which: &str, replacing: Option<usize>) -> Result<(), ModelError> {
        let spec = self
            .kind
            .field(which)
            .ok_or_else(|| ModelError::InvalidKey(which.to_string()))?;
        if !spec.class.is_numeric() {
            return Err(ModelError::InvalidKey(which.to_string()));
        }
        if self.output_field() == Some(which) {
            return Err(ModelError::MutualExclusivity(format!(
                "'{}' is the output and cannot vary in an extra",
                which
            )));
        }
        let established = self
            .extras
            .iter()
            .enumerate()
            .find(|(i, _)| Some(*i) != replacing)
            .map(|(_, e)| e.which());
        match established {
            Some(existing) if existing != which => Err(ModelError::MutualExclusivity(format!(
                "extras already vary '{}', not '{}'",
                existing, which
            ))),
            _ => Ok(()),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), ModelError> {
        if index >= self.extras.len() {
            return Err(ModelError::IndexOutOfRange {
                index,
                len: self.extras.len(),
            });
        }
        Ok(())
    }

    fn is_sample_size_field(&self, key: &str) -> bool {
        self.kind
            .field(key)
            .is_some_and(|spec| spec.class == FieldClass::SampleSize)
    }

    fn set_output(&mut self, output: Output) {
        if output == self.output {
            return;
        }
        self.output = output;
        self.recorder
            .record(OUTPUT_KEY, ChangeValue::Text(output.as_str().to_string()));

        // an extra may never vary the field now being solved for
        if let Some(field) = self.output_field() {
            if self.extras.first().is_some_and(|e| e.which() == field) {
                for index in (0..self.extras.len()).rev() {
                    self.recorder
                        .record_collection(EXTRA_KEY, CollectionChange::Remove { index });
                }
                self.extras.clear();
                self.extra_subs.clear();
            }
        }
    }

    fn assign(&mut self, key: String, value: FieldValue) {
        if self.values.get(&key) == Some(&value) {
            return;
        }
        self.recorder.record(key.clone(), ChangeValue::from(&value));
        self.values.insert(key, value);
    }

    fn replace_wholesale(&mut self, state: &SolverResponse) {
        let incoming = &state.model;
        if self.kind.outputs().contains(&incoming.output) {
            self.set_output(incoming.output);
        }

        let stale: Vec<String> = self
            .values
            .keys()
            .filter(|k| !incoming.values.contains_key(*k))
            .cloned()
            .collect();
        for key in stale {
            self.values.remove(&key);
            self.recorder.record(key, ChangeValue::Cleared);
        }
        for (key, value) in &incoming.values {
            let valid = self
                .kind
                .field(key)
                .is_some_and(|spec| check_value(spec, value).is_ok());
            if valid {
                self.assign(key.clone(), value.clone());
            }
        }

        let current: Vec<ExtraAttribs> = self.extras.iter().map(Extra::attribs).collect();
        if current != incoming.extra {
            for (index, value) in incoming.extra.iter().enumerate() {
                match current.get(index) {
                    Some(old) if old == value => {}
                    Some(_) => self.recorder.record_collection(
                        EXTRA_KEY,
                        CollectionChange::Replace {
                            index,
                            value: value.clone(),
                        },
                    ),
                    None => self.recorder.record_collection(
                        EXTRA_KEY,
                        CollectionChange::Append {
                            value: value.clone(),
                        },
                    ),
                }
            }
            for index in (incoming.extra.len()..current.len()).rev() {
                self.recorder
                    .record_collection(EXTRA_KEY, CollectionChange::Remove { index });
            }
            self.set_extras(incoming.extra.iter().map(Extra::from_snapshot).collect());
        }

        self.plot = state.data.clone();
    }

    fn set_extras(&mut self, extras: Vec<Extra>) {
        self.extra_subs = extras.iter().map(Extra::subscribe).collect();
        self.extras = extras;
    }
}

impl Clone for Model {
    /// Clones get fresh notification channels; subscribers stay with the
    /// original
    fn clone(&self) -> Self {
        let extras = self.extras.clone();
        let extra_subs = extras.iter().map(Extra::subscribe).collect();
        Self {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            output: self.output,
            values: self.values.clone(),
            extras,
            extra_subs,
            plot: self.plot.clone(),
            recorder: self.recorder.clone(),
        }
    }
}

fn round_field(spec: &FieldSpec, value: f64) -> f64 {
    match spec.class {
        FieldClass::SampleSize => value.ceil(),
        _ => round2(value),
    }
}

fn check_output(kind: ModelKind, output: Output) -> Result<(), ModelError> {
    if kind.outputs().contains(&output) {
        Ok(())
    } else {
        Err(ModelError::InvalidValue {
            key: OUTPUT_KEY.to_string(),
            reason: format!("{} models cannot solve for '{}'", kind, output),
        })
    }
}

fn parse_output(kind: ModelKind, value: &FieldValue) -> Result<Output, ModelError> {
    let name = value.as_text().ok_or_else(|| ModelError::InvalidValue {
        key: OUTPUT_KEY.to_string(),
        reason: format!("expected text, got {}", value.type_name()),
    })?;
    let output = Output::parse(name).ok_or_else(|| ModelError::InvalidValue {
        key: OUTPUT_KEY.to_string(),
        reason: format!("unknown output '{}'", name),
    })?;
    check_output(kind, output)?;
    Ok(output)
}

fn check_value(spec: &FieldSpec, value: &FieldValue) -> Result<(), ModelError> {
    let invalid = |reason: String| ModelError::InvalidValue {
        key: spec.name.to_string(),
        reason,
    };
    match (spec.class, value) {
        (FieldClass::Number | FieldClass::SampleSize, FieldValue::Number(v)) => {
            if v.is_finite() {
                Ok(())
            } else {
                Err(invalid(format!("{} is not finite", v)))
            }
        }
        (FieldClass::Flag, FieldValue::Flag(_)) => Ok(()),
        (FieldClass::Text, FieldValue::Text(_)) => Ok(()),
        (FieldClass::Choice(allowed), FieldValue::Text(v)) => {
            if allowed.contains(&v.as_str()) {
                Ok(())
            } else {
                Err(invalid(format!("'{}' is not one of {}", v, allowed.join(", "))))
            }
        }
        (class, other) => Err(invalid(format!(
            "expected {}, got {}",
            class_name(class),
            other.type_name()
        ))),
    }
}

fn class_name(class: FieldClass) -> &'static str {
    match class {
        FieldClass::Number | FieldClass::SampleSize => "number",
        FieldClass::Flag => "flag",
        FieldClass::Text | FieldClass::Choice(_) => "text",
    }
}
