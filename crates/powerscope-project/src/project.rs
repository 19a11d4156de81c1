//! The model set and its derived ranges

use crate::error::{ProjectError, Result};
use crate::history::HistoryEntry;
use crate::ranges::{self, PlotSlot};
use powerscope_domain::{
    Attribs, Axis, AxisRanges, ChangeEvent, FieldValue, Model, ModelId, ModelKind,
    Output, Range, RangeSnapshot, SolverResponse, OUTPUT_KEY,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

const MODEL_NAMES: [&str; 10] = [
    "Primary",
    "Secondary",
    "Tertiary",
    "Quaternary",
    "Quinary",
    "Senary",
    "Septenary",
    "Octonary",
    "Nonary",
    "Denary",
];

/// Notification published by a [`Project`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProjectEvent {
    /// A model emitted a change batch
    ModelChanged {
        /// Model position
        index: usize,
        /// The model's batch
        event: ChangeEvent,
    },
    /// Auto or user ranges changed
    RangesChanged {
        /// Changed axes
        event: ChangeEvent,
    },
    /// A solver round trip was issued for a model
    Computing {
        /// Model position
        index: usize,
    },
    /// A solver result was applied and ranges recalculated
    Recomputed {
        /// Model position
        index: usize,
    },
    /// A solver round trip failed; the model was rolled back
    SolverFailed {
        /// Model position
        index: usize,
        /// Failure description
        message: String,
    },
    /// An edit was rejected before touching the model
    EditRejected {
        /// Model position
        index: usize,
        /// Why it was rejected
        error: String,
    },
}

/// Ordered models of one kind plus the shared axis ranges they are drawn on
#[derive(Debug)]
pub struct Project {
    kind: ModelKind,
    models: Vec<Model>,
    model_subs: Vec<broadcast::Receiver<ChangeEvent>>,
    selected_index: usize,
    change_history: Vec<HistoryEntry>,
    ranges: AxisRanges,
    custom_ranges: bool,
    previous_ranges: Option<RangeSnapshot>,
    events: broadcast::Sender<ProjectEvent>,
}

impl Project {
    /// Empty project holding models of `kind`
    pub fn new(kind: ModelKind) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            kind,
            models: Vec::new(),
            model_subs: Vec::new(),
            selected_index: 0,
            change_history: Vec::new(),
            ranges: AxisRanges::new(),
            custom_ranges: false,
            previous_ranges: None,
            events,
        }
    }

    /// Model kind
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Shared output of every model, if any model exists
    pub fn output(&self) -> Option<Output> {
        self.models.first().map(Model::output)
    }

    /// All models in display order
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Model at `index`
    pub fn model(&self, index: usize) -> Result<&Model> {
        self.models.get(index).ok_or(ProjectError::ModelNotFound(index))
    }

    /// Current position of a model
    pub fn index_of(&self, id: ModelId) -> Option<usize> {
        self.models.iter().position(|m| m.id() == id)
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the project has no models
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Index of the model the user is looking at
    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    /// Change the selected model
    pub fn select(&mut self, index: usize) -> Result<()> {
        self.model(index)?;
        self.selected_index = index;
        Ok(())
    }

    /// Audit log, oldest first
    pub fn change_history(&self) -> &[HistoryEntry] {
        &self.change_history
    }

    /// Current axis ranges
    pub fn ranges(&self) -> RangeSnapshot {
        self.ranges.snapshot()
    }

    /// Whether the user has overridden auto-ranging
    pub fn custom_ranges(&self) -> bool {
        self.custom_ranges
    }

    /// Last-known-good ranges, captured after each successful round trip
    pub fn previous_ranges(&self) -> Option<&RangeSnapshot> {
        self.previous_ranges.as_ref()
    }

    /// Subscribe to project notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    /// Sender half of the notification channel, for handles that outlive a borrow
    pub fn event_sender(&self) -> broadcast::Sender<ProjectEvent> {
        self.events.clone()
    }

    /// Publish a notification to subscribers
    pub fn publish(&self, event: ProjectEvent) {
        let _ = self.events.send(event);
    }

    /// Name, append and range a new model; returns its index
    ///
    /// A model joining a non-empty project adopts the project's output.
    pub fn add_model(&mut self, mut model: Model) -> Result<usize> {
        if model.kind() != self.kind {
            return Err(ProjectError::KindMismatch {
                expected: self.kind,
                actual: model.kind(),
            });
        }
        if let Some(output) = self.output() {
            if model.output() != output {
                let mut adopt = Attribs::new();
                adopt.insert(OUTPUT_KEY.to_string(), FieldValue::from(output.as_str()));
                model.update(&adopt, true)?;
            }
        }

        let index = self.models.len();
        model.set_name(model_name(index));
        info!(index, name = model.name(), "Adding model");

        self.change_history.push(HistoryEntry::add(index, model.attribs()));
        self.model_subs.push(model.subscribe());
        self.models.push(model);
        if !self.custom_ranges {
            self.calculate_ranges();
        }
        Ok(index)
    }

    /// Remove the model at `index`
    pub fn remove_model(&mut self, index: usize) -> Result<Model> {
        self.model(index)?;
        let model = self.models.remove(index);
        self.model_subs.remove(index);
        info!(index, name = model.name(), "Removed model");

        self.change_history.push(HistoryEntry::remove(index));
        if self.selected_index >= self.models.len() {
            self.selected_index = self.models.len().saturating_sub(1);
        }
        if !self.custom_ranges {
            self.calculate_ranges();
        }
        Ok(model)
    }

    /// Apply a user edit to the model at `index`
    ///
    /// Editing a CI width switches the model to CI mode and editing the
    /// sample size switches it back; while solving by CI width the same
    /// applies to `delta` and `power` with the delta mode. An `output` change
    /// applies to every model and re-enables auto-ranging.
    ///
    /// Returns the indices of the models that need a solver round trip.
    pub fn update_model(&mut self, index: usize, attribs: &Attribs) -> Result<Vec<usize>> {
        let model = self.model(index)?;
        let mut changes = attribs.clone();

        let targets: Vec<usize> = if attribs.contains_key(OUTPUT_KEY) {
            (0..self.models.len()).collect()
        } else {
            let has_field = |name: &str| model.kind().field(name).is_some();
            if model.output() == Output::SampleSizeByCi && has_field("deltaMode") {
                if attribs.contains_key("delta") {
                    changes.insert("deltaMode".to_string(), FieldValue::Flag(true));
                } else if attribs.contains_key("power") {
                    changes.insert("deltaMode".to_string(), FieldValue::Flag(false));
                }
            } else if self.output() != Some(Output::SampleSize) && has_field("ciMode") {
                if attribs.contains_key("ci") {
                    changes.insert("ciMode".to_string(), FieldValue::Flag(true));
                } else if attribs.contains_key("n") {
                    changes.insert("ciMode".to_string(), FieldValue::Flag(false));
                }
            }
            vec![index]
        };

        // models share one schema, so validating on a copy of the first
        // target covers all of them
        self.models[targets[0]].clone().update(&changes, false)?;

        if targets.len() > 1 {
            self.custom_ranges = false;
        }
        for &target in &targets {
            self.models[target].update(&changes, true)?;
            self.forward_model_events(target);
        }
        debug!(index, keys = ?attribs.keys().collect::<Vec<_>>(), "Applied edit");

        if !self.custom_ranges {
            self.calculate_ranges();
        }
        Ok(targets)
    }

    /// Replace a model wholesale with a solver result
    ///
    /// Unless ranges are custom, they are recalculated and captured as
    /// last-known-good.
    /// `key` names the user edit that caused the round trip, if any.
    pub fn apply_solver_result(
        &mut self,
        index: usize,
        response: &SolverResponse,
        key: Option<&str>,
    ) -> Result<()> {
        self.model(index)?;
        self.models[index].replace_from_solver(response);
        self.forward_model_events(index);

        if !self.custom_ranges {
            self.calculate_ranges();
            self.previous_ranges = Some(self.ranges.snapshot());
        }
        if let Some(key) = key {
            self.change_history
                .push(HistoryEntry::change(index, key, self.models[index].attribs()));
        }
        self.publish(ProjectEvent::Recomputed { index });
        Ok(())
    }

    /// Roll a model back to a snapshot after a failed round trip
    pub fn restore_model(&mut self, index: usize, snapshot: &SolverResponse) -> Result<()> {
        self.model(index)?;
        self.models[index].restore(snapshot);
        self.forward_model_events(index);
        if !self.custom_ranges {
            self.calculate_ranges();
        }
        Ok(())
    }

    /// Recompute every axis range from the current models
    pub fn calculate_ranges(&mut self) {
        let next = ranges::calculate(&self.models);
        if let Some(event) = self.ranges.apply(next, true) {
            debug!(axes = event.changes.len(), "Ranges recalculated");
            self.publish(ProjectEvent::RangesChanged { event });
        }
    }

    /// Restore the last-known-good ranges
    pub fn reset_ranges(&mut self) {
        if let Some(previous) = self.previous_ranges.clone() {
            if let Some(event) = self.ranges.apply(previous, true) {
                self.publish(ProjectEvent::RangesChanged { event });
            }
        }
    }

    /// Suspend (`true`) or resume (`false`) auto-ranging
    ///
    /// Resuming restores the last-known-good ranges, or recalculates when
    /// none were captured yet.
    pub fn set_custom_ranges(&mut self, custom: bool) {
        self.custom_ranges = custom;
        if !custom {
            if self.previous_ranges.is_some() {
                self.reset_ranges();
            } else {
                self.calculate_ranges();
            }
        }
    }

    /// User override of one plot slot; suspends auto-ranging
    pub fn set_range(&mut self, slot: PlotSlot, range: Range) {
        let Some(axis) = self.slot_axis(slot) else {
            return;
        };
        self.custom_ranges = true;
        let range = range.with_description(axis.description());
        if let Some(event) = self.ranges.set(axis, Some(range), true) {
            self.publish(ProjectEvent::RangesChanged { event });
        }
    }

    /// Range currently shown in a plot slot
    pub fn range_for(&self, slot: PlotSlot) -> Option<&Range> {
        self.ranges.get(self.slot_axis(slot)?)
    }

    /// Axis shown in a plot slot; top slots need at least one model
    pub fn slot_axis(&self, slot: PlotSlot) -> Option<Axis> {
        match slot {
            PlotSlot::BottomX => Some(Axis::PSpace),
            _ => self.output().map(|output| slot.axis(output)),
        }
    }

    /// Human-readable history line
    pub fn describe_change(&self, entry: &HistoryEntry, html: bool) -> String {
        entry.describe(html)
    }

    /// Whether the CI target marker may be dragged
    pub fn is_ci_target_draggable(&self) -> bool {
        self.selected_output() == Some(Output::DetectableAlternative)
    }

    /// Whether the CI bound markers may be dragged
    pub fn is_ci_bounds_draggable(&self) -> bool {
        matches!(self.selected_output(), Some(output) if output != Output::Power)
    }

    /// Report a rejected edit to subscribers
    pub fn reject_edit(&self, index: usize, error: &dyn std::fmt::Display) {
        self.publish(ProjectEvent::EditRejected {
            index,
            error: error.to_string(),
        });
    }

    fn selected_output(&self) -> Option<Output> {
        self.models.get(self.selected_index).map(Model::output)
    }

    fn forward_model_events(&mut self, index: usize) {
        let mut forwarded = Vec::new();
        if let Some(rx) = self.model_subs.get_mut(index) {
            while let Ok(event) = rx.try_recv() {
                forwarded.push(event);
            }
        }
        for event in forwarded {
            self.publish(ProjectEvent::ModelChanged { index, event });
        }
    }
}

impl Clone for Project {
    /// Value copy for inspection; subscribers stay with the original
    fn clone(&self) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let models = self.models.clone();
        let model_subs = models.iter().map(Model::subscribe).collect();
        Self {
            kind: self.kind,
            models,
            model_subs,
            selected_index: self.selected_index,
            change_history: self.change_history.clone(),
            ranges: self.ranges.clone(),
            custom_ranges: self.custom_ranges,
            previous_ranges: self.previous_ranges.clone(),
            events,
        }
    }
}

/// Display name of the model at `index`
pub fn model_name(index: usize) -> String {
    MODEL_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Line {}", index + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerscope_domain::{attribs, ModelError};

    fn ttest(output: Output) -> Model {
        Model::new(
            ModelKind::TTest,
            output,
            attribs([
                ("alpha", 0.05),
                ("power", 0.8),
                ("delta", 5.0),
                ("sigma", 10.0),
                ("n", 33.0),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn test_model_names() {
        assert_eq!(model_name(0), "Primary");
        assert_eq!(model_name(9), "Denary");
        assert_eq!(model_name(10), "Line 11");
    }

    #[test]
    fn test_add_model_names_and_records_history() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        project.add_model(ttest(Output::Power)).unwrap();
        assert_eq!(project.model(1).unwrap().name(), "Secondary");
        assert_eq!(project.change_history().len(), 2);
    }

    #[test]
    fn test_add_model_adopts_project_output() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        project.add_model(ttest(Output::SampleSize)).unwrap();
        assert_eq!(project.model(1).unwrap().output(), Output::Power);
    }

    #[test]
    fn test_add_model_kind_mismatch() {
        let mut project = Project::new(ModelKind::ZTest);
        let err = project.add_model(ttest(Output::Power)).unwrap_err();
        assert!(matches!(err, ProjectError::KindMismatch { .. }));
    }

    #[test]
    fn test_ci_edit_sets_ci_mode() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        project.update_model(0, &attribs([("ci", 7.0)])).unwrap();
        assert_eq!(project.model(0).unwrap().flag("ciMode"), Some(true));
        project.update_model(0, &attribs([("n", 40.0)])).unwrap();
        assert_eq!(project.model(0).unwrap().flag("ciMode"), Some(false));
    }

    #[test]
    fn test_delta_edit_sets_delta_mode_when_solving_by_ci() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::SampleSizeByCi)).unwrap();
        project.update_model(0, &attribs([("delta", 4.0)])).unwrap();
        assert_eq!(project.model(0).unwrap().flag("deltaMode"), Some(true));
        assert!(project.model(0).unwrap().get("ciMode").is_none());
    }

    #[test]
    fn test_output_change_applies_to_all_and_resets_custom() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        project.add_model(ttest(Output::Power)).unwrap();
        project.set_range(PlotSlot::TopY, Range::new(0.0, 0.5));
        assert!(project.custom_ranges());

        let targets = project
            .update_model(1, &attribs([(OUTPUT_KEY, "n")]))
            .unwrap();
        assert_eq!(targets, vec![0, 1]);
        assert!(project.models().iter().all(|m| m.output() == Output::SampleSize));
        assert!(!project.custom_ranges());
        assert_eq!(project.ranges().n.unwrap().to_array(), [16.5, 49.5]);
    }

    #[test]
    fn test_rejected_edit_touches_nothing() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        let err = project
            .update_model(0, &attribs([("n", 40.0), ("ci", 3.0)]))
            .unwrap_err();
        assert!(matches!(err, ProjectError::Model(ModelError::MutualExclusivity(_))));
        assert_eq!(project.model(0).unwrap().number("n"), Some(33.0));
        assert!(matches!(
            project.update_model(5, &Attribs::new()),
            Err(ProjectError::ModelNotFound(5))
        ));
    }

    #[test]
    fn test_custom_ranges_suspend_and_reset() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        let response = project.model(0).unwrap().snapshot();
        project.apply_solver_result(0, &response, None).unwrap();
        let good = project.ranges();

        project.set_range(PlotSlot::TopRightX, Range::new(-1.0, 1.0));
        assert_eq!(project.range_for(PlotSlot::TopRightX).unwrap().to_array(), [-1.0, 1.0]);

        project.update_model(0, &attribs([("sigma", 20.0)])).unwrap();
        assert_eq!(project.ranges().delta.unwrap().to_array(), [-1.0, 1.0]);

        project.set_custom_ranges(false);
        assert_eq!(project.ranges(), good);
    }

    #[test]
    fn test_round_trip_during_override_keeps_auto_ranges() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        let response = project.model(0).unwrap().snapshot();
        project.apply_solver_result(0, &response, None).unwrap();
        assert_eq!(project.range_for(PlotSlot::TopY).unwrap().to_array(), [0.01, 1.0]);

        project.set_range(PlotSlot::TopY, Range::new(0.0, 0.5));
        project.apply_solver_result(0, &response, Some("n")).unwrap();
        assert_eq!(project.range_for(PlotSlot::TopY).unwrap().to_array(), [0.0, 0.5]);

        project.set_custom_ranges(false);
        assert_eq!(project.range_for(PlotSlot::TopY).unwrap().to_array(), [0.01, 1.0]);
    }

    #[test]
    fn test_resume_without_snapshot_recalculates() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        assert!(project.previous_ranges().is_none());

        project.set_range(PlotSlot::TopY, Range::new(0.0, 0.5));
        project.set_custom_ranges(false);
        assert!(!project.custom_ranges());
        assert_eq!(project.range_for(PlotSlot::TopY).unwrap().to_array(), [0.01, 1.0]);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(ProjectEvent::Recomputed { index: 1 }).unwrap();
        assert_eq!(json["type"], "recomputed");
        assert_eq!(json["index"], 1);
    }

    #[test]
    fn test_apply_solver_result_records_change() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        let mut rx = project.subscribe();

        let mut response = project.model(0).unwrap().snapshot();
        response
            .model
            .values
            .insert("power".to_string(), FieldValue::Number(0.52));
        project.apply_solver_result(0, &response, Some("n")).unwrap();

        let last = project.change_history().last().unwrap();
        assert_eq!(last.key.as_deref(), Some("n"));
        assert!(project.previous_ranges().is_some());

        let mut saw_recalculation = false;
        let mut saw_recomputed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProjectEvent::ModelChanged { event, .. } => saw_recalculation |= event.recalculation,
                ProjectEvent::Recomputed { index } => saw_recomputed = index == 0,
                _ => {}
            }
        }
        assert!(saw_recalculation);
        assert!(saw_recomputed);
    }

    #[test]
    fn test_remove_model_clamps_selection() {
        let mut project = Project::new(ModelKind::TTest);
        project.add_model(ttest(Output::Power)).unwrap();
        project.add_model(ttest(Output::Power)).unwrap();
        project.select(1).unwrap();
        project.remove_model(1).unwrap();
        assert_eq!(project.selected_index(), 0);
        assert_eq!(project.change_history().last().unwrap().describe(false), "Removed model #2");
    }

    #[test]
    fn test_draggability_follows_selected_output() {
        let mut project = Project::new(ModelKind::TTest);
        assert!(!project.is_ci_bounds_draggable());
        project.add_model(ttest(Output::Power)).unwrap();
        assert!(!project.is_ci_target_draggable());
        assert!(!project.is_ci_bounds_draggable());
        project.update_model(0, &attribs([(OUTPUT_KEY, "delta")])).unwrap();
        assert!(project.is_ci_target_draggable());
        assert!(project.is_ci_bounds_draggable());
    }
}
