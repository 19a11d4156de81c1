//! Messages accepted by the pipeline task

use crate::metrics::PipelineMetrics;
use powerscope_domain::{attribs, Attribs, FieldValue, Model, Range};
use powerscope_project::{PlotSlot, Project, ProjectError};
use tokio::sync::oneshot;

/// Reply channel for a command that can be refused
pub type Reply<T> = oneshot::Sender<Result<T, ProjectError>>;

/// How quickly an edit reaches the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditClass {
    /// Apply and solve right away (typed values, drag release)
    Immediate,
    /// Wait for a quiet period first (slider movement)
    Delayed,
}

/// One user edit addressed to a model by position
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    /// Model position at the time of the edit
    pub model: usize,
    /// Changed fields
    pub attribs: Attribs,
    /// Scheduling class
    pub class: EditClass,
}

impl Edit {
    /// Edit applied without waiting
    pub fn immediate(model: usize, attribs: Attribs) -> Self {
        Self {
            model,
            attribs,
            class: EditClass::Immediate,
        }
    }

    /// Edit that waits for the debounce window
    pub fn delayed(model: usize, attribs: Attribs) -> Self {
        Self {
            model,
            attribs,
            class: EditClass::Delayed,
        }
    }

    /// Single numeric field edit
    ///
    /// # Examples
    ///
    /// ```
    /// use powerscope_pipeline::{Edit, EditClass};
    ///
    /// let edit = Edit::number(0, "n", 45.0, EditClass::Immediate);
    /// assert_eq!(edit.attribs.len(), 1);
    /// ```
    pub fn number(model: usize, key: &str, value: f64, class: EditClass) -> Self {
        Self {
            model,
            attribs: attribs([(key, value)]),
            class,
        }
    }

    /// Whether the edit skips the debounce window
    pub fn is_immediate(&self) -> bool {
        self.class == EditClass::Immediate
    }

    /// Field name to record in the change history; mode flags never count
    pub(crate) fn history_key(attribs: &Attribs) -> Option<String> {
        attribs
            .iter()
            .find(|(_, value)| !matches!(value, FieldValue::Flag(_)))
            .map(|(key, _)| key.clone())
    }
}

/// Command sent from a [`PipelineHandle`](crate::PipelineHandle) to the task
#[derive(Debug)]
pub enum Command {
    /// User edit
    Edit {
        /// The edit
        edit: Edit,
        /// Told once the edit is applied or refused
        reply: Option<Reply<()>>,
    },
    /// Add a model and solve it
    AddModel {
        /// New model
        model: Box<Model>,
        /// Told the new model's index
        reply: Option<Reply<usize>>,
    },
    /// Remove a model; its outstanding responses become stale
    RemoveModel {
        /// Model position
        index: usize,
        /// Told once the model is gone
        reply: Option<Reply<()>>,
    },
    /// Suspend or resume auto-ranging
    SetCustomRanges(bool),
    /// Fix one plot slot by hand
    SetRange {
        /// Plot slot
        slot: PlotSlot,
        /// New range
        range: Range,
    },
    /// Restore last-known-good ranges
    ResetRanges,
    /// Change the selected model
    Select {
        /// Model position
        index: usize,
        /// Told once selected
        reply: Option<Reply<()>>,
    },
    /// Copy of the current project
    Snapshot(oneshot::Sender<Project>),
    /// Copy of the current counters
    Metrics(oneshot::Sender<PipelineMetrics>),
    /// Stop the task; it returns the project
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_key_skips_mode_flags() {
        let mut changes = attribs([("n", 40.0)]);
        changes.insert("ciMode".to_string(), FieldValue::Flag(false));
        assert_eq!(Edit::history_key(&changes).as_deref(), Some("n"));

        let only_mode: Attribs = [("ciMode".to_string(), FieldValue::Flag(true))].into();
        assert_eq!(Edit::history_key(&only_mode), None);
    }

    #[test]
    fn test_constructors() {
        assert!(Edit::immediate(0, Attribs::new()).is_immediate());
        assert!(!Edit::delayed(0, Attribs::new()).is_immediate());
        let edit = Edit::number(2, "power", 0.9, EditClass::Delayed);
        assert_eq!(edit.model, 2);
        assert_eq!(edit.attribs.get("power"), Some(&FieldValue::Number(0.9)));
    }
}
