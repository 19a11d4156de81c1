//! Scripted sessions.
//!
//! A script lists the starting models and a sequence of steps, and is
//! replayed against a live pipeline. Example:
//!
//! ```json
//! {
//!   "kind": "ttest",
//!   "models": [{"output": "power", "alpha": 0.05, "power": 0.8, "delta": 5, "sigma": 10, "n": 33}],
//!   "steps": [
//!     {"op": "slide", "model": 0, "set": {"n": 38}},
//!     {"op": "slide", "model": 0, "set": {"n": 40}},
//!     {"op": "wait", "ms": 500},
//!     {"op": "output", "output": "delta"},
//!     {"op": "drag", "handle": "leftBound", "to": 2.5}
//!   ]
//! }
//! ```

use crate::error::{CliError, Result};
use powerscope_domain::{attribs, Attribs, Model, ModelAttribs, ModelKind, Output, Range, Solver, OUTPUT_KEY};
use powerscope_drag::{DragController, DragTarget, Handle, LinearScale};
use powerscope_pipeline::{Edit, PipelineConfig, PipelineHandle, UpdatePipeline};
use powerscope_project::{PlotSlot, Project};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Starting models plus the steps to replay.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Model kind shared by every model
    pub kind: ModelKind,
    /// Models added before the first step
    #[serde(default)]
    pub models: Vec<ModelAttribs>,
    /// Steps in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted user action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    /// Typed edit, applied immediately
    Edit {
        /// Model position
        model: usize,
        /// Changed fields
        set: Attribs,
    },
    /// Slider edit, debounced
    Slide {
        /// Model position
        model: usize,
        /// Changed fields
        set: Attribs,
    },
    /// Switch every model to another output
    Output {
        /// New output
        output: Output,
    },
    /// Add a model
    Add {
        /// Model snapshot
        model: ModelAttribs,
    },
    /// Remove a model
    Remove {
        /// Model position
        model: usize,
    },
    /// Select a model
    Select {
        /// Model position
        model: usize,
    },
    /// Drag a marker of the selected model to a model-space value
    Drag {
        /// Marker
        handle: Handle,
        /// Value released at
        to: f64,
    },
    /// Fix a plot slot by hand
    SetRange {
        /// Plot slot
        slot: PlotSlot,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Go back to automatic ranges
    AutoRange,
    /// Let time pass
    Wait {
        /// Milliseconds
        ms: u64,
    },
}

impl Script {
    /// Load a script from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Replay `script` against `solver` and return the final project.
pub async fn replay<S: Solver>(script: &Script, solver: S, config: PipelineConfig) -> Result<Project> {
    let (pipeline, task) = UpdatePipeline::spawn(Project::new(script.kind), solver, config);

    for attribs in &script.models {
        let model = Model::from_attribs(script.kind, attribs)?;
        pipeline.add_model(model).await?;
    }
    info!("Replaying {} step(s)", script.steps.len());

    for (number, step) in script.steps.iter().enumerate() {
        debug!("Step {}: {:?}", number + 1, step);
        run_step(&pipeline, script.kind, step).await?;
    }

    pipeline.shutdown()?;
    task.await
        .map_err(|e| CliError::InvalidInput(format!("Pipeline task failed: {}", e)))
}

async fn run_step(pipeline: &PipelineHandle, kind: ModelKind, step: &Step) -> Result<()> {
    match step {
        Step::Edit { model, set } => {
            pipeline.edit_and_wait(Edit::immediate(*model, set.clone())).await?;
        }
        Step::Slide { model, set } => {
            pipeline.edit(Edit::delayed(*model, set.clone()))?;
        }
        Step::Output { output } => {
            let change = attribs([(OUTPUT_KEY, output.as_str())]);
            pipeline.edit_and_wait(Edit::immediate(0, change)).await?;
        }
        Step::Add { model } => {
            pipeline.add_model(Model::from_attribs(kind, model)?).await?;
        }
        Step::Remove { model } => pipeline.remove_model(*model).await?,
        Step::Select { model } => pipeline.select(*model).await?,
        Step::Drag { handle, to } => {
            let project = pipeline.snapshot().await?;
            let target = DragTarget::from_project(&project)
                .ok_or_else(|| CliError::InvalidInput("Nothing to drag".to_string()))?;
            // model-space coordinates in, model-space values out
            let mut drag = DragController::new(pipeline.clone(), LinearScale::identity());
            drag.drag_start(*handle, target)?;
            drag.drag_move(*to)?;
            drag.drag_end()?;
        }
        Step::SetRange { slot, min, max } => {
            pipeline.set_range(*slot, Range::new(*min, *max))?;
        }
        Step::AutoRange => pipeline.set_custom_ranges(false)?,
        Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let script: Script = serde_json::from_str(
            r#"{
                "kind": "ttest",
                "models": [{"output": "power", "n": 33}],
                "steps": [
                    {"op": "edit", "model": 0, "set": {"n": 40}},
                    {"op": "drag", "handle": "rightBound", "to": 0.3},
                    {"op": "setRange", "slot": "topY", "min": 0, "max": 0.5},
                    {"op": "autoRange"},
                    {"op": "wait", "ms": 10}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.kind, ModelKind::TTest);
        assert_eq!(script.models[0].output, Output::Power);
        assert_eq!(script.steps.len(), 5);
        assert_eq!(
            script.steps[1],
            Step::Drag {
                handle: Handle::RightBound,
                to: 0.3
            }
        );
        assert_eq!(script.steps[3], Step::AutoRange);
    }

    #[test]
    fn test_unknown_op() {
        let result: std::result::Result<Script, _> =
            serde_json::from_str(r#"{"kind": "ztest", "steps": [{"op": "explode"}]}"#);
        assert!(result.is_err());
    }
}
