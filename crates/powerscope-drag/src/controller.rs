//! Drag gesture state machine
//!
//! A drag runs idle → dragging → idle. Moving only stages values locally;
//! the solver is reached once, through the pipeline, when the drag ends.

use crate::error::{DragError, Result};
use crate::scale::LinearScale;
use powerscope_domain::{attribs, AxisScale, CiBound, CiTable, Model, Output};
use powerscope_pipeline::{Edit, PipelineHandle};
use powerscope_project::Project;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Half-width of the band around zero the target marker cannot rest in
pub const DEAD_ZONE: f64 = 0.1;

/// Draggable marker on the confidence interval plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Handle {
    /// The detectable alternative (interval centre)
    Target,
    /// Lower interval bound
    LeftBound,
    /// Upper interval bound
    RightBound,
}

impl Handle {
    /// Table view searched while dragging a bound
    pub fn bound(&self) -> Option<CiBound> {
        match self {
            Handle::Target => None,
            Handle::LeftBound => Some(CiBound::Lower),
            Handle::RightBound => Some(CiBound::Upper),
        }
    }
}

/// What a drag needs to know about the model under the pointer
///
/// Taken once at drag start; the model may change underneath without
/// affecting the gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct DragTarget {
    /// Model position
    pub model: usize,
    /// Detectable-alternative field name
    pub param: Option<&'static str>,
    /// Detectable-alternative value before the drag
    pub value: Option<f64>,
    /// Interval before the drag
    pub bounds: Option<[f64; 2]>,
    /// Interval → sample size lookup
    pub table: CiTable,
    /// Whether the target marker may move
    pub target_draggable: bool,
    /// Whether the bound markers may move
    pub bounds_draggable: bool,
}

impl DragTarget {
    /// Snapshot `model`, which sits at position `index`
    pub fn from_model(index: usize, model: &Model) -> Self {
        Self {
            model: index,
            param: model.det_alt_param(),
            value: model.det_alt(),
            bounds: model.ci_interval(),
            table: CiTable::new(&model.plot().confidence_intervals),
            target_draggable: model.output() == Output::DetectableAlternative,
            bounds_draggable: model.output() != Output::Power,
        }
    }

    /// Snapshot the project's selected model
    pub fn from_project(project: &Project) -> Option<Self> {
        let index = project.selected_index();
        let model = project.model(index).ok()?;
        Some(Self {
            target_draggable: project.is_ci_target_draggable(),
            bounds_draggable: project.is_ci_bounds_draggable(),
            ..Self::from_model(index, model)
        })
    }

    fn allows(&self, handle: Handle) -> bool {
        match handle {
            Handle::Target => self.target_draggable && self.param.is_some(),
            Handle::LeftBound | Handle::RightBound => self.bounds_draggable,
        }
    }
}

/// State of an active drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    /// Marker being dragged
    pub handle: Handle,
    /// Model position
    pub model: usize,
    /// Value the marker started at
    pub original: Option<f64>,
    /// Staged detectable alternative
    pub live_value: Option<f64>,
    /// Staged interval
    pub live_bounds: Option<[f64; 2]>,
    /// Staged sample size
    pub live_n: Option<f64>,
    /// Whether other plot elements are dimmed
    pub de_emphasized: bool,
    target: DragTarget,
}

/// Turns pointer movement into at most one edit per drag
///
/// # Examples
///
/// ```
/// use powerscope_domain::{attribs, CiEntry, CiTable, Model, ModelKind, Output};
/// use powerscope_drag::{DragController, DragTarget, Handle, LinearScale};
/// use powerscope_pipeline::{PipelineConfig, UpdatePipeline};
/// use powerscope_project::Project;
/// use powerscope_solver::MockSolver;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (pipeline, _task) =
///     UpdatePipeline::spawn(Project::new(ModelKind::TTest), MockSolver::echo(), PipelineConfig::default());
/// let mut drag = DragController::new(pipeline, LinearScale::new([0.0, 1.0], [0.0, 100.0]));
///
/// let model = Model::new(ModelKind::TTest, Output::DetectableAlternative, attribs([("n", 30.0)])).unwrap();
/// let mut target = DragTarget::from_model(0, &model);
/// target.table = CiTable::new(&[CiEntry::new(0.04, 0.3, 40.0), CiEntry::new(0.10, 0.28, 45.0)]);
///
/// drag.drag_start(Handle::LeftBound, target).unwrap();
/// assert_eq!(drag.drag_move(12.0).unwrap(), Some(45.0));
/// # }
/// ```
pub struct DragController<A: AxisScale = LinearScale> {
    pipeline: PipelineHandle,
    scale: A,
    disabled: HashSet<Handle>,
    session: Option<DragSession>,
}

impl<A: AxisScale> DragController<A> {
    /// Controller committing through `pipeline`
    pub fn new(pipeline: PipelineHandle, scale: A) -> Self {
        Self {
            pipeline,
            scale,
            disabled: HashSet::new(),
            session: None,
        }
    }

    /// Current scale
    pub fn scale(&self) -> &A {
        &self.scale
    }

    /// Replace the scale, e.g. after the axis range changed
    pub fn set_scale(&mut self, scale: A) {
        self.scale = scale;
    }

    /// Switch a handle on or off
    pub fn set_enabled(&mut self, handle: Handle, enabled: bool) {
        if enabled {
            self.disabled.remove(&handle);
        } else {
            self.disabled.insert(handle);
        }
    }

    /// Whether a handle accepts drags
    pub fn is_enabled(&self, handle: Handle) -> bool {
        !self.disabled.contains(&handle)
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the plot should dim everything but the dragged marker
    pub fn is_de_emphasized(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.de_emphasized)
    }

    /// Active session, if any
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Begin dragging `handle` over `target`
    pub fn drag_start(&mut self, handle: Handle, target: DragTarget) -> Result<&DragSession> {
        if self.session.is_some() {
            return Err(DragError::AlreadyDragging);
        }
        if !self.is_enabled(handle) {
            return Err(DragError::Disabled(handle));
        }
        if !target.allows(handle) {
            return Err(DragError::NotDraggable(handle));
        }

        let original = match handle {
            Handle::Target => target.value,
            Handle::LeftBound => target.bounds.map(|[lower, _]| lower),
            Handle::RightBound => target.bounds.map(|[_, upper]| upper),
        };
        debug!(?handle, model = target.model, "Drag started");

        let session = self.session.insert(DragSession {
            handle,
            model: target.model,
            original,
            live_value: None,
            live_bounds: None,
            live_n: None,
            de_emphasized: true,
            target,
        });
        Ok(&*session)
    }

    /// Follow the pointer to `screen_x`
    ///
    /// Returns the staged value: the detectable alternative for the target,
    /// the snapped sample size for a bound, or `None` when nothing matched.
    pub fn drag_move(&mut self, screen_x: f64) -> Result<Option<f64>> {
        let x = self.scale.invert(screen_x);
        let session = self.session.as_mut().ok_or(DragError::NotDragging)?;

        match session.handle.bound() {
            None => {
                let x = clamp_dead_zone(x);
                session.live_value = Some(x);
                // the interval travels with its centre
                if let (Some([lower, upper]), Some(start)) =
                    (session.target.bounds, session.target.value)
                {
                    let shift = x - start;
                    session.live_bounds = Some([lower + shift, upper + shift]);
                }
                Ok(Some(x))
            }
            Some(bound) => {
                let Some((_, entry)) = session.target.table.lookup(bound, x) else {
                    return Ok(None);
                };
                session.live_bounds = Some([entry.ci1, entry.ci2]);
                session.live_n = Some(entry.n);
                Ok(Some(entry.n))
            }
        }
    }

    /// Release the pointer and commit the staged value
    ///
    /// Returns the edit sent to the pipeline, if anything was staged.
    pub fn drag_end(&mut self) -> Result<Option<Edit>> {
        let session = self.session.take().ok_or(DragError::NotDragging)?;

        let edit = match session.handle {
            Handle::Target => session
                .target
                .param
                .zip(session.live_value)
                .map(|(param, value)| Edit::immediate(session.model, attribs([(param, value)]))),
            Handle::LeftBound | Handle::RightBound => session
                .live_n
                .map(|n| Edit::immediate(session.model, attribs([("n", n)]))),
        };

        match &edit {
            Some(edit) => {
                debug!(handle = ?session.handle, model = session.model, "Drag committed");
                self.pipeline.edit(edit.clone())?;
            }
            None => debug!(handle = ?session.handle, "Drag ended without a value"),
        }
        Ok(edit)
    }

    /// Abandon the drag without committing
    pub fn cancel(&mut self) -> Option<DragSession> {
        let session = self.session.take();
        if let Some(session) = &session {
            debug!(handle = ?session.handle, "Drag cancelled");
        }
        session
    }
}

impl<A: AxisScale + std::fmt::Debug> std::fmt::Debug for DragController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragController")
            .field("scale", &self.scale)
            .field("disabled", &self.disabled)
            .field("session", &self.session)
            .finish()
    }
}

/// Keep the target marker out of `(-0.1, 0.1)`
///
/// # Examples
///
/// ```
/// use powerscope_drag::clamp_dead_zone;
///
/// assert_eq!(clamp_dead_zone(0.02), 0.1);
/// assert_eq!(clamp_dead_zone(-0.05), -0.1);
/// assert_eq!(clamp_dead_zone(0.4), 0.4);
/// ```
pub fn clamp_dead_zone(x: f64) -> f64 {
    if (0.0..DEAD_ZONE).contains(&x) {
        DEAD_ZONE
    } else if x < 0.0 && x > -DEAD_ZONE {
        -DEAD_ZONE
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerscope_domain::{CiEntry, ModelKind};
    use powerscope_pipeline::{PipelineConfig, UpdatePipeline};
    use powerscope_solver::MockSolver;

    fn controller(scale: LinearScale) -> DragController {
        let (pipeline, _task) = UpdatePipeline::spawn(
            Project::new(ModelKind::TTest),
            MockSolver::echo(),
            PipelineConfig::default(),
        );
        DragController::new(pipeline, scale)
    }

    fn target(output: Output) -> DragTarget {
        let model = Model::new(
            ModelKind::TTest,
            output,
            attribs([("delta", 5.0), ("ci", 4.0), ("n", 30.0)]),
        )
        .unwrap();
        let mut target = DragTarget::from_model(0, &model);
        target.table = CiTable::new(&[
            CiEntry::new(0.04, 0.3, 40.0),
            CiEntry::new(0.10, 0.28, 45.0),
        ]);
        target
    }

    #[test]
    fn test_dead_zone() {
        assert_eq!(clamp_dead_zone(0.0), 0.1);
        assert_eq!(clamp_dead_zone(0.099), 0.1);
        assert_eq!(clamp_dead_zone(0.1), 0.1);
        assert_eq!(clamp_dead_zone(-0.01), -0.1);
        assert_eq!(clamp_dead_zone(-0.1), -0.1);
        assert_eq!(clamp_dead_zone(-3.0), -3.0);
    }

    #[test]
    fn test_target_snapshot() {
        let t = target(Output::DetectableAlternative);
        assert_eq!(t.param, Some("delta"));
        assert_eq!(t.value, Some(5.0));
        assert_eq!(t.bounds, Some([3.0, 7.0]));
        assert!(t.target_draggable);
        assert!(t.bounds_draggable);

        let power = target(Output::Power);
        assert!(!power.target_draggable);
        assert!(!power.bounds_draggable);
    }

    #[tokio::test]
    async fn test_start_guards() {
        let mut drag = controller(LinearScale::identity());

        let err = drag.drag_start(Handle::Target, target(Output::Power)).unwrap_err();
        assert!(matches!(err, DragError::NotDraggable(Handle::Target)));

        drag.set_enabled(Handle::LeftBound, false);
        let err = drag
            .drag_start(Handle::LeftBound, target(Output::SampleSize))
            .unwrap_err();
        assert!(matches!(err, DragError::Disabled(Handle::LeftBound)));
        drag.set_enabled(Handle::LeftBound, true);

        drag.drag_start(Handle::RightBound, target(Output::SampleSize)).unwrap();
        assert!(drag.is_de_emphasized());
        let err = drag
            .drag_start(Handle::LeftBound, target(Output::SampleSize))
            .unwrap_err();
        assert!(matches!(err, DragError::AlreadyDragging));
    }

    #[tokio::test]
    async fn test_move_requires_session() {
        let mut drag = controller(LinearScale::identity());
        assert!(matches!(drag.drag_move(1.0), Err(DragError::NotDragging)));
        assert!(matches!(drag.drag_end(), Err(DragError::NotDragging)));
    }

    #[tokio::test]
    async fn test_target_move_stages_value_and_bounds() {
        let mut drag = controller(LinearScale::new([0.0, 8.0], [0.0, 16.0]));
        drag.drag_start(Handle::Target, target(Output::DetectableAlternative))
            .unwrap();
        assert_eq!(drag.session().unwrap().original, Some(5.0));

        assert_eq!(drag.drag_move(12.0).unwrap(), Some(6.0));
        let session = drag.session().unwrap();
        assert_eq!(session.live_value, Some(6.0));
        assert_eq!(session.live_bounds, Some([4.0, 8.0]));

        // into the dead zone
        assert_eq!(drag.drag_move(0.1).unwrap(), Some(0.1));
    }

    #[tokio::test]
    async fn test_bound_move_snaps_to_table() {
        let mut drag = controller(LinearScale::new([0.0, 1.0], [0.0, 100.0]));
        drag.drag_start(Handle::LeftBound, target(Output::SampleSize))
            .unwrap();

        assert_eq!(drag.drag_move(12.0).unwrap(), Some(45.0));
        assert_eq!(drag.session().unwrap().live_bounds, Some([0.10, 0.28]));

        // below every entry: index 0 is a hit
        assert_eq!(drag.drag_move(1.0).unwrap(), Some(40.0));
    }

    #[tokio::test]
    async fn test_empty_table_move_is_noop() {
        let mut drag = controller(LinearScale::identity());
        let mut t = target(Output::SampleSize);
        t.table = CiTable::default();
        drag.drag_start(Handle::RightBound, t).unwrap();

        assert_eq!(drag.drag_move(0.5).unwrap(), None);
        assert_eq!(drag.session().unwrap().live_n, None);
        assert_eq!(drag.drag_end().unwrap(), None);
        assert!(!drag.is_dragging());
    }

    #[tokio::test]
    async fn test_cancel_discards_staged_value() {
        let mut drag = controller(LinearScale::identity());
        drag.drag_start(Handle::Target, target(Output::DetectableAlternative))
            .unwrap();
        drag.drag_move(0.5).unwrap();

        let session = drag.cancel().unwrap();
        assert_eq!(session.live_value, Some(0.5));
        assert!(!drag.is_dragging());
        assert!(!drag.is_de_emphasized());
        assert!(drag.cancel().is_none());
    }
}
