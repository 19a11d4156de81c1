//! The update pipeline task
//!
//! A single task owns the [`Project`]. It receives commands from handles,
//! debounces delayed edits, issues solver round trips on spawned tasks and
//! applies their results when they come back. Because only this task touches
//! the project, no locking is needed around model state.

use crate::command::{Command, Edit, EditClass, Reply};
use crate::config::PipelineConfig;
use crate::handle::PipelineHandle;
use crate::metrics::PipelineMetrics;
use powerscope_domain::{Attribs, ModelId, Solver, SolverResponse, OUTPUT_KEY};
use powerscope_project::{Project, ProjectError, ProjectEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Which solver operation a round trip uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Calculate,
    Update,
}

/// A finished round trip, tagged with the token it was issued under
#[derive(Debug)]
struct Completion {
    id: ModelId,
    token: u64,
    key: Option<String>,
    result: Result<SolverResponse, String>,
}

/// Delayed edits waiting for the debounce window to close
#[derive(Debug, Default)]
struct PendingEdit {
    index: usize,
    attribs: Attribs,
    replies: Vec<Reply<()>>,
}

/// Models re-solved together after an output change
///
/// The batch either lands as a whole or is rolled back as a whole.
#[derive(Debug)]
struct OutputBatch {
    members: Vec<ModelId>,
    pending: HashSet<ModelId>,
    settled: Vec<ModelId>,
}

/// Merge `incoming` into `pending`; later keys win and evict the mutually
/// exclusive partners already queued
///
/// Keys arriving together in `incoming` are kept as they are, so the model
/// still sees (and rejects) an edit that sets two exclusive fields at once.
fn merge_attribs(pending: &mut Attribs, incoming: &Attribs, groups: &[&[&str]]) {
    for key in incoming.keys() {
        for group in groups.iter().filter(|g| g.contains(&key.as_str())) {
            for partner in group.iter().filter(|p| !incoming.contains_key(**p)) {
                pending.remove(*partner);
            }
        }
    }
    pending.extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Debounces edits and keeps models in sync with the solver
///
/// # Examples
///
/// ```
/// use powerscope_domain::{attribs, Model, ModelKind, Output};
/// use powerscope_pipeline::{Edit, PipelineConfig, UpdatePipeline};
/// use powerscope_project::Project;
/// use powerscope_solver::MockSolver;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (handle, task) = UpdatePipeline::spawn(
///     Project::new(ModelKind::TTest),
///     MockSolver::echo(),
///     PipelineConfig::default(),
/// );
///
/// let model = Model::new(
///     ModelKind::TTest,
///     Output::Power,
///     attribs([("alpha", 0.05), ("power", 0.8), ("delta", 5.0), ("sigma", 10.0), ("n", 33.0)]),
/// )
/// .unwrap();
/// handle.add_model(model).await.unwrap();
/// handle.edit_and_wait(Edit::immediate(0, attribs([("n", 45.0)]))).await.unwrap();
///
/// handle.shutdown().unwrap();
/// let project = task.await.unwrap();
/// assert_eq!(project.model(0).unwrap().number("n"), Some(45.0));
/// # }
/// ```
pub struct UpdatePipeline<S: Solver> {
    project: Project,
    solver: Arc<S>,
    config: PipelineConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    pending: Vec<(ModelId, PendingEdit)>,
    deadline: Option<Instant>,
    tokens: HashMap<ModelId, u64>,
    next_token: u64,
    last_good: HashMap<ModelId, SolverResponse>,
    batches: Vec<OutputBatch>,
    in_flight: usize,
    metrics: PipelineMetrics,
}

impl<S: Solver> UpdatePipeline<S> {
    /// Create a pipeline around `project` and a handle to drive it
    pub fn new(project: Project, solver: S, config: PipelineConfig) -> (Self, PipelineHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let handle = PipelineHandle::new(commands_tx, project.event_sender());
        let pipeline = Self {
            project,
            solver: Arc::new(solver),
            config,
            commands,
            completions_tx,
            completions,
            pending: Vec::new(),
            deadline: None,
            tokens: HashMap::new(),
            next_token: 0,
            last_good: HashMap::new(),
            batches: Vec::new(),
            in_flight: 0,
            metrics: PipelineMetrics::new(),
        };
        (pipeline, handle)
    }

    /// Create a pipeline and run it on a new task
    ///
    /// The task finishes with the final project after
    /// [`PipelineHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(
        project: Project,
        solver: S,
        config: PipelineConfig,
    ) -> (PipelineHandle, JoinHandle<Project>) {
        let (pipeline, handle) = Self::new(project, solver, config);
        (handle, tokio::spawn(pipeline.run()))
    }

    /// Run until shutdown; returns the project
    pub async fn run(mut self) -> Project {
        tracing::info!(
            "Update pipeline started (debounce: {:?})",
            self.config.debounce()
        );

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush_delayed();
                }
            }
        }

        if self.config.drain_on_shutdown {
            self.drain().await;
        }
        tracing::info!("Update pipeline stopped\n{}", self.metrics.summary());
        self.project
    }

    async fn drain(&mut self) {
        self.flush_delayed();
        while self.in_flight > 0 {
            match self.completions.recv().await {
                Some(completion) => self.handle_completion(completion),
                None => break,
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Edit { edit, reply } => self.handle_edit(edit, reply),
            Command::AddModel { model, reply } => {
                let result = self.project.add_model(*model);
                if let Ok(index) = result {
                    if let Ok(model) = self.project.model(index) {
                        let id = model.id();
                        self.issue_request(id, Method::Calculate, None);
                    }
                }
                send_reply(reply, result);
            }
            Command::RemoveModel { index, reply } => {
                let result = self.project.remove_model(index).map(|model| {
                    let id = model.id();
                    // any response still on its way is now stale
                    self.tokens.remove(&id);
                    self.leave_batch(id);
                    self.last_good.remove(&id);
                    self.pending.retain(|(pending_id, _)| *pending_id != id);
                });
                if self.pending.is_empty() {
                    self.deadline = None;
                }
                send_reply(reply, result);
            }
            Command::SetCustomRanges(custom) => self.project.set_custom_ranges(custom),
            Command::SetRange { slot, range } => self.project.set_range(slot, range),
            Command::ResetRanges => self.project.reset_ranges(),
            Command::Select { index, reply } => {
                let result = self.project.select(index);
                send_reply(reply, result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.project.clone());
            }
            Command::Metrics(reply) => {
                let _ = reply.send(self.metrics.clone());
            }
            Command::Shutdown => {}
        }
    }

    fn handle_edit(&mut self, edit: Edit, reply: Option<Reply<()>>) {
        self.metrics.record_edit(edit.is_immediate());

        let (id, groups) = match self.project.model(edit.model) {
            Ok(model) => (model.id(), model.kind().exclusive_groups(model.output())),
            Err(e) => {
                self.reject(edit.model, e, reply.into_iter().collect());
                return;
            }
        };

        match edit.class {
            EditClass::Delayed => {
                match self.pending.iter_mut().find(|(pending_id, _)| *pending_id == id) {
                    Some((_, pending)) => {
                        self.metrics.record_coalesced();
                        merge_attribs(&mut pending.attribs, &edit.attribs, &groups);
                        pending.replies.extend(reply);
                    }
                    None => {
                        let mut pending = PendingEdit {
                            index: edit.model,
                            ..PendingEdit::default()
                        };
                        merge_attribs(&mut pending.attribs, &edit.attribs, &groups);
                        pending.replies.extend(reply);
                        self.pending.push((id, pending));
                    }
                }
                self.deadline = Some(Instant::now() + self.config.debounce());
                tracing::debug!("Delayed edit for model {} queued", edit.model);
            }
            EditClass::Immediate => {
                // an immediate edit carries the model's pending delayed edits with it
                let mut merged = PendingEdit {
                    index: edit.model,
                    ..PendingEdit::default()
                };
                if let Some(position) = self.pending.iter().position(|(pending_id, _)| *pending_id == id) {
                    merged = self.pending.remove(position).1;
                }
                merge_attribs(&mut merged.attribs, &edit.attribs, &groups);
                merged.replies.extend(reply);
                if self.pending.is_empty() {
                    self.deadline = None;
                }
                self.apply_edit(id, merged);
            }
        }
    }

    fn flush_delayed(&mut self) {
        self.deadline = None;
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            tracing::debug!("Debounce window closed, flushing {} model(s)", pending.len());
        }
        for (id, edit) in pending {
            self.apply_edit(id, edit);
        }
    }

    fn apply_edit(&mut self, id: ModelId, edit: PendingEdit) {
        let Some(index) = self.project.index_of(id) else {
            // removed while the edit was pending
            send_all(edit.replies, Err(ProjectError::ModelNotFound(edit.index)));
            return;
        };

        let changes = match self.project.model(index) {
            Ok(model) if self.config.round_edits => model.round_attribs(&edit.attribs),
            _ => edit.attribs,
        };

        // an output change touches every model, so snapshot all of them
        let before: Vec<(ModelId, SolverResponse)> = if changes.contains_key(OUTPUT_KEY) {
            self.project.models().iter().map(|m| (m.id(), m.snapshot())).collect()
        } else {
            self.project
                .model(index)
                .map(|m| vec![(m.id(), m.snapshot())])
                .unwrap_or_default()
        };

        match self.project.update_model(index, &changes) {
            Ok(targets) => {
                for (model_id, snapshot) in before {
                    self.last_good.entry(model_id).or_insert(snapshot);
                }
                send_all(edit.replies, Ok(()));

                let key = Edit::history_key(&changes);
                let ids: Vec<ModelId> = targets
                    .iter()
                    .filter_map(|&t| self.project.model(t).ok().map(|m| m.id()))
                    .collect();
                for &target in &ids {
                    self.issue_request(target, Method::Update, key.clone());
                }
                if changes.contains_key(OUTPUT_KEY) && ids.len() > 1 {
                    self.batches.push(OutputBatch {
                        pending: ids.iter().copied().collect(),
                        members: ids,
                        settled: Vec::new(),
                    });
                }
            }
            Err(e) => self.reject(index, e, edit.replies),
        }
    }

    fn reject(&mut self, index: usize, error: ProjectError, replies: Vec<Reply<()>>) {
        self.metrics.record_rejected();
        tracing::warn!("Rejected edit for model {}: {}", index, error);
        self.project.reject_edit(index, &error);
        send_all(replies, Err(error));
    }

    fn issue_request(&mut self, id: ModelId, method: Method, key: Option<String>) {
        let Some(index) = self.project.index_of(id) else {
            return;
        };
        let Ok(model) = self.project.model(index) else {
            return;
        };
        let kind = model.kind();
        let attribs = model.attribs();
        // a newer request supersedes the model's part in an output change
        self.leave_batch(id);

        self.next_token += 1;
        let token = self.next_token;
        self.tokens.insert(id, token);
        self.in_flight += 1;
        self.metrics.record_request();
        self.project.publish(ProjectEvent::Computing { index });
        tracing::debug!("Issuing {:?} for model {} (token {})", method, index, token);

        let solver = Arc::clone(&self.solver);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = match method {
                Method::Calculate => solver.calculate(kind, &attribs).await,
                Method::Update => solver.update(kind, &attribs).await,
            };
            let _ = completions.send(Completion {
                id,
                token,
                key,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let current = self.tokens.get(&completion.id).copied();
        let index = self.project.index_of(completion.id);
        let (Some(index), true) = (index, current == Some(completion.token)) else {
            self.metrics.record_stale();
            tracing::debug!(
                "Discarding stale response for model {} (token {})",
                completion.id,
                completion.token
            );
            return;
        };

        match completion.result {
            Ok(response) => {
                match self.batch_of(completion.id) {
                    Some(position) => self.settle_batch_member(position, completion.id),
                    None => {
                        self.last_good.remove(&completion.id);
                    }
                }
                match self
                    .project
                    .apply_solver_result(index, &response, completion.key.as_deref())
                {
                    Ok(()) => self.metrics.record_applied(),
                    Err(e) => tracing::error!("Failed to apply solver result: {}", e),
                }
            }
            Err(message) => {
                self.metrics.record_failure();
                tracing::warn!("Solver failed for model {}: {}", index, message);
                match self.batch_of(completion.id) {
                    Some(position) => self.roll_back_batch(position),
                    None => self.roll_back(completion.id),
                }
                self.project
                    .publish(ProjectEvent::SolverFailed { index, message });
            }
        }
    }

    fn roll_back(&mut self, id: ModelId) {
        let (Some(index), Some(snapshot)) = (self.project.index_of(id), self.last_good.remove(&id))
        else {
            return;
        };
        if let Err(e) = self.project.restore_model(index, &snapshot) {
            tracing::error!("Failed to restore model {}: {}", index, e);
        }
    }

    /// Undo an output change on every model it touched
    fn roll_back_batch(&mut self, position: usize) {
        let batch = self.batches.remove(position);
        tracing::warn!(
            "Output change failed, restoring {} model(s)",
            batch.members.len()
        );
        for id in batch.members {
            // responses still on their way belong to the abandoned output
            self.tokens.remove(&id);
            self.roll_back(id);
        }
    }

    fn batch_of(&self, id: ModelId) -> Option<usize> {
        self.batches.iter().position(|b| b.pending.contains(&id))
    }

    fn settle_batch_member(&mut self, position: usize, id: ModelId) {
        let batch = &mut self.batches[position];
        batch.pending.remove(&id);
        batch.settled.push(id);
        if batch.pending.is_empty() {
            self.close_batch(position);
        }
    }

    fn leave_batch(&mut self, id: ModelId) {
        if let Some(position) = self.batch_of(id) {
            let batch = &mut self.batches[position];
            batch.pending.remove(&id);
            if batch.pending.is_empty() {
                self.close_batch(position);
            }
        }
    }

    fn close_batch(&mut self, position: usize) {
        let batch = self.batches.remove(position);
        for id in batch.settled {
            self.last_good.remove(&id);
        }
    }
}

fn send_reply<T>(reply: Option<Reply<T>>, result: Result<T, ProjectError>) {
    if let Some(reply) = reply {
        let _ = reply.send(result);
    }
}

fn send_all(replies: Vec<Reply<()>>, result: Result<(), ProjectError>) {
    for reply in replies {
        let _ = reply.send(result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerscope_domain::{attribs, FieldValue};

    const CI_GROUP: &[&str] = &["n", "ci"];

    #[test]
    fn test_merge_later_keys_win() {
        let mut pending = attribs([("n", 30.0), ("power", 0.8)]);
        merge_attribs(&mut pending, &attribs([("n", 40.0)]), &[CI_GROUP]);
        assert_eq!(pending.get("n"), Some(&FieldValue::Number(40.0)));
        assert_eq!(pending.get("power"), Some(&FieldValue::Number(0.8)));
    }

    #[test]
    fn test_merge_evicts_exclusive_partner() {
        let mut pending = attribs([("n", 30.0)]);
        merge_attribs(&mut pending, &attribs([("ci", 5.0)]), &[CI_GROUP]);
        assert!(!pending.contains_key("n"));
        assert_eq!(pending.get("ci"), Some(&FieldValue::Number(5.0)));
    }

    #[test]
    fn test_merge_keeps_exclusive_keys_sent_together() {
        let mut pending = attribs([("power", 0.8)]);
        merge_attribs(&mut pending, &attribs([("n", 40.0), ("ci", 3.0)]), &[CI_GROUP]);
        assert_eq!(pending.get("n"), Some(&FieldValue::Number(40.0)));
        assert_eq!(pending.get("ci"), Some(&FieldValue::Number(3.0)));
        assert_eq!(pending.len(), 3);
    }

    #[test]
    fn test_merge_without_groups() {
        let mut pending = attribs([("n", 30.0)]);
        merge_attribs(&mut pending, &attribs([("ci", 5.0)]), &[]);
        assert_eq!(pending.len(), 2);
    }
}
