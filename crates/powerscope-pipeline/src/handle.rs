//! Cloneable front end to a running pipeline

use crate::command::{Command, Edit, Reply};
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use powerscope_domain::{Model, Range};
use powerscope_project::{PlotSlot, Project, ProjectEvent};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Handle for sending commands to an [`UpdatePipeline`](crate::UpdatePipeline)
///
/// Fire-and-forget methods return as soon as the command is queued; the
/// `async` methods wait for the task to answer.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ProjectEvent>,
}

impl PipelineHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        events: broadcast::Sender<ProjectEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Queue a raw command
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| PipelineError::Closed)
    }

    /// Subscribe to project notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    /// Queue an edit without waiting for it
    pub fn edit(&self, edit: Edit) -> Result<()> {
        self.send(Command::Edit { edit, reply: None })
    }

    /// Queue an edit and wait until it is applied or refused
    ///
    /// Delayed edits answer when the debounce window closes.
    pub async fn edit_and_wait(&self, edit: Edit) -> Result<()> {
        self.request(|reply| Command::Edit {
            edit,
            reply: Some(reply),
        })
        .await
    }

    /// Add a model; returns its index
    pub async fn add_model(&self, model: Model) -> Result<usize> {
        self.request(|reply| Command::AddModel {
            model: Box::new(model),
            reply: Some(reply),
        })
        .await
    }

    /// Remove the model at `index`
    pub async fn remove_model(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::RemoveModel {
            index,
            reply: Some(reply),
        })
        .await
    }

    /// Select the model at `index`
    pub async fn select(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::Select {
            index,
            reply: Some(reply),
        })
        .await
    }

    /// Suspend or resume auto-ranging
    pub fn set_custom_ranges(&self, custom: bool) -> Result<()> {
        self.send(Command::SetCustomRanges(custom))
    }

    /// Fix one plot slot by hand
    pub fn set_range(&self, slot: PlotSlot, range: Range) -> Result<()> {
        self.send(Command::SetRange { slot, range })
    }

    /// Restore last-known-good ranges
    pub fn reset_ranges(&self) -> Result<()> {
        self.send(Command::ResetRanges)
    }

    /// Copy of the project as the task currently sees it
    pub async fn snapshot(&self) -> Result<Project> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| PipelineError::Closed)
    }

    /// Copy of the task's counters
    pub async fn metrics(&self) -> Result<PipelineMetrics> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Metrics(tx))?;
        rx.await.map_err(|_| PipelineError::Closed)
    }

    /// Ask the task to stop
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        let answer = rx.await.map_err(|_| PipelineError::Closed)?;
        Ok(answer?)
    }
}
