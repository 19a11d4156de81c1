//! Powerscope Update Pipeline
//!
//! Debounces user edits and keeps models in sync with a solver.
//!
//! # Overview
//!
//! Edits come in two classes:
//! - **Immediate**: applied and sent to the solver right away
//! - **Delayed**: merged per model (later keys win) and flushed once no
//!   delayed edit has arrived for the debounce period
//!
//! Every solver round trip is tagged with a per-model token. A response
//! whose token is no longer the model's latest is discarded, so a slow
//! answer can never overwrite a newer one. A failed round trip rolls the
//! model back to its state before the edit.
//!
//! # Example
//!
//! ```
//! use powerscope_domain::{attribs, Model, ModelKind, Output};
//! use powerscope_pipeline::{Edit, PipelineConfig, UpdatePipeline};
//! use powerscope_project::Project;
//! use powerscope_solver::MockSolver;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let solver = MockSolver::echo();
//! let (handle, task) =
//!     UpdatePipeline::spawn(Project::new(ModelKind::TTest), solver.clone(), PipelineConfig::responsive());
//!
//! let model = Model::new(
//!     ModelKind::TTest,
//!     Output::Power,
//!     attribs([("alpha", 0.05), ("power", 0.8), ("delta", 5.0), ("sigma", 10.0), ("n", 33.0)]),
//! )
//! .unwrap();
//! handle.add_model(model).await.unwrap();
//!
//! // slider movement collapses into a single round trip on shutdown
//! for n in [34.0, 35.0, 36.0] {
//!     handle.edit(Edit::delayed(0, attribs([("n", n)]))).unwrap();
//! }
//! handle.shutdown().unwrap();
//!
//! let project = task.await.unwrap();
//! assert_eq!(project.model(0).unwrap().number("n"), Some(36.0));
//! assert_eq!(solver.call_count(), 2);
//! # }
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod pipeline;

pub use command::{Command, Edit, EditClass, Reply};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use handle::PipelineHandle;
pub use metrics::PipelineMetrics;
pub use pipeline::UpdatePipeline;
