//! Powerscope Project
//!
//! An ordered set of models drawn on shared axes.
//!
//! # Overview
//!
//! The project is responsible for:
//! - **Model set**: adding, removing and editing models of one kind
//! - **Range aggregation**: deriving one range per plotted axis from every
//!   model, unless the user has fixed the ranges by hand
//! - **Audit log**: an append-only history of adds, removes and changes
//! - **Notifications**: model changes, range changes and solver progress on
//!   a broadcast channel
//!
//! The project never talks to the solver. The update pipeline owns a project
//! and feeds solver results back through [`Project::apply_solver_result`].
//!
//! # Examples
//!
//! ```
//! use powerscope_domain::{attribs, Model, ModelKind, Output};
//! use powerscope_project::Project;
//!
//! let mut project = Project::new(ModelKind::TTest);
//! let model = Model::new(
//!     ModelKind::TTest,
//!     Output::Power,
//!     attribs([("alpha", 0.05), ("power", 0.8), ("delta", 5.0), ("sigma", 10.0), ("n", 33.0)]),
//! )
//! .unwrap();
//! project.add_model(model).unwrap();
//!
//! let ranges = project.ranges();
//! assert_eq!(ranges.delta.unwrap().to_array(), [-25.0, 25.0]);
//! assert_eq!(ranges.power.unwrap().to_array(), [0.01, 1.0]);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod history;
pub mod project;
pub mod ranges;

pub use error::{ProjectError, Result};
pub use history::{HistoryEntry, HistoryKind};
pub use project::{model_name, Project, ProjectEvent};
pub use ranges::PlotSlot;
