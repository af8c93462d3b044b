// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # tablegen
//!
//! Schema-driven CRUD artifact generation with a replayable history.
//!
//! A live table definition is read from the database catalog, classified
//! with name and comment heuristics, turned into a render-ready
//! [`EntityDescriptor`], and rendered through a fixed set of templates into
//! backend handlers, typed client bindings, view templates and provisioning
//! SQL. Every run is journaled with the full text of what it wrote, so any
//! earlier state can be restored file-for-file.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tablegen::{Config, ConnectionDescriptor, GenerateRequest, Generator};
//!
//! let source = ConnectionDescriptor::parse("sqlite:app.db")?.open()?;
//! let generator = Generator::new(Config::default());
//!
//! let request = GenerateRequest::new("sys_user", "sys")
//!     .with_features(&["list", "add", "edit", "delete", "view"]);
//! let record = generator.generate(source.as_ref(), &request)?;
//!
//! // later
//! generator.journal().rollback(&record.id)?;
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! catalog ──► Introspector ──► Classifier ──► overrides ──► EntityBuilder
//!                                                              │
//!            Journal ◄── files written ◄── Renderer (per artifact)
//! ```
//!
//! Each stage is usable on its own: [`naming`] holds the case transforms,
//! [`introspect`] the drivers and normalisation, [`classify`] the heuristic
//! rule tables, [`entity`] the descriptor builder, [`templates`] the
//! renderer and helper functions, [`history`] the journal.

pub mod artifacts;
pub mod classify;
pub mod config;
pub mod entity;
pub mod error;
pub mod generator;
pub mod history;
pub mod introspect;
pub mod naming;
pub mod schema;
pub mod templates;

pub use artifacts::{ArtifactKind, ArtifactPlan, ArtifactSpec, LayerMode, OutputRoots, Selection};
pub use classify::{Classifier, ClassifierRules};
pub use config::Config;
pub use entity::{
    EntityBuilder, EntityDescriptor, Feature, NamingRules, OperationDescriptor, OperationKind,
};
pub use error::{Error, Result};
pub use generator::{BatchOutcome, BatchReport, GenerateRequest, Generator, RenderedArtifact};
pub use history::{GeneratedFile, GenerationRecord, Journal, RollbackOptions, RollbackReport};
pub use introspect::{CatalogSource, ConnectionDescriptor, DriverKind, Introspector, TableSummary};
pub use schema::{ColumnDescriptor, ColumnOverride, IndexDescriptor, TableDescriptor};
pub use templates::Renderer;

/// Version of tablegen
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
