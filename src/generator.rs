//! Generation pipeline
//!
//! One table runs strictly in sequence: introspect, classify, apply
//! overrides, build the entity, render each planned artifact, write it, then
//! append one journal record holding exactly the text that was written.
//! A render failure stops the run where it is; files already written stay
//! and no record is appended.

use crate::artifacts::{ArtifactKind, ArtifactPlan, OutputRoots, Selection};
use crate::classify::Classifier;
use crate::config::Config;
use crate::entity::{EntityBuilder, EntityDescriptor};
use crate::error::{Error, Result};
use crate::history::{GeneratedFile, GenerationRecord, Journal};
use crate::introspect::{CatalogSource, Introspector, TableSummary};
use crate::templates::Renderer;
use std::path::PathBuf;
use std::time::Instant;

/// What to generate for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub table: String,
    pub module: String,
    /// Empty means `[list]`
    pub features: Vec<String>,
    pub selection: Selection,
    /// Introspection deadline
    pub deadline: Option<Instant>,
}

impl GenerateRequest {
    pub fn new(table: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            module: module.into(),
            features: Vec::new(),
            selection: Selection::All,
            deadline: None,
        }
    }

    pub fn with_features<S: AsRef<str>>(mut self, features: &[S]) -> Self {
        self.features = features.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Same request for another table
    fn for_table(&self, table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..self.clone()
        }
    }
}

/// One rendered artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    pub template: String,
    pub path: PathBuf,
    pub content: String,
}

/// Per-table result of a batch, in request order
#[derive(Debug)]
pub enum BatchOutcome {
    Generated(Box<GenerationRecord>),
    /// The table had no catalog rows; the batch moved on.
    Skipped { table: String, error: Error },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn records(&self) -> impl Iterator<Item = &GenerationRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            BatchOutcome::Generated(record) => Some(record.as_ref()),
            BatchOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes.iter().filter_map(|o| match o {
            BatchOutcome::Skipped { table, error } => Some((table.as_str(), error)),
            BatchOutcome::Generated(_) => None,
        })
    }
}

/// Runs the pipeline for a [`Config`]
pub struct Generator {
    config: Config,
    introspector: Introspector,
    builder: EntityBuilder,
    renderer: Renderer,
    plan: ArtifactPlan,
    roots: OutputRoots,
    journal: Journal,
}

impl Generator {
    pub fn new(config: Config) -> Self {
        let introspector = Introspector::new(Classifier::new(config.classifier.clone()));
        let builder = EntityBuilder::new(config.naming.clone())
            .with_package(config.generator.backend.package.clone());
        let renderer = Renderer::new(config.generator.template_dir.clone(), config.field_filters())
            .with_layer_mode(config.generator.backend.layer_mode);

        let mut plan = config.artifact_plan();
        if !config.generator.backend.enabled {
            plan = plan.select(Selection::FrontendOnly);
        }
        if !config.generator.frontend.enabled {
            plan = plan.select(Selection::BackendOnly);
        }

        Self {
            introspector,
            builder,
            renderer,
            plan,
            roots: config.output_roots(),
            journal: Journal::new(config.generator.history_dir.clone()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Use another journal location.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn list_tables(&self, source: &dyn CatalogSource, deadline: Option<Instant>) -> Result<Vec<TableSummary>> {
        source.list_tables(deadline)
    }

    /// Introspect, classify, apply overrides and build the entity.
    pub fn describe(&self, source: &dyn CatalogSource, request: &GenerateRequest) -> Result<EntityDescriptor> {
        if request.module.trim().is_empty() {
            return Err(Error::Config("module name is required".to_string()));
        }
        let mut table = self.introspector.introspect(source, &request.table, request.deadline)?;
        table.apply_overrides(&self.config.overrides_for(&request.table))?;
        self.builder.build(table, request.module.trim(), request.features.as_slice())
    }

    /// Render every planned artifact without touching the filesystem or
    /// the journal.
    pub fn preview(&self, source: &dyn CatalogSource, request: &GenerateRequest) -> Result<Vec<RenderedArtifact>> {
        let entity = self.describe(source, request)?;
        self.plan
            .clone()
            .select(request.selection)
            .resolve(&entity, &self.roots)?
            .into_iter()
            .map(|planned| {
                let preview = self.renderer.preview(&planned.template, &entity, &planned.path)?;
                Ok(RenderedArtifact {
                    kind: planned.kind,
                    template: preview.template,
                    path: preview.path,
                    content: preview.content,
                })
            })
            .collect()
    }

    /// Generate one table and journal the run.
    pub fn generate(&self, source: &dyn CatalogSource, request: &GenerateRequest) -> Result<GenerationRecord> {
        let entity = self.describe(source, request)?;
        let planned = self
            .plan
            .clone()
            .select(request.selection)
            .resolve(&entity, &self.roots)?;

        let mut files = Vec::with_capacity(planned.len());
        for artifact in planned {
            let content = self
                .renderer
                .render_to_file(&artifact.template, &entity, &artifact.path)?;
            files.push(GeneratedFile::new(artifact.path, artifact.kind, content));
        }

        let features: Vec<String> = entity.features.iter().map(|f| f.as_str().to_string()).collect();
        let record = GenerationRecord::new(
            &entity.table.name,
            &entity.module,
            &entity.table.comment,
            entity.table.columns.len(),
            self.config.snapshot(&features),
            files,
        );
        self.journal.append(record.clone())?;

        tracing::info!(
            table = %entity.table.name,
            entity = %entity.entity_name,
            files = record.files.len(),
            record = %record.id,
            "generated table"
        );
        Ok(record)
    }

    /// Generate several tables in order. Missing tables are reported in the
    /// batch and skipped; any other error stops the batch.
    pub fn generate_batch<S: AsRef<str>>(
        &self,
        source: &dyn CatalogSource,
        tables: &[S],
        request: &GenerateRequest,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for table in tables {
            let table = table.as_ref();
            match self.generate(source, &request.for_table(table)) {
                Ok(record) => report.outcomes.push(BatchOutcome::Generated(Box::new(record))),
                Err(error) if error.is_table_not_found() => {
                    tracing::warn!(table, "skipping table with no catalog rows");
                    report.outcomes.push(BatchOutcome::Skipped {
                        table: table.to_string(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(report)
    }
}
