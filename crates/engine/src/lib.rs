//! # Intake Engine
//!
//! The Intake Engine assembles survey responses from a remote list into an
//! immutable [`Dataset`](intake_types::Dataset) and serves it to presentation
//! layers.
//!
//! ## Key Features
//!
//! - **Pipeline**: token → resolve → fetch → normalize → enrich, in sequence
//!   ([`SurveyPipeline`])
//! - **Caching**: time-bounded, per-key single-flight memo ([`DatasetCache`])
//! - **Configuration**: JSON file with `${env:…}`/`${secret:…}` interpolation
//!   and environment overrides ([`config`])
//! - **Filtering**: course/shift/term selections ([`FilterSelection`])
//! - **Reporting**: per-section results that never abort the whole report
//!   ([`build_report`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use intake_engine::{DatasetCache, SurveyPipeline, config::load_config};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config()?;
//! let pipeline = SurveyPipeline::from_config(&config, Arc::new(DatasetCache::new()))?;
//! let dataset = pipeline.load().await?;
//! println!("{} responses", dataset.len());
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod config;
mod filters;
mod pipeline;
pub mod report;
pub mod roles;

pub use cache::DatasetCache;
pub use filters::{ALL_CHOICE, FilterOptions, FilterSelection};
pub use pipeline::{PipelineError, SurveyPipeline};
pub use report::{DEFAULT_SECTIONS, RenderError, Report, Section, SectionKind, SectionSpec, build_report};
pub use roles::{ColumnRole, ResolvedColumns};
