//! Semantic checks for transit schedule feeds.
//!
//! A [`GtfsFeed`] is loaded once through [`GtfsInput`], then handed to a
//! [`ValidationEngine`] which runs the [`rules`] over it and collects
//! [`Finding`]s into a [`Report`].

pub mod calendar;
pub mod config;
pub mod context;
pub mod engine;
pub mod feed;
pub mod finding;
pub mod geometry;
pub mod index;
pub mod input;
pub mod progress;
pub mod rules;
pub mod spatial_index;
pub mod statistics;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use calendar::{ActiveDateSet, ServiceDatePolicy};
pub use config::ValidationConfig;
pub use context::ValidationContext;
pub use engine::ValidationEngine;
pub use feed::GtfsFeed;
pub use finding::{EntityKind, Finding, FindingSeverity, Report, RuleCode};
pub use geometry::{Envelope, GeometryAdapter, GeometryError, PlanarPoint, UtmProjection};
pub use index::{FeedIndex, FeedIntegrityError};
pub use input::{parse_csv_table, CsvTable, GtfsInput, GtfsInputError};
pub use progress::{NoOpProgressHandler, ProgressHandler};
pub use rules::default_runner;
pub use spatial_index::{SpatialIndex, SpatialIndexBuilder};
pub use statistics::FeedStatistics;
pub use validator::{Validator, ValidatorRunner};
