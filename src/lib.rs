//! Cleaning and summarising event-attendance CSV logs.
//!
//! Data flows one way: [`loader`] decodes uploads, [`normalize`] types and
//! enriches them, [`merge`] combines them into the canonical dataset,
//! [`filter`] narrows it to the current view, and [`aggregate`] /
//! [`reports`] summarise the view. [`pipeline`] strings a whole cycle
//! together; [`output`] exports results.
pub mod aggregate;
pub mod config;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod loader;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod types;
pub mod util;

pub use config::{AppConfig, ColumnNames, PipelineConfig};
pub use error::{Error, IngestError, InvalidColumnError, Result};
pub use filter::{DateRange, FilterPredicates};
pub use pipeline::{build_dataset, current_view, run_cycle, CanonicalDataset, Upload};
pub use types::{Advisory, Outcome, Table, Value};
