//! scorestream: live exam results from a server-sent event stream.
//!
//! A background [`Ingestor`] holds a connection to the upstream score feed,
//! parses each `score` event and writes it into two grouped-map indexes, one
//! keyed by student and one keyed by exam. A [`QueryService`] reads those
//! indexes for the HTTP layer, including each group's average score.
//!
//! # Example
//!
//! ```rust,no_run
//! use scorestream::{Ingestor, QueryService, ServiceContext, Settings, SseSource};
//! use scorestream::context::IndexKind;
//! use scorestore::StoreEngine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let engine = StoreEngine::from_config(&settings.engine)?;
//!     let ctx = ServiceContext::open(&engine, &settings.indexes).await?;
//!
//!     let ingestor = Ingestor::new(
//!         Arc::new(SseSource::new(settings.upstream.url.clone())),
//!         ctx.clone(),
//!         settings.upstream.backoff(),
//!     );
//!     tokio::spawn(async move { ingestor.run().await });
//!
//!     let queries = QueryService::new(ctx);
//!     let summary = queries.summary(IndexKind::Students, "studentId12345").await?;
//!     println!("{:?} average {}", summary.results, summary.average);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod ingest;
pub mod query;
pub mod source;
pub mod writer;
pub mod tests;

pub use config::{CliArgs, Settings};
pub use context::{IndexKind, ServiceContext};
pub use error::{IngestError, ParseError, QueryError, WriteError};
pub use event::{parse, ScoreEvent, StreamMessage};
pub use ingest::{Backoff, ConnectionState, IngestMonitor, IngestStats, Ingestor};
pub use query::{average, GroupSummary, QueryService};
pub use source::{EventSource, SseSource};
pub use writer::DualIndexWriter;
