//! # etalon-jobs
//!
//! Background processing of the durable ingestion queue.
//!
//! This crate provides:
//! - A worker that claims queued batches in submission order
//! - Acknowledgement of each batch with its report, or a failure record
//! - Retry of transient failures up to the message's retry limit
//! - Lifecycle notifications via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use etalon_jobs::{AnalysisHandler, WorkerBuilder, WorkerConfig};
//!
//! let worker = WorkerBuilder::new(queue, Arc::new(AnalysisHandler::new(pipeline)))
//!     .with_config(WorkerConfig::from_env())
//!     .build();
//!
//! let handle = worker.start();
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod worker;

// Re-export core types
pub use etalon_core::*;

pub use handler::{AnalysisHandler, MessageHandler, MessageResult, NoOpHandler};
pub use worker::{AnalysisWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
