//! # DocStore Emulator
//!
//! In-process DocStore server for tests and local development.
//!
//! This crate provides:
//! - A versioned document store with a logical clock
//! - Optimistic read-write transactions (read sets validated at commit)
//! - Write preconditions and field masks
//! - Structured query evaluation
//! - A CBOR endpoint router for loopback HTTP clients
//!
//! # Concurrency control
//!
//! Every document carries a version bumped on each write. Reads made inside
//! a transaction record the version they observed (or that the document was
//! missing). At commit the emulator compares the read set with the current
//! versions; any difference aborts the commit with `Aborted`, which clients
//! treat as contention and retry.
//!
//! A failed commit leaves its transaction open until it is rolled back or a
//! new transaction names it as the one being retried.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod query;
mod server;
mod store;

pub use config::EmulatorConfig;
pub use error::{EmulatorError, EmulatorResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::EmulatorServer;
pub use store::{DocumentStore, StoredDocument};
