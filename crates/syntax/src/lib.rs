// Library code reports through tracing, never stderr.
#![deny(clippy::print_stderr)]

//! Incremental syntax trees for live documents.
//!
//! # Architecture
//!
//! * [`document`]: the host document interface and a rope-backed implementation
//! * [`position`]: zero-based tree points to one-based host positions
//! * [`diff`]: lockstep diff of a tree against its structurally edited copy
//! * [`session`]: per-document parser state and the time-sliced reparse loop
//! * [`coordinator`]: document lifecycle, language binding and update fan-out
//! * [`service`]: [`SyntaxService`], the consumer entry point
//! * [`telemetry`]: parse events and sinks
//!
//! Edits flow host → [`SyntaxCoordinator::on_content_changed`] →
//! [`ParseSession::report_change`], which patches the tree, queues a reparse
//! and returns the invalidated ranges without waiting for it.

pub mod config;
pub mod coordinator;
pub mod diff;
pub mod document;
mod error;
pub mod position;
pub mod service;
pub mod session;
pub mod telemetry;
#[cfg(test)]
mod testing;

pub use config::SyntaxConfig;
pub use coordinator::{SyntaxCoordinator, TreeUpdate};
pub use diff::{ChangedNode, ChangedRanges, RangeChange, TraversalStep};
pub use document::{ContentChange, Document, DocumentError, DocumentId, RopeDocument};
pub use error::SyntaxError;
pub use position::{Position, PositionRange};
pub use service::SyntaxService;
pub use session::{ParseSession, SessionOptions};
pub use telemetry::{ParseEvent, ParseKind, ParseMetrics, ParseTelemetry, TelemetryFanout, TracingTelemetry};
