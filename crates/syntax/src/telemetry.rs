//! Parse telemetry.
//!
//! Sessions report one [`ParseEvent`] per committed parse. Sinks are
//! write-only and best-effort: nothing they do feeds back into scheduling.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::document::DocumentId;

/// Smoothing factor for Exponential Moving Average.
/// alpha = 2 / (N + 1). For N=10, alpha ~= 0.18.
const EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseKind {
	/// No previous tree to reuse.
	Full,
	Incremental,
}

impl ParseKind {
	const fn idx(self) -> usize {
		match self {
			Self::Full => 0,
			Self::Incremental => 1,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Full => "full",
			Self::Incremental => "incremental",
		}
	}
}

#[derive(Debug, Clone)]
pub struct ParseEvent {
	pub doc_id: DocumentId,
	pub language: Arc<str>,
	pub kind: ParseKind,
	pub elapsed: Duration,
	pub slices: u32,
}

/// Write-only sink for parse events.
pub trait ParseTelemetry: Send + Sync {
	fn record(&self, event: &ParseEvent);
}

/// Logs every event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl ParseTelemetry for TracingTelemetry {
	fn record(&self, event: &ParseEvent) {
		tracing::debug!(
			doc_id = %event.doc_id,
			language = %event.language,
			kind = event.kind.as_str(),
			elapsed_ms = event.elapsed.as_secs_f64() * 1000.0,
			slices = event.slices,
			"syntax.parse"
		);
	}
}

#[derive(Debug, Clone, Default)]
struct Ema {
	value: f64,
	initialized: bool,
}

impl Ema {
	fn update(&mut self, next: f64) {
		if self.initialized {
			self.value = EMA_ALPHA * next + (1.0 - EMA_ALPHA) * self.value;
		} else {
			self.value = next;
			self.initialized = true;
		}
	}
}

#[derive(Debug, Clone, Default)]
struct Entry {
	duration_ms: Ema,
	slices: Ema,
	count: u64,
}

/// Per-(language, kind) moving averages of parse cost.
#[derive(Debug, Default)]
pub struct ParseMetrics {
	entries: Mutex<FxHashMap<Arc<str>, [Entry; 2]>>,
}

impl ParseMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn avg_duration(&self, language: &str, kind: ParseKind) -> Option<Duration> {
		self.with_entry(language, kind, |e| Duration::from_secs_f64(e.duration_ms.value / 1000.0))
	}

	pub fn avg_slices(&self, language: &str, kind: ParseKind) -> Option<f64> {
		self.with_entry(language, kind, |e| e.slices.value)
	}

	/// Number of parses recorded.
	pub fn count(&self, language: &str, kind: ParseKind) -> u64 {
		self.with_entry(language, kind, |e| e.count).unwrap_or(0)
	}

	fn with_entry<T>(&self, language: &str, kind: ParseKind, f: impl FnOnce(&Entry) -> T) -> Option<T> {
		let entries = self.entries.lock();
		entries.get(language).map(|by_kind| &by_kind[kind.idx()]).filter(|e| e.count > 0).map(f)
	}
}

impl ParseTelemetry for ParseMetrics {
	fn record(&self, event: &ParseEvent) {
		let mut entries = self.entries.lock();
		let entry = &mut entries.entry(Arc::clone(&event.language)).or_default()[event.kind.idx()];
		entry.duration_ms.update(event.elapsed.as_secs_f64() * 1000.0);
		entry.slices.update(f64::from(event.slices));
		entry.count += 1;
	}
}

/// Forwards each event to several sinks.
#[derive(Default, Clone)]
pub struct TelemetryFanout {
	sinks: Vec<Arc<dyn ParseTelemetry>>,
}

impl TelemetryFanout {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, sink: Arc<dyn ParseTelemetry>) -> Self {
		self.sinks.push(sink);
		self
	}
}

impl ParseTelemetry for TelemetryFanout {
	fn record(&self, event: &ParseEvent) {
		for sink in &self.sinks {
			sink.record(event);
		}
	}
}
