//! Progress reporting for merges.
//!
//! The merge engine calls a [`ProgressSink`] synchronously once per merged
//! document. Sinks must return quickly and must not fail the merge: a sink
//! that cannot do its job logs the problem and carries on.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::working_set::DocumentRef;

/// Emitted once per merged document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeEvent {
	/// 1-based position of the document just merged.
	pub index: usize,
	pub total: usize,
	pub path: DocumentRef,
	pub elapsed_secs: f64,
	/// Linear estimate of the time left, never negative.
	pub eta_secs: f64,
}

impl MergeEvent {
	pub fn new(index: usize, total: usize, path: DocumentRef, elapsed: Duration) -> Self {
		Self {
			index,
			total,
			path,
			elapsed_secs: elapsed.as_secs_f64(),
			eta_secs: estimate_remaining(elapsed, index, total),
		}
	}

	pub fn percent(&self) -> usize {
		if self.total == 0 {
			100
		} else {
			self.index * 100 / self.total
		}
	}

	pub fn status_line(&self) -> String {
		format!(
			"Merging {}/{} files... {}% complete. ETA: {:.1} seconds",
			self.index,
			self.total,
			self.percent(),
			self.eta_secs
		)
	}
}

/// Seconds left if the remaining documents cost the mean of those done so
/// far. Zero when nothing is done yet or everything is done.
pub fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> f64 {
	if done == 0 || total == 0 {
		return 0.0;
	}
	let elapsed = elapsed.as_secs_f64();
	let estimated_total = elapsed / done as f64 * total as f64;
	(estimated_total - elapsed).max(0.0)
}

/// Receiver of merge progress.
pub trait ProgressSink {
	fn on_event(&mut self, event: &MergeEvent);
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
	fn on_event(&mut self, event: &MergeEvent) {
		(**self).on_event(event);
	}
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
	fn on_event(&mut self, event: &MergeEvent) {
		(**self).on_event(event);
	}
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for (A, B) {
	fn on_event(&mut self, event: &MergeEvent) {
		self.0.on_event(event);
		self.1.on_event(event);
	}
}

impl<S: ProgressSink> ProgressSink for Option<S> {
	fn on_event(&mut self, event: &MergeEvent) {
		if let Some(sink) = self {
			sink.on_event(event);
		}
	}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
	fn on_event(&mut self, _event: &MergeEvent) {}
}

/// Logs each event at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
	fn on_event(&mut self, event: &MergeEvent) {
		info!("merged {} ({}/{})", event.path, event.index, event.total);
	}
}

/// Forwards events to the control side over an unbounded channel. Sending
/// never blocks; once the receiver is gone events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
	tx: UnboundedSender<MergeEvent>,
}

impl ChannelSink {
	pub fn new(tx: UnboundedSender<MergeEvent>) -> Self {
		Self { tx }
	}
}

impl ProgressSink for ChannelSink {
	fn on_event(&mut self, event: &MergeEvent) {
		let _ = self.tx.send(event.clone());
	}
}

/// One line of the merge history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
	pub merged_at: DateTime<Utc>,
	pub source: DocumentRef,
	pub output: PathBuf,
	pub index: usize,
	pub total: usize,
}

impl HistoryEntry {
	pub fn summary(&self) -> String {
		format!(
			"{} Merged: {} -> {}",
			self.merged_at.format("%Y-%m-%d %H:%M:%S"),
			self.source,
			self.output.display()
		)
	}
}

/// Durable merge history in NDJSON, one [`HistoryEntry`] per merged
/// document.
///
/// Entries are held back as events arrive and only written by
/// [`HistoryLog::commit`], which the caller invokes once the output has
/// been saved. A log dropped without a commit records nothing, so a failed
/// or cancelled merge never appears in the history.
#[derive(Debug, Clone)]
pub struct HistoryLog {
	path: PathBuf,
	output: PathBuf,
	pending: Vec<HistoryEntry>,
}

impl HistoryLog {
	pub fn new(path: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			output: output.into(),
			pending: Vec::new(),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Entries recorded since the last commit.
	pub fn pending(&self) -> &[HistoryEntry] {
		&self.pending
	}

	/// Append the pending entries to the history file. Failures are logged
	/// and the entries are dropped either way.
	pub fn commit(&mut self) {
		if self.pending.is_empty() {
			return;
		}
		let entries = std::mem::take(&mut self.pending);
		if let Err(e) = self.append(&entries) {
			warn!(
				"failed to record merge history in {}: {}",
				self.path.display(),
				e
			);
		}
	}

	fn append(&self, entries: &[HistoryEntry]) -> anyhow::Result<()> {
		if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
			fs::create_dir_all(dir)?;
		}
		let mut lines = String::new();
		for entry in entries {
			lines.push_str(&serde_json::to_string(entry)?);
			lines.push('\n');
		}
		let mut file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)?;
		file.write_all(lines.as_bytes())?;
		Ok(())
	}
}

impl ProgressSink for HistoryLog {
	fn on_event(&mut self, event: &MergeEvent) {
		self.pending.push(HistoryEntry {
			merged_at: Utc::now(),
			source: event.path.clone(),
			output: self.output.clone(),
			index: event.index,
			total: event.total,
		});
	}
}

/// Read back a history file. A missing file is an empty history; lines that
/// do not parse are skipped.
pub fn read_history(path: &Path) -> std::io::Result<Vec<HistoryEntry>> {
	let file = match File::open(path) {
		Ok(f) => f,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(e) => return Err(e),
	};

	let mut entries = Vec::new();
	for (n, line) in BufReader::new(file).lines().enumerate() {
		let line = line?;
		if line.trim().is_empty() {
			continue;
		}
		match serde_json::from_str::<HistoryEntry>(&line) {
			Ok(entry) => entries.push(entry),
			Err(e) => warn!("skipping history line {} in {}: {}", n + 1, path.display(), e),
		}
	}
	Ok(entries)
}
