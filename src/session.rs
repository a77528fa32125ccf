//! Control-surface state: the working set, the order text and the single
//! in-flight merge.
//!
//! A [`MergeSession`] is the only owner of the working set and order. It
//! validates a merge request up front, then runs the engine on a blocking
//! worker thread and hands back a [`MergeJob`] through which the caller
//! receives immutable [`MergeEvent`]s and the terminal result. While a job
//! is running the session refuses to start another one or to change its
//! inputs.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;

use crate::codec::DocumentCodec;
use crate::merge::{CancelToken, MergeEngine, MergeError, MergeSummary};
use crate::order::{OrderError, default_order, resolve};
use crate::progress::{ChannelSink, HistoryLog, MergeEvent};
use crate::working_set::{DocumentRef, WorkingSet};

#[derive(Debug, Error)]
pub enum SessionError {
	#[error("no documents selected to merge")]
	NoDocuments,
	#[error("invalid order: {0}")]
	Order(#[from] OrderError),
	#[error("a merge is already in progress")]
	Busy,
}

/// Failure reported by [`MergeJob::wait`].
#[derive(Debug, Error)]
pub enum JobError {
	#[error(transparent)]
	Merge(#[from] MergeError),
	#[error("merge worker stopped unexpectedly: {0}")]
	Worker(#[from] tokio::task::JoinError),
}

pub struct MergeSession<C> {
	engine: Arc<MergeEngine<C>>,
	working_set: WorkingSet,
	order_text: String,
	history: Option<PathBuf>,
	active: Arc<AtomicBool>,
}

impl<C: DocumentCodec> MergeSession<C> {
	pub fn new(codec: C) -> Self {
		Self {
			engine: Arc::new(MergeEngine::new(codec)),
			working_set: WorkingSet::new(),
			order_text: String::new(),
			history: None,
			active: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Record every merged document in the NDJSON history file at `path`
	/// once the merged output has been saved.
	pub fn with_history(mut self, path: impl Into<PathBuf>) -> Self {
		self.history = Some(path.into());
		self
	}

	pub fn codec(&self) -> &C {
		self.engine.codec()
	}

	pub fn working_set(&self) -> &WorkingSet {
		&self.working_set
	}

	pub fn order_text(&self) -> &str {
		&self.order_text
	}

	pub fn is_merging(&self) -> bool {
		self.active.load(Ordering::SeqCst)
	}

	/// Add documents and reset the order to the identity order.
	pub fn add<I, D>(&mut self, docs: I) -> Result<(), SessionError>
	where
		I: IntoIterator<Item = D>,
		D: Into<DocumentRef>,
	{
		self.ensure_idle()?;
		self.working_set.extend(docs);
		self.order_text = default_order(self.working_set.len());
		Ok(())
	}

	pub fn clear(&mut self) -> Result<(), SessionError> {
		self.ensure_idle()?;
		self.working_set.clear();
		self.order_text.clear();
		Ok(())
	}

	/// Replace the order text. It is validated when a merge starts.
	pub fn set_order(&mut self, order_text: impl Into<String>) -> Result<(), SessionError> {
		self.ensure_idle()?;
		self.order_text = order_text.into();
		Ok(())
	}

	/// Validate the current inputs and start merging into `output` on a
	/// blocking worker. Must be called from within a Tokio runtime.
	pub fn start(&self, output: impl Into<PathBuf>) -> Result<MergeJob, SessionError> {
		if self.working_set.is_empty() {
			return Err(SessionError::NoDocuments);
		}
		let order = resolve(&self.order_text, self.working_set.len())?;
		let refs = self.working_set.select(&order);

		if self
			.active
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return Err(SessionError::Busy);
		}
		let guard = ActiveGuard(Arc::clone(&self.active));

		let output = output.into();
		let (tx, events) = unbounded_channel();
		let cancel = CancelToken::new();
		let worker_cancel = cancel.clone();
		let engine = Arc::clone(&self.engine);
		let history = self
			.history
			.as_ref()
			.map(|path| HistoryLog::new(path.clone(), output.clone()));

		info!(
			"starting merge of {} documents into {}",
			refs.len(),
			output.display()
		);
		let handle = tokio::task::spawn_blocking(move || -> Result<MergeSummary, MergeError> {
			let _guard = guard;
			let mut sink = (ChannelSink::new(tx), history);
			let summary = engine.merge_to(&refs, &output, &mut sink, &worker_cancel)?;
			if let Some(history) = sink.1.as_mut() {
				history.commit();
			}
			Ok(summary)
		});

		Ok(MergeJob {
			events,
			cancel,
			handle,
		})
	}

	fn ensure_idle(&self) -> Result<(), SessionError> {
		if self.is_merging() {
			Err(SessionError::Busy)
		} else {
			Ok(())
		}
	}
}

/// Clears the session's in-flight flag when the worker finishes, however
/// it finishes.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

/// Handle to a running merge.
pub struct MergeJob {
	events: UnboundedReceiver<MergeEvent>,
	cancel: CancelToken,
	handle: JoinHandle<Result<MergeSummary, MergeError>>,
}

impl MergeJob {
	/// Next progress event, or `None` once the worker has finished.
	pub async fn next_event(&mut self) -> Option<MergeEvent> {
		self.events.recv().await
	}

	/// Ask the worker to stop before the next document. Nothing is saved.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn cancel_token(&self) -> CancelToken {
		self.cancel.clone()
	}

	/// Wait for the terminal outcome. Events not yet read are discarded.
	pub async fn wait(self) -> Result<MergeSummary, JobError> {
		Ok(self.handle.await??)
	}
}

#[cfg(test)]
#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use crate::progress::read_history;
	use crate::test_utils::MemoryCodec;
	use std::path::Path;
	use std::sync::Barrier;

	fn two_docs() -> MemoryCodec {
		MemoryCodec::new()
			.with_document("A.docx", &["a1", "a2", "a3"])
			.with_document("B.docx", &["b1", "b2", "b3", "b4", "b5"])
	}

	#[test]
	fn adding_refreshes_default_order_and_clear_resets_it() {
		let mut session = MergeSession::new(two_docs());
		session.add(["A.docx", "B.docx"]).unwrap();
		assert_eq!(session.order_text(), "1,2");
		session.add(["A.docx"]).unwrap();
		assert_eq!(session.order_text(), "1,2,3");
		session.clear().unwrap();
		assert_eq!(session.order_text(), "");
		assert!(session.working_set().is_empty());
	}

	#[tokio::test]
	async fn empty_working_set_is_rejected() {
		let session = MergeSession::new(two_docs());
		assert!(matches!(session.start("out.docx"), Err(SessionError::NoDocuments)));
	}

	#[tokio::test]
	async fn invalid_order_never_reaches_the_engine() {
		let mut session = MergeSession::new(two_docs());
		session.add(["A.docx", "B.docx"]).unwrap();

		session.set_order("1,x").unwrap();
		assert!(matches!(
			session.start("out.docx"),
			Err(SessionError::Order(OrderError::Parse { .. }))
		));
		session.set_order("3").unwrap();
		assert!(matches!(
			session.start("out.docx"),
			Err(SessionError::Order(OrderError::Range { index, size: 2 })) if index == "3"
		));
		assert!(session.codec().opened().is_empty());
		assert!(!session.is_merging());
	}

	#[tokio::test]
	async fn merges_in_requested_order_with_progress() {
		let mut session = MergeSession::new(two_docs());
		session.add(["A.docx", "B.docx"]).unwrap();
		session.set_order("2,1,2").unwrap();

		let mut job = session.start("out.docx").expect("start");
		let mut seen = Vec::new();
		while let Some(event) = job.next_event().await {
			seen.push((event.index, event.total));
		}
		let summary = job.wait().await.expect("merge");

		assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
		assert_eq!(summary.blocks, 13);
		assert_eq!(summary.documents, 3);
		assert_eq!(
			session.codec().opened(),
			vec![
				PathBuf::from("B.docx"),
				PathBuf::from("A.docx"),
				PathBuf::from("B.docx")
			]
		);
		assert_eq!(
			session.codec().saved(Path::new("out.docx")).map(|b| b.len()),
			Some(13)
		);
	}

	#[tokio::test]
	async fn second_merge_and_edits_are_rejected_while_running() {
		let gate = Arc::new(Barrier::new(2));
		let mut session = MergeSession::new(two_docs().gated(Arc::clone(&gate)));
		session.add(["A.docx"]).unwrap();

		let job = session.start("out.docx").expect("start");
		assert!(session.is_merging());
		assert!(matches!(session.start("other.docx"), Err(SessionError::Busy)));
		assert!(matches!(session.add(["B.docx"]), Err(SessionError::Busy)));
		assert!(matches!(session.clear(), Err(SessionError::Busy)));
		assert!(matches!(session.set_order("1"), Err(SessionError::Busy)));

		tokio::task::spawn_blocking(move || gate.wait())
			.await
			.unwrap();
		job.wait().await.expect("merge");

		assert!(!session.is_merging());
		let again = session.start("again.docx").expect("restart");
		again.wait().await.expect("second merge");
	}

	#[tokio::test]
	async fn failed_merge_leaves_inputs_untouched() {
		let mut session = MergeSession::new(two_docs());
		session.add(["A.docx", "gone.docx"]).unwrap();
		session.set_order("2,1").unwrap();

		let err = session.start("out.docx").expect("start").wait().await.unwrap_err();
		match err {
			JobError::Merge(MergeError::Open { index, path, .. }) => {
				assert_eq!(index, 1);
				assert_eq!(path, DocumentRef::new("gone.docx"));
			}
			other => panic!("unexpected error: {other}"),
		}
		assert_eq!(session.working_set().len(), 2);
		assert_eq!(session.order_text(), "2,1");
		assert!(!session.is_merging());
		assert!(session.codec().saved(Path::new("out.docx")).is_none());
	}

	#[tokio::test]
	async fn history_records_each_merged_document() {
		let dir = tempfile::tempdir().expect("tempdir");
		let history = dir.path().join("history.ndjson");
		let mut session = MergeSession::new(two_docs()).with_history(&history);
		session.add(["A.docx", "B.docx"]).unwrap();

		session
			.start("out.docx")
			.expect("start")
			.wait()
			.await
			.expect("merge");

		let entries = read_history(&history).expect("history");
		let sources: Vec<String> = entries.iter().map(|e| e.source.to_string()).collect();
		assert_eq!(sources, vec!["A.docx", "B.docx"]);
		assert!(entries.iter().all(|e| e.output == PathBuf::from("out.docx")));
	}

	#[tokio::test]
	async fn failed_save_records_no_history() {
		let dir = tempfile::tempdir().expect("tempdir");
		let history = dir.path().join("history.ndjson");
		let mut session = MergeSession::new(two_docs().failing_saves()).with_history(&history);
		session.add(["A.docx", "B.docx"]).unwrap();

		let err = session.start("out.docx").expect("start").wait().await.unwrap_err();
		assert!(matches!(err, JobError::Merge(MergeError::Persist { .. })));
		assert!(read_history(&history).expect("history").is_empty());
	}
}
