//! The merge engine: concatenates the bodies of an ordered list of
//! documents into one accumulated document.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::codec::{CodecError, ContentTree, DocumentCodec};
use crate::progress::{MergeEvent, ProgressSink};
use crate::working_set::DocumentRef;

/// Terminal failure of a merge. Nothing is retried and nothing is written
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum MergeError {
	#[error("could not open document {index} '{path}': {source}")]
	Open {
		/// 1-based position of the document within the merge order.
		index: usize,
		path: DocumentRef,
		#[source]
		source: CodecError,
	},
	#[error("could not save merged document to '{}': {source}", path.display())]
	Persist {
		path: PathBuf,
		#[source]
		source: CodecError,
	},
	#[error("merge cancelled after {merged} of {total} documents")]
	Cancelled { merged: usize, total: usize },
}

impl MergeError {
	/// The file the failure concerns, if any.
	pub fn path(&self) -> Option<&Path> {
		match self {
			MergeError::Open { path, .. } => Some(path.path()),
			MergeError::Persist { path, .. } => Some(path),
			MergeError::Cancelled { .. } => None,
		}
	}
}

/// Shared flag used to stop a merge between documents.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Outcome of a merge that was persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
	pub output: PathBuf,
	pub documents: usize,
	pub blocks: usize,
	pub elapsed: Duration,
}

pub struct MergeEngine<C> {
	codec: C,
}

impl<C: DocumentCodec> MergeEngine<C> {
	pub fn new(codec: C) -> Self {
		Self { codec }
	}

	pub fn codec(&self) -> &C {
		&self.codec
	}

	/// Merge `refs` in order into a new in-memory document.
	///
	/// Every document is opened fresh, its top-level blocks are moved to
	/// the end of the accumulator verbatim, one [`MergeEvent`] is sent to
	/// `sink`, and the opened document is dropped. The first document that
	/// fails to open aborts the whole merge. `cancel` is only consulted
	/// between documents, so the accumulator never holds half a document.
	pub fn merge<S>(
		&self,
		refs: &[DocumentRef],
		sink: &mut S,
		cancel: &CancelToken,
	) -> Result<ContentTree, MergeError>
	where
		S: ProgressSink + ?Sized,
	{
		let total = refs.len();
		let mut accumulator = self.codec.new_document();
		let start = Instant::now();
		info!("merging {} documents", total);

		for (i, doc) in refs.iter().enumerate() {
			if cancel.is_cancelled() {
				warn!("merge cancelled after {} of {} documents", i, total);
				return Err(MergeError::Cancelled { merged: i, total });
			}

			let source = self.codec.open(doc.path()).map_err(|source| {
				error!("failed to open {} (document {} of {}): {}", doc, i + 1, total, source);
				MergeError::Open {
					index: i + 1,
					path: doc.clone(),
					source,
				}
			})?;

			let moved = accumulator.absorb(source);
			debug!("appended {} blocks from {}", moved, doc);

			sink.on_event(&MergeEvent::new(i + 1, total, doc.clone(), start.elapsed()));
		}

		info!(
			"merged {} documents into {} blocks in {:.3}s",
			total,
			accumulator.block_count(),
			start.elapsed().as_secs_f64()
		);
		Ok(accumulator)
	}

	/// Merge `refs` and persist the result to `output`.
	pub fn merge_to<S>(
		&self,
		refs: &[DocumentRef],
		output: &Path,
		sink: &mut S,
		cancel: &CancelToken,
	) -> Result<MergeSummary, MergeError>
	where
		S: ProgressSink + ?Sized,
	{
		let start = Instant::now();
		let merged = self.merge(refs, sink, cancel)?;

		if cancel.is_cancelled() {
			warn!("merge cancelled before saving {}", output.display());
			return Err(MergeError::Cancelled {
				merged: refs.len(),
				total: refs.len(),
			});
		}

		self.codec.save(&merged, output).map_err(|source| {
			error!("failed to save {}: {}", output.display(), source);
			MergeError::Persist {
				path: output.to_path_buf(),
				source,
			}
		})?;
		info!("saved merged document to {}", output.display());

		Ok(MergeSummary {
			output: output.to_path_buf(),
			documents: refs.len(),
			blocks: merged.block_count(),
			elapsed: start.elapsed(),
		})
	}
}
