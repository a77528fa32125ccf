//! Document codec boundary.
//!
//! The merge engine only needs three things from a document format: open a
//! file into a [`ContentTree`], enumerate the tree's top-level content
//! blocks, and save a tree back to disk. [`DocumentCodec`] is that seam;
//! [`DocxCodec`] implements it for Office Open XML word-processing files.

pub mod body;
pub mod docx;
pub mod tree;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use docx::{DocxCodec, blank_document};
pub use tree::{ContentBlock, ContentTree, Part};

/// Errors raised while decoding or encoding a document package.
#[derive(Debug, Error)]
pub enum CodecError {
	#[error("i/o error on '{}': {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("package stream error: {0}")]
	Stream(#[from] std::io::Error),
	#[error("not a valid document package: {0}")]
	Archive(#[from] zip::result::ZipError),
	#[error("package has no main document part '{0}'")]
	MissingPart(String),
	#[error("part '{0}' is not valid UTF-8")]
	Encoding(String),
	#[error("malformed XML in '{part}' at byte {position}: {message}")]
	Xml {
		part: String,
		position: usize,
		message: String,
	},
	#[error("main document part has no body element")]
	MissingBody,
	#[error("part '{part}' is larger than the {limit} byte limit")]
	PartTooLarge { part: String, limit: u64 },
}

impl CodecError {
	pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
		CodecError::Io {
			path: path.to_path_buf(),
			source,
		}
	}
}

/// The three operations the merge engine requires from a document format.
pub trait DocumentCodec: Send + Sync + 'static {
	/// A new, empty document used as the merge accumulator.
	fn new_document(&self) -> ContentTree;

	/// Open and decode the document at `path`.
	fn open(&self, path: &Path) -> Result<ContentTree, CodecError>;

	/// Encode `tree` and write it to `path`.
	fn save(&self, tree: &ContentTree, path: &Path) -> Result<(), CodecError>;
}
