use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Locator of one input document. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(PathBuf);

impl DocumentRef {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self(path.into())
	}

	pub fn path(&self) -> &Path {
		&self.0
	}
}

impl fmt::Display for DocumentRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.display())
	}
}

impl From<PathBuf> for DocumentRef {
	fn from(path: PathBuf) -> Self {
		Self(path)
	}
}

impl From<&Path> for DocumentRef {
	fn from(path: &Path) -> Self {
		Self::new(path)
	}
}

impl From<&str> for DocumentRef {
	fn from(path: &str) -> Self {
		Self::new(path)
	}
}

impl From<String> for DocumentRef {
	fn from(path: String) -> Self {
		Self::new(path)
	}
}

/// The documents available for merging, in the order they were added.
/// Duplicates are kept; each occurrence is its own entry.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
	refs: Vec<DocumentRef>,
}

impl WorkingSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, doc: impl Into<DocumentRef>) {
		self.refs.push(doc.into());
	}

	pub fn extend<I, D>(&mut self, docs: I)
	where
		I: IntoIterator<Item = D>,
		D: Into<DocumentRef>,
	{
		self.refs.extend(docs.into_iter().map(Into::into));
	}

	pub fn clear(&mut self) {
		self.refs.clear();
	}

	pub fn len(&self) -> usize {
		self.refs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.refs.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&DocumentRef> {
		self.refs.get(index)
	}

	pub fn iter(&self) -> impl Iterator<Item = &DocumentRef> {
		self.refs.iter()
	}

	/// Numbered listing, one `"<n>. <path>"` line per document.
	pub fn listing(&self) -> Vec<String> {
		self.refs
			.iter()
			.enumerate()
			.map(|(i, r)| format!("{}. {}", i + 1, r))
			.collect()
	}

	/// Map resolved 0-based indices to the documents they select, in order.
	/// Indices come from [`crate::order::resolve`], which has already
	/// bounds-checked them against this set; stray ones are skipped.
	pub fn select(&self, order: &[usize]) -> Vec<DocumentRef> {
		order
			.iter()
			.filter_map(|&i| self.refs.get(i).cloned())
			.collect()
	}
}
