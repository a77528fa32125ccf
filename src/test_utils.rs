//! Test utilities shared by the unit tests.
//!
//! Provides builders for real `.docx` packages and an in-memory codec that
//! records what the merge engine opened and saved.

#![cfg(test)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier, Mutex};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::codec::{CodecError, ContentBlock, ContentTree, DocumentCodec, blank_document};

/// `<w:p>` blocks, one per text.
pub fn paragraphs(texts: &[&str]) -> Vec<String> {
	texts
		.iter()
		.map(|t| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", t))
		.collect()
}

pub fn document_xml(blocks: &[String]) -> String {
	format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
		<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
		<w:body>{}</w:body></w:document>",
		blocks.concat()
	)
}

/// A minimal `.docx` package whose body holds `blocks`.
pub fn docx_bytes(blocks: &[String]) -> Vec<u8> {
	let mut buf = Vec::new();
	{
		let mut zip = ZipWriter::new(Cursor::new(&mut buf));
		let options = SimpleFileOptions::default();
		zip.start_file("[Content_Types].xml", options).unwrap();
		zip.write_all(b"<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>")
			.unwrap();
		zip.start_file("word/document.xml", options).unwrap();
		zip.write_all(document_xml(blocks).as_bytes()).unwrap();
		zip.finish().unwrap();
	}
	buf
}

/// Codec over documents held in memory. Each document is a list of
/// paragraph texts; opening one yields `<w:p>text</w:p>` blocks.
#[derive(Default)]
pub struct MemoryCodec {
	documents: HashMap<PathBuf, Vec<String>>,
	opened: Mutex<Vec<PathBuf>>,
	saved: Mutex<HashMap<PathBuf, Vec<String>>>,
	fail_saves: bool,
	gate: Mutex<Option<Arc<Barrier>>>,
}

impl MemoryCodec {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_document(mut self, path: &str, texts: &[&str]) -> Self {
		self.documents.insert(
			PathBuf::from(path),
			texts.iter().map(|t| t.to_string()).collect(),
		);
		self
	}

	pub fn failing_saves(mut self) -> Self {
		self.fail_saves = true;
		self
	}

	/// The first `open` waits on `gate` before proceeding.
	pub fn gated(self, gate: Arc<Barrier>) -> Self {
		*self.gate.lock().unwrap() = Some(gate);
		self
	}

	pub fn opened(&self) -> Vec<PathBuf> {
		self.opened.lock().unwrap().clone()
	}

	pub fn saved(&self, path: &Path) -> Option<Vec<String>> {
		self.saved.lock().unwrap().get(path).cloned()
	}
}

impl DocumentCodec for MemoryCodec {
	fn new_document(&self) -> ContentTree {
		blank_document()
	}

	fn open(&self, path: &Path) -> Result<ContentTree, CodecError> {
		let gate = self.gate.lock().unwrap().take();
		if let Some(gate) = gate {
			gate.wait();
		}
		self.opened.lock().unwrap().push(path.to_path_buf());

		let texts = self.documents.get(path).ok_or_else(|| {
			CodecError::io(
				path,
				std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
			)
		})?;
		let mut tree = blank_document();
		tree.append(
			texts
				.iter()
				.map(|t| ContentBlock::new(format!("<w:p>{}</w:p>", t)))
				.collect(),
		);
		Ok(tree)
	}

	fn save(&self, tree: &ContentTree, path: &Path) -> Result<(), CodecError> {
		if self.fail_saves {
			return Err(CodecError::io(
				path,
				std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
			));
		}
		let blocks = tree
			.content_blocks()
			.iter()
			.map(|b| b.as_xml().to_string())
			.collect();
		self.saved.lock().unwrap().insert(path.to_path_buf(), blocks);
		Ok(())
	}
}
