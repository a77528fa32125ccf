/// Common test utilities and helpers for integration tests.
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use docmerge::{DocumentCodec, DocxCodec};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// `<w:p>` blocks, one per text.
pub fn paragraphs(texts: &[&str]) -> Vec<String> {
	texts
		.iter()
		.map(|t| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", t))
		.collect()
}

/// Build a `.docx` package with the given extra root attributes and body
/// blocks, the way a word processor lays one out (content types, package
/// relationships, main part, styles).
pub fn docx_with_root(root_attrs: &str, blocks: &[String]) -> Vec<u8> {
	docx_with_attrs(root_attrs, "", blocks)
}

/// Like [`docx_with_root`], with extra attributes on the body element too.
pub fn docx_with_attrs(root_attrs: &str, body_attrs: &str, blocks: &[String]) -> Vec<u8> {
	let document = format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
		<w:document xmlns:w=\"{}\"{}><w:body{}>{}</w:body></w:document>",
		W_NS,
		root_attrs,
		body_attrs,
		blocks.concat()
	);

	let mut buf = Vec::new();
	{
		let mut zip = ZipWriter::new(Cursor::new(&mut buf));
		let options = SimpleFileOptions::default();
		zip.start_file("[Content_Types].xml", options).unwrap();
		zip.write_all(
			b"<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
			<Default Extension=\"xml\" ContentType=\"application/xml\"/></Types>",
		)
		.unwrap();
		zip.start_file("_rels/.rels", options).unwrap();
		zip.write_all(
			b"<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
			<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
			</Relationships>",
		)
		.unwrap();
		zip.start_file("word/document.xml", options).unwrap();
		zip.write_all(document.as_bytes()).unwrap();
		zip.start_file("word/styles.xml", options).unwrap();
		zip.write_all(format!("<w:styles xmlns:w=\"{}\"/>", W_NS).as_bytes())
			.unwrap();
		zip.finish().unwrap();
	}
	buf
}

/// Write a document whose body holds one paragraph per text.
pub fn write_docx(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, docx_with_root("", &paragraphs(texts))).unwrap();
	path
}

/// Paragraph texts of a saved document, in body order.
pub fn body_texts(path: &Path) -> Vec<String> {
	let tree = DocxCodec.open(path).expect("open merged document");
	tree.content_blocks()
		.iter()
		.map(|b| {
			let xml = b.as_xml();
			let start = xml.find("<w:t>").map(|i| i + "<w:t>".len()).unwrap_or(0);
			let end = xml.find("</w:t>").unwrap_or(xml.len());
			xml[start..end].to_string()
		})
		.collect()
}
