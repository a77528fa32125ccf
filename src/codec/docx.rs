use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use log::debug;
use quick_xml::Reader;
use quick_xml::events::Event;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::body::split_main_part;
use super::tree::{ContentBlock, ContentTree, MainPart, Part};
use super::{CodecError, DocumentCodec};

/// Default location of the main document part inside a `.docx` package.
pub const MAIN_PART: &str = "word/document.xml";

/// Largest package part that will be decompressed into memory.
pub const MAX_PART_SIZE: u64 = 512 * 1024 * 1024;

/// Upper bound on the buffer reserved up front for a part. The declared
/// entry size is read from the archive and is not trusted beyond this.
const PART_SIZE_HINT: u64 = 1024 * 1024;

const PACKAGE_RELS: &str = "_rels/.rels";
const OFFICE_DOCUMENT_REL: &str =
	"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

const XML_DECLARATION: &str =
	"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

const BLANK_CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
</Types>";

const BLANK_PACKAGE_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
</Relationships>";

/// Codec for Office Open XML word-processing packages (`.docx`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxCodec;

impl DocumentCodec for DocxCodec {
	fn new_document(&self) -> ContentTree {
		blank_document()
	}

	fn open(&self, path: &Path) -> Result<ContentTree, CodecError> {
		let file = File::open(path).map_err(|e| CodecError::io(path, e))?;
		let tree = read_package(BufReader::new(file))?;
		debug!(
			"opened {} ({} blocks, {} parts)",
			path.display(),
			tree.block_count(),
			tree.parts().len()
		);
		Ok(tree)
	}

	/// Writes the package to a temporary file beside `path` and renames it
	/// into place only once fully written, so a failed save never leaves a
	/// truncated document behind.
	fn save(&self, tree: &ContentTree, path: &Path) -> Result<(), CodecError> {
		let dir = match path.parent() {
			Some(p) if !p.as_os_str().is_empty() => p,
			_ => Path::new("."),
		};
		let staged = NamedTempFile::new_in(dir).map_err(|e| CodecError::io(path, e))?;
		{
			let mut writer = write_package(tree, BufWriter::new(staged.as_file()))?;
			writer.flush().map_err(|e| CodecError::io(path, e))?;
		}
		staged
			.as_file()
			.sync_all()
			.map_err(|e| CodecError::io(path, e))?;
		staged
			.persist(path)
			.map_err(|e| CodecError::io(path, e.error))?;
		debug!("saved {} ({} blocks)", path.display(), tree.block_count());
		Ok(())
	}
}

/// An empty word-processing document: the minimal package Word accepts,
/// with an empty body.
pub fn blank_document() -> ContentTree {
	let parts = vec![
		Part {
			name: "[Content_Types].xml".to_string(),
			data: BLANK_CONTENT_TYPES.as_bytes().to_vec(),
		},
		Part {
			name: PACKAGE_RELS.to_string(),
			data: BLANK_PACKAGE_RELS.as_bytes().to_vec(),
		},
	];
	let main = MainPart {
		prolog: XML_DECLARATION.to_string(),
		root_name: "w:document".to_string(),
		root_attrs: vec![
			(
				"xmlns:w".to_string(),
				"http://schemas.openxmlformats.org/wordprocessingml/2006/main".to_string(),
			),
			(
				"xmlns:r".to_string(),
				"http://schemas.openxmlformats.org/officeDocument/2006/relationships".to_string(),
			),
		],
		preamble: "<w:body>".to_string(),
		body_namespaces: Vec::new(),
		blocks: Vec::<ContentBlock>::new(),
		epilogue: "</w:body></w:document>".to_string(),
	};
	ContentTree::new(parts, MAIN_PART, main)
}

/// Decode a `.docx` package from any seekable reader.
pub fn read_package<R: Read + Seek>(reader: R) -> Result<ContentTree, CodecError> {
	let mut archive = ZipArchive::new(reader)?;

	let mut parts = Vec::with_capacity(archive.len());
	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)?;
		if entry.is_dir() {
			continue;
		}
		let name = entry.name().to_string();
		let declared = entry.size();
		if declared > MAX_PART_SIZE {
			return Err(CodecError::PartTooLarge {
				part: name,
				limit: MAX_PART_SIZE,
			});
		}
		let mut data = Vec::with_capacity(declared.min(PART_SIZE_HINT) as usize);
		(&mut entry).take(MAX_PART_SIZE + 1).read_to_end(&mut data)?;
		if data.len() as u64 > MAX_PART_SIZE {
			return Err(CodecError::PartTooLarge {
				part: name,
				limit: MAX_PART_SIZE,
			});
		}
		parts.push(Part { name, data });
	}

	let main_name = locate_main_part(&parts);
	let main_data = parts
		.iter()
		.find(|p| p.name == main_name)
		.map(|p| p.data.as_slice())
		.ok_or_else(|| CodecError::MissingPart(main_name.clone()))?;
	let xml =
		std::str::from_utf8(main_data).map_err(|_| CodecError::Encoding(main_name.clone()))?;
	let main = split_main_part(&main_name, xml)?;

	Ok(ContentTree::new(parts, main_name, main))
}

/// Encode `tree` as a `.docx` package into `writer`, returning the writer.
pub fn write_package<W: Write + Seek>(tree: &ContentTree, writer: W) -> Result<W, CodecError> {
	let mut zip = ZipWriter::new(writer);
	let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

	for part in tree.parts() {
		zip.start_file(part.name.as_str(), options)?;
		if part.name == tree.main_part_name() {
			zip.write_all(tree.render_main_part().as_bytes())?;
		} else {
			zip.write_all(&part.data)?;
		}
	}

	Ok(zip.finish()?)
}

/// Find the main part through the package relationships, falling back to
/// the conventional `word/document.xml`.
fn locate_main_part(parts: &[Part]) -> String {
	parts
		.iter()
		.find(|p| p.name == PACKAGE_RELS)
		.and_then(|rels| office_document_target(&rels.data))
		.filter(|target| parts.iter().any(|p| &p.name == target))
		.unwrap_or_else(|| MAIN_PART.to_string())
}

fn office_document_target(rels: &[u8]) -> Option<String> {
	let mut reader = Reader::from_reader(rels);
	loop {
		match reader.read_event() {
			Ok(Event::Start(e)) | Ok(Event::Empty(e))
				if e.local_name().as_ref() == b"Relationship" =>
			{
				let mut rel_type = None;
				let mut target = None;
				for attr in e.attributes().flatten() {
					match attr.key.as_ref() {
						b"Type" => rel_type = Some(String::from_utf8_lossy(&attr.value).into_owned()),
						b"Target" => target = Some(String::from_utf8_lossy(&attr.value).into_owned()),
						_ => {}
					}
				}
				if rel_type.as_deref() == Some(OFFICE_DOCUMENT_REL) {
					return target.map(|t| t.trim_start_matches('/').to_string());
				}
			}
			Ok(Event::Eof) | Err(_) => return None,
			_ => {}
		}
	}
}
