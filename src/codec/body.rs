use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::CodecError;
use super::tree::{ContentBlock, MainPart, is_namespace_decl};

/// Split a main document part into the pieces of a [`MainPart`].
///
/// The part is tokenized, not rebuilt: every direct child of the body is
/// captured as the exact byte span it occupies in `xml`, and everything
/// around the body is kept verbatim. Whitespace, comments and processing
/// instructions between body children are dropped.
pub fn split_main_part(part: &str, xml: &str) -> Result<MainPart, CodecError> {
	let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
	let mut reader = Reader::from_str(xml);

	let mut depth = 0usize;
	let mut root: Option<(String, Vec<(String, String)>, usize, usize)> = None;
	let mut body_open_end: Option<usize> = None;
	let mut body_namespaces = Vec::new();
	let mut block_start: Option<usize> = None;
	let mut blocks = Vec::new();

	loop {
		let before = reader.buffer_position() as usize;
		let event = reader.read_event().map_err(|e| CodecError::Xml {
			part: part.to_string(),
			position: before,
			message: e.to_string(),
		})?;
		let after = reader.buffer_position() as usize;

		match event {
			Event::Start(e) => {
				match depth {
					0 => root = Some(parse_root(part, &e, before, after)?),
					1 if body_open_end.is_none() && is_body(&e) => {
						body_namespaces = namespace_decls(part, &e, before)?;
						body_open_end = Some(after);
					}
					2 if body_open_end.is_some() => block_start = Some(before),
					_ => {}
				}
				depth += 1;
			}
			Event::End(e) => {
				depth = depth.saturating_sub(1);
				match (depth, body_open_end) {
					(2, Some(_)) => {
						if let Some(start) = block_start.take() {
							blocks.push(ContentBlock::new(&xml[start..after]));
						}
					}
					(1, Some(open_end)) if e.local_name().as_ref() == b"body" => {
						let Some((root_name, root_attrs, root_start, root_end)) = root else {
							return Err(CodecError::MissingBody);
						};
						return Ok(MainPart {
							prolog: xml[..root_start].to_string(),
							root_name,
							root_attrs,
							preamble: xml[root_end..open_end].to_string(),
							body_namespaces,
							blocks,
							epilogue: xml[before..].to_string(),
						});
					}
					_ => {}
				}
			}
			Event::Empty(e) => match depth {
				0 => return Err(CodecError::MissingBody),
				1 if body_open_end.is_none() && is_body(&e) => {
					let Some((root_name, root_attrs, root_start, root_end)) = root else {
						return Err(CodecError::MissingBody);
					};
					// `<w:body/>`: expand into an open/close pair so blocks can go in between.
					let tag = xml[before..after].trim_end_matches('>').trim_end_matches('/');
					let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
					let body_namespaces = namespace_decls(part, &e, before)?;
					return Ok(MainPart {
						prolog: xml[..root_start].to_string(),
						root_name,
						root_attrs,
						preamble: format!("{}{}>", &xml[root_end..before], tag.trim_end()),
						body_namespaces,
						blocks,
						epilogue: format!("</{}>{}", name, &xml[after..]),
					});
				}
				2 if body_open_end.is_some() => blocks.push(ContentBlock::new(&xml[before..after])),
				_ => {}
			},
			Event::Eof => break,
			_ => {}
		}
	}

	Err(CodecError::MissingBody)
}

fn is_body(e: &BytesStart<'_>) -> bool {
	e.local_name().as_ref() == b"body"
}

fn parse_root(
	part: &str,
	e: &BytesStart<'_>,
	start: usize,
	end: usize,
) -> Result<(String, Vec<(String, String)>, usize, usize), CodecError> {
	let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
	Ok((name, raw_attributes(part, e, start)?, start, end))
}

fn namespace_decls(
	part: &str,
	e: &BytesStart<'_>,
	position: usize,
) -> Result<Vec<(String, String)>, CodecError> {
	let mut attrs = raw_attributes(part, e, position)?;
	attrs.retain(|(key, _)| is_namespace_decl(key));
	Ok(attrs)
}

/// Attributes as raw (still escaped) key/value pairs.
fn raw_attributes(
	part: &str,
	e: &BytesStart<'_>,
	position: usize,
) -> Result<Vec<(String, String)>, CodecError> {
	let mut attrs = Vec::new();
	for attr in e.attributes() {
		let attr = attr.map_err(|err| CodecError::Xml {
			part: part.to_string(),
			position,
			message: err.to_string(),
		})?;
		attrs.push((
			String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
			String::from_utf8_lossy(&attr.value).into_owned(),
		));
	}
	Ok(attrs)
}
