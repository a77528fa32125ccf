use log::debug;

/// A single top-level element of a document body (paragraph, table,
/// section properties, ...), kept as the verbatim XML it was read from.
///
/// Blocks are deliberately not `Clone`: appending one to another tree moves
/// it out of its source.
#[derive(Debug, PartialEq, Eq)]
pub struct ContentBlock {
	xml: String,
}

impl ContentBlock {
	pub fn new(xml: impl Into<String>) -> Self {
		Self { xml: xml.into() }
	}

	pub fn as_xml(&self) -> &str {
		&self.xml
	}

	/// Local element name of the block, e.g. `p`, `tbl` or `sectPr`.
	pub fn kind(&self) -> &str {
		let tag = self.xml.trim_start().trim_start_matches('<');
		let end = tag
			.find(|c: char| c.is_whitespace() || c == '/' || c == '>')
			.unwrap_or(tag.len());
		let qname = &tag[..end];
		qname.rsplit(':').next().unwrap_or(qname)
	}

	/// Declare namespaces on the block's own start tag, skipping prefixes
	/// the tag already declares.
	fn declare(&mut self, decls: &[(String, String)]) {
		let lead = self.xml.len() - self.xml.trim_start().len();
		if !self.xml[lead..].starts_with('<') {
			return;
		}
		let name_start = lead + 1;
		let name_end = self.xml[name_start..]
			.find(|c: char| c.is_whitespace() || c == '/' || c == '>')
			.map_or(self.xml.len(), |i| name_start + i);
		let tag_end = self.xml[name_end..]
			.find('>')
			.map_or(self.xml.len(), |i| name_end + i);

		let head = &self.xml[name_end..tag_end];
		let mut added = String::new();
		for (key, value) in decls.iter().filter(|(k, _)| !declares(head, k)) {
			push_attr(&mut added, key, value);
		}
		self.xml.insert_str(name_end, &added);
	}
}

fn declares(tag: &str, key: &str) -> bool {
	tag.match_indices(key).any(|(i, _)| {
		tag[..i].ends_with(char::is_whitespace) && tag[i + key.len()..].trim_start().starts_with('=')
	})
}

fn push_attr(out: &mut String, key: &str, value: &str) {
	// Raw values came from either quote style; pick one that cannot clash.
	let quote = if value.contains('"') { '\'' } else { '"' };
	out.push(' ');
	out.push_str(key);
	out.push('=');
	out.push(quote);
	out.push_str(value);
	out.push(quote);
}

/// A raw package part (archive entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
	pub name: String,
	pub data: Vec<u8>,
}

/// The main document part split around its body content.
#[derive(Debug)]
pub struct MainPart {
	/// Everything before the root element (XML declaration, whitespace).
	pub prolog: String,
	/// Qualified name of the root element, e.g. `w:document`.
	pub root_name: String,
	/// Root attributes as raw (still escaped) key/value pairs.
	pub root_attrs: Vec<(String, String)>,
	/// From the end of the root start tag through the body start tag.
	pub preamble: String,
	/// Namespace declarations made on the body start tag itself.
	pub body_namespaces: Vec<(String, String)>,
	pub blocks: Vec<ContentBlock>,
	/// From the body end tag to the end of the part.
	pub epilogue: String,
}

/// In-memory representation of a document: its package parts plus the
/// ordered content blocks of the main part's body.
#[derive(Debug)]
pub struct ContentTree {
	parts: Vec<Part>,
	main_part: String,
	prolog: String,
	root_name: String,
	root_attrs: Vec<(String, String)>,
	preamble: String,
	body_namespaces: Vec<(String, String)>,
	blocks: Vec<ContentBlock>,
	epilogue: String,
}

impl ContentTree {
	/// Build a tree from package parts and the decoded main part. The data of
	/// the part named `main_part` is ignored; it is re-rendered on save.
	pub fn new(mut parts: Vec<Part>, main_part: impl Into<String>, main: MainPart) -> Self {
		let main_part = main_part.into();
		if let Some(p) = parts.iter_mut().find(|p| p.name == main_part) {
			p.data.clear();
		} else {
			parts.push(Part {
				name: main_part.clone(),
				data: Vec::new(),
			});
		}

		Self {
			parts,
			main_part,
			prolog: main.prolog,
			root_name: main.root_name,
			root_attrs: main.root_attrs,
			preamble: main.preamble,
			body_namespaces: main.body_namespaces,
			blocks: main.blocks,
			epilogue: main.epilogue,
		}
	}

	pub fn main_part_name(&self) -> &str {
		&self.main_part
	}

	pub fn parts(&self) -> &[Part] {
		&self.parts
	}

	pub fn root_attrs(&self) -> &[(String, String)] {
		&self.root_attrs
	}

	/// The top-level content blocks of the body, in document order.
	pub fn content_blocks(&self) -> &[ContentBlock] {
		&self.blocks
	}

	pub fn block_count(&self) -> usize {
		self.blocks.len()
	}

	pub fn into_blocks(self) -> Vec<ContentBlock> {
		self.blocks
	}

	/// Append blocks to the end of the body, in the order given.
	pub fn append(&mut self, blocks: Vec<ContentBlock>) {
		self.blocks.extend(blocks);
	}

	/// Move every content block of `source` to the end of this tree's body
	/// and return how many were moved.
	///
	/// Namespaces in scope for the source body (root declarations and those
	/// on its body element) that this tree lacks are adopted on the root. A
	/// prefix this tree already binds to a different namespace is instead
	/// redeclared on each moved block, so the moved XML keeps its meaning.
	pub fn absorb(&mut self, source: ContentTree) -> usize {
		let rebound = self.adopt_namespaces(&source.namespace_scope());
		let mut blocks = source.into_blocks();
		if !rebound.is_empty() {
			for block in &mut blocks {
				block.declare(&rebound);
			}
		}
		let moved = blocks.len();
		self.append(blocks);
		moved
	}

	/// Namespace declarations visible to body content: the root's, overridden
	/// by the body element's own.
	fn namespace_scope(&self) -> Vec<(String, String)> {
		let mut scope: Vec<(String, String)> = self
			.root_attrs
			.iter()
			.filter(|(k, _)| is_namespace_decl(k))
			.cloned()
			.collect();
		for (key, value) in &self.body_namespaces {
			match scope.iter_mut().find(|(k, _)| k == key) {
				Some(entry) => entry.1 = value.clone(),
				None => scope.push((key.clone(), value.clone())),
			}
		}
		scope
	}

	fn binding(&self, key: &str) -> Option<&str> {
		self.body_namespaces
			.iter()
			.chain(self.root_attrs.iter())
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	/// Adopt declarations this tree lacks and return those whose prefix it
	/// binds differently.
	fn adopt_namespaces(&mut self, scope: &[(String, String)]) -> Vec<(String, String)> {
		let mut rebound = Vec::new();
		for (key, value) in scope {
			match self.binding(key).map(str::to_owned) {
				Some(existing) if existing != *value => {
					debug!(
						"namespace prefix '{}' is bound to '{}'; redeclaring '{}' on moved blocks",
						key, existing, value
					);
					rebound.push((key.clone(), value.clone()));
				}
				Some(_) => {}
				None => self.root_attrs.push((key.clone(), value.clone())),
			}
		}
		rebound
	}

	/// Serialize the main part with the current block sequence.
	pub fn render_main_part(&self) -> String {
		let body_len: usize = self.blocks.iter().map(|b| b.as_xml().len()).sum();
		let mut out = String::with_capacity(
			self.prolog.len() + self.preamble.len() + self.epilogue.len() + body_len + 256,
		);

		out.push_str(&self.prolog);
		out.push('<');
		out.push_str(&self.root_name);
		for (key, value) in &self.root_attrs {
			push_attr(&mut out, key, value);
		}
		out.push('>');
		out.push_str(&self.preamble);
		for block in &self.blocks {
			out.push_str(block.as_xml());
		}
		out.push_str(&self.epilogue);
		out
	}
}

pub(crate) fn is_namespace_decl(key: &str) -> bool {
	key == "xmlns" || key.starts_with("xmlns:")
}
