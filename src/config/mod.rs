use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::Level;
use serde::Deserialize;
use thiserror::Error;

/// Runtime configuration for docmerge.
///
/// Values are loaded from (in order): `/etc/docmerge/docmerge.json`, the
/// user config folder and the local config folder (all optional), then
/// environment variables prefixed with `DMG_` (e.g. `DMG_LOG_LEVEL`).
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Settings {
	pub log_level: Level,
	/// Colorize log level names on stderr.
	pub color: bool,
	/// Record each merged document in the history file.
	pub history_enabled: bool,
	pub history_file: PathBuf,
	/// Extension given to an output path that has none.
	pub default_extension: String,
}

impl Default for Settings {
	fn default() -> Self {
		let history_file = dirs::data_local_dir()
			.map(|d| d.join("docmerge").join("history.ndjson"))
			.unwrap_or_else(|| PathBuf::from("docmerge-history.ndjson"));

		Self {
			log_level: Level::Info,
			color: true,
			history_enabled: true,
			history_file,
			default_extension: "docx".to_string(),
		}
	}
}

impl Settings {
	/// The path a merge will actually be written to: `path` itself, or
	/// `path` with the default extension when it has none.
	pub fn output_path(&self, path: &Path) -> PathBuf {
		if path.extension().is_some() || self.default_extension.is_empty() {
			path.to_path_buf()
		} else {
			path.with_extension(&self.default_extension)
		}
	}

	/// History file to record into, if history is enabled.
	pub fn history(&self) -> Option<&Path> {
		self.history_enabled.then_some(self.history_file.as_path())
	}
}

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("configuration error: {0}")]
	Config(#[from] config::ConfigError),
}

/// Candidate settings files, lowest precedence first.
fn settings_files() -> Vec<PathBuf> {
	let mut files = vec![PathBuf::from("/etc/docmerge/docmerge.json")];
	files.extend(
		[dirs::config_dir(), dirs::config_local_dir()]
			.into_iter()
			.flatten()
			.map(|dir| dir.join("docmerge").join("docmerge.json")),
	);
	files
}

/// A `DMG_*` variable parsed as `T`; unset, empty or unparsable values are
/// ignored.
fn env_override<T: FromStr>(name: &str) -> Option<T> {
	std::env::var(name)
		.ok()
		.filter(|v| !v.is_empty())
		.and_then(|v| v.parse().ok())
}

/// Load settings from the settings files and `DMG_*` environment
/// variables. Unset values keep their defaults.
pub fn load() -> Result<Settings, SettingsError> {
	let builder = settings_files()
		.into_iter()
		.fold(config::Config::builder(), |b, path| {
			b.add_source(config::File::from(path).required(false))
		})
		.add_source(config::Environment::with_prefix("DMG").separator("__"));

	let mut s: Settings = builder.build()?.try_deserialize()?;

	// Top-level names are read straight from the environment so that
	// `DMG_HISTORY_FILE` and friends apply regardless of key mapping.
	if let Some(level) = env_override::<Level>("DMG_LOG_LEVEL") {
		s.log_level = level;
	}
	if let Some(color) = env_override("DMG_COLOR") {
		s.color = color;
	}
	if let Some(enabled) = env_override("DMG_HISTORY_ENABLED") {
		s.history_enabled = enabled;
	}
	if let Some(file) = env_override::<PathBuf>("DMG_HISTORY_FILE") {
		s.history_file = file;
	}
	if let Some(ext) = env_override::<String>("DMG_DEFAULT_EXTENSION") {
		s.default_extension = ext.trim_start_matches('.').to_string();
	}

	Ok(s)
}
