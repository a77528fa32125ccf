use fern::colors::{Color, ColoredLevelConfig};
use log::Level;

/// Initialize timestamped logging to stderr at `level`.
///
/// Only the first call in a process succeeds; later calls return an error
/// that callers may ignore.
pub fn init_logging(level: Level, color: bool) -> anyhow::Result<()> {
	let colors = ColoredLevelConfig::new()
		.error(Color::Red)
		.warn(Color::Yellow)
		.info(Color::Green)
		.debug(Color::Blue)
		.trace(Color::Magenta);

	fern::Dispatch::new()
		.format(move |out, message, record| {
			let level = if color {
				colors.color(record.level()).to_string()
			} else {
				record.level().to_string()
			};
			out.finish(format_args!(
				"{} {:<5} [{}] {}",
				chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
				level,
				record.target(),
				message
			))
		})
		.level(level.to_level_filter())
		.chain(std::io::stderr())
		.apply()
		.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

	Ok(())
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn logging_initialization() {
		// Another test may have installed the logger already.
		let _ = super::init_logging(log::Level::Debug, false);
		assert!(super::init_logging(log::Level::Debug, false).is_err());
	}
}
