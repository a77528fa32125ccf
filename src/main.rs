use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docmerge::config::{self, Settings};
use docmerge::order::default_order;
use docmerge::progress::read_history;
use docmerge::{DocxCodec, MergeSession, WorkingSet, observability};

#[derive(Parser)]
#[command(name = "docmerge", about = "docmerge - merge Word documents into one")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Merge documents into a single output document
	Merge {
		/// Where to save the merged document (".docx" is added if there is no extension)
		#[arg(short, long)]
		output: PathBuf,
		/// Comma-separated 1-based positions of FILES, e.g. "2,1,2" (default: all, in order)
		#[arg(long)]
		order: Option<String>,
		/// Do not record this merge in the history file
		#[arg(long)]
		no_history: bool,
		/// Input documents, numbered from 1 in the order given
		#[arg(required = true)]
		files: Vec<PathBuf>,
	},
	/// Show the numbered document list and the default order
	List {
		#[arg(required = true)]
		files: Vec<PathBuf>,
	},
	/// Show recently merged documents
	History {
		/// Number of most recent entries to show
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let settings = match config::load() {
		Ok(s) => s,
		Err(e) => {
			eprintln!("failed to load config, using defaults: {}", e);
			Settings::default()
		}
	};
	if let Err(e) = observability::init_logging(settings.log_level, settings.color) {
		eprintln!("{}", e);
	}

	match cli.command {
		Commands::Merge {
			output,
			order,
			no_history,
			files,
		} => match merge(&settings, output, order, no_history, files).await {
			Ok(()) => ExitCode::SUCCESS,
			Err(e) => {
				eprintln!("Error merging documents: {:#}", e);
				ExitCode::FAILURE
			}
		},
		Commands::List { files } => {
			let mut set = WorkingSet::new();
			set.extend(files);
			for line in set.listing() {
				println!("{}", line);
			}
			println!("Order: {}", default_order(set.len()));
			ExitCode::SUCCESS
		}
		Commands::History { limit } => match read_history(&settings.history_file) {
			Ok(entries) if entries.is_empty() => {
				println!("No merges recorded yet.");
				ExitCode::SUCCESS
			}
			Ok(entries) => {
				let skip = entries.len().saturating_sub(limit);
				for entry in &entries[skip..] {
					println!("{}", entry.summary());
				}
				ExitCode::SUCCESS
			}
			Err(e) => {
				eprintln!(
					"Failed to read history {}: {}",
					settings.history_file.display(),
					e
				);
				ExitCode::FAILURE
			}
		},
	}
}

async fn merge(
	settings: &Settings,
	output: PathBuf,
	order: Option<String>,
	no_history: bool,
	files: Vec<PathBuf>,
) -> anyhow::Result<()> {
	let output = settings.output_path(&output);

	let mut session = MergeSession::new(DocxCodec);
	if let Some(history) = settings.history().filter(|_| !no_history) {
		session = session.with_history(history);
	}
	session.add(files)?;
	if let Some(order) = order {
		session.set_order(order)?;
	}

	let mut job = session.start(&output)?;

	// Ctrl-C stops the merge before the next document; nothing is saved.
	let cancel = job.cancel_token();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			cancel.cancel();
		}
	});

	while let Some(event) = job.next_event().await {
		println!("{}", event.status_line());
	}
	let summary = job.wait().await?;

	println!("Merge Completed Successfully!");
	println!(
		"Documents merged successfully! Saved at: {} ({} documents, {} blocks, {:.1}s)",
		summary.output.display(),
		summary.documents,
		summary.blocks,
		summary.elapsed.as_secs_f64()
	);
	Ok(())
}
