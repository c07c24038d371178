// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabular_ingest::{
    Category, CategorySignatures, IngestError, RecordStore, RejectionPolicy, Session,
    SqliteRecordStore, ValidatingStore,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stage CSV/XLSX files, label their source and load them into one dataset
#[derive(Parser, Debug)]
#[command(name = "tabular-ingest")]
#[command(version)]
struct Args {
    /// SQLite database holding the consolidated records
    #[arg(long, default_value = "ingest.db", env = "INGEST_DB_PATH")]
    db: PathBuf,

    /// Spreadsheet written by export (.xlsx or .csv)
    #[arg(long, default_value = "export.xlsx", env = "INGEST_EXPORT_PATH")]
    export_path: PathBuf,

    /// JSON file overriding the required columns per category
    #[arg(long, env = "INGEST_SIGNATURES")]
    signatures: Option<PathBuf>,

    /// Record every staged file without checking its category
    #[arg(long)]
    no_validate: bool,

    /// Keep rejected files staged when other files in the batch commit
    #[arg(long)]
    retain_rejected: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive staging screen (default)
    Ui,

    /// Stage the given files, commit them and optionally export
    Load {
        /// FILE or FILE:CATEGORY (category defaults to tsun)
        #[arg(required = true)]
        files: Vec<String>,

        /// Export after a successful commit
        #[arg(long)]
        export: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let interactive = matches!(args.command, None | Some(Command::Ui));
    init_tracing(interactive);

    let policy = if args.retain_rejected {
        RejectionPolicy::RetainRejected
    } else {
        RejectionPolicy::DiscardRejected
    };

    let store = SqliteRecordStore::open(&args.db)?;
    info!(db = %args.db.display(), validate = !args.no_validate, ?policy, "Opened record store");

    if args.no_validate {
        run(Session::new(store).with_policy(policy), &args)
    } else {
        let signatures = match &args.signatures {
            Some(path) => CategorySignatures::from_file(path)?,
            None => CategorySignatures::default(),
        };
        let store = ValidatingStore::new(store, signatures);
        run(Session::new(store).with_policy(policy), &args)
    }
}

fn init_tracing(interactive: bool) {
    // Log lines would tear the alternate screen, so the TUI stays quiet by default
    let default_filter = if interactive { "off" } else { "tabular_ingest=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run<S: RecordStore>(session: Session<S>, args: &Args) -> Result<()> {
    match &args.command {
        None | Some(Command::Ui) => run_ui_mode(session, args),
        Some(Command::Load { files, export }) => run_load(session, args, files, *export),
    }
}

/// Parse `FILE[:CATEGORY]`, only splitting on a colon followed by a known category
fn parse_file_arg(arg: &str) -> (PathBuf, Category) {
    if let Some((path, label)) = arg.rsplit_once(':') {
        if let Ok(category) = label.parse::<Category>() {
            return (PathBuf::from(path), category);
        }
    }
    (PathBuf::from(arg), Category::default())
}

fn run_load<S: RecordStore>(
    mut session: Session<S>,
    args: &Args,
    files: &[String],
    export: bool,
) -> Result<()> {
    for arg in files {
        let (path, category) = parse_file_arg(arg);
        match session.add_file(&path) {
            Ok(()) => {
                let last = session.staged().len() - 1;
                session.set_category(last, category)?;
            }
            Err(e) => eprintln!("❌ {}", e),
        }
    }

    let report = match session.commit_all() {
        Ok(report) => report,
        Err(e) => exit_with(e),
    };

    for m in &report.mismatches {
        eprintln!("❌ {}", m);
    }
    for entry in &report.committed {
        println!(
            "✓ {} ({}): {} rows recorded, {} duplicates skipped",
            entry.display_name(),
            entry.category,
            entry.summary.rows_recorded,
            entry.summary.duplicates_skipped
        );
    }
    if report.is_clean() {
        println!("✅ All files uploaded successfully!");
    } else {
        println!("✅ All valid files uploaded successfully!");
    }

    if export {
        if let Err(e) = session.export(&args.export_path) {
            exit_with(e);
        }
        println!("✅ All files exported successfully to {}", args.export_path.display());
    }

    Ok(())
}

/// Lines printed for a failed action: the batch's rejections first, then the error
fn failure_lines(err: &IngestError) -> Vec<String> {
    let mut lines = Vec::new();
    if let IngestError::Record { mismatches, .. } = err {
        lines.extend(mismatches.0.iter().map(|m| format!("❌ {}", m)));
    }
    lines.push(format!("❌ {}", err));
    lines
}

fn exit_with(err: IngestError) -> ! {
    for line in failure_lines(&err) {
        eprintln!("{}", line);
    }
    std::process::exit(err.exit_code());
}

#[cfg(feature = "tui")]
fn run_ui_mode<S: RecordStore>(session: Session<S>, args: &Args) -> Result<()> {
    use anyhow::Context;

    let mut app = ui::App::new(session, args.export_path.clone());
    ui::run_ui(&mut app).context("Terminal UI failed")?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode<S: RecordStore>(_session: Session<S>, _args: &Args) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or stage files directly: tabular-ingest load FILE[:CATEGORY]...");
    std::process::exit(1);
}
