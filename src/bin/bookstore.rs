use clap::{Parser, Subcommand};
use plp_bookstore::Database;
use plp_bookstore::collection::Collection;
use plp_bookstore::book::Book;
use plp_bookstore::config::{AppConfig, ReportFormat, Settings, load_config};
use plp_bookstore::errors::DbError;
use plp_bookstore::query::{Order, parse_filter_json};
use plp_bookstore::report::{ConsoleSink, LogSink, NdjsonSink, ReportSink};
use plp_bookstore::runner::QueryRunner;
use plp_bookstore::script::{Operation, Step, bookstore_battery, run_battery};
use plp_bookstore::{logger, seed};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "PLP Bookstore query and report runner", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Data directory holding the database folders")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Database name (default plp_bookstore)")]
    db: Option<String>,
    #[arg(long, global = true, help = "Collection name (default books)")]
    collection: Option<String>,
    #[arg(long, global = true, help = "error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Report format: console|log|ndjson")]
    format: Option<String>,
    #[arg(long, global = true, help = "Fail instead of creating a missing data directory")]
    no_create: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the full bookstore report")]
    Run {
        #[arg(long, help = "Seed the collection first if it is empty")]
        seed: bool,
        #[arg(long, requires = "seed", help = "Remove existing documents before seeding")]
        reset: bool,
    },
    #[command(about = "Load books from a JSON array / NDJSON file, or the bundled dataset")]
    Seed {
        #[arg(help = "Books file; the bundled twelve books when omitted")]
        file: Option<PathBuf>,
        #[arg(long, help = "Remove existing documents first")]
        reset: bool,
    },
    #[command(about = "Explain a find, e.g. '{\"title\": \"1984\"}'")]
    Explain {
        #[arg(help = "Filter JSON")]
        filter: String,
    },
    #[command(about = "List every book ordered by price")]
    Sort {
        #[arg(long, default_value = "asc", help = "asc|desc")]
        order: String,
    },
    #[command(about = "Books with the highest or lowest value of a field")]
    Top {
        #[arg(help = "Field to rank by, e.g. price or pages")]
        field: String,
        #[arg(long, default_value = "desc", help = "asc|desc")]
        order: String,
        #[arg(long, default_value_t = 1)]
        limit: usize,
    },
    #[command(about = "List the indexes on the collection")]
    Indexes,
    #[command(about = "Count documents in the collection")]
    Count,
}

fn settings_from(cli: &Cli) -> Result<Settings, DbError> {
    let overrides = AppConfig {
        data_dir: cli.data_dir.clone(),
        database: cli.db.clone(),
        collection: cli.collection.clone(),
        log_level: cli.log_level.clone(),
        report_format: cli.format.clone(),
        create_if_missing: cli.no_create.then_some(false),
        ..AppConfig::default()
    };
    load_config(overrides, cli.config.as_deref(), |k| std::env::var(k).ok())?.resolve()
}

fn init_logging(settings: &Settings) -> bool {
    let res = match &settings.log_config {
        Some(path) => logger::init_path(path),
        None => logger::configure_logging(&settings.log_dir, settings.log_level),
    };
    match res {
        Ok(()) => true,
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            false
        }
    }
}

fn sink_for(format: ReportFormat) -> Box<dyn ReportSink> {
    match format {
        ReportFormat::Console => Box::new(ConsoleSink::new(std::io::stdout())),
        ReportFormat::Log => Box::new(LogSink),
        ReportFormat::Ndjson => Box::new(NdjsonSink::new(std::io::stdout())),
    }
}

fn books_for(file: Option<&PathBuf>) -> Result<Vec<Book>, DbError> {
    file.map_or_else(seed::default_books, |p| seed::load_books(p))
}

fn run_command(
    cli: &Cli,
    settings: &Settings,
    logging_ready: bool,
    runner: &QueryRunner<Arc<Collection>>,
) -> Result<(), DbError> {
    let steps = match &cli.command {
        Commands::Run { seed: do_seed, reset } => {
            if *do_seed {
                let books = books_for(settings.seed_file.as_ref())?;
                seed::seed_collection(runner.store(), &books, *reset)?;
            }
            bookstore_battery()
        }
        Commands::Seed { file, reset } => {
            let books = books_for(file.as_ref().or(settings.seed_file.as_ref()))?;
            let report = seed::seed_collection(runner.store(), &books, *reset)?;
            println!(
                "inserted {} books into {}.{} (cleared {}{})",
                report.inserted,
                settings.database,
                settings.collection,
                report.cleared,
                if report.skipped { ", skipped: collection not empty" } else { "" }
            );
            return Ok(());
        }
        Commands::Explain { filter } => {
            vec![Step::new("Explain", Operation::ExplainFind(parse_filter_json(filter)?))]
        }
        Commands::Sort { order } => {
            vec![Step::new("Books sorted by price", Operation::SortByPrice(order.parse::<Order>()?))]
        }
        Commands::Top { field, order, limit } => vec![Step::new(
            &format!("Top {limit} by {field}"),
            Operation::TopBy { field: field.clone(), order: order.parse::<Order>()?, limit: *limit },
        )],
        Commands::Indexes => vec![Step::new("Indexes", Operation::ListIndexes)],
        Commands::Count => vec![Step::new("Total books in collection", Operation::CountDocuments)],
    };
    let mut sink = sink_for(settings.report_format.with_logging(logging_ready));
    run_battery(runner, &steps, sink.as_mut())?;
    Ok(())
}

// the store is closed (and written back) even when a step fails
fn execute(cli: &Cli, settings: &Settings, logging_ready: bool) -> Result<(), DbError> {
    let db = Database::open(settings)?;
    let result =
        db.runner().and_then(|runner| run_command(cli, settings, logging_ready, &runner));
    let closed = db.close();
    result.and(closed)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match settings_from(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    let logging_ready = init_logging(&settings);
    match execute(&cli, &settings, logging_ready) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(if e.is_fatal() { 2 } else { 1 })
        }
    }
}
