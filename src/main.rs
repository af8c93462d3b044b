//! tablegen CLI
//!
//! Commands:
//!   generate  - Generate artifacts for one or more tables
//!   preview   - Render without writing
//!   tables    - List tables in the data source
//!   history   - List, inspect, roll back or delete generation records
//!   init      - Write a default config file
//!   schema    - Print JSON schema for the config or journal records

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tablegen::config::DEFAULT_CONFIG_FILE;
use tablegen::*;

/// Generate CRUD artifacts from live table definitions
#[derive(Debug, Parser)]
#[command(name = "tablegen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate artifacts and record the run
    Generate(GenerateArgs),

    /// Render artifacts to stdout without writing or recording
    Preview(GenerateArgs),

    /// List tables in the data source
    Tables {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Generation history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print a JSON schema
    Schema {
        #[arg(value_enum)]
        name: SchemaName,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Data source, e.g. `sqlite:app.db` or `snapshot:catalog.yaml`
    #[arg(long)]
    dsn: Option<String>,

    /// Give up on introspection after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Tables to generate; repeat or separate with commas
    #[arg(short, long = "table", required = true, value_delimiter = ',')]
    tables: Vec<String>,

    /// Module name used in paths and permissions
    #[arg(short, long)]
    module: String,

    /// Features; defaults to the config's list
    #[arg(short, long, value_delimiter = ',')]
    features: Vec<String>,

    /// Generate only one side
    #[arg(long, value_enum)]
    only: Option<Only>,

    /// Backend output root
    #[arg(long)]
    output: Option<PathBuf>,

    /// Frontend output root
    #[arg(long)]
    web_output: Option<PathBuf>,

    /// Template override directory
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Backend layering: simple or standard
    #[arg(long)]
    layer_mode: Option<LayerMode>,

    /// Also generate backend tests
    #[arg(long)]
    with_test: bool,

    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Only {
    Backend,
    Frontend,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaName {
    Config,
    Record,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    /// List records, oldest first
    List {
        /// Only records for this table
        #[arg(long)]
        table: Option<String>,
    },
    /// Show one record
    Show {
        id: String,
        /// Print the stored file contents
        #[arg(long)]
        content: bool,
    },
    /// Restore every file of a record
    Rollback {
        id: String,
        /// Refuse if a file changed on disk since the record was taken
        #[arg(long)]
        check_drift: bool,
    },
    /// Delete one record
    Delete { id: String },
    /// Delete every record
    Clear,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tablegen=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => cmd_generate(&cli.config, args, false),
        Command::Preview(args) => cmd_generate(&cli.config, args, true),
        Command::Tables { source } => cmd_tables(&cli.config, &source),
        Command::History { command } => cmd_history(&cli.config, command),
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Schema { name } => cmd_schema(name),
    }
}

fn open_source(config: &Config, args: &SourceArgs) -> Result<Box<dyn CatalogSource>> {
    let descriptor = match &args.dsn {
        Some(dsn) => ConnectionDescriptor::parse(dsn)?,
        None => config.database.connection()?,
    };
    descriptor.open()
}

fn deadline(args: &SourceArgs) -> Option<Instant> {
    args.timeout.map(|secs| Instant::now() + Duration::from_secs(secs))
}

fn cmd_generate(config_path: &Path, args: GenerateArgs, preview: bool) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(output) = args.output {
        config.generator.backend.output = output;
    }
    if let Some(web_output) = args.web_output {
        config.generator.frontend.output = web_output;
    }
    if let Some(dir) = args.template_dir {
        config.generator.template_dir = Some(dir);
    }
    if let Some(mode) = args.layer_mode {
        config.generator.backend.layer_mode = mode;
    }
    if args.with_test {
        config.generator.backend.with_test = true;
    }

    let source = open_source(&config, &args.source)?;
    let features = if args.features.is_empty() {
        config.generator.features.clone()
    } else {
        args.features
    };
    let mut request = GenerateRequest::new("", args.module)
        .with_features(features.as_slice())
        .with_selection(match args.only {
            None => Selection::All,
            Some(Only::Backend) => Selection::BackendOnly,
            Some(Only::Frontend) => Selection::FrontendOnly,
        });
    if let Some(deadline) = deadline(&args.source) {
        request = request.with_deadline(deadline);
    }

    let generator = Generator::new(config);

    if preview {
        for table in &args.tables {
            request.table = table.clone();
            for artifact in generator.preview(source.as_ref(), &request)? {
                println!("=== {} ({}) ===", artifact.path.display(), artifact.template);
                println!("{}", artifact.content);
            }
        }
        return Ok(());
    }

    let report = generator.generate_batch(source.as_ref(), args.tables.as_slice(), &request)?;
    for outcome in &report.outcomes {
        match outcome {
            BatchOutcome::Generated(record) => {
                println!("{} -> record {}", record.table, record.id);
                for file in &record.files {
                    println!("  Created: {}", file.path.display());
                }
            }
            BatchOutcome::Skipped { table, error } => {
                eprintln!("{}: {}", table, error);
            }
        }
    }
    if report.records().next().is_none() {
        return Err("no tables were generated".into());
    }
    Ok(())
}

fn cmd_tables(config_path: &Path, args: &SourceArgs) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let source = open_source(&config, args)?;
    for table in source.list_tables(deadline(args))? {
        if table.comment.is_empty() {
            println!("{}", table.name);
        } else {
            println!("{}\t{}", table.name, table.comment);
        }
    }
    Ok(())
}

fn cmd_history(config_path: &Path, command: HistoryCommand) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let journal = Journal::new(config.generator.history_dir);

    match command {
        HistoryCommand::List { table } => {
            let records = match table {
                Some(table) => journal.records_for_table(&table)?,
                None => journal.list()?,
            };
            if records.is_empty() {
                println!("No generation records");
            }
            for r in records {
                println!(
                    "{}  {}  {:<24} {:<12} {} files",
                    r.id,
                    r.generated_at.format("%Y-%m-%d %H:%M:%S"),
                    r.table,
                    r.module,
                    r.files.len()
                );
            }
        }
        HistoryCommand::Show { id, content } => {
            let record = journal.get(&id)?;
            println!("Record:   {}", record.id);
            println!("Table:    {} {}", record.table, record.table_comment);
            println!("Module:   {}", record.module);
            println!("Created:  {}", record.generated_at.to_rfc3339());
            println!("Fields:   {}", record.field_count);
            println!("Features: {}", record.config.features.join(", "));
            println!("Checksum: {}{}", record.checksum, if record.is_intact() { "" } else { " (MISMATCH)" });
            for file in &record.files {
                println!("  [{}] {} {}", file.kind, file.path.display(), &file.checksum[..12.min(file.checksum.len())]);
                if content {
                    println!("{}", file.content);
                }
            }
        }
        HistoryCommand::Rollback { id, check_drift } => {
            let report = journal.rollback_with(&id, RollbackOptions { check_drift })?;
            for path in &report.restored {
                println!("  Restored: {}", path.display());
            }
        }
        HistoryCommand::Delete { id } => {
            journal.delete(&id)?;
            println!("Deleted {}", id);
        }
        HistoryCommand::Clear => {
            let count = journal.clear()?;
            println!("Removed {} records", count);
        }
    }
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", config_path.display()).into());
    }
    Config::default().save(config_path)?;
    println!("Wrote {}", config_path.display());
    Ok(())
}

fn cmd_schema(name: SchemaName) -> Result<()> {
    let schema = match name {
        SchemaName::Config => schemars::schema_for!(Config),
        SchemaName::Record => schemars::schema_for!(GenerationRecord),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
