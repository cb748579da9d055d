//! Binary entry point for strandcli.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow terminal output in the main binary
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strandcli::config::CliConfig;
use strandcli::container::{Container, Database};
use strandcli::pipeline::{ExportOptions, ImportOptions};
use strandcli::{Result, cli};

/// Command line client for the Strand backend-as-a-service platform.
#[derive(Parser)]
#[command(name = "strandcli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file location. Default is <config dir>/strandcli/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Endpoint address.
    #[arg(long, global = true, env = "STRAND_ENDPOINT")]
    endpoint: Option<String>,

    /// API key.
    #[arg(long, global = true, env = "STRAND_API_KEY")]
    api_key: Option<String>,

    /// Access token.
    #[arg(long, global = true, env = "STRAND_ACCESS_TOKEN")]
    access_token: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available command groups.
#[derive(Subcommand)]
enum Commands {
    /// Create, read, update and delete records in the database.
    Record {
        /// Use the private database. Default is the public one.
        #[arg(short = 'p', long, global = true)]
        private: bool,

        #[command(subcommand)]
        action: RecordAction,
    },

    /// Modify the key-value structure of a record type.
    Schema {
        /// Use the private database. Default is the public one.
        #[arg(short = 'p', long, global = true)]
        private: bool,

        #[command(subcommand)]
        action: SchemaAction,
    },
}

/// Record subcommands.
#[derive(Subcommand)]
enum RecordAction {
    /// Import records to the database.
    Import {
        /// Files or directories of *.json files. Reads stdin when empty.
        paths: Vec<PathBuf>,

        /// Remove @file: fields instead of uploading assets.
        #[arg(long)]
        skip_asset: bool,

        /// Base path for locating files to be uploaded.
        #[arg(short = 'd', long)]
        basedir: Option<PathBuf>,

        /// Convert complex values without prompting.
        #[arg(long)]
        force_convert: bool,
    },

    /// Export records from the database.
    Export {
        /// Record IDs to export.
        #[arg(required = true)]
        record_ids: Vec<String>,

        /// Leave @asset: fields alone instead of downloading assets.
        #[arg(long)]
        skip_asset: bool,

        /// Base path for downloaded assets.
        #[arg(short = 'd', long)]
        basedir: Option<PathBuf>,

        /// Print output in an indented format.
        #[arg(long)]
        pretty_print: bool,

        /// Path to save the output to. Defaults to stdout, one record per line.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Query records of a type from the database.
    Query {
        /// The record type to query.
        record_type: String,

        /// Leave @asset: fields alone instead of downloading assets.
        #[arg(long)]
        skip_asset: bool,

        /// Base path for downloaded assets.
        #[arg(short = 'd', long)]
        basedir: Option<PathBuf>,

        /// Print output in an indented format.
        #[arg(long)]
        pretty_print: bool,

        /// Path to save the output to. Defaults to stdout, one record per line.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete records from the database.
    Delete {
        /// Record IDs to delete.
        #[arg(required = true)]
        record_ids: Vec<String>,
    },

    /// Set attributes on a record.
    Set {
        /// The record ID, <type>/<key>.
        record_id: String,

        /// Attribute assignments, key=value.
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Get the value of a record attribute.
    Get {
        /// The record ID, <type>/<key>.
        record_id: String,

        /// The attribute to read.
        key: String,

        /// Path to save the output to. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// If the value is an asset, output the asset content instead.
        #[arg(short = 'a', long)]
        asset: bool,
    },

    /// Edit a record in $EDITOR.
    Edit {
        /// A record ID, or a bare record type to create a new record.
        target: String,

        /// Do not fetch the record from the database before editing.
        #[arg(short = 'n', long)]
        new: bool,
    },
}

/// Schema subcommands.
#[derive(Subcommand)]
enum SchemaAction {
    /// Add a column to the schema of a record type.
    Add {
        /// The record type to modify.
        record_type: String,
        /// Name of the new column.
        column_name: String,
        /// Type of the new column.
        column_def: String,
    },

    /// Give a new name to an existing column.
    #[command(alias = "mv")]
    Move {
        /// The record type to modify.
        record_type: String,
        /// Current column name.
        column_name: String,
        /// New column name.
        new_column_name: String,
    },

    /// Remove a column from the schema of a record type.
    #[command(aliases = ["rm", "del", "delete"])]
    Remove {
        /// The record type to modify.
        record_type: String,
        /// Column to remove.
        column_name: String,
    },

    /// Fetch the current record schema.
    Fetch,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "strandcli=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn database(cli: &Cli, private: bool) -> Result<Database> {
    let config = CliConfig::load(cli.config.as_deref())?.with_overrides(
        cli.endpoint.clone(),
        cli.api_key.clone(),
        cli.access_token.clone(),
    );

    let mut container = Container::new(config.endpoint);
    if let Some(key) = config.api_key {
        container = container.with_api_key(key);
    }
    if let Some(token) = config.access_token {
        container = container.with_access_token(token);
    }

    Ok(if private {
        Database::private(container)
    } else {
        Database::public(container)
    })
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Record { private, action } => {
            let db = database(cli, *private)?;
            match action {
                RecordAction::Import {
                    paths,
                    skip_asset,
                    basedir,
                    force_convert,
                } => {
                    let mut options = ImportOptions::default()
                        .with_skip_asset(*skip_asset)
                        .with_force_convert(*force_convert);
                    if let Some(basedir) = basedir {
                        options = options.with_asset_base_dir(basedir);
                    }
                    cli::import_records(&db, paths, &options)
                }
                RecordAction::Export {
                    record_ids,
                    skip_asset,
                    basedir,
                    pretty_print,
                    output,
                } => {
                    let options =
                        export_options(*skip_asset, basedir.as_ref(), *pretty_print, output.as_ref());
                    cli::export_records(&db, record_ids, &options)
                }
                RecordAction::Query {
                    record_type,
                    skip_asset,
                    basedir,
                    pretty_print,
                    output,
                } => {
                    let options =
                        export_options(*skip_asset, basedir.as_ref(), *pretty_print, output.as_ref());
                    cli::query_records(&db, record_type, &options)
                }
                RecordAction::Delete { record_ids } => cli::delete_records(&db, record_ids),
                RecordAction::Set {
                    record_id,
                    assignments,
                } => cli::set_attributes(&db, record_id, assignments),
                RecordAction::Get {
                    record_id,
                    key,
                    output,
                    asset,
                } => cli::get_attribute(&db, record_id, key, output.as_deref(), *asset),
                RecordAction::Edit { target, new } => cli::edit_record(&db, target, *new),
            }
        }
        Commands::Schema { private, action } => {
            let db = database(cli, *private)?;
            match action {
                SchemaAction::Add {
                    record_type,
                    column_name,
                    column_def,
                } => cli::add_column(&db, record_type, column_name, column_def),
                SchemaAction::Move {
                    record_type,
                    column_name,
                    new_column_name,
                } => cli::move_column(&db, record_type, column_name, new_column_name),
                SchemaAction::Remove {
                    record_type,
                    column_name,
                } => cli::remove_column(&db, record_type, column_name),
                SchemaAction::Fetch => cli::fetch_schema(&db),
            }
        }
    }
}

fn export_options(
    skip_asset: bool,
    basedir: Option<&PathBuf>,
    pretty_print: bool,
    output: Option<&PathBuf>,
) -> ExportOptions {
    let mut options = ExportOptions::default()
        .with_skip_asset(skip_asset)
        .with_pretty_print(pretty_print);
    if let Some(basedir) = basedir {
        options = options.with_asset_base_dir(basedir);
    }
    if let Some(output) = output {
        options = options.with_output(output);
    }
    options
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
