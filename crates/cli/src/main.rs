// rowscope CLI - load CSV records, filter, style, export

mod args;
mod exit_codes;
mod render;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use rowscope_config::{ConfigError, Settings};
use rowscope_engine::refs::column_letter;
use rowscope_engine::{condition_columns, preview_formula, PageRequest, SavedFilter, Schema, Sort};
use rowscope_formula::Evaluator;
use rowscope_io::{read_csv, write_csv, FilterStore, Store, StoreError};

use args::{parse_conditions, parse_select_args};
use exit_codes::{EXIT_ERROR, EXIT_IO, EXIT_NOT_FOUND, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "rowscope")]
#[command(about = "Filter, style and export tabular records loaded from CSV")]
#[command(version)]
struct Cli {
    /// Settings file (default: $ROWSCOPE_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace every stored record with the rows of a CSV file
    #[command(after_help = "\
Headers are matched to configured columns by label, then by name
(case-insensitive). Delimiter and encoding are detected.

Examples:
  rowscope load exports/2024-06.csv")]
    Load {
        /// CSV file to load
        file: PathBuf,

        /// Print the load summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record count and date range
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Configured columns and the operators each accepts
    Columns {
        #[arg(long)]
        json: bool,
    },

    /// Distinct non-empty values of a column
    Values {
        /// Column name
        column: String,

        /// Maximum number of values (default: distinct_limit setting)
        #[arg(long)]
        limit: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Show one page of filtered records
    #[command(after_help = "\
Conditions use 'column:operator[:value[:value2]]'.

Examples:
  rowscope query --where payer:contains:acme --page 2
  rowscope query --where amount:between:100:500 --sort amount --desc
  rowscope query --filter big-payers --where due:date_after:2024-01-01
  rowscope query --select payer,amount --json")]
    Query {
        /// Saved filter supplying columns, conditions, color rules and formulas
        #[arg(long)]
        filter: Option<String>,

        /// Columns to show (repeatable, comma-separated); overrides the filter's
        #[arg(long)]
        select: Vec<String>,

        /// Extra condition, AND-ed with the filter's (repeatable)
        #[arg(long = "where")]
        r#where: Vec<String>,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u64,

        /// Rows per page (default: page_size setting)
        #[arg(long)]
        page_size: Option<u64>,

        /// Sort column
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,

        #[arg(long)]
        json: bool,
    },

    /// Write every matching record as CSV
    #[command(after_help = "\
Examples:
  rowscope export --filter big-payers -o big.csv
  rowscope export --where payer:in:ACME,Globex > subset.csv")]
    Export {
        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        select: Vec<String>,

        #[arg(long = "where")]
        r#where: Vec<String>,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Manage saved filters
    #[command(subcommand)]
    Filter(FilterCommands),

    /// Evaluate a formula against the first matching record
    #[command(name = "formula-preview", after_help = "\
Columns are lettered in display order: A is the first selected column.

Examples:
  rowscope formula-preview '=B1*2' --select payer,amount
  rowscope formula-preview '=SE(B1>100;\"big\";\"small\")' --filter big-payers")]
    FormulaPreview {
        /// Formula text, starting with =
        formula: String,

        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        select: Vec<String>,

        #[arg(long = "where")]
        r#where: Vec<String>,
    },
}

#[derive(Subcommand)]
enum FilterCommands {
    /// List saved filters, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one saved filter as JSON
    Show { id: String },
    /// Save a filter document read from a JSON file (replaces an existing id)
    Save { file: PathBuf },
    /// Delete a saved filter (missing ids are ignored)
    Delete { id: String },
    /// Import one filter document or an array of them
    Import { file: PathBuf },
    /// Write every saved filter as one JSON array
    Export {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Settings::load(cli.config.as_deref())
        .map_err(CliError::from)
        .and_then(|settings| run(cli.command, &settings));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder.format_timestamp(None).init();
}

fn run(command: Commands, settings: &Settings) -> Result<(), CliError> {
    match command {
        Commands::Load { file, json } => cmd_load(settings, &file, json),
        Commands::Stats { json } => cmd_stats(settings, json),
        Commands::Columns { json } => cmd_columns(settings, json),
        Commands::Values { column, limit, json } => cmd_values(settings, &column, limit, json),
        Commands::Query {
            filter,
            select,
            r#where,
            page,
            page_size,
            sort,
            desc,
            json,
        } => {
            let sort = sort.map(|col| if desc { Sort::desc(col) } else { Sort::asc(col) });
            cmd_query(settings, filter, &select, &r#where, page, page_size, sort, json)
        }
        Commands::Export { filter, select, r#where, output } => {
            cmd_export(settings, filter, &select, &r#where, output)
        }
        Commands::Filter(command) => match command {
            FilterCommands::List { json } => cmd_filter_list(settings, json),
            FilterCommands::Show { id } => cmd_filter_show(settings, &id),
            FilterCommands::Save { file } => cmd_filter_save(settings, &file),
            FilterCommands::Delete { id } => cmd_filter_delete(settings, &id),
            FilterCommands::Import { file } => cmd_filter_import(settings, &file),
            FilterCommands::Export { output } => cmd_filter_export(settings, output),
        },
        Commands::FormulaPreview { formula, filter, select, r#where } => {
            cmd_formula_preview(settings, &formula, filter, &select, &r#where)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { code: EXIT_NOT_FOUND, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Sqlite(_) | StoreError::Io(_) => CliError::io(message),
            StoreError::Json(_) | StoreError::Csv(_) | StoreError::InvalidData(_) => {
                CliError::parse(message)
            }
            StoreError::TooFewRecords => CliError::parse(message),
            StoreError::NoMatchingColumns => CliError::parse(message)
                .with_hint("CSV headers must match the label or name of a configured column"),
            StoreError::Engine(_) => CliError::args(message)
                .with_hint("run `rowscope columns` to list column names"),
            StoreError::InvalidFilterId(_) => CliError::args(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let message = err.to_string();
        match err {
            ConfigError::Io { .. } => CliError::io(message),
            ConfigError::Parse { .. } => CliError::parse(message),
            _ => Self { code: EXIT_ERROR, message, hint: None }
                .with_hint("pass --config or set ROWSCOPE_CONFIG to choose the settings file"),
        }
    }
}

fn write_err(e: io::Error) -> CliError {
    CliError::io(e.to_string())
}

// ============================================================================
// Shared plumbing
// ============================================================================

fn open_store(settings: &Settings) -> Result<Store, CliError> {
    Ok(Store::open(&settings.db_path()?)?)
}

fn open_filters(settings: &Settings) -> Result<FilterStore, CliError> {
    Ok(FilterStore::open(settings.filters_dir()?)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::parse(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn load_filter(settings: &Settings, schema: &Schema, id: &str) -> Result<SavedFilter, CliError> {
    let filter = open_filters(settings)?
        .get(id)?
        .ok_or_else(|| {
            CliError::not_found(format!("no saved filter {:?}", id))
                .with_hint("run `rowscope filter list` to see saved filters")
        })?;
    filter
        .validate(schema)
        .map_err(|e| CliError::args(format!("filter {:?}: {}", id, e)))?;
    Ok(filter)
}

/// Columns, conditions, color rules and formulas for a command: the saved
/// filter's, with `--select` replacing its columns and `--where` appended.
fn resolve_view(
    settings: &Settings,
    schema: &Schema,
    filter_id: Option<String>,
    select: &[String],
    where_args: &[String],
) -> Result<SavedFilter, CliError> {
    let mut view = match filter_id {
        Some(id) => load_filter(settings, schema, &id)?,
        None => SavedFilter::new("", ""),
    };
    let select = parse_select_args(select);
    if !select.is_empty() {
        view.selected_columns = select;
    }
    view.conditions.extend(parse_conditions(where_args)?);
    Ok(view)
}

// ============================================================================
// load / stats / columns / values
// ============================================================================

fn cmd_load(settings: &Settings, file: &Path, json: bool) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let table = read_csv(file).map_err(|e| match e {
        StoreError::Io(io) => CliError::io(format!("{}: {}", file.display(), io)),
        other => CliError::from(other),
    })?;
    let mut store = open_store(settings)?;
    let summary = store.replace_all(&schema, &table.headers, &table.rows)?;

    if json {
        return print_json(&summary);
    }
    println!("imported {} records ({} skipped)", summary.imported, summary.skipped);
    if !summary.unmapped_headers.is_empty() {
        println!("ignored columns: {}", summary.unmapped_headers.join(", "));
    }
    Ok(())
}

fn cmd_stats(settings: &Settings, json: bool) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let stats = open_store(settings)?.stats(&schema, settings.stats_date_column.as_deref())?;

    if json {
        return print_json(&stats);
    }
    println!("records: {}", stats.total);
    if let Some(col) = &settings.stats_date_column {
        println!(
            "{}: {} .. {}",
            schema.label_of(col),
            stats.min_date.as_deref().unwrap_or("-"),
            stats.max_date.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ColumnInfo<'a> {
    name: &'a str,
    label: &'a str,
    #[serde(rename = "type")]
    column_type: String,
    operators: Vec<&'a str>,
}

fn cmd_columns(settings: &Settings, json: bool) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let infos: Vec<ColumnInfo> = schema
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: &c.name,
            label: &c.label,
            column_type: c.column_type.to_string(),
            operators: c.column_type.operators().iter().map(|op| op.as_str()).collect(),
        })
        .collect();

    if json {
        return print_json(&infos);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for info in &infos {
        writeln!(
            out,
            "{:<24} {:<24} {:<7} {}",
            info.name,
            info.label,
            info.column_type,
            info.operators.join(",")
        )
        .map_err(write_err)?;
    }
    Ok(())
}

fn cmd_values(settings: &Settings, column: &str, limit: Option<u64>, json: bool) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let limit = limit.unwrap_or(settings.distinct_limit);
    let values = open_store(settings)?.distinct_values(&schema, column, limit)?;

    if json {
        return print_json(&values);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for value in &values {
        writeln!(out, "{}", value).map_err(write_err)?;
    }
    Ok(())
}

// ============================================================================
// query / export
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    settings: &Settings,
    filter: Option<String>,
    select: &[String],
    where_args: &[String],
    page: u64,
    page_size: Option<u64>,
    sort: Option<Sort>,
    json: bool,
) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let view = resolve_view(settings, &schema, filter, select, where_args)?;
    let page_size = match page_size {
        Some(n) => n,
        None => settings.page_size()?,
    };

    let mut request = PageRequest::new(view.selected_columns.clone(), view.conditions.clone())
        .fetching(condition_columns(&view.color_rules))
        .page(page, page_size);
    if let Some(sort) = sort {
        request = request.sorted(sort);
    }
    let result = open_store(settings)?.query_page(&schema, &request)?;

    let rendered = render::build_view(
        &Evaluator::new(),
        &schema,
        &result,
        (page, page_size),
        &view.color_rules,
        &view.formula_columns,
    );

    if json {
        return print_json(&rendered);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render::write_table(&mut out, &rendered).map_err(write_err)
}

fn cmd_export(
    settings: &Settings,
    filter: Option<String>,
    select: &[String],
    where_args: &[String],
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let delimiter = settings.delimiter()?;
    let view = resolve_view(settings, &schema, filter, select, where_args)?;

    let store = open_store(settings)?;
    let columns = schema.resolve_selection(&view.selected_columns).map_err(StoreError::from)?;
    let rows = store.query_all(&schema, &columns, &view.conditions)?;

    let written = match &output {
        Some(path) => {
            let file = fs::File::create(path)
                .map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
            write_csv(io::BufWriter::new(file), &schema, &columns, &rows, delimiter)?
        }
        None => write_csv(io::stdout().lock(), &schema, &columns, &rows, delimiter)?,
    };
    if let Some(path) = output {
        eprintln!("wrote {} records to {}", written, path.display());
    }
    Ok(())
}

// ============================================================================
// filter
// ============================================================================

fn cmd_filter_list(settings: &Settings, json: bool) -> Result<(), CliError> {
    let store = open_filters(settings)?;
    let filters = store.list()?;
    if json {
        return print_json(&filters);
    }
    if filters.is_empty() {
        eprintln!("no saved filters in {}", store.dir().display());
        return Ok(());
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for f in &filters {
        writeln!(
            out,
            "{:<40} {:<30} {} conditions, {} rules, {} formulas",
            f.id,
            f.name,
            f.conditions.len(),
            f.color_rules.len(),
            f.formula_columns.len()
        )
        .map_err(write_err)?;
    }
    Ok(())
}

fn cmd_filter_show(settings: &Settings, id: &str) -> Result<(), CliError> {
    match open_filters(settings)?.get(id)? {
        Some(filter) => print_json(&filter),
        None => Err(CliError::not_found(format!("no saved filter {:?}", id))),
    }
}

fn cmd_filter_save(settings: &Settings, file: &Path) -> Result<(), CliError> {
    let schema = settings.schema()?;
    let text = fs::read_to_string(file)
        .map_err(|e| CliError::io(format!("{}: {}", file.display(), e)))?;
    let filter: SavedFilter = serde_json::from_str(&text)
        .map_err(|e| CliError::parse(format!("{}: {}", file.display(), e)))?;
    filter
        .validate(&schema)
        .map_err(|e| CliError::args(e.to_string()))?;

    let saved = open_filters(settings)?.save(filter)?;
    println!("{}", saved.id);
    Ok(())
}

fn cmd_filter_delete(settings: &Settings, id: &str) -> Result<(), CliError> {
    if open_filters(settings)?.delete(id)? {
        println!("deleted {}", id);
    } else {
        log::info!("no saved filter {:?}; nothing to delete", id);
    }
    Ok(())
}

fn cmd_filter_import(settings: &Settings, file: &Path) -> Result<(), CliError> {
    let text = fs::read_to_string(file)
        .map_err(|e| CliError::io(format!("{}: {}", file.display(), e)))?;
    let imported = open_filters(settings)?.import(&text)?;
    println!("imported {} filters", imported);
    Ok(())
}

fn cmd_filter_export(settings: &Settings, output: Option<PathBuf>) -> Result<(), CliError> {
    let json = open_filters(settings)?.export_all()?;
    match output {
        Some(path) => fs::write(&path, json)
            .map_err(|e| CliError::io(format!("{}: {}", path.display(), e))),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

// ============================================================================
// formula-preview
// ============================================================================

fn cmd_formula_preview(
    settings: &Settings,
    formula: &str,
    filter: Option<String>,
    select: &[String],
    where_args: &[String],
) -> Result<(), CliError> {
    if !formula.starts_with('=') {
        return Err(CliError::args("formula must start with =")
            .with_hint("text without = is shown literally and has nothing to preview"));
    }
    let schema = settings.schema()?;
    let view = resolve_view(settings, &schema, filter, select, where_args)?;
    let request = PageRequest::new(view.selected_columns, view.conditions).page(1, 1);
    let result = open_store(settings)?.query_page(&schema, &request)?;

    let Some(sample) = result.rows.first() else {
        return Err(CliError::not_found("no matching record to preview against"));
    };
    // Reference legend on stderr so stdout stays the bare value.
    let legend: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{}={}", column_letter(idx), schema.label_of(name)))
        .collect();
    eprintln!("columns: {}", legend.join(", "));
    println!("{}", preview_formula(&Evaluator::new(), &result.columns, sample, formula));
    Ok(())
}
