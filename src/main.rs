// DltExport - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. Request building (format, scope, filter, decoder catalog)
// 4. Running the export and mapping its outcome to an exit code

use clap::Parser;
use dltexport::app::exporter::{run_export, ExportRequest};
use dltexport::core::filter::FilterState;
use dltexport::core::format::ExportFormat;
use dltexport::core::model::ExportState;
use dltexport::core::selection::SelectionScope;
use dltexport::platform::config::{load_config, AppConfig, PlatformPaths};
use dltexport::util;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Exit code for usage and setup errors.
const EXIT_SETUP: u8 = 2;

/// Exit code when the run aborted or any record failed.
const EXIT_FAILURES: u8 = 1;

/// DltExport - export DLT trace files to DLT, text, CSV or the clipboard.
///
/// Exports every record, the filtered view, or selected rows of the filtered
/// view, counting read and write failures instead of stopping on them.
#[derive(Parser, Debug)]
#[command(name = "dltexport", version, about)]
struct Cli {
    /// DLT trace file to export.
    input: PathBuf,

    /// Output file (not used by the clipboard format).
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output format: dlt, dlt-decoded, ascii, utf8, csv or clipboard.
    #[arg(short = 'f', long = "format")]
    format: Option<ExportFormat>,

    /// Records to export: all, filtered or selected.
    #[arg(short = 's', long = "scope", default_value = "all")]
    scope: SelectionScope,

    /// Filtered-view row numbers for the selected scope (comma separated).
    #[arg(long = "rows", value_delimiter = ',')]
    rows: Vec<usize>,

    /// Keep only records from this ECU id (repeatable).
    #[arg(long = "ecu")]
    ecu: Vec<String>,

    /// Keep only records from this application id (repeatable).
    #[arg(long = "app")]
    app: Vec<String>,

    /// Keep only records from this context id (repeatable).
    #[arg(long = "ctx")]
    ctx: Vec<String>,

    /// Most verbose log level to keep (1 = fatal .. 6 = verbose).
    #[arg(long = "max-level", value_parser = clap::value_parser!(u8).range(1..=6))]
    max_level: Option<u8>,

    /// Keep only fatal and error log messages.
    #[arg(long = "errors-only", conflicts_with = "max_level")]
    errors_only: bool,

    /// Case-insensitive payload substring filter.
    #[arg(long = "text")]
    text: Option<String>,

    /// Payload regular expression filter.
    #[arg(long = "regex")]
    regex: Option<String>,

    /// Message catalog for decoding non-verbose messages.
    #[arg(long = "catalog")]
    catalog: Option<PathBuf>,

    /// Non-interactive mode: no progress bar, quiet decoding.
    #[arg(long = "silent")]
    silent: bool,

    /// Print the run summary as JSON (on stderr for the clipboard format).
    #[arg(long = "json-summary")]
    json_summary: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let platform_paths = PlatformPaths::resolve();
    let (config, config_warnings) = load_config(&platform_paths.config_dir);

    util::logging::init(
        cli.debug,
        config.log_level.as_deref(),
        config.log_file.as_deref(),
    );

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "DltExport starting"
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
        eprintln!("Warning: {warning}");
    }

    let request = match build_request(&cli, &config, &platform_paths) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Invalid export request");
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_SETUP);
        }
    };

    // Ctrl-C requests cancellation instead of killing the process, so the
    // sink is still finished. Silent runs keep the default behaviour.
    let cancel = Arc::new(AtomicBool::new(false));
    if !request.silent {
        if let Err(e) =
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel))
        {
            tracing::warn!(error = %e, "Ctrl-C handler not installed");
        }
    }

    let outcome = match run_export(&request, cancel) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(error = %e, "Export setup failed");
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_SETUP);
        }
    };

    if let Some(ref text) = outcome.clipboard {
        print!("{text}");
    }

    if cli.json_summary {
        match serde_json::to_string_pretty(&outcome.summary) {
            Ok(json) if outcome.stdout_taken() => eprintln!("{json}"),
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "Could not serialise summary"),
        }
    }

    let summary = &outcome.summary;
    if summary.state == ExportState::Aborted || summary.needs_attention() {
        ExitCode::from(EXIT_FAILURES)
    } else {
        ExitCode::SUCCESS
    }
}

/// Merge command-line options over config defaults.
fn build_request(
    cli: &Cli,
    config: &AppConfig,
    paths: &PlatformPaths,
) -> util::error::Result<ExportRequest> {
    let format = cli.format.unwrap_or(config.default_format);

    if format.writes_file() && cli.output.is_none() {
        return Err(util::error::ConfigError::ValueOutOfRange {
            field: "--output".to_string(),
            value: String::new(),
            expected: format!("an output path for the '{format}' format"),
        }
        .into());
    }

    if !cli.rows.is_empty() && cli.scope != SelectionScope::Selected {
        tracing::warn!(scope = %cli.scope, "--rows is ignored unless --scope selected");
    }

    let mut filter = if cli.errors_only {
        FilterState::errors_only()
    } else {
        FilterState {
            max_log_level: cli.max_level,
            ..Default::default()
        }
    };
    filter.ecu_ids.extend(cli.ecu.iter().cloned());
    filter.app_ids.extend(cli.app.iter().cloned());
    filter.ctx_ids.extend(cli.ctx.iter().cloned());
    filter.text_search = cli.text.clone().unwrap_or_default();
    if let Some(ref pattern) = cli.regex {
        filter.set_regex(pattern)?;
    }

    // Catalog: CLI > config > default location when present.
    let catalog = cli
        .catalog
        .clone()
        .or_else(|| config.message_catalog.clone())
        .or_else(|| {
            let default = paths.default_catalog();
            default.is_file().then_some(default)
        });

    Ok(ExportRequest {
        input: cli.input.clone(),
        output: cli.output.clone(),
        format,
        scope: cli.scope,
        rows: cli.rows.clone(),
        filter,
        silent: cli.silent || config.silent,
        catalog,
    })
}
