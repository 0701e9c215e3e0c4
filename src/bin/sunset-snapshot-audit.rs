//! Audit snapshot coverage and rating integrity.
//!
//! Exports CSV lists for all snapshots, rated snapshots, export-eligible
//! snapshots, and the three mismatch categories, plus `summary.json`.

use std::path::PathBuf;

use sunset_ml::audit::{AuditOptions, AuditSort, run_audit};
use sunset_ml::config::resolve_database_url;
use sunset_ml::store::{AccessMode, open_store};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(cli) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let database_url =
        resolve_database_url(cli.database_url.as_deref()).map_err(|err| err.to_string())?;

    let log_dir = cli.options.output_root.join("logs");
    let _log_guard = match sunset_ml::logging::init(&log_dir, "snapshot-audit") {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Logging disabled: {err}");
            None
        }
    };
    audit(&database_url, &cli.options).inspect_err(|err| tracing::error!("{err}"))
}

fn audit(database_url: &str, options: &AuditOptions) -> Result<(), String> {
    let outcome = {
        let conn = open_store(database_url, AccessMode::ReadOnly).map_err(|err| err.to_string())?;
        run_audit(&conn, options).map_err(|err| err.to_string())?
    };

    let payload = serde_json::json!({
        "ok": true,
        "output_dir": outcome.output_dir.display().to_string(),
        "summary": outcome.summary,
    });
    let text = serde_json::to_string_pretty(&payload).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    database_url: Option<String>,
    options: AuditOptions,
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut cli = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--database-url" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--database-url requires a value".to_string())?;
                cli.database_url = Some(value.to_string());
            }
            "--output-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--output-dir requires a value".to_string())?;
                cli.options.output_root = PathBuf::from(value);
            }
            "--limit" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--limit requires a value".to_string())?;
                cli.options.limit = value
                    .parse::<i64>()
                    .map_err(|_| format!("Invalid --limit value: {value}"))?;
            }
            "--sort" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--sort requires a value".to_string())?;
                cli.options.sort = value.parse::<AuditSort>().map_err(|err| err.to_string())?;
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    Ok(Some(cli))
}

fn help_text() -> String {
    [
        "sunset-snapshot-audit",
        "",
        "Audits snapshot coverage and rating integrity (read-only).",
        "",
        "Usage:",
        "  sunset-snapshot-audit [--database-url <url>] [options]",
        "",
        "Options:",
        "  --database-url <url>   SQLite path or URL (default: $DATABASE_URL).",
        "  --output-dir <dir>     Output root (default: ml/artifacts/reports/snapshot_audit).",
        "  --limit <i64>          Max snapshots to audit; 0 means all (default: 0).",
        "  --sort <order>         captured_desc | captured_asc | id_desc | id_asc (default: captured_desc).",
    ]
    .join("\n")
}
