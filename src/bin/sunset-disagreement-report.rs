//! Generate the automated vs. human rating disagreement report.

use std::path::PathBuf;

use sunset_ml::config::resolve_database_url;
use sunset_ml::disagreement::{DisagreementOptions, run_report};
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
    let _log_guard = match sunset_ml::logging::init(&log_dir, "disagreement-report") {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Logging disabled: {err}");
            None
        }
    };
    report(&database_url, &cli.options).inspect_err(|err| tracing::error!("{err}"))
}

fn report(database_url: &str, options: &DisagreementOptions) -> Result<(), String> {
    let outcome = {
        let conn = open_store(database_url, AccessMode::ReadOnly).map_err(|err| err.to_string())?;
        run_report(&conn, options).map_err(|err| err.to_string())?
    };

    let payload = serde_json::json!({
        "ok": true,
        "output_dir": outcome.output_dir.display().to_string(),
        "model_version": outcome.report.model_version,
        "num_rows": outcome.report.num_rows,
        "phase_summary": outcome.report.phase_summary,
    });
    let text = serde_json::to_string_pretty(&payload).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    database_url: Option<String>,
    options: DisagreementOptions,
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
            "--model-version" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--model-version requires a value".to_string())?;
                cli.options.model_version = Some(value.to_string());
            }
            "--limit" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--limit requires a value".to_string())?;
                cli.options.limit = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --limit value: {value}"))?;
            }
            "--output-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--output-dir requires a value".to_string())?;
                cli.options.output_root = PathBuf::from(value);
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
        "sunset-disagreement-report",
        "",
        "Ranks snapshots by |automated rating - consensus rating| (read-only).",
        "",
        "Usage:",
        "  sunset-disagreement-report [--database-url <url>] [options]",
        "",
        "Options:",
        "  --database-url <url>     SQLite path or URL (default: $DATABASE_URL).",
        "  --model-version <tag>    Only use inferences from this model version.",
        "  --limit <usize>          Max ranked rows (default: 200).",
        "  --output-dir <dir>       Output root (default: ml/artifacts/reports/disagreements).",
    ]
    .join("\n")
}
