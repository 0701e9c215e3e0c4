//! Export deterministic train/val/test manifests from the snapshot store.

use std::path::PathBuf;
use std::str::FromStr;

use sunset_ml::config::{load_pipeline_config, resolve_database_url};
use sunset_ml::dataset::export::{ExportOptions, LabelSource, export_dataset};
use sunset_ml::store::open_store;

const DEFAULT_OUTPUT_DIR: &str = "ml/artifacts/datasets";

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

    let mut config = load_pipeline_config(cli.config.as_deref()).map_err(|err| err.to_string())?;
    if let Some(seed) = cli.seed {
        config.split.seed = seed;
    }
    if let Some(pct) = cli.train_pct {
        config.split.train_pct = pct;
    }
    if let Some(pct) = cli.val_pct {
        config.split.val_pct = pct;
    }
    if let Some(pct) = cli.test_pct {
        config.split.test_pct = pct;
    }
    if let Some(target_type) = cli.target_type {
        config.labels.target_type = target_type;
    }
    if let Some(threshold) = cli.binary_threshold {
        config.labels.binary_threshold = threshold;
    }
    if let Some(label_source) = cli.label_source {
        config.export.label_source = label_source;
    }
    if let Some(min_rating_count) = cli.min_rating_count {
        config.export.min_rating_count = min_rating_count;
    }

    config.split.validate().map_err(|err| err.to_string())?;
    let label_policy = config.labels.policy().map_err(|err| err.to_string())?;

    let log_dir = cli.output_dir.join("logs");
    let _log_guard = match sunset_ml::logging::init(&log_dir, "dataset-export") {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Logging disabled: {err}");
            None
        }
    };

    let options = ExportOptions {
        output_root: cli.output_dir,
        label_source: config.export.label_source,
        label_policy,
        min_rating_count: config.export.min_rating_count,
        split: config.split,
        training_run_id: cli.training_run_id,
    };
    export(&database_url, &options).inspect_err(|err| tracing::error!("{err}"))
}

fn export(database_url: &str, options: &ExportOptions) -> Result<(), String> {
    let summary = {
        let mut conn =
            open_store(database_url, options.access_mode()).map_err(|err| err.to_string())?;
        export_dataset(&mut conn, options).map_err(|err| err.to_string())?
    };

    let payload = serde_json::json!({
        "ok": true,
        "output_dir": summary.output_dir.display().to_string(),
        "meta": summary.meta,
    });
    let text = serde_json::to_string_pretty(&payload).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    database_url: Option<String>,
    config: Option<PathBuf>,
    output_dir: PathBuf,
    label_source: Option<LabelSource>,
    target_type: Option<String>,
    binary_threshold: Option<f64>,
    min_rating_count: Option<u32>,
    seed: Option<i64>,
    train_pct: Option<u32>,
    val_pct: Option<u32>,
    test_pct: Option<u32>,
    training_run_id: Option<i64>,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            database_url: None,
            config: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            label_source: None,
            target_type: None,
            binary_threshold: None,
            min_rating_count: None,
            seed: None,
            train_pct: None,
            val_pct: None,
            test_pct: None,
            training_run_id: None,
        }
    }
}

fn parse_value<T: FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if flag == "-h" || flag == "--help" {
            println!("{}", help_text());
            return Ok(None);
        }
        idx += 1;
        let value = args
            .get(idx)
            .ok_or_else(|| format!("{flag} requires a value"))?;
        match flag {
            "--database-url" => options.database_url = Some(value.to_string()),
            "--config" => options.config = Some(PathBuf::from(value)),
            "--output-dir" => options.output_dir = PathBuf::from(value),
            "--label-source" => {
                options.label_source =
                    Some(value.parse::<LabelSource>().map_err(|err| err.to_string())?);
            }
            "--target-type" => options.target_type = Some(value.to_string()),
            "--binary-threshold" => options.binary_threshold = Some(parse_value(flag, value)?),
            "--min-rating-count" => options.min_rating_count = Some(parse_value(flag, value)?),
            "--seed" => options.seed = Some(parse_value(flag, value)?),
            "--train-pct" => options.train_pct = Some(parse_value(flag, value)?),
            "--val-pct" => options.val_pct = Some(parse_value(flag, value)?),
            "--test-pct" => options.test_pct = Some(parse_value(flag, value)?),
            "--training-run-id" => options.training_run_id = Some(parse_value(flag, value)?),
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "sunset-dataset-export",
        "",
        "Exports deterministic webcam-grouped train/val/test manifests for model training.",
        "",
        "Usage:",
        "  sunset-dataset-export [--database-url <url>] [options]",
        "",
        "Options:",
        "  --database-url <url>       SQLite path or URL (default: $DATABASE_URL).",
        "  --config <path>            Pipeline TOML with [split], [labels], [export] sections.",
        "  --output-dir <dir>         Output root (default: ml/artifacts/datasets).",
        "  --label-source <mode>      manual_only | public_aggregate (default: manual_only).",
        "  --target-type <type>       binary | regression (default: binary).",
        "  --binary-threshold <f64>   Positive-class rating threshold (default: 4.0).",
        "  --min-rating-count <u32>   Minimum backing rating rows (default: 2).",
        "  --seed <i64>               Split seed (default: 20260212).",
        "  --train-pct <u32>          Train percentage (default: 70).",
        "  --val-pct <u32>            Validation percentage (default: 15).",
        "  --test-pct <u32>           Test percentage (default: 15).",
        "  --training-run-id <i64>    Persist sample membership for this training run.",
    ]
    .join("\n")
}
