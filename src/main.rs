// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use submission_export::pipeline::ExportSummary;
use submission_export::utils::logging::{
    format_count, format_error, format_info, format_success, format_warning,
};
use submission_export::worker::decrypt_into_csv;
use submission_export::{
    Config, DownloadParams, ExportError, ExportOrchestrator, ExportRequest, ExportResult,
    FileSecretKey, LineData, ProgressTracker, SecretKeyProvider, StaticSecretKey,
    SubmissionsClient, TerminalState, Validator, open_file,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "submission-export")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Decrypt encrypted form responses into a CSV export", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct KeyArgs {
    /// File holding the base64 form secret key
    #[arg(long, value_name = "FILE")]
    secret_key_file: Option<PathBuf>,

    #[arg(long, env = "FORM_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,
}

impl KeyArgs {
    fn provider(self) -> Result<Box<dyn SecretKeyProvider>> {
        match (self.secret_key_file, self.secret_key) {
            (Some(path), _) => Ok(Box::new(FileSecretKey(path))),
            (None, Some(key)) => Ok(Box::new(StaticSecretKey::new(key))),
            (None, None) => Err(anyhow!(
                "No secret key given: use --secret-key-file or set FORM_SECRET_KEY"
            )),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export every response of a form into a CSV file
    Export {
        #[arg(long)]
        form_id: String,

        /// Form title, used for the output filename
        #[arg(long, default_value = "Form")]
        title: String,

        #[command(flatten)]
        keys: KeyArgs,

        /// Read the ndjson stream from a file instead of the API
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        #[arg(long, value_name = "YYYY-MM-DD", requires = "end_date")]
        start_date: Option<String>,

        #[arg(long, value_name = "YYYY-MM-DD", requires = "start_date")]
        end_date: Option<String>,

        #[arg(long)]
        download_attachments: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a single ndjson line and print the classified record
    DecryptLine {
        #[arg(long)]
        form_id: String,

        #[command(flatten)]
        keys: KeyArgs,

        #[arg(long)]
        line: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    submission_export::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    match cli.command {
        Commands::Export {
            form_id,
            title,
            keys,
            input,
            start_date,
            end_date,
            download_attachments,
            output,
        } => {
            let mut config = config;
            if let Some(output) = output {
                config.export.output_dir = output;
            }
            let params = DownloadParams {
                form_id,
                start_date,
                end_date,
                download_attachments,
            };
            cmd_export(config, params, title, keys, input, cli.color).await?;
        }
        Commands::DecryptLine {
            form_id,
            keys,
            line,
        } => {
            cmd_decrypt_line(config, form_id, keys, line).await?;
        }
    }

    Ok(())
}

async fn cmd_export(
    config: Config,
    params: DownloadParams,
    title: String,
    keys: KeyArgs,
    input: Option<PathBuf>,
    color: bool,
) -> Result<()> {
    Validator::validate_form_id(&params.form_id)?;
    Validator::validate_date_range(params.start_date.as_deref(), params.end_date.as_deref())?;
    let keys = keys.provider()?;

    tokio::fs::create_dir_all(&config.export.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {}",
                config.export.output_dir.display()
            )
        })?;

    let source = match &input {
        Some(path) => {
            Validator::validate_file_path(path)?;
            info!("Reading responses from {}", path.display());
            open_file(path).await.context("Failed to open input file")?
        }
        None => {
            let client = SubmissionsClient::new(&config.api)?;
            info!("Downloading responses from {}", client.base_url());
            client
                .open(&params)
                .await
                .context("Failed to open submissions stream")?
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling export");
            interrupt.cancel();
        }
    });

    let request = ExportRequest {
        form_id: params.form_id.clone(),
        title,
        download_attachments: params.download_attachments,
        host_origin: config.api.base_url.clone(),
    };

    let tracker = Arc::new(ProgressTracker::with_color(source.expected_count, color));
    let orchestrator = ExportOrchestrator::new(config).with_tracker(Arc::clone(&tracker));

    let start_time = Instant::now();
    let outcome = orchestrator
        .run(&request, source, keys.as_ref(), cancel)
        .await;
    tracker.finish();
    let elapsed = start_time.elapsed();
    let stats = tracker.get_stats();

    match outcome {
        Ok(summary) => {
            print_summary(&summary);
            info!(
                "Export finished in {:.2}s ({:.1} responses/s)",
                elapsed.as_secs_f64(),
                stats.records_per_second()
            );
            Ok(())
        }
        Err(ExportError::AllRecordsFailed { result }) => {
            println!(
                "\n{}",
                format_error("No responses could be decrypted, nothing was written")
            );
            print_counts(&result);
            Err(anyhow!("All responses failed decryption or verification"))
        }
        Err(ExportError::Cancelled) => {
            println!("\n{}", format_warning("Export cancelled, no file was written"));
            Ok(())
        }
        Err(e) => Err(e).context("Export failed"),
    }
}

fn print_summary(summary: &ExportSummary) {
    println!();
    match (&summary.state, &summary.csv_path) {
        (_, None) => println!("{}", format_info("Form has no responses to export")),
        (TerminalState::PartialFailure, Some(path)) => println!(
            "{}",
            format_warning(&format!(
                "Stream ended early, partial export saved to {}",
                path.display()
            ))
        ),
        (_, Some(path)) => println!(
            "{}",
            format_success(&format!("Export saved to {}", path.display()))
        ),
    }
    print_counts(&summary.result);
    if summary.attachments_saved > 0 || summary.attachment_error_count > 0 {
        println!("{}", format_count("Archives", summary.attachments_saved));
        println!(
            "{}",
            format_count("Attach. err", summary.attachment_error_count)
        );
    }
}

fn print_counts(result: &ExportResult) {
    println!("{}", format_count("Expected", result.expected_count));
    println!("{}", format_count("Success", result.success_count));
    println!("{}", format_count("Errors", result.error_count));
    println!("{}", format_count("Unverified", result.unverified_count));
}

async fn cmd_decrypt_line(
    config: Config,
    form_id: String,
    keys: KeyArgs,
    line: String,
) -> Result<()> {
    let keys = keys.provider()?;
    let host_origin = config.api.base_url.clone();
    let orchestrator = ExportOrchestrator::new(config);
    let ctx = orchestrator
        .worker_context(keys.as_ref())
        .context("Failed to prepare decryption keys")?;

    let data = LineData {
        line,
        form_id,
        download_attachments: false,
        host_origin,
    };
    let record = decrypt_into_csv(&data, &ctx, None, &Semaphore::new(1)).await;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
