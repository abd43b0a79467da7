use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod annex;
mod convert;
mod error;
mod migrator;
mod naming;
mod process;
mod recipe;
mod report;
mod theme;

use error::MigrateError;

#[derive(Parser)]
#[command(name = "migrate-to-oci")]
#[command(about = "Migrate Singularity recipe images to OCI images tracked in git-annex")]
#[command(version = "0.1.0")]
struct Cli {
    /// Root of the git-annex repository
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,

    /// Directory scanned for Singularity.* recipes [default: <repo-dir>/images]
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// Directory receiving OCI and SIF images [default: <repo-dir>/images-oci]
    #[arg(long)]
    images_oci_dir: Option<PathBuf>,

    /// Record conversion failures and keep going instead of aborting
    #[arg(long)]
    skip_failures: bool,

    /// Only report what would be converted
    #[arg(long)]
    dry_run: bool,

    /// Restrict the run to these image families (repeatable)
    #[arg(long = "family")]
    families: Vec<String>,

    /// Tool copying registry images into OCI layouts
    #[arg(long, default_value = "skopeo")]
    copy_tool: String,

    /// Tool building SIF images from OCI layouts
    #[arg(long, default_value = "apptainer")]
    build_tool: String,

    /// git binary used for annex queries
    #[arg(long, default_value = "git")]
    git: String,

    /// Timeout in seconds for each external tool invocation
    #[arg(long, default_value_t = 3600)]
    timeout: u64,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: report::ReportFormat,

    /// When to colorize output: auto, always, never
    #[arg(long, default_value = "auto")]
    color: String,

    /// Custom report theme as JSON string (e.g., '{"failure":"#ea6962"}')
    #[arg(long)]
    theme: Option<String>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    // Determine if we should use color
    let use_color = match cli.color.as_str() {
        "always" => true,
        "never" => false,
        _ => atty::is(atty::Stream::Stdout),
    };

    let theme = if let Some(theme_json) = cli.theme {
        theme::Theme::from_json(&theme_json)?
    } else {
        theme::Theme::default()
    };

    let images_dir = cli.images_dir.unwrap_or_else(|| cli.repo_dir.join("images"));
    let images_oci_dir = cli.images_oci_dir.unwrap_or_else(|| cli.repo_dir.join("images-oci"));
    let config = migrator::MigratorConfig {
        skip_failures: cli.skip_failures,
        dry_run: cli.dry_run,
        families: cli.families,
        ..migrator::MigratorConfig::new(cli.repo_dir, images_dir, images_oci_dir)
    };

    let timeout = Duration::from_secs(cli.timeout);
    let converter = convert::ContainerTool::new(cli.copy_tool, cli.build_tool, timeout);
    let annex = annex::GitAnnex::new(cli.git, config.repo_dir.clone(), timeout);
    let migrator = migrator::OciMigrator::new(config, converter, annex);

    let options = report::ReportOptions {
        format: cli.format,
        use_color,
        theme,
    };
    let mut stdout = io::stdout().lock();

    match migrator.run() {
        Ok(results) => {
            report::write_report(&mut stdout, &results, &options)
                .context("Failed to write report")?;
            if results.iter().all(|r| r.success()) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        Err(MigrateError::FatalAbort {
            file,
            processed,
            message,
            results,
        }) => {
            report::write_report(&mut stdout, &results, &options)
                .context("Failed to write report")?;
            eprintln!(
                "{} aborted on {} after {} file(s): {}",
                "error:".if_supports_color(Stream::Stderr, |t| t.red()),
                file.display(),
                processed,
                message
            );
            eprintln!("hint: rerun with --skip-failures to continue past failed conversions");
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err).with_context(|| {
            format!("Migration of {} failed", migrator.config().images_dir.display())
        }),
    }
}
