use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use feedlint_core::{
    GtfsFeed, GtfsInput, ProgressHandler, ServiceDatePolicy, ValidationConfig, ValidationEngine,
};
use feedlint_report::{
    write_html_report, HtmlReportContext, ReportSummary, ReportSummaryContext, ValidationReport,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Legacy,
    Complete,
}

impl From<PolicyArg> for ServiceDatePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Legacy => ServiceDatePolicy::Legacy,
            PolicyArg::Complete => ServiceDatePolicy::Complete,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "feedlint")]
#[command(about = "Semantic checks for transit schedule feeds", version)]
struct Args {
    /// Feed directory or zip archive.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Zip archive to download and validate.
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    /// Where the JSON report is written.
    #[arg(short = 'o', long = "output", default_value = "report.json")]
    output: PathBuf,

    /// Optional HTML rendering of the same report.
    #[arg(long = "html-report")]
    html_report: Option<PathBuf>,

    /// JSON file with validation settings; flags below override it.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "buffer-distance")]
    buffer_distance: Option<f64>,

    #[arg(long = "distance-multiplier")]
    distance_multiplier: Option<f64>,

    #[arg(long = "stop-shape-distance")]
    stop_shape_distance: Option<f64>,

    #[arg(long = "service-date-policy", value_enum)]
    service_date_policy: Option<PolicyArg>,

    #[arg(short = 'p', long = "pretty")]
    pretty: bool,

    /// Worker threads for the validator pool; 0 lets rayon decide.
    #[arg(long = "threads", default_value_t = 0)]
    threads: u32,

    /// Hide progress bars.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads as usize)
            .build_global()
            .context("configure worker threads")?;
    }

    let config = build_config(&args)?;
    let resolved = resolve_input(&args)?;
    info!("input {} detected", resolved.input.path().display());

    let progress = IndicatifHandler::new(args.quiet);
    let started_at = Instant::now();

    let feed = GtfsFeed::from_input_with_progress(&resolved.input, &progress)
        .with_context(|| format!("load feed {}", resolved.input.path().display()))?;
    progress.loading_pb.finish_with_message("Loading complete");

    let engine = ValidationEngine::new(&feed, config.clone());
    let findings = engine
        .validate_all_with_progress(&progress)
        .context("feed failed integrity checks")?;
    progress
        .validation_pb
        .finish_with_message("Validation complete");
    let elapsed = started_at.elapsed();

    let mut summary_context = ReportSummaryContext::new()
        .with_feed_input(resolved.input.path())
        .with_output_path(&args.output)
        .with_validation_time_seconds(elapsed.as_secs_f64())
        .with_validator_version(env!("CARGO_PKG_VERSION"))
        .with_threads(args.threads)
        .with_config(&config)
        .with_statistics(engine.statistics());
    if let Some(url) = resolved.feed_input_uri.as_deref() {
        summary_context = summary_context.with_feed_input_uri(url);
    }
    let summary = ReportSummary::from_context(summary_context);
    let report = ValidationReport::from_report_with_summary(&findings, summary);

    if let Some(parent) = args.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    report.write_json_with_format(&args.output, args.pretty)?;
    if let Some(html_path) = &args.html_report {
        write_html_report(
            html_path,
            &report,
            &HtmlReportContext::new(resolved.source_label.clone()),
        )?;
        info!("html report written to {}", html_path.display());
    }

    let counts = report.summary.counts;
    info!(
        "{} findings ({} errors, {} warnings) in {:.2}s, report written to {}",
        counts.total,
        counts.errors,
        counts.warnings,
        elapsed.as_secs_f64(),
        args.output.display()
    );

    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<ValidationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            ValidationConfig::from_json(&data)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => ValidationConfig::default(),
    };
    if let Some(buffer) = args.buffer_distance {
        config.buffer_distance_meters = buffer;
    }
    if let Some(multiplier) = args.distance_multiplier {
        config.distance_multiplier = multiplier;
    }
    if let Some(distance) = args.stop_shape_distance {
        config.stop_shape_distance_meters = distance;
    }
    if let Some(policy) = args.service_date_policy {
        config.service_date_policy = policy.into();
    }

    for (flag, value) in [
        ("buffer distance", config.buffer_distance_meters),
        ("distance multiplier", config.distance_multiplier),
        ("stop shape distance", config.stop_shape_distance_meters),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("{} must be a non-negative number, got {}", flag, value);
        }
    }
    Ok(config)
}

struct ResolvedInput {
    input: GtfsInput,
    feed_input_uri: Option<String>,
    source_label: String,
    _downloaded: Option<DownloadedFile>,
}

/// Removes a downloaded archive when the run ends, on success or failure.
struct DownloadedFile {
    path: PathBuf,
}

impl Drop for DownloadedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("could not remove {}: {}", self.path.display(), err),
        }
    }
}

fn resolve_input(args: &Args) -> anyhow::Result<ResolvedInput> {
    match (&args.input, &args.url) {
        (Some(_), Some(_)) => {
            bail!("--input and --url cannot be provided at the same time");
        }
        (None, None) => {
            bail!("one of --input or --url must be provided");
        }
        (Some(path), None) => {
            let input = GtfsInput::from_path(path)
                .with_context(|| format!("load input {}", path.display()))?;
            Ok(ResolvedInput {
                input,
                feed_input_uri: None,
                source_label: path.display().to_string(),
                _downloaded: None,
            })
        }
        (None, Some(url)) => {
            if url.trim().is_empty() {
                bail!("--url must not be empty");
            }
            let download_path = std::env::temp_dir().join(format!(
                "feedlint_download_{}_{}.zip",
                std::process::id(),
                unique_suffix()
            ));
            let downloaded = DownloadedFile {
                path: download_path,
            };
            download_url_to_path(url, &downloaded.path)?;
            let input = GtfsInput::from_path(&downloaded.path)
                .with_context(|| format!("load input {}", downloaded.path.display()))?;
            Ok(ResolvedInput {
                input,
                feed_input_uri: Some(url.clone()),
                source_label: url.clone(),
                _downloaded: Some(downloaded),
            })
        }
    }
}

fn download_url_to_path(url: &str, path: &Path) -> anyhow::Result<()> {
    let client = Client::builder()
        .user_agent(format!("feedlint/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")?;
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("download feed from {}", url))?
        .error_for_status()
        .with_context(|| format!("download feed from {}", url))?;
    let mut file =
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    std::io::copy(&mut response, &mut file).with_context(|| format!("write {}", path.display()))?;
    info!("downloaded {} to {}", url, path.display());
    Ok(())
}

fn unique_suffix() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

struct IndicatifHandler {
    _multi: MultiProgress,
    loading_pb: ProgressBar,
    validation_pb: ProgressBar,
}

impl IndicatifHandler {
    fn new(hidden: bool) -> Self {
        let multi = MultiProgress::new();
        let make_bar = |template: &str, waiting: &'static str| {
            let bar = if hidden {
                ProgressBar::hidden()
            } else {
                multi.add(ProgressBar::new(0))
            };
            if let Ok(style) = ProgressStyle::with_template(template) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar.set_message(waiting);
            bar
        };

        let loading_pb = make_bar(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {percent}% {msg}",
            "Waiting to load files...",
        );
        let validation_pb = make_bar(
            "{spinner:.green} [{elapsed_precise}] {bar:40.magenta/magenta} {percent}% {msg}",
            "Waiting to validate...",
        );

        Self {
            _multi: multi,
            loading_pb,
            validation_pb,
        }
    }
}

impl ProgressHandler for IndicatifHandler {
    fn on_start_file_load(&self, file: &str) {
        self.loading_pb.set_message(format!("Loading {}", file));
    }

    fn on_finish_file_load(&self, file: &str, loaded: bool) {
        if !loaded {
            self.loading_pb.set_message(format!("Failed to load {}", file));
        }
        self.loading_pb.inc(1);
    }

    fn on_start_validation(&self, validator_name: &str) {
        self.validation_pb
            .set_message(format!("Running {}", validator_name));
    }

    fn on_finish_validation(&self, validator_name: &str, findings: usize) {
        if findings > 0 {
            self.validation_pb
                .println(format!("{}: {} findings", validator_name, findings));
        }
        self.validation_pb.inc(1);
    }

    fn set_total_files(&self, count: usize) {
        self.loading_pb.set_length(count as u64);
        self.loading_pb.set_message("Starting load...");
    }

    fn set_total_validators(&self, count: usize) {
        self.validation_pb.set_length(count as u64);
        self.validation_pb.set_message("Starting validation...");
    }
}
