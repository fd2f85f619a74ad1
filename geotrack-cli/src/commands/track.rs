//! Track command - run a tracking session against a simulated device.
//!
//! The device performs a random walk from `--lat/--lon`. Permissions and
//! settings are either scripted by flags or asked at the terminal. Samples
//! print as they arrive, tagged with the path that delivered them, until
//! `--duration` elapses, Ctrl-C is pressed, or tracking fails to start.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use geotrack::config::{config_file_path, format_duration, parse_duration, ConfigFile};
use geotrack::logging::init_logging;
use geotrack::simulation::{ScriptedPermissions, ScriptedSettings, SimulatedProvider};
use geotrack::tracking::{
    AccuracyTier, Granularity, LocationListener, LocationSample, LocationTracker,
    PermissionCollaborator, ResolutionToken, SampleSource, SettingsCollaborator, SettingsError,
    SettingsOutcome, TrackerCollaborators, TrackingConfig, TrackingError, MAX_UPDATE_INTERVAL,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::prompt::{PromptingPermissions, PromptingSettings};
use crate::simulation::{run_driver, DriverConfig, RandomWalk};

/// How the permission prompt is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PermissionMode {
    /// Permissions are already held, no prompt
    Granted,
    /// Ask at the terminal
    Ask,
    /// Prompt is shown and granted
    Grant,
    /// Prompt is shown and denied
    Deny,
}

/// What the device settings check reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingsMode {
    /// Settings already meet the request
    Satisfied,
    /// A resolution (e.g. enabling GPS) is needed first
    Resolve,
    /// Settings cannot meet the request
    Unresolvable,
}

/// How a settings resolution is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionMode {
    /// Ask at the terminal
    Ask,
    /// Accept the resolution
    Accept,
    /// Decline the resolution
    Decline,
}

/// Arguments for the track command.
#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Update interval, also the watchdog period (e.g. 10s, 500ms)
    #[arg(long, value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Minimum distance between updates in meters
    #[arg(long)]
    pub distance: Option<f32>,

    /// Accuracy tier (high-accuracy, balanced, low-power)
    #[arg(long)]
    pub accuracy: Option<AccuracyTier>,

    /// Granularity (permission-level, coarse, fine)
    #[arg(long)]
    pub granularity: Option<Granularity>,

    /// Deliver the first update without waiting for an accurate fix
    #[arg(long)]
    pub no_wait_for_accurate: bool,

    /// Start latitude of the simulated device
    #[arg(long, default_value_t = 52.52, allow_negative_numbers = true)]
    pub lat: f64,

    /// Start longitude of the simulated device
    #[arg(long, default_value_t = 13.405, allow_negative_numbers = true)]
    pub lon: f64,

    /// Seed for a reproducible walk
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fixes per push batch
    #[arg(long, default_value_t = 1)]
    pub batch: usize,

    /// Stop pushing after this many batches (the watchdog keeps delivering)
    #[arg(long)]
    pub stall_after: Option<u64>,

    /// Stop after this long (e.g. 60s, 2m); runs until Ctrl-C otherwise
    #[arg(long, value_parser = parse_positive)]
    pub duration: Option<Duration>,

    /// How the permission prompt is answered
    #[arg(long, value_enum, default_value = "granted")]
    pub permission: PermissionMode,

    /// What the settings check reports
    #[arg(long, value_enum, default_value = "satisfied")]
    pub settings: SettingsMode,

    /// How a settings resolution is answered
    #[arg(long, value_enum, default_value = "ask")]
    pub resolution: ResolutionMode,

    /// Print samples as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Config file (default: ~/.geotrack/config.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_positive(s: &str) -> Result<Duration, String> {
    let duration = parse_duration(s).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("must be greater than zero".to_string());
    }
    Ok(duration)
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let duration = parse_positive(s)?;
    if duration > MAX_UPDATE_INTERVAL {
        return Err(format!("must be at most {}", format_duration(MAX_UPDATE_INTERVAL)));
    }
    Ok(duration)
}

impl TrackArgs {
    /// Overlay command-line flags on the config file's tracking section.
    fn tracking_config(&self, base: TrackingConfig) -> TrackingConfig {
        let mut config = base;
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(distance) = self.distance {
            config.min_distance_meters = distance;
        }
        if let Some(accuracy) = self.accuracy {
            config.accuracy = accuracy;
        }
        if let Some(granularity) = self.granularity {
            config.granularity = granularity;
        }
        if self.no_wait_for_accurate {
            config.wait_for_accurate_fix = false;
        }
        config
    }
}

/// Samples delivered per path.
#[derive(Default)]
struct SampleCounts {
    push: AtomicU64,
    poll: AtomicU64,
}

impl SampleCounts {
    fn record(&self, source: SampleSource) {
        let counter = match source {
            SampleSource::Push => &self.push,
            SampleSource::Poll => &self.poll,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Prints samples and forwards terminal failures to the session loop.
struct PrintListener {
    json: bool,
    counts: Arc<SampleCounts>,
    failures: mpsc::UnboundedSender<TrackingError>,
}

impl LocationListener for PrintListener {
    fn on_location(&self, sample: &LocationSample) {
        self.counts.record(sample.source);
        if self.json {
            match serde_json::to_string(sample) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to encode sample"),
            }
        } else {
            println!("{}", format_sample(sample));
        }
    }

    fn on_tracking_failed(&self, error: &TrackingError) {
        let _ = self.failures.send(error.clone());
    }
}

fn format_sample(sample: &LocationSample) -> String {
    format!(
        "[{}] {:>10.6}, {:>11.6}  ±{:.1} m  {}",
        sample.source,
        sample.latitude,
        sample.longitude,
        sample.accuracy_meters,
        sample.timestamp.format("%H:%M:%S%.3f"),
    )
}

fn permission_collaborator(mode: PermissionMode) -> Arc<dyn PermissionCollaborator> {
    match mode {
        PermissionMode::Granted => Arc::new(ScriptedPermissions::granted()),
        PermissionMode::Ask => Arc::new(PromptingPermissions::new()),
        PermissionMode::Grant => Arc::new(ScriptedPermissions::unknown().grant_on_request(true)),
        PermissionMode::Deny => Arc::new(ScriptedPermissions::unknown().grant_on_request(false)),
    }
}

fn settings_collaborator(
    settings: SettingsMode,
    resolution: ResolutionMode,
) -> Arc<dyn SettingsCollaborator> {
    let checks = match settings {
        SettingsMode::Satisfied => ScriptedSettings::satisfied(),
        SettingsMode::Resolve => ScriptedSettings::satisfied().then(
            SettingsOutcome::ResolutionRequired(ResolutionToken::new("enable-high-accuracy")),
        ),
        SettingsMode::Unresolvable => ScriptedSettings::satisfied()
            .then(SettingsOutcome::Unresolvable(SettingsError::ChangeUnavailable)),
    };

    match resolution {
        ResolutionMode::Ask => Arc::new(PromptingSettings::new(checks)),
        ResolutionMode::Accept => Arc::new(checks.accept_resolution(true)),
        ResolutionMode::Decline => Arc::new(checks.accept_resolution(false)),
    }
}

/// Run the track command.
pub fn run(args: TrackArgs) -> Result<(), CliError> {
    let config_path = args.config.clone().unwrap_or_else(config_file_path);
    let file = ConfigFile::load_from(&config_path)?;
    let tracking = args.tracking_config(file.tracking.clone());
    tracking
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let _logging = init_logging(&file.logging.directory, &file.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    tracing::info!(
        config = %config_path.display(),
        log = %file.logging.directory.join(&file.logging.file).display(),
        "Track session starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::RuntimeCreation)?;

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    ctrlc::set_handler(move || {
        signal.cancel();
    })
    .map_err(|e| CliError::SignalHandler(e.to_string()))?;

    if !args.json {
        println!("geotrack v{}", env!("CARGO_PKG_VERSION"));
        println!("=============");
        println!();
        println!("Start:       {:.6}, {:.6}", args.lat, args.lon);
        println!("Interval:    {}", format_duration(tracking.interval));
        println!("Distance:    {} m", tracking.min_distance_meters);
        println!("Accuracy:    {}", tracking.accuracy);
        println!("Granularity: {}", tracking.granularity);
        println!();
        println!("Press Ctrl+C to stop");
        println!();
    }

    let counts = runtime.block_on(run_session(&args, tracking, cancel))?;

    if !args.json {
        println!();
        println!("Session Summary");
        println!("───────────────");
        println!("  Push samples: {}", counts.push.load(Ordering::Relaxed));
        println!("  Poll samples: {}", counts.poll.load(Ordering::Relaxed));
    }
    Ok(())
}

async fn run_session(
    args: &TrackArgs,
    tracking: TrackingConfig,
    cancel: CancellationToken,
) -> Result<Arc<SampleCounts>, CliError> {
    let provider = Arc::new(SimulatedProvider::new());
    let tracker = LocationTracker::new(
        tracking.clone(),
        TrackerCollaborators {
            permissions: permission_collaborator(args.permission),
            settings: settings_collaborator(args.settings, args.resolution),
            provider: provider.clone(),
        },
    )?;

    let counts = Arc::new(SampleCounts::default());
    let (failure_tx, mut failures) = mpsc::unbounded_channel();
    tracker.register(PrintListener {
        json: args.json,
        counts: counts.clone(),
        failures: failure_tx,
    });

    let driver = tokio::spawn(run_driver(
        provider,
        RandomWalk::new(args.lat, args.lon, args.seed),
        DriverConfig {
            interval: tracking.interval,
            batch: args.batch,
            stall_after: args.stall_after,
        },
        cancel.clone(),
    ));

    tracker.start();

    let deadline = async {
        match args.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("Interrupted");
            Ok(())
        }
        _ = deadline => Ok(()),
        Some(error) = failures.recv() => Err(error),
    };

    tracker.stop();
    cancel.cancel();
    if let Err(e) = driver.await {
        tracing::warn!(error = %e, "Simulated device task failed");
    }

    outcome?;
    Ok(counts)
}
