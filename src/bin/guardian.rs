//! Guardian CLI - Command-line interface for Guardian SOS
//!
//! Commands:
//! - sos: Send a manual SOS for a session file
//! - replay: Run a recorded motion trace through drop detection
//! - history: List alerts received by a user
//! - resolve: Mark a received alert resolved
//! - users: List registered users
//! - test-email: Send a test e-mail to the session user
//! - doctor: Diagnose configuration and settings

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use guardian_sos::adapters::{FixedLocation, HttpBackend, NullRecorder, ReplaySensor};
use guardian_sos::schema::parse_motion_ndjson;
use guardian_sos::{
    Collaborators, ContactBook, DetectorState, DropDetector, EmergencyContact,
    Location, Notice, Presenter, SafetyMonitor, SessionContext, Settings, SosConfig, SosError,
    SubmitError, UserProfile, VERSION,
};

/// Guardian - Drop detection and SOS alerts
#[derive(Parser)]
#[command(name = "guardian")]
#[command(version = VERSION)]
#[command(about = "Drop detection and emergency alert dispatch", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a manual SOS
    Sos {
        /// Session file with user, location and contacts
        #[arg(short, long)]
        session: PathBuf,

        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run a recorded motion trace through drop detection
    Replay {
        /// NDJSON motion recording (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Send a drop SOS for this session when a detection is not cancelled
        #[arg(long)]
        dispatch: Option<PathBuf>,

        /// Sample interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// List alerts received by a user
    History {
        #[arg(long)]
        user_id: u64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a received alert resolved
    Resolve {
        #[arg(long)]
        alert_id: u64,
    },

    /// List registered users
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a test e-mail to the session user
    TestEmail {
        #[arg(short, long)]
        session: PathBuf,

        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Diagnose configuration and settings
    Doctor {
        /// Check a settings file
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{}", report);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), GuardianCliError> {
    // Doctor reports a broken config instead of failing on it
    if let Commands::Doctor { settings, json } = &cli.command {
        return cmd_doctor(cli.config.as_deref(), settings.as_deref(), *json);
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sos { session, yes } => cmd_sos(config, &session, yes).await,
        Commands::Replay {
            input,
            dispatch,
            interval_ms,
        } => cmd_replay(config, &input, dispatch.as_deref(), interval_ms).await,
        Commands::History { user_id, json } => cmd_history(config, user_id, json).await,
        Commands::Resolve { alert_id } => cmd_resolve(config, alert_id).await,
        Commands::Users { json } => cmd_users(config, json).await,
        Commands::TestEmail { session, yes } => cmd_test_email(config, &session, yes).await,
        Commands::Doctor { .. } => Ok(()),
    }
}

fn load_config(path: Option<&Path>) -> Result<SosConfig, GuardianCliError> {
    let config = match path {
        Some(path) => SosConfig::from_file(path)?,
        None => {
            let mut config = SosConfig::default();
            config.apply_env();
            config
        }
    };
    Ok(config)
}

/// On-disk session: who is sending, from where, to whom
#[derive(serde::Deserialize)]
struct SessionFile {
    user: Option<UserProfile>,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    contacts: Vec<EmergencyContact>,
}

impl SessionFile {
    fn load(path: &Path) -> Result<Self, GuardianCliError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn into_parts(self) -> (SessionContext, FixedLocation) {
        let location = match self.location {
            Some(location) => FixedLocation::new(location),
            None => FixedLocation::unavailable(),
        };
        let context = SessionContext::new(self.user, ContactBook::new(self.contacts));
        (context, location)
    }
}

fn build_monitor(
    config: SosConfig,
    session: SessionFile,
    sensor: ReplaySensor,
    presenter: TerminalPresenter,
) -> Result<SafetyMonitor, GuardianCliError> {
    let backend = HttpBackend::new(config.backend.clone())?;
    let (context, location) = session.into_parts();
    Ok(SafetyMonitor::new(
        config,
        context,
        Collaborators {
            sensor: Arc::new(sensor),
            recorder: Arc::new(NullRecorder),
            location: Arc::new(location),
            backend: Arc::new(backend),
            presenter: Arc::new(presenter),
        },
    ))
}

async fn cmd_sos(config: SosConfig, session: &Path, yes: bool) -> Result<(), GuardianCliError> {
    let session = SessionFile::load(session)?;
    let monitor = build_monitor(
        config,
        session,
        ReplaySensor::new(Vec::new()),
        TerminalPresenter::new(yes),
    )?;
    monitor.start().await?;

    let outcome = monitor.trigger_manual_sos().await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_replay(
    mut config: SosConfig,
    input: &Path,
    dispatch: Option<&Path>,
    interval_ms: Option<u64>,
) -> Result<(), GuardianCliError> {
    if let Some(ms) = interval_ms {
        config.sample_interval_ms = ms;
        config.validate()?;
    }

    let content = read_input(input)?;
    let records = parse_motion_ndjson(&content)?;
    if records.is_empty() {
        return Err(GuardianCliError::NoSamples);
    }

    match dispatch {
        None => replay_dry(&config, records),
        Some(session) => {
            let session = SessionFile::load(session)?;
            replay_live(config, records, session).await
        }
    }
}

#[derive(serde::Serialize)]
struct Detection {
    index: usize,
    delta: f64,
    detected_at: chrono::DateTime<chrono::Utc>,
}

/// Detector pass without timers; every detection is treated as cancelled
fn replay_dry(
    config: &SosConfig,
    records: Vec<guardian_sos::schema::MotionRecord>,
) -> Result<(), GuardianCliError> {
    let mut detector = DropDetector::new(config.drop_threshold);
    let start = chrono::Utc::now();
    let interval = chrono::Duration::milliseconds(config.sample_interval_ms as i64);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut detections = 0usize;

    for (index, record) in records.into_iter().enumerate() {
        let fallback = start + interval * index as i32;
        if let Some(event) = detector.observe(record.into_sample(fallback)) {
            detections += 1;
            let line = serde_json::to_string(&Detection {
                index,
                delta: event.delta,
                detected_at: event.detected_at,
            })?;
            writeln!(out, "{}", line)?;
            detector.cancel(event.id);
        }
    }

    out.flush()?;
    eprintln!("{} drop detection(s)", detections);
    Ok(())
}

/// Feed the trace at its cadence through the full pipeline and wait for any
/// resulting SOS to finish
async fn replay_live(
    config: SosConfig,
    records: Vec<guardian_sos::schema::MotionRecord>,
    session: SessionFile,
) -> Result<(), GuardianCliError> {
    let monitor = build_monitor(
        config,
        session,
        ReplaySensor::new(records),
        TerminalPresenter::new(true),
    )?;
    monitor.start().await?;
    monitor.set_drop_detection(true)?;

    let poll = Duration::from_millis(100);
    loop {
        tokio::time::sleep(poll).await;
        let feed_done = !monitor.drop_detection_active();
        let idle = monitor.drop_state() == DetectorState::Idle;
        if feed_done && idle && !monitor.dispatcher().is_in_flight() {
            break;
        }
    }

    monitor.shutdown();
    Ok(())
}

async fn cmd_history(config: SosConfig, user_id: u64, json: bool) -> Result<(), GuardianCliError> {
    let backend = HttpBackend::new(config.backend)?;
    let history = backend.alert_history(user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    let summary = history.summary();
    println!("Active: {}  Resolved: {}", summary.active, summary.resolved);
    for alert in &history.alerts {
        println!(
            "  #{} [{}] {} at {} ({})",
            alert.id,
            if alert.is_active() { "active" } else { "resolved" },
            alert.describe(),
            alert.created_at.as_deref().unwrap_or("unknown time"),
            alert.map_url()
        );
    }
    Ok(())
}

async fn cmd_resolve(config: SosConfig, alert_id: u64) -> Result<(), GuardianCliError> {
    let backend = HttpBackend::new(config.backend)?;
    backend.resolve_alert(alert_id).await?;
    println!("{}", Notice::AlertResolved.message());
    Ok(())
}

async fn cmd_users(config: SosConfig, json: bool) -> Result<(), GuardianCliError> {
    let backend = HttpBackend::new(config.backend)?;
    let users = backend.fetch_users().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else {
        for user in &users {
            println!(
                "  {:>4}  {}  <{}>",
                user.id,
                user.name,
                user.email.as_deref().unwrap_or("no e-mail")
            );
        }
    }
    Ok(())
}

async fn cmd_test_email(
    config: SosConfig,
    session: &Path,
    yes: bool,
) -> Result<(), GuardianCliError> {
    let session = SessionFile::load(session)?;
    let monitor = build_monitor(
        config,
        session,
        ReplaySensor::new(Vec::new()),
        TerminalPresenter::new(yes),
    )?;

    if !monitor.send_test_email().await? {
        return Err(GuardianCliError::NotSent);
    }
    Ok(())
}

fn cmd_doctor(
    config_path: Option<&Path>,
    settings_path: Option<&Path>,
    json: bool,
) -> Result<(), GuardianCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "guardian_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Guardian version {}", VERSION),
    });

    // Configuration
    let config = match config_path {
        Some(path) => match SosConfig::from_file(path) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Configuration valid ({})", path.display()),
                });
                Some(config)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid configuration: {}", e),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "No configuration file, using defaults".to_string(),
            });
            let mut config = SosConfig::default();
            config.apply_env();
            Some(config)
        }
    };

    if let Some(config) = &config {
        checks.push(DoctorCheck {
            name: "drop_detection".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Threshold {} every {} ms, {} s to cancel",
                config.drop_threshold, config.sample_interval_ms, config.confirmation_window_secs
            ),
        });

        let backend_check = match reqwest::Url::parse(&config.backend.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => DoctorCheck {
                name: "backend".to_string(),
                status: if url.scheme() == "https" {
                    CheckStatus::Ok
                } else {
                    CheckStatus::Warning
                },
                message: format!("Backend at {}", url),
            },
            Ok(url) => DoctorCheck {
                name: "backend".to_string(),
                status: CheckStatus::Error,
                message: format!("Unsupported backend scheme: {}", url.scheme()),
            },
            Err(e) => DoctorCheck {
                name: "backend".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid backend URL: {}", e),
            },
        };
        checks.push(backend_check);
    }

    // Settings file if provided
    if let Some(path) = settings_path {
        let check = if !path.exists() {
            DoctorCheck {
                name: "settings".to_string(),
                status: CheckStatus::Warning,
                message: "Settings file does not exist, drop detection starts disabled".to_string(),
            }
        } else {
            match Settings::load(path) {
                Ok(settings) => DoctorCheck {
                    name: "settings".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Drop detection {}",
                        if settings.drop_detection_enabled { "enabled" } else { "disabled" }
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "settings".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read settings: {}", e),
                },
            }
        };
        checks.push(check);
    }

    // Prompts need a terminal
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (prompts available)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is not a TTY (prompts decline unless --yes)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Guardian Doctor Report");
        println!("======================");
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GuardianCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String, GuardianCliError> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Prints notices to stderr and asks questions on the terminal
struct TerminalPresenter {
    assume_yes: bool,
}

impl TerminalPresenter {
    fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    async fn ask(&self, question: String) -> bool {
        if self.assume_yes {
            return true;
        }
        if !atty::is(atty::Stream::Stdin) {
            eprintln!("{} [no terminal, declining]", question);
            return false;
        }

        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{} [y/N] ", question);
            let _ = io::stderr().flush();
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

#[async_trait]
impl Presenter for TerminalPresenter {
    fn notify(&self, notice: Notice) {
        eprintln!("[{}] {}", notice.title(), notice.message());
    }

    async fn confirm_sos(&self) -> bool {
        self.ask(
            "Are you sure you want to send an emergency alert to all your contacts?".to_string(),
        )
        .await
    }

    async fn confirm_without_email(&self) -> bool {
        self.ask(
            "None of your emergency contacts have valid email addresses. \
             They will not receive email alerts. Continue anyway?"
                .to_string(),
        )
        .await
    }

    async fn confirm_test_email(&self, email: &str) -> bool {
        self.ask(format!("Send a test email to {}?", email)).await
    }

    fn open_contacts(&self) {
        eprintln!("Add emergency contacts to the session file and try again.");
    }
}

#[derive(Debug)]
enum GuardianCliError {
    Io(io::Error),
    Sos(SosError),
    Submit(SubmitError),
    Json(serde_json::Error),
    NoSamples,
    NotSent,
    DoctorFailed,
}

impl From<io::Error> for GuardianCliError {
    fn from(e: io::Error) -> Self {
        GuardianCliError::Io(e)
    }
}

impl From<SosError> for GuardianCliError {
    fn from(e: SosError) -> Self {
        GuardianCliError::Sos(e)
    }
}

impl From<SubmitError> for GuardianCliError {
    fn from(e: SubmitError) -> Self {
        GuardianCliError::Submit(e)
    }
}

impl From<serde_json::Error> for GuardianCliError {
    fn from(e: serde_json::Error) -> Self {
        GuardianCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

fn submit_error(e: SubmitError) -> CliError {
    let (code, hint) = match &e {
        SubmitError::Rejected { .. } => ("SERVER_ERROR", "The backend refused the request"),
        SubmitError::Connectivity(_) => {
            ("NETWORK_ERROR", "Check your connection and the backend URL")
        }
        SubmitError::Unexpected(_) => ("SEND_FAILED", "Retry; report if it persists"),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

impl From<GuardianCliError> for CliError {
    fn from(e: GuardianCliError) -> Self {
        match e {
            GuardianCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GuardianCliError::Sos(SosError::Submission(e)) | GuardianCliError::Submit(e) => {
                submit_error(e)
            }
            GuardianCliError::Sos(
                e @ (SosError::MissingUser | SosError::MissingLocation | SosError::NoContacts),
            ) => CliError {
                code: "NOT_READY".to_string(),
                message: e.to_string(),
                hint: Some("Session needs a user, a location and at least one contact".to_string()),
            },
            GuardianCliError::Sos(e @ SosError::Config(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'guardian doctor' for details".to_string()),
            },
            GuardianCliError::Sos(e) => CliError {
                code: "SOS_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            GuardianCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GuardianCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No motion samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            GuardianCliError::NotSent => CliError {
                code: "NOT_SENT".to_string(),
                message: "Nothing was sent".to_string(),
                hint: None,
            },
            GuardianCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

