//! idle-detector CLI
//!
//! Idle-stage notifications for macOS.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use idle_detector::{
    agent::LaunchAgent,
    config::Config,
    core::{human_readable, Stage, StageDecision, StageEngine},
    machine::{host_description, Machine, MetricsSource, ScriptedSource},
    notifier::{
        worker::DEFAULT_QUEUE_CAPACITY, ConsoleDispatcher, DispatchWorker, Dispatcher,
        Notification, TerminalNotifier,
    },
    runner::{sync_pause_flag, Clock, RunLoop, RunSummary},
    session::create_shared_stats,
    HOMEPAGE, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idle-detector")]
#[command(author = "Yousef Abuzahrieh")]
#[command(version = VERSION)]
#[command(about = "Idle-stage notifications for macOS", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring idle stages
    Start(StartArgs),

    /// Pause detection in a running agent
    Pause,

    /// Resume detection in a running agent
    Resume,

    /// Show host support, configuration and the current stage
    Status,

    /// Show configuration
    Config,

    /// Replay a JSON array of snapshots and print each decision
    Simulate {
        /// File holding the snapshots
        file: PathBuf,

        /// Simulated seconds between snapshots (defaults to the poll interval)
        #[arg(long)]
        step: Option<u64>,
    },

    /// Send a test notification
    TestNotification,

    /// Remove delivered notifications
    Clear {
        /// Only remove notifications of this stage (e.g. `wake`)
        #[arg(long)]
        stage: Option<String>,
    },

    /// List delivered notifications
    Notifications,

    /// Install and start the LaunchAgent
    InstallAgent,

    /// Stop and remove the LaunchAgent
    UninstallAgent,
}

#[derive(Args, Debug, Default)]
struct StartArgs {
    /// Render durations as `5m 30s`
    #[arg(long)]
    compact_time: bool,

    /// Group notifications by stage in the notification center
    #[arg(long)]
    group_notifications: bool,

    /// Treat a running screensaver as display off
    #[arg(long)]
    consider_screensaver_as_off: bool,

    /// Respect Do Not Disturb
    #[arg(long)]
    honor_dnd: bool,

    /// Seconds used when neither screensaver nor display sleep is configured (0 disables)
    #[arg(long, short = 'c')]
    custom_idle_time: Option<u64>,

    /// Seconds between polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Seconds before the screensaver to send the pre-alert
    #[arg(long)]
    pre_alert_lead: Option<u64>,

    /// Idle seconds below which the user counts as active
    #[arg(long)]
    wake_floor: Option<u64>,

    /// Print notifications instead of sending them
    #[arg(long)]
    dry_run: bool,
}

impl StartArgs {
    fn apply(&self, config: &mut Config) {
        if self.compact_time {
            config.notifications.compact_time = true;
        }
        if self.group_notifications {
            config.notifications.group_notifications = true;
        }
        if self.consider_screensaver_as_off {
            config.consider_screensaver_as_off = true;
        }
        if self.honor_dnd {
            config.notifications.ignore_dnd = false;
        }
        if let Some(secs) = self.custom_idle_time {
            config.idle_interval_if_no_modes_are_set =
                Some(Duration::from_secs(secs)).filter(|d| !d.is_zero());
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.pre_alert_lead {
            config.pre_alert_lead = Duration::from_secs(secs);
        }
        if let Some(secs) = self.wake_floor {
            config.wake_floor = Duration::from_secs(secs);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Start(args) => cmd_start(args),
        Commands::Pause => cmd_set_paused(true),
        Commands::Resume => cmd_set_paused(false),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
        Commands::Simulate { file, step } => cmd_simulate(&file, step),
        Commands::TestNotification => cmd_test_notification(),
        Commands::Clear { stage } => cmd_clear(stage.as_deref()),
        Commands::Notifications => cmd_notifications(),
        Commands::InstallAgent => cmd_install_agent(),
        Commands::UninstallAgent => cmd_uninstall_agent(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `IDLE_DETECTOR_LOG`.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "idle_detector=debug"
    } else {
        "idle_detector=info"
    };
    let filter = EnvFilter::try_from_env("IDLE_DETECTOR_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(args: StartArgs) -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    args.apply(&mut config);
    config.validate()?;
    config
        .ensure_directories()
        .context("Failed to create data directories")?;

    println!("idle-detector v{VERSION}");
    println!();

    let machine = Machine::probe()?;
    let dispatcher: Box<dyn Dispatcher> = if args.dry_run {
        Box::new(ConsoleDispatcher::new())
    } else {
        Box::new(TerminalNotifier::locate()?)
    };

    let stats = create_shared_stats();
    let worker = DispatchWorker::spawn(dispatcher, DEFAULT_QUEUE_CAPACITY, stats.clone())?;

    if config.paused {
        println!("Detection is currently paused.");
        println!("Run `idle-detector resume` to start detecting.");
        println!();
    }
    println!("Press Ctrl+C to stop.");

    let cancel = CancellationToken::new();
    ctrlc_handler(cancel.clone())?;
    let paused = Arc::new(AtomicBool::new(config.paused));

    let run_loop =
        RunLoop::new(machine, &config, worker, stats.clone()).with_pause_flag(paused.clone());
    let summary = block_on(async {
        let watcher = tokio::spawn(sync_pause_flag(
            Config::config_path(),
            paused,
            Duration::from_secs(1),
            cancel.clone(),
        ));
        let summary = run_loop.run(cancel.clone()).await;
        cancel.cancel();
        let _ = watcher.await;
        summary
    })?;

    print_summary(&summary, &stats.summary());
    Ok(())
}

fn cmd_set_paused(paused: bool) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.paused = paused;
    config.save().context("Error saving config")?;

    if paused {
        println!("Detection paused. Use 'idle-detector resume' to continue.");
    } else {
        println!("Detection resumed.");
    }
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("idle-detector Status");
    println!("====================");
    println!();
    println!("Version: {VERSION}");
    println!("Host: {}", host_description());

    let machine = Machine::probe();
    match &machine {
        Ok(m) => println!("Supported: yes (macOS {}.{})", m.version().0, m.version().1),
        Err(e) => println!("Supported: no ({e})"),
    }

    match TerminalNotifier::locate() {
        Ok(notifier) => println!(
            "terminal-notifier: {} ({})",
            notifier.version().unwrap_or_else(|_| "unknown version".into()),
            notifier.binary().display()
        ),
        Err(e) => println!("terminal-notifier: missing ({e})"),
    }

    let agent = LaunchAgent::for_current_exe(&config)?;
    println!(
        "LaunchAgent: {}",
        if agent.is_installed() {
            "installed"
        } else {
            "not installed"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Poll interval: {}s", config.poll_interval.as_secs());
    println!(
        "  Fallback idle interval: {}",
        config
            .idle_interval_if_no_modes_are_set
            .map(|d| human_readable(d, true))
            .unwrap_or_else(|| "disabled".into())
    );
    println!("  Pre-alert lead: {}s", config.pre_alert_lead.as_secs());
    println!("  Wake floor: {}s", config.wake_floor.as_secs());
    println!("  Screensaver counts as off: {}", config.consider_screensaver_as_off);
    println!("  Group notifications: {}", config.notifications.group_notifications);
    println!("  Ignore Do Not Disturb: {}", config.notifications.ignore_dnd);
    println!("  Paused: {}", config.paused);
    println!();

    if let Ok(mut machine) = machine {
        match machine.snapshot() {
            Some(snapshot) => {
                let mut engine = StageEngine::new(config.engine_config());
                let decision = engine.evaluate(&snapshot);
                println!("Current reading:");
                print_decision_details(&decision, config.notifications.compact_time);
            }
            None => println!("Current reading: idle time unavailable"),
        }
    }

    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_simulate(file: &Path, step: Option<u64>) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let source = ScriptedSource::from_file(file)?;
    let step = step
        .map(Duration::from_secs)
        .unwrap_or(config.poll_interval)
        .max(Duration::from_secs(1));

    println!("Replaying {} snapshot(s) from {:?}", source.remaining(), file);
    println!();

    let stats = create_shared_stats();
    let worker =
        DispatchWorker::spawn(ConsoleDispatcher::new(), DEFAULT_QUEUE_CAPACITY, stats.clone())?;
    let cancel = CancellationToken::new();
    ctrlc_handler(cancel.clone())?;

    let compact = config.notifications.compact_time;
    let mut cycle = 0u64;
    let run_loop = RunLoop::new(source, &config, worker, stats.clone())
        .with_pause_flag(Arc::new(AtomicBool::new(false)))
        .with_clock(
            Clock::Simulated {
                next: chrono::Utc::now(),
                step,
            },
            Duration::from_millis(1),
        )
        .with_observer(move |decision| {
            cycle += 1;
            println!(
                "{:>4}  idle {:>10}  {:<16} {}",
                cycle,
                human_readable(decision.idle, compact),
                decision.stage.display_name(),
                if decision.is_transition {
                    format!("<- {}", decision.previous.display_name())
                } else {
                    String::new()
                }
            );
        });

    let summary = block_on(run_loop.run(cancel))?;
    print_summary(&summary, &stats.summary());
    Ok(())
}

fn cmd_test_notification() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let mut notifier = TerminalNotifier::locate()?;
    notifier.dispatch(&Notification::test(config.notifications.ignore_dnd))?;
    println!("Test notification sent.");
    Ok(())
}

fn cmd_clear(stage: Option<&str>) -> anyhow::Result<()> {
    let group = match stage {
        Some(key) => match Stage::from_key(key) {
            Some(stage) => Some(stage.key()),
            None => {
                let known: Vec<&str> = Stage::ALL.iter().map(|s| s.key()).collect();
                bail!("Unknown stage {key:?}; expected one of: {}", known.join(", "));
            }
        },
        None => None,
    };

    let notifier = TerminalNotifier::locate()?;
    notifier.remove(group)?;
    match group {
        Some(group) => println!("Cleared {group} notifications."),
        None => println!("Cleared all notifications."),
    }
    Ok(())
}

fn cmd_notifications() -> anyhow::Result<()> {
    let notifier = TerminalNotifier::locate()?;
    let delivered = notifier.list()?;

    if delivered.is_empty() {
        println!("No delivered notifications.");
        return Ok(());
    }

    println!("{} delivered notification(s):", delivered.len());
    for notification in delivered {
        let when = notification
            .delivered_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  [{}] {} - {}: {}",
            when,
            notification.group,
            notification.subtitle,
            notification.message.replace('\n', " | ")
        );
    }
    Ok(())
}

fn cmd_install_agent() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let agent = LaunchAgent::for_current_exe(&config)?;
    agent.install()?;

    println!("LaunchAgent installed at {:?}", agent.plist_path());
    println!("Logs: {:?}", agent.stdout_log());
    Ok(())
}

fn cmd_uninstall_agent() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let agent = LaunchAgent::for_current_exe(&config)?;
    agent.uninstall()?;

    println!("LaunchAgent removed.");
    Ok(())
}

fn print_decision_details(decision: &StageDecision, compact: bool) {
    let fmt = |d: Option<Duration>| {
        d.map(|d| human_readable(d, compact))
            .unwrap_or_else(|| "-".into())
    };
    println!("  Stage: {}", decision.stage.display_name());
    println!("  Idle: {}", human_readable(decision.idle, compact));
    println!("  Screensaver after: {}", fmt(decision.thresholds.screensaver));
    println!("  Display off after: {}", fmt(decision.thresholds.display_off));
    if decision.thresholds.fallback {
        println!("  (no modes set, using fallback interval)");
    }
    println!("  Next milestone in: {}", fmt(decision.until_next));
    println!("  Milestone timer: {}", fmt(decision.since_timer));
}

fn print_summary(summary: &RunSummary, stats_summary: &str) {
    println!();
    println!("Stopped ({:?}) in stage {}.", summary.reason, summary.final_stage.display_name());
    println!();
    println!("{stats_summary}");
    println!();
    println!("{HOMEPAGE}");
}

/// Run a future on a current-thread runtime.
fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    Ok(runtime.block_on(future))
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(cancel: CancellationToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        cancel.cancel();
    })
    .context("Error setting Ctrl+C handler")
}
