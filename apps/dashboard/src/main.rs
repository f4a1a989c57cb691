mod terminal;

use std::{io, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dashboard_core::{
    api::Reply, load_settings, ControllerApi, Dashboard, Preferences, Settings,
};
use serde_json::Value;
use shared::{
    domain::{format_recipe, parse_recipe, Motor, PrinterAction, PumpDirection, PumpId, Theme},
    protocol::{LogLevelRequest, LoggingConfig, NetworkConfig, PumpCommand, StartPrintRequest},
};
use terminal::TerminalSink;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const CONNECT_WAIT: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "dashboard", about = "Multi-material printer dashboard")]
struct Args {
    /// Settings file (defaults to ./dashboard.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured controller URL.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Surface background task failures as notices.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Connect and print the dashboard whenever it changes.
    Watch,
    /// Print the controller's status snapshot.
    Status,
    /// Run a pump motor for a number of seconds.
    Pump {
        motor: Motor,
        direction: PumpDirection,
        #[arg(default_value_t = 5)]
        duration: u32,
    },
    Printer {
        action: PrinterAction,
    },
    /// Start or stop the multi-material sequence.
    Mm {
        action: Toggle,
    },
    EmergencyStop,
    /// List the files on the printer.
    Files {
        /// Ask over the live channel instead of the REST endpoint.
        #[arg(long)]
        channel: bool,
    },
    Print {
        file: String,
    },
    Recipe {
        #[command(subcommand)]
        action: Option<RecipeCmd>,
    },
    Config {
        section: Section,
        /// JSON file to save instead of printing the current values.
        #[arg(long)]
        set: Option<PathBuf>,
    },
    TestConnection {
        printer_ip: Option<String>,
    },
    Logs {
        #[arg(long, default_value_t = dashboard_core::api::DEFAULT_RECENT_LOGS)]
        count: u32,
    },
    LogLevel {
        component: String,
        level: String,
    },
    Diagnostic {
        name: String,
    },
    Calibrate {
        pump: PumpArg,
    },
    Theme {
        theme: Option<Theme>,
    },
    /// Restart the print manager on the controller.
    Restart,
}

#[derive(Subcommand, Debug)]
enum RecipeCmd {
    Get,
    /// Replace the recipe with `A,50:B,120` style text.
    Set { text: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    Start,
    Stop,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Section {
    Pump,
    Network,
    Logging,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PumpArg {
    A,
    B,
    C,
    Drain,
}

impl From<PumpArg> for PumpId {
    fn from(value: PumpArg) -> Self {
        match value {
            PumpArg::A => PumpId::PumpA,
            PumpArg::B => PumpId::PumpB,
            PumpArg::C => PumpId::PumpC,
            PumpArg::Drain => PumpId::DrainPump,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref()).context("loading settings")?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    settings.debug_mode |= args.debug;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    run(args.command.unwrap_or(Cmd::Watch), &settings).await
}

async fn watch(settings: &Settings) -> Result<()> {
    let sink = TerminalSink::new(io::stdout());
    let (dashboard, handle) = Dashboard::connect(sink, settings).context("starting dashboard")?;
    let task = tokio::spawn(dashboard.run());
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    handle.shutdown().await;
    task.await.context("dashboard task")?;
    Ok(())
}

async fn files_over_channel(settings: &Settings) -> Result<()> {
    let (dashboard, handle) =
        Dashboard::connect(TerminalSink::new(io::sink()), settings).context("starting dashboard")?;
    let task = tokio::spawn(dashboard.run());

    let mut views = handle.views();
    tokio::time::timeout(
        CONNECT_WAIT,
        views.wait_for(|view| view.connection.badge.text.starts_with("Connected")),
    )
    .await
    .context("controller did not connect")?
    .context("dashboard stopped")?;

    let listing = handle.request_files().await;
    handle.shutdown().await;
    task.await.context("dashboard task")?;
    print_json(&listing.context("requesting printer files")?)
}

fn controller_api(settings: &Settings) -> Result<ControllerApi> {
    let server_url = settings.server_url().context("controller URL")?;
    Ok(ControllerApi::new(reqwest::Client::new(), &server_url))
}

fn preferences(settings: &Settings) -> Result<Preferences> {
    let path = match &settings.preferences_path {
        Some(path) => path.clone(),
        None => Preferences::default_path().context("locating preferences")?,
    };
    Ok(Preferences::load(path))
}

async fn run(command: Cmd, settings: &Settings) -> Result<()> {
    let api = match command {
        Cmd::Watch => return watch(settings).await,
        Cmd::Files { channel: true } => return files_over_channel(settings).await,
        Cmd::Theme { theme } => return set_theme(settings, theme),
        _ => controller_api(settings)?,
    };
    let api = &api;
    match command {
        Cmd::Status => print_json(&api.status().await?),
        Cmd::Pump {
            motor,
            direction,
            duration,
        } => {
            let command = PumpCommand::new(motor, direction, duration)?;
            print_reply(api.run_pump(&command).await?)
        }
        Cmd::Printer { action } => print_reply(api.printer_action(action).await?),
        Cmd::Mm { action: Toggle::Start } => print_reply(api.start_multi_material().await?),
        Cmd::Mm { action: Toggle::Stop } => print_reply(api.stop_multi_material().await?),
        Cmd::EmergencyStop => print_reply(api.emergency_stop().await?),
        Cmd::Files { .. } => print_json(&api.printer_files().await?),
        Cmd::Print { file } => print_reply(api.start_print(&StartPrintRequest::new(file)?).await?),
        Cmd::Recipe { action: None | Some(RecipeCmd::Get) } => {
            let steps = api.recipe().await?;
            println!("{}", format_recipe(&steps));
            Ok(())
        }
        Cmd::Recipe {
            action: Some(RecipeCmd::Set { text }),
        } => {
            let steps = parse_recipe(&text);
            anyhow::ensure!(!steps.is_empty(), "recipe '{text}' has no material,layer entries");
            print_reply(api.save_recipe(&steps).await?)
        }
        Cmd::Config { section, set: None } => show_config(api, settings, section).await,
        Cmd::Config {
            section,
            set: Some(path),
        } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let reply = match section {
                Section::Pump => api.save_pump_config(&serde_json::from_str::<Value>(&raw)?).await?,
                Section::Network => {
                    api.save_network_config(&serde_json::from_str::<NetworkConfig>(&raw)?)
                        .await?
                }
                Section::Logging => {
                    let config = serde_json::from_str::<LoggingConfig>(&raw)?;
                    let reply = api.save_logging_config(&config).await?;
                    preferences(settings)?.cache_logging_config(&config)?;
                    reply
                }
            };
            print_reply(reply)
        }
        Cmd::TestConnection { printer_ip } => {
            print_reply(api.test_connection(printer_ip.as_deref()).await?)
        }
        Cmd::Logs { count } => {
            for line in api.recent_logs(count).await? {
                let component = line.component.as_deref().unwrap_or("-");
                println!("{:<8}{:<16}{}", line.level, component, line.message);
            }
            Ok(())
        }
        Cmd::LogLevel { component, level } => {
            print_reply(api.set_log_level(&LogLevelRequest::new(component, level)?).await?)
        }
        Cmd::Diagnostic { name } => print_reply(api.run_diagnostic(&name).await?),
        Cmd::Calibrate { pump } => print_reply(api.calibrate(pump.into()).await?),
        Cmd::Restart => print_reply(api.restart_controller().await?),
        Cmd::Watch | Cmd::Theme { .. } => Ok(()),
    }
}

fn set_theme(settings: &Settings, theme: Option<Theme>) -> Result<()> {
    let mut prefs = preferences(settings)?;
    if let Some(theme) = theme {
        prefs.set_theme(theme).context("saving theme")?;
    }
    println!("{}", prefs.theme());
    Ok(())
}

async fn show_config(api: &ControllerApi, settings: &Settings, section: Section) -> Result<()> {
    match section {
        Section::Pump => print_json(&api.pump_config().await?),
        Section::Network => print_json(&api.network_config().await?),
        Section::Logging => {
            let mut prefs = preferences(settings)?;
            match api.logging_config().await {
                Ok(config) => {
                    if let Err(err) = prefs.cache_logging_config(&config) {
                        warn!(error = %err, "prefs: could not cache logging config");
                    }
                    print_json(&config)
                }
                Err(err) => {
                    let cached = prefs
                        .cached_logging_config()
                        .with_context(|| format!("loading logging config: {err}"))?;
                    warn!(error = %err, "api: using cached logging config");
                    print_json(&cached)
                }
            }
        }
    }
}

fn print_reply(reply: Reply) -> Result<()> {
    match reply.message {
        Some(message) => println!("{message}"),
        None if reply.data.is_empty() => println!("ok"),
        None => print_json(&reply.data)?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
