//! collector-console: data-collection backend console.
//!
//! Connects one log panel per topic to the backend's WebSocket channels,
//! prints incoming lines as they arrive, and reads operator commands from
//! stdin. Given trailing arguments it runs a single backend command instead.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use collector_console::config::{Config, Overrides};
use collector_console::console::{Command, Console, Output, OutputKind};
use collector_console::dashboard::{self, Style};
use collector_console::logging;
use collector_console::panels::{EVENT_CHANNEL_CAPACITY, PanelSet};
use collector_console::paths::ConsolePaths;
use collector_console::protocol::Topic;
use collector_console::rest_client::BackendClient;

/// Data-collection backend console
#[derive(Parser, Debug)]
#[command(name = "collector-console", version, about = "Data-collection backend console")]
struct Args {
    /// Configuration file (default: ~/.config/collector-console/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// REST base URL of the backend (e.g. http://192.168.1.76:8000)
    #[arg(long)]
    base_url: Option<String>,

    /// WebSocket base URL (derived from --base-url when omitted)
    #[arg(long)]
    ws_base: Option<String>,

    /// Topic to open a panel for; repeat for several (default: all)
    #[arg(short, long = "topic")]
    topics: Vec<Topic>,

    /// Do not print panel lines as they arrive
    #[arg(long)]
    no_follow: bool,

    /// Disable ANSI colours
    #[arg(long)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run one backend command and exit (e.g. `backups`, `start ses_1`)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn load_config(args: &Args) -> Result<Config> {
    let paths = ConsolePaths::resolve();
    if args.config.is_none() && paths.is_none() {
        warn!("HOME is not set; using the default configuration");
    }
    let mut config = Config::load_or_default(args.config.as_deref(), paths.as_ref())?;
    config.apply(Overrides {
        base_url: args.base_url.clone(),
        ws_base: args.ws_base.clone(),
        topics: args.topics.clone(),
    });
    config.validate()?;
    Ok(config)
}

fn print_output(out: &Output, style: Style) {
    for (text, kind) in out {
        match kind {
            OutputKind::Error => eprintln!("{}", style.apply(text.as_str().red())),
            OutputKind::Success => println!("{}", style.apply(text.as_str().green())),
            OutputKind::Info | OutputKind::Value => println!("{}", text),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(args.verbose);

    let config = load_config(&args)?;
    let style = if args.no_color || !std::io::stdout().is_terminal() {
        Style::plain()
    } else {
        Style::colored()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create Tokio runtime")?;

    if args.command.is_empty() {
        runtime.block_on(run_interactive(&args, config, style))
    } else {
        runtime.block_on(run_once(&args.command.join(" "), config, style))
    }
}

/// One-shot mode: a single backend command, no panels.
async fn run_once(line: &str, config: Config, style: Style) -> Result<()> {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(()),
        Err(msg) => bail!(msg),
    };
    if !command.is_backend() {
        bail!("`{}` needs open panels; run without arguments for the interactive console", line);
    }

    let backend = BackendClient::new(&config.backend)?;
    let mut console = Console::new(PanelSet::empty(), backend, style);
    let out = console.run(command).await;
    print_output(&out, style);

    if out.iter().any(|(_, kind)| *kind == OutputKind::Error) {
        bail!("command failed");
    }
    Ok(())
}

async fn run_interactive(args: &Args, config: Config, style: Style) -> Result<()> {
    let backend = BackendClient::new(&config.backend)?;
    println!("collector-console v{}", env!("CARGO_PKG_VERSION"));
    println!("Backend: {}", backend.base_url());

    let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let panels = PanelSet::spawn(&config, events_tx).await?;
    for topic in panels.topics() {
        println!("  - {}", topic.title());
    }
    println!("Type `help` for commands.");

    let follower = (!args.no_follow).then(|| {
        let mut rx = panels.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(text) = dashboard::format_event(&event, style) {
                            println!("{}", text);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "console", skipped, "follow output fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    });

    let mut console = Console::new(panels, backend, style);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => {
                        let out = console.execute(&line).await;
                        print_output(&out, style);
                        if console.should_quit() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(target: "console", "interrupted");
                break;
            }
        }
    }

    console.shutdown().await;
    if let Some(handle) = follower {
        handle.abort();
    }
    Ok(())
}
