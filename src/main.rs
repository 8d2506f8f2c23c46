use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_stream::StreamExt;
use tracing::info;

use spaceline::actor::space_monitor::{self, SpaceMonitor};
use spaceline::actor::space_switcher::{SpaceSwitcher, SwitcherDeps};
use spaceline::common::config::Config;
use spaceline::common::log;
use spaceline::model::builder::build_snapshot;
use spaceline::sys::provider::SpaceDataProvider;

#[derive(Parser)]
#[command(name = "spaceline", about = "Track and switch macOS spaces", version)]
struct Cli {
    /// Number spaces per display instead of across all displays.
    #[arg(long, global = true)]
    local_numbering: bool,

    /// Config file to read instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current space snapshot as JSON.
    Current,
    /// Print the current snapshot, then one JSON line per space change.
    Watch,
    /// Switch to a space by its ordinal.
    Switch {
        ordinal: usize,
        #[arg(long, value_enum, default_value_t = Strategy::Auto)]
        strategy: Strategy,
    },
    /// Switch to a fullscreen space by activating its owning application.
    Activate { space_id: u64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Input synthesis, falling back to the external tool.
    Auto,
    /// Synthesized space shortcut key events only.
    Keys,
    /// External tool only.
    Tool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let local_numbering = cli.local_numbering || config.local_numbering;
    let provider = new_provider();

    match cli.command {
        Command::Current => {
            let snapshot = build_snapshot(provider.as_ref(), local_numbering);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Watch => {
            let watch_path = config
                .watch_path
                .clone()
                .or_else(space_monitor::default_watch_path)
                .context("cannot determine the space signal file to watch")?;
            info!(path = %watch_path.display(), "watching for space changes");

            let build_provider = provider.clone();
            let monitor = SpaceMonitor::new(
                watch_path,
                Arc::new(move || build_snapshot(build_provider.as_ref(), local_numbering)),
            );
            let mut snapshots = monitor.subscribe();

            let initial = build_snapshot(provider.as_ref(), local_numbering);
            println!("{}", serde_json::to_string(&initial)?);
            while let Some(snapshot) = snapshots.next().await {
                println!("{}", serde_json::to_string(&snapshot)?);
            }
        }
        Command::Switch { ordinal, strategy } => {
            let switcher = new_switcher(provider, config.external_tool.clone());
            let switched = match strategy {
                Strategy::Auto => switcher.switch_to_space(ordinal).await,
                Strategy::Keys => switcher.switch_via_input_synthesis(ordinal).await,
                Strategy::Tool => switcher.switch_via_external_tool(ordinal).await,
            };
            if !switched {
                bail!("could not switch to space {ordinal}");
            }
        }
        Command::Activate { space_id } => {
            let switcher = new_switcher(provider, config.external_tool.clone());
            if !switcher.activate_owner_of_space(space_id).await {
                bail!("could not activate an application on space {space_id}");
            }
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn new_provider() -> Arc<dyn SpaceDataProvider> {
    Arc::new(spaceline::sys::skylight::SkylightProvider)
}

#[cfg(not(target_os = "macos"))]
fn new_provider() -> Arc<dyn SpaceDataProvider> {
    Arc::new(spaceline::sys::provider::HeadlessProvider)
}

#[cfg(target_os = "macos")]
fn new_switcher(provider: Arc<dyn SpaceDataProvider>, tool_override: Option<PathBuf>) -> SpaceSwitcher {
    SpaceSwitcher::spawn(SwitcherDeps {
        hotkeys: Box::new(spaceline::sys::hotkey::SymbolicHotKeys),
        input: Box::new(spaceline::sys::event::HidEventSink),
        permissions: Box::new(spaceline::sys::permission::AccessibilityGate),
        window_server: Box::new(spaceline::sys::window_server::CgWindowServer),
        provider,
        tool_override,
    })
}

#[cfg(not(target_os = "macos"))]
fn new_switcher(provider: Arc<dyn SpaceDataProvider>, tool_override: Option<PathBuf>) -> SpaceSwitcher {
    SpaceSwitcher::spawn(SwitcherDeps {
        hotkeys: Box::new(spaceline::sys::hotkey::UnavailableHotKeys),
        input: Box::new(spaceline::sys::event::NullEventSink),
        permissions: Box::new(spaceline::sys::permission::DeniedGate),
        window_server: Box::new(spaceline::sys::window_server::NullWindowServer),
        provider,
        tool_override,
    })
}
