//! # Ring - overlay selection menu
//!
//! Reads one item per line from standard input, shows them on the overlay
//! layer and prints the chosen line. Nothing is printed on cancel.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};

use ring_menu::config::{AnchorEdge, ColorRole};
use ring_menu::menu::read_items;
use ring_menu::{MenuConfig, Outcome};

#[derive(Parser, Debug)]
#[command(name = "ring")]
#[command(about = "A minimal keyboard-driven selection menu for Wayland")]
#[command(version = env!("RING_LONG_VERSION"))]
struct Cli {
    /// Font descriptor, e.g. "monospace 10"
    #[arg(short, long)]
    font: Option<String>,

    /// Normal background color (RRGGBB or RRGGBBAA)
    #[arg(short = 'N', long, value_name = "COLOR")]
    normal_bg: Option<String>,

    /// Normal foreground color
    #[arg(short = 'n', long, value_name = "COLOR")]
    normal_fg: Option<String>,

    /// Selected background color
    #[arg(short = 'S', long, value_name = "COLOR")]
    select_bg: Option<String>,

    /// Selected foreground color
    #[arg(short = 's', long, value_name = "COLOR")]
    select_fg: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Anchor the menu to a screen edge (repeatable)
    #[arg(long, value_enum)]
    anchor: Vec<AnchorEdge>,
}

impl Cli {
    fn color_overrides(&self) -> [(ColorRole, Option<&str>); 4] {
        [
            (ColorRole::NormalBackground, self.normal_bg.as_deref()),
            (ColorRole::NormalForeground, self.normal_fg.as_deref()),
            (ColorRole::SelectBackground, self.select_bg.as_deref()),
            (ColorRole::SelectForeground, self.select_fg.as_deref()),
        ]
    }
}

/// Apply the command-line overrides on top of the loaded configuration.
/// Returns one message per color that was rejected.
fn apply_overrides(cli: &Cli, config: &mut MenuConfig) -> Vec<String> {
    if let Some(font) = &cli.font {
        config.font = font.clone();
    }
    if !cli.anchor.is_empty() {
        config.anchor = cli.anchor.clone();
    }
    cli.color_overrides()
        .into_iter()
        .filter_map(|(role, value)| value.map(|value| (role, value)))
        .filter(|(role, value)| !config.colors.apply_override(*role, value))
        .map(|(role, value)| format!("ring: invalid {} color: {}", role, value))
        .collect()
}

fn load_config(cli: &Cli) -> MenuConfig {
    let loaded = match &cli.config {
        Some(path) => MenuConfig::load(path).map(Some),
        None => MenuConfig::load_default(),
    };

    let mut config = match loaded {
        Ok(Some(config)) => {
            info!("✅ Configuration loaded");
            config
        }
        Ok(None) => MenuConfig::default(),
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            MenuConfig::default()
        }
    };

    // Printed regardless of the log filter
    for message in apply_overrides(cli, &mut config) {
        eprintln!("{message}");
    }
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    debug!("📄 Version: {}", ring_menu::VERSION);

    let config = load_config(&cli);
    let items = read_items(io::stdin().lock()).context("Failed to read menu items from stdin")?;
    debug!("Read {} items", items.len());

    match ring_menu::run(config, items)? {
        Outcome::Selected(item) => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{item}").context("Failed to write selection")?;
            stdout.flush().context("Failed to write selection")?;
        }
        Outcome::Cancelled => debug!("Cancelled, nothing to print"),
    }
    Ok(())
}
