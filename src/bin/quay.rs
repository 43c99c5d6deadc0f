use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use quay_wm::commands::parse_command;
use quay_wm::common::config::{Config, Trigger, config_file};
use quay_wm::common::log;
use quay_wm::layout_engine::{OutputInfo, SeatId, SurfaceInfo, WindowManager};
use quay_wm::model::tree::NodeId;
use quay_wm::sys::compositor::LoggingCompositor;
use quay_wm::sys::geometry::Rect;
use tracing::{debug, info};

#[derive(Parser)]
#[command(version, about = "Headless driver for the quay window manager core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and report any issues.
    Check {
        /// Path to configuration file to use (overrides default).
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Replay a script of surface events and commands, then print the tree.
    Run {
        script: PathBuf,

        /// Path to configuration file to use (overrides default).
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Tree)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Tree,
    Json,
    Ron,
}

fn main() {
    let cli = Cli::parse();
    log::init_logging();

    let result = match cli.command {
        Commands::Check { config } => check(config.as_deref()),
        Commands::Run { script, config, format } => run(&script, config.as_deref(), format),
    };
    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = path.map(Path::to_path_buf).or_else(config_file);
    match path {
        Some(path) if path.exists() => Config::read(&path),
        Some(path) => {
            debug!(path = %path.display(), "no config file, using the default");
            Ok(Config::default())
        }
        None => Ok(Config::default()),
    }
}

fn check(path: Option<&Path>) -> anyhow::Result<bool> {
    let config = load_config(path)?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
        return Ok(true);
    }
    for issue in issues {
        eprintln!("{issue}");
    }
    Ok(false)
}

fn run(script: &Path, path: Option<&Path>, format: Format) -> anyhow::Result<bool> {
    let config = load_config(path)?;
    for issue in config.validate() {
        eprintln!("{issue}");
    }
    let text = std::fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;

    let mut session = Session::new(&config);
    for (index, line) in text.lines().enumerate() {
        session.line(line).with_context(|| format!("{}:{}", script.display(), index + 1))?;
        if session.wm.compositor().quit_requested {
            info!("quit requested, stopping the script");
            break;
        }
    }

    let out = match format {
        Format::Tree => session.wm.draw_tree(),
        Format::Json => serde_json::to_string_pretty(&session.wm.snapshot())?,
        Format::Ron => {
            ron::ser::to_string_pretty(&session.wm.snapshot(), ron::ser::PrettyConfig::new())?
        }
    };
    println!("{}", out.trim_end());
    Ok(true)
}

/// A headless window manager driven line by line.
struct Session<'a> {
    config: &'a Config,
    wm: WindowManager<LoggingCompositor>,
    seat: SeatId,
    /// Surfaces in arrival order. Scripts refer to them by 1-based index.
    surfaces: Vec<Option<NodeId>>,
}

impl<'a> Session<'a> {
    fn new(config: &'a Config) -> Self {
        let mut wm = WindowManager::new(LoggingCompositor::default(), config);
        let seat = wm.add_seat("seat0");
        if config.outputs.is_empty() {
            wm.add_output(OutputInfo {
                name: "default".into(),
                geometry: Rect::new(0, 0, 1920, 1080),
                scale: 1,
            });
        } else {
            wm.outputs_from_config(&config.outputs);
        }
        Session { config, wm, seat, surfaces: Vec::new() }
    }

    fn line(&mut self, line: &str) -> anyhow::Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match word {
            "add" => {
                let app_id = Some(rest).filter(|s| !s.is_empty()).map(str::to_owned);
                let info = SurfaceInfo { app_id, geometry: Rect::default() };
                let Some(node) = self.wm.surface_added(info) else {
                    bail!("no output to place the surface on");
                };
                self.surfaces.push(Some(node));
            }
            "remove" => {
                let node = self.surface(rest)?;
                self.wm.surface_removed(node);
                self.forget(node);
            }
            "commit" => {
                let mut args = rest.split_whitespace();
                let node = self.surface(args.next().unwrap_or(""))?;
                let numbers = args
                    .map(|a| a.parse::<i32>().with_context(|| format!("bad number `{a}`")))
                    .collect::<anyhow::Result<Vec<i32>>>()?;
                let client = match numbers[..] {
                    [] => {
                        let geometry = self.wm.container(node).map(|c| c.geometry).unwrap_or_default();
                        Rect::new(0, 0, geometry.width, geometry.height)
                    }
                    [x, y, width, height] => Rect::new(x, y, width, height),
                    _ => bail!("commit takes a surface and optionally x y width height"),
                };
                self.wm.surface_committed(node, client);
            }
            "key" | "button" => {
                let trigger: Trigger = rest.parse()?;
                let action = if word == "key" {
                    self.config.key(&trigger)
                } else {
                    self.config.button(&trigger)
                };
                let Some(action) = action else { bail!("`{trigger}` is not bound") };
                self.wm.run_action(action, self.seat);
            }
            _ => {
                let command = parse_command(line)?;
                self.wm.invoke(&command, self.seat);
            }
        }
        Ok(())
    }

    fn surface(&self, index: &str) -> anyhow::Result<NodeId> {
        let n: usize = index.parse().with_context(|| format!("bad surface index `{index}`"))?;
        match n.checked_sub(1).and_then(|i| self.surfaces.get(i)) {
            Some(Some(node)) => Ok(*node),
            Some(None) => bail!("surface {n} was removed"),
            None => bail!("no surface {n}"),
        }
    }

    fn forget(&mut self, node: NodeId) {
        for slot in &mut self.surfaces {
            if *slot == Some(node) {
                *slot = None;
            }
        }
    }
}
