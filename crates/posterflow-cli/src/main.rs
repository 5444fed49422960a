use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use posterflow_canvas::{MemorySurface, Viewport};
use posterflow_core::config::Config;
use posterflow_core::session::PosterSession;
use posterflow_core::types::CanvasContext;
use posterflow_gateway::{GatewayState, TurnGuard, run_turn};

mod logging;

#[derive(Parser)]
#[command(
    name = "posterflow",
    about = "Describe a poster in plain words; get a background and typography on a canvas",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (default: 18790)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one generation and print what it placed on a fresh canvas
    Generate {
        /// What to generate or change
        instruction: String,

        /// JSON file with a canvas context to send along
        #[arg(long)]
        context: Option<PathBuf>,

        /// Viewport size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_viewport, default_value = "1280x800")]
        viewport: Viewport,
    },

    /// Build a poster turn by turn from stdin
    Chat {
        /// Viewport size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_viewport, default_value = "1280x800")]
        viewport: Viewport,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
}

fn parse_viewport(raw: &str) -> Result<Viewport, String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let width: f64 = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height: f64 = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
    if width <= 0.0 || height <= 0.0 {
        return Err("viewport must have a positive size".into());
    }
    Ok(Viewport::new(width, height))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose);

    // `config` reports problems itself; everything else refuses to start on them.
    if !matches!(cli.command, Commands::Config { .. }) {
        for warning in config.ensure_valid()? {
            tracing::warn!("{warning}");
        }
    }

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            #[allow(unused_mut)]
            let mut state = GatewayState::new(Arc::new(config))?;
            #[cfg(feature = "metrics")]
            {
                state.metrics = Some(posterflow_gateway::metrics::install_prometheus_recorder()?);
            }
            tracing::info!("Starting Posterflow gateway on port {port}");
            posterflow_gateway::start_gateway(Arc::new(state), port).await?;
        }
        Commands::Generate {
            instruction,
            context,
            viewport,
        } => {
            let canvas_context = match context {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)?;
                    Some(serde_json::from_str::<CanvasContext>(&raw)?)
                }
                None => None,
            };

            let state = GatewayState::new(Arc::new(config))?;
            let generation = state
                .orchestrator()?
                .submit(&instruction, canvas_context)
                .await?;
            let mut surface = MemorySurface::new("cli", viewport);
            let outcome = state
                .reconciler()
                .apply(&mut surface, &generation.result)
                .await?;

            let events = surface.drain_events();
            let report = json!({
                "mode": generation.mode,
                "jobId": generation.job_id,
                "polls": generation.polls,
                "outcome": outcome,
                "shapes": surface.shapes,
                "assets": surface.assets,
                "events": events,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Chat { viewport } => {
            let state = GatewayState::new(Arc::new(config))?;
            let orchestrator = state.orchestrator()?;
            let reconciler = state.reconciler();
            let session = PosterSession::new("chat");
            let surface = Mutex::new(MemorySurface::new("chat", viewport));

            println!("Describe your poster. /state shows the canvas, /reset starts over, /quit exits.");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                match line {
                    "" => continue,
                    "/quit" | "/exit" => break,
                    "/reset" => {
                        session.reset();
                        surface.lock().await.reset();
                        println!("Started a new poster.");
                        continue;
                    }
                    "/state" => {
                        let surface = surface.lock().await;
                        let snapshot = json!({
                            "state": session.snapshot(),
                            "surface": &*surface,
                        });
                        println!("{}", serde_json::to_string_pretty(&snapshot)?);
                        continue;
                    }
                    _ => {}
                }

                let Some(guard) = TurnGuard::acquire(&session) else {
                    println!("Still working on the previous request.");
                    continue;
                };
                match run_turn(guard, &orchestrator, &reconciler, &surface, line).await {
                    Ok(report) => println!("{}", report.reply.content),
                    Err(e) => {
                        let detail = e.details().map(|d| format!(" ({d})")).unwrap_or_default();
                        println!(
                            "{}{detail}",
                            posterflow_gateway::error::user_message(&e)
                        );
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
                let (warnings, errors) = config.validate();
                for warning in warnings {
                    eprintln!("warning: {warning}");
                }
                for error in errors {
                    eprintln!("error: {error}");
                }
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("1000x800"), Ok(Viewport::new(1000.0, 800.0)));
        assert_eq!(parse_viewport("640X480"), Ok(Viewport::new(640.0, 480.0)));
        assert!(parse_viewport("1000").is_err());
        assert!(parse_viewport("0x800").is_err());
        assert!(parse_viewport("widexhigh").is_err());
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "posterflow",
            "generate",
            "a neon skyline poster",
            "--viewport",
            "1000x800",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                instruction,
                context,
                viewport,
            } => {
                assert_eq!(instruction, "a neon skyline poster");
                assert!(context.is_none());
                assert_eq!(viewport, Viewport::new(1000.0, 800.0));
            }
            _ => panic!("expected generate"),
        }
    }
}
