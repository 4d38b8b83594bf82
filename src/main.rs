// SYNOID Shorts Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use synoid_shorts::agent::health::{check_dependencies, ToolStatus};
use synoid_shorts::agent::narration::normalize;
use synoid_shorts::agent::pipeline::{PipelineContext, RenderMode, ShortRequest, VoiceoverRequest};
use synoid_shorts::config::ShortsConfig;
use synoid_shorts::server;
use synoid_shorts::state::ShortsState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synoid-shorts")]
#[command(about = "SYNOID Shorts - narration-driven short video assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value = "5001")]
        port: u16,

        /// Use clips from this folder instead of Pexels
        #[arg(long)]
        footage_dir: Option<PathBuf>,
    },

    /// Render a short from a narration script
    Render {
        /// Narration text
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the narration from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Footage search query (defaults to the script's first words)
        #[arg(short, long)]
        query: Option<String>,

        /// Burn in time-aligned captions
        #[arg(long)]
        captions: bool,

        /// Use clips from this folder instead of Pexels
        #[arg(long)]
        footage_dir: Option<PathBuf>,

        #[arg(long)]
        voice: Option<String>,

        #[arg(long)]
        lang: Option<String>,

        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Synthesize a voiceover only
    Voiceover {
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long)]
        voice: Option<String>,

        #[arg(long)]
        lang: Option<String>,

        /// Rewrite the text for speech with the script writer first
        #[arg(long)]
        polish: bool,

        #[arg(short, long, default_value = "voiceover.mp3")]
        output: PathBuf,
    },

    /// Print the cleaned narration for a script
    Clean {
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate a content idea
    Idea {
        #[arg(short, long)]
        topic: String,
    },

    /// Generate a social caption with hashtags
    Caption {
        #[arg(short, long)]
        topic: String,

        #[arg(long)]
        lang: Option<String>,
    },

    /// Rewrite source material into a short-video script
    Rewrite {
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long)]
        style: Option<String>,
    },

    /// Fetch a YouTube transcript and analyse it
    Analyze {
        #[arg(short, long)]
        url: String,
    },

    /// Check external tools and configuration
    Doctor,
}

fn read_script(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(t), _) => Ok(t),
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("cannot read {:?}", path))
        }
        (None, None) => bail!("provide --text or --file"),
    }
}

fn default_output(captions: bool) -> PathBuf {
    let name = if captions { "video_final.mp4" } else { "video_short.mp4" };
    dirs::video_dir()
        .filter(|d| d.is_dir())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Keep decoder and HTTP internals quiet unless asked for.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,symphonia=error,hyper=warn,reqwest=warn");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[SYNOID PANIC] at {}: {}", location, message);
    }));

    let args = Cli::parse();
    let config = ShortsConfig::from_env();

    match args.command {
        Commands::Serve { port, footage_dir } => {
            info!("--- SYNOID SHORTS v{} ---", env!("CARGO_PKG_VERSION"));
            let ctx = PipelineContext::from_config(config, footage_dir)?;
            let report = check_dependencies(
                &ctx.config.ffmpeg_bin,
                &ctx.config.ffprobe_bin,
                &ctx.config.ytdlp_bin,
                ctx.started,
            )
            .await;
            if !report.is_healthy() {
                tracing::warn!("[SERVER] Starting with missing tools; renders will fail");
            }
            server::start_server(port, Arc::new(ShortsState::new(ctx))).await?;
        }

        Commands::Render {
            text,
            file,
            query,
            captions,
            footage_dir,
            voice,
            lang,
            output,
        } => {
            let script = read_script(text, file)?;
            let ctx = PipelineContext::from_config(config, footage_dir)?;
            let request = ShortRequest {
                text: script,
                query,
                voice_id: voice,
                lang,
                mode: if captions { RenderMode::Captioned } else { RenderMode::Plain },
                output_path: output.unwrap_or_else(|| default_output(captions)),
            };
            let report = ctx.produce_short(&request).await.context("render failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Voiceover {
            text,
            file,
            voice,
            lang,
            polish,
            output,
        } => {
            let script = read_script(text, file)?;
            let ctx = PipelineContext::from_config(config, None)?;
            let request = VoiceoverRequest {
                text: script,
                voice_id: voice,
                lang,
                polish,
            };
            let report = ctx
                .produce_voiceover(&request, &output)
                .await
                .context("voiceover failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Clean { text, file } => {
            let script = read_script(text, file)?;
            println!("{}", normalize(&script));
        }

        Commands::Idea { topic } => {
            let ctx = PipelineContext::from_config(config, None)?;
            println!("{}", ctx.writer()?.idea(&topic).await?);
        }

        Commands::Caption { topic, lang } => {
            let ctx = PipelineContext::from_config(config, None)?;
            let lang = lang.unwrap_or_else(|| ctx.config.default_lang.clone());
            println!("{}", ctx.writer()?.social_caption(&topic, &lang).await?);
        }

        Commands::Rewrite { text, file, style } => {
            let source = read_script(text, file)?;
            let ctx = PipelineContext::from_config(config, None)?;
            println!("{}", ctx.writer()?.rewrite(&source, style.as_deref()).await?);
        }

        Commands::Analyze { url } => {
            let ctx = PipelineContext::from_config(config, None)?;
            let analysis = ctx.analyze_link(&url).await?;
            println!("{}", analysis.analysis);
        }

        Commands::Doctor => {
            let report = check_dependencies(
                &config.ffmpeg_bin,
                &config.ffprobe_bin,
                &config.ytdlp_bin,
                std::time::Instant::now(),
            )
            .await;

            println!("=== SYNOID Shorts Doctor ===");
            for tool in &report.tools {
                match &tool.status {
                    ToolStatus::Available { version } => {
                        println!("[ok]      {:<8} {}", tool.name, version)
                    }
                    ToolStatus::Missing { reason } => {
                        let tag = if tool.optional { "[warn]" } else { "[missing]" };
                        println!("{:<9} {:<8} {} ({})", tag, tool.name, tool.binary, reason)
                    }
                }
            }
            let key = |set: bool| if set { "set" } else { "not set" };
            println!("PEXELS_API_KEY: {}", key(config.pexels_api_key.is_some()));
            println!("ELEVEN_API_KEY: {}", key(config.elevenlabs_api_key.is_some()));
            println!("Text generator: {}", key(config.has_writer()));
            println!("Encoder: {}", synoid_shorts::encoder_backend::encoder_backend(config.hardware_encoding));

            if !report.is_healthy() {
                bail!("required tools are missing");
            }
        }
    }

    Ok(())
}
