use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use video_dubber::catalog::Catalog;
use video_dubber::registry::{self, ModelRegistry};
use video_dubber::service::{generate_dub, GenerateRequest};
use video_dubber::tts::{OpenAiSpeech, SpeechRequest, OPENAI_VOICES};
use video_dubber::{Config, Dubber, DubbingJob, SubtitleStyle};

#[derive(Parser, Debug)]
#[command(name = "video-dubber", version, about = "Dub videos with synthesized speech and burned-in subtitles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dub a video with an existing speech track and SRT file
    Dub(DubArgs),
    /// Synthesize speech from text and dub a catalog video with it
    Generate(GenerateArgs),
    /// Manage the sample video catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// List registered speech models
    Models,
}

#[derive(Args, Debug)]
struct DubArgs {
    /// Source video
    #[arg(long)]
    video: PathBuf,

    /// Speech audio that becomes the output's audio track
    #[arg(long)]
    speech: PathBuf,

    /// SRT subtitles to burn in
    #[arg(long)]
    subtitles: PathBuf,

    /// Output video (default: alongside input with .dubbed.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    mix: MixArgs,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Registered speech model
    #[arg(long, default_value = "gpt-4o-mini-tts")]
    model: String,

    /// Catalog id of the video to dub
    #[arg(long)]
    video_id: String,

    /// Text to speak
    #[arg(long)]
    text: String,

    #[arg(long, default_value = "alloy")]
    voice: String,

    #[arg(long, default_value_t = 1.05)]
    speed: f64,

    /// Pause between sentences, seconds
    #[arg(long, default_value_t = 0.3)]
    silence: f64,

    /// Pause after the last sentence, seconds
    #[arg(long, default_value_t = 0.5)]
    end_silence: f64,

    #[command(flatten)]
    mix: MixArgs,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct MixArgs {
    /// Volume of the original audio under the speech (0 mutes it)
    #[arg(long, default_value_t = 0.0)]
    volume: f64,
}

#[derive(Args, Debug)]
struct StyleArgs {
    #[arg(long, default_value = "Inter")]
    font_name: String,

    #[arg(long, default_value_t = 16)]
    font_size: u32,

    #[arg(long, default_value_t = 2)]
    outline: u32,

    #[arg(long, default_value_t = 1)]
    shadow: u32,

    #[arg(long, default_value_t = 2)]
    alignment: u8,

    #[arg(long, default_value_t = 80)]
    margin_v: u32,
}

impl From<StyleArgs> for SubtitleStyle {
    fn from(args: StyleArgs) -> Self {
        SubtitleStyle {
            font_name: args.font_name,
            font_size: args.font_size,
            outline: args.outline,
            shadow: args.shadow,
            alignment: args.alignment,
            margin_v: args.margin_v,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Copy a video into the catalog and render its preview
    Add {
        video: PathBuf,

        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,

        /// Base URL for preview links
        #[arg(long)]
        url: Option<String>,
    },
    /// List catalog videos
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 10)]
        page_size: usize,

        /// Only videos with any of these comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Read configuration from environment")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }
    let dubber = Dubber::new(config, cancel);

    match cli.command {
        Command::Dub(args) => run_dub(&dubber, args).await,
        Command::Generate(args) => run_generate(&dubber, args).await,
        Command::Catalog(cmd) => run_catalog(&dubber, cmd).await,
        Command::Models => {
            let registry = install_registry(dubber.config())?;
            println!("{}", serde_json::to_string_pretty(&registry.list())?);
            Ok(())
        }
    }
}

async fn run_dub(dubber: &Dubber, args: DubArgs) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| default_output_video_path(&args.video));
    let job = DubbingJob {
        video: args.video,
        speech: args.speech,
        subtitles: args.subtitles,
        style: args.style.into(),
        background_volume: args.mix.volume,
        output,
    };

    let progress = spinner("Dubbing video with ffmpeg...");
    let out = dubber.dub(&job).await.context("Dubbing failed")?;
    progress.finish_with_message(format!("Done. Video: {}", out.display()));
    Ok(())
}

async fn run_generate(dubber: &Dubber, args: GenerateArgs) -> Result<()> {
    let registry = install_registry(dubber.config())?;
    let catalog = Catalog::new(&dubber.config().samples_dir);
    let request = GenerateRequest {
        tts: SpeechRequest {
            text: args.text,
            voice: Some(args.voice),
            speed: args.speed,
            silence_duration: args.silence,
            end_silence_duration: args.end_silence,
        },
        subtitle: args.style.into(),
        background_volume: args.mix.volume,
        video_id: args.video_id,
    };

    let progress = spinner("Synthesizing speech and dubbing video...");
    let out = generate_dub(dubber, registry, &catalog, &args.model, &request)
        .await
        .context("Generation failed")?;
    progress.finish_with_message(format!("Done. Video: {}", out.display()));
    Ok(())
}

async fn run_catalog(dubber: &Dubber, cmd: CatalogCommand) -> Result<()> {
    let catalog = Catalog::new(&dubber.config().samples_dir);
    match cmd {
        CatalogCommand::Add { video, tags, url } => {
            let progress = spinner("Adding video to catalog...");
            let entry = catalog
                .add(&video, &split_tags(&tags), url.as_deref(), dubber.runner(), dubber.config())
                .await
                .with_context(|| format!("Add {} to catalog", video.display()))?;
            progress.finish_and_clear();
            println!("Video added");
            println!("   ID: {}", entry.id);
            println!("   Preview: {}", entry.url);
            println!("   Duration: {}", entry.duration);
        }
        CatalogCommand::List { page, page_size, tags } => {
            let tags = tags.as_deref().map(split_tags).unwrap_or_default();
            let page = catalog.list(page, page_size, &tags).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }
    Ok(())
}

fn install_registry(config: &Config) -> Result<&'static ModelRegistry> {
    let mut models = ModelRegistry::new();
    if let Some(key) = &config.openai_api_key {
        models.register(
            config.tts_model.clone(),
            Arc::new(OpenAiSpeech::new(key.clone(), config.tts_model.clone())),
        );
    } else {
        eprintln!("Warning: OPENAI_API_KEY is not set; {} is not running", config.tts_model);
        models.declare(
            config.tts_model.clone(),
            OPENAI_VOICES.iter().map(|v| v.to_string()).collect(),
            false,
        );
    }
    Ok(registry::install(models)?)
}

fn spinner(message: &'static str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        progress.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }
    progress.enable_steady_tick(std::time::Duration::from_millis(120));
    progress.set_message(message);
    progress
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_output_video_path(input: &Path) -> PathBuf {
    let mut p = input.to_path_buf();
    p.set_extension("");
    let base = p.file_name().and_then(|s| s.to_str()).unwrap_or("output");
    let mut out = input.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    out.push(format!("{}.dubbed.mp4", base));
    out
}
