//! X5 OS - guided AI generation from the terminal.
//!
//! Runs the contract, design-brief, plan and photo flows interactively and
//! exposes the raw text, image and video generation calls.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tokio::runtime::Runtime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use x5os::ai::{InlineImage, VideoRequest};
use x5os::workflow::{FlowMode, PhotoMode};
use x5os::{
    Artifact, AspectRatio, CancelToken, Category, Config, Driver, Gateway, GeminiBackend,
    GuidedSession, PhotoOutcome, PhotoRequest, PhotoStudio, StyleMode, Tier, WorkflowStep,
};

/// Guided AI generation for contracts, briefs, plans, photos and videos
#[derive(Parser)]
#[command(name = "x5os")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default lookup
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the pro image model
    #[arg(long, global = true)]
    pro: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided creation flow
    Flow {
        /// Flow category (contract:services, design:logo, instagram, presentation, photo:anime, ...)
        category: Category,

        /// Description of the task (asked interactively when omitted)
        #[arg(short, long)]
        description: Option<String>,

        /// Reference image to attach (repeatable)
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// Aspect ratio for photo flows
        #[arg(short, long)]
        aspect: Option<AspectRatio>,

        /// Ask clarifying questions even for direct flows
        #[arg(long, conflicts_with = "direct")]
        guided: bool,

        /// Skip clarifying questions
        #[arg(long)]
        direct: bool,
    },

    /// Generate text from a prompt
    Text {
        /// Prompt text
        prompt: String,
    },

    /// Generate an image
    Image {
        /// What to draw
        prompt: String,

        /// Photo style
        #[arg(short, long, default_value = "realistic")]
        style: StyleMode,

        /// Aspect ratio
        #[arg(short, long, default_value = "1:1")]
        aspect: AspectRatio,

        /// Reference image (repeatable)
        #[arg(short, long = "reference")]
        references: Vec<PathBuf>,

        /// Directory to save the image in
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Animate a still image into a video
    Video {
        /// First frame
        image: PathBuf,

        /// What should happen in the video
        prompt: String,

        /// Optional last frame
        #[arg(long)]
        end_image: Option<PathBuf>,
    },

    /// List flow categories
    Categories,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };
    let tier = if cli.pro { Tier::Pro } else { config.general.tier };

    match cli.command {
        Commands::Flow { category, description, images, aspect, guided, direct } => {
            let mode = if guided {
                Some(FlowMode::Guided)
            } else if direct {
                Some(FlowMode::Direct)
            } else {
                None
            };
            cmd_flow(&config, tier, category, description, &images, aspect, mode)?;
        }
        Commands::Text { prompt } => cmd_text(&config, &prompt)?,
        Commands::Image { prompt, style, aspect, references, out } => {
            let request = PhotoRequest {
                prompt,
                style,
                aspect_ratio: aspect,
                references: load_images(&references)?,
            };
            cmd_image(&config, tier, request, out)?;
        }
        Commands::Video { image, prompt, end_image } => {
            cmd_video(&config, &image, prompt, end_image.as_deref())?;
        }
        Commands::Categories => cmd_categories(),
        Commands::Config { path } => cmd_config(&config, path)?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "x5os", &mut io::stdout());
        }
    }

    Ok(())
}

fn build_gateway(config: &Config) -> Result<Gateway<GeminiBackend>> {
    let backend = GeminiBackend::from_config(config)?;
    Ok(Gateway::new(backend, config.gateway.clone()).with_output_dir(&config.general.output_dir))
}

/// What a Ctrl-C press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Abort the request in flight
    Cancel,
    /// Leave the program
    Exit,
}

/// Ctrl-C cancels a running request. At a prompt, or when pressed again, it exits.
fn interrupt_action(busy: bool, cancelled: bool) -> InterruptAction {
    if busy && !cancelled {
        InterruptAction::Cancel
    } else {
        InterruptAction::Exit
    }
}

/// Ctrl-C wiring for commands that talk to the API.
struct Interrupt {
    cancel: CancelToken,
    busy: Arc<AtomicBool>,
}

impl Interrupt {
    fn install() -> Result<Self> {
        let cancel = CancelToken::new();
        let busy = Arc::new(AtomicBool::new(false));

        let token = cancel.clone();
        let flag = Arc::clone(&busy);
        ctrlc::set_handler(move || {
            match interrupt_action(flag.load(Ordering::SeqCst), token.is_cancelled()) {
                InterruptAction::Cancel => token.cancel(),
                InterruptAction::Exit => std::process::exit(130),
            }
        })?;

        Ok(Self { cancel, busy })
    }

    /// Run `fut` on `rt`; Ctrl-C cancels it instead of exiting.
    fn block_on<F: Future>(&self, rt: &Runtime, fut: F) -> F::Output {
        self.busy.store(true, Ordering::SeqCst);
        let output = rt.block_on(fut);
        self.busy.store(false, Ordering::SeqCst);
        output
    }
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<InlineImage>> {
    paths
        .iter()
        .map(|path| {
            InlineImage::from_path(path)
                .with_context(|| format!("Failed to read image {}", path.display()))
        })
        .collect()
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn confirm(label: &str) -> Result<bool> {
    let answer = prompt_line(&format!("{label} [y/N] "))?;
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("д"))
}

fn cmd_flow(
    config: &Config,
    tier: Tier,
    category: Category,
    description: Option<String>,
    images: &[PathBuf],
    aspect: Option<AspectRatio>,
    mode: Option<FlowMode>,
) -> Result<()> {
    let category = match (category, aspect) {
        (Category::Photo { mode: photo }, Some(aspect_ratio)) => {
            Category::Photo { mode: PhotoMode { aspect_ratio, ..photo } }
        }
        (category, _) => category,
    };

    let gateway = build_gateway(config)?;
    let interrupt = Interrupt::install()?;
    let driver = Driver::new(&gateway).with_tier(tier);

    let mut session = GuidedSession::new(category)
        .with_options(config.workflow.clone())
        .with_media(load_images(images)?);
    if let Some(mode) = mode {
        session = session.with_mode(mode);
    }

    println!("{}\n", category.label());
    let description = match description {
        Some(text) => text,
        None => prompt_line("Опишите задачу: ")?,
    };
    let mut ticket = session
        .submit_description(&description)
        .ok_or_else(|| anyhow::anyhow!("Описание не может быть пустым"))?;

    let rt = Runtime::new()?;
    loop {
        eprintln!("Генерация...");
        interrupt.block_on(&rt, driver.run_cancellable(&mut session, ticket, &interrupt.cancel));

        ticket = match session.step() {
            WorkflowStep::Questioning => {
                let questions = session.questions().to_vec();
                let mut answers = Vec::with_capacity(questions.len());
                if !questions.is_empty() {
                    println!("\nУточняющие вопросы (Enter, чтобы пропустить):");
                }
                for (index, question) in questions.iter().enumerate() {
                    answers.push(prompt_line(&format!("{}. {} ", index + 1, question))?);
                }
                session
                    .submit_answers(&answers)
                    .ok_or_else(|| anyhow::anyhow!("session is not accepting answers"))?
            }
            WorkflowStep::Result => break,
            WorkflowStep::Failed => {
                let message = session.failure().unwrap_or_default().to_string();
                eprintln!("{message}");
                if interrupt.cancel.is_cancelled() || !confirm("Повторить?")? {
                    anyhow::bail!(message);
                }
                session.retry().ok_or_else(|| anyhow::anyhow!("nothing to retry"))?
            }
            step => anyhow::bail!("unexpected session step: {step:?}"),
        };
    }

    match session.artifact() {
        Some(Artifact::Image(image)) => {
            let path = image.save(&config.general.output_dir, &format!("photo-{}", timestamp_stem()))?;
            println!("{}", path.display());
        }
        Some(artifact) => println!("{}", artifact.render()),
        None => anyhow::bail!("session finished without a result"),
    }
    Ok(())
}

fn timestamp_stem() -> String {
    chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

fn cmd_text(config: &Config, prompt: &str) -> Result<()> {
    let gateway = build_gateway(config)?;
    let rt = Runtime::new()?;

    let text = rt.block_on(gateway.request_text(prompt, &config.workflow.fallback_message));
    println!("{text}");
    Ok(())
}

fn cmd_image(config: &Config, tier: Tier, request: PhotoRequest, out: Option<PathBuf>) -> Result<()> {
    let gateway = build_gateway(config)?;
    let studio = PhotoStudio::new(&gateway, tier);
    let rt = Runtime::new()?;

    eprintln!("Генерация изображения...");
    match rt.block_on(studio.generate(request)) {
        PhotoOutcome::Added(artifact) => {
            let dir = out.unwrap_or_else(|| config.general.output_dir.clone());
            let path = artifact.reference.save(&dir, &format!("photo-{}", artifact.id))?;
            println!("{}", path.display());
            Ok(())
        }
        PhotoOutcome::Failed { message } => anyhow::bail!(message),
    }
}

fn cmd_video(config: &Config, image: &Path, prompt: String, end_image: Option<&Path>) -> Result<()> {
    let gateway = build_gateway(config)?;
    let interrupt = Interrupt::install()?;

    let request = VideoRequest {
        source: InlineImage::from_path(image)
            .with_context(|| format!("Failed to read image {}", image.display()))?,
        prompt,
        end_frame: end_image
            .map(|path| {
                InlineImage::from_path(path)
                    .with_context(|| format!("Failed to read image {}", path.display()))
            })
            .transpose()?,
    };

    eprintln!("Генерация видео (Ctrl-C для отмены)...");
    let rt = Runtime::new()?;
    let video = interrupt.block_on(&rt, gateway.request_video(&request, &interrupt.cancel))?;
    println!("{}", video.path.display());
    Ok(())
}

fn cmd_categories() {
    for category in Category::all() {
        let mode = match category.flow_mode() {
            FlowMode::Direct => "direct",
            FlowMode::Guided => "guided",
        };
        println!("{:<22} {:<7} {}", category.id(), mode, category.label());
    }
}

fn cmd_config(config: &Config, path: bool) -> Result<()> {
    if path {
        match Config::config_dir() {
            Some(dir) => println!("{}", dir.join("config.toml").display()),
            None => println!("Could not determine config directory"),
        }
        return Ok(());
    }

    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
