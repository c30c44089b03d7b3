// this_file: src/main.rs
//! Glyphcache CLI - drive the cached text renderer from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glyphcache::{
    logging, Antialias, CacheConfig, FontRegistry, Hinting, RenderSettings, TextRequest,
    TextService,
};
use log::{info, warn};
use rayon::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Glyphcache - cached glyph and glyph-run rendering
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<String>,

    /// Enable quiet mode (only errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "log_level")]
    quiet: bool,

    /// JSON configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum HintingArg {
    None,
    Light,
    Full,
}

impl From<HintingArg> for Hinting {
    fn from(arg: HintingArg) -> Self {
        match arg {
            HintingArg::None => Hinting::None,
            HintingArg::Light => Hinting::Light,
            HintingArg::Full => Hinting::Full,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a line of text through the caches
    Render {
        /// Font file (TTF/OTF/TTC)
        #[arg(short, long)]
        font: PathBuf,

        /// Face index inside a collection
        #[arg(long, default_value_t = 0)]
        face_index: u32,

        /// Pixel size
        #[arg(short, long, default_value_t = 16.0)]
        size: f32,

        /// Text to render
        #[arg(short, long)]
        text: String,

        #[arg(long, value_enum, default_value = "none")]
        hinting: HintingArg,

        /// Monochrome coverage instead of grayscale
        #[arg(long)]
        mono: bool,

        #[arg(long)]
        embolden: bool,

        /// Render the same request this many times
        #[arg(long, default_value_t = 1)]
        repeat: u32,

        /// Write the composited line as a grayscale PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render many requests concurrently against one service
    Stress {
        #[arg(short, long)]
        font: PathBuf,

        #[arg(short, long, default_value_t = 16.0)]
        size: f32,

        /// Words are rendered individually as well as the whole text
        #[arg(short, long, default_value = "The quick brown fox jumps over the lazy dog")]
        text: String,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,

        #[arg(long, default_value_t = 1000)]
        iterations: usize,
    },

    /// Print the effective configuration
    Config,

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    logging::init_logging(&log_level, cli.quiet, true);

    match cli.command {
        Commands::Render {
            font,
            face_index,
            size,
            text,
            hinting,
            mono,
            embolden,
            repeat,
            output,
        } => {
            let service = build_service(&config, &font, face_index)?;
            let mut settings = RenderSettings::new(0, size);
            settings.hinting = hinting.into();
            settings.antialias = if mono { Antialias::Mono } else { Antialias::Gray };
            settings.embolden = embolden;
            render_text(&service, TextRequest::new(&text, settings), repeat, output.as_deref())?;
        }
        Commands::Stress {
            font,
            size,
            text,
            threads,
            iterations,
        } => {
            let service = build_service(&config, &font, 0)?;
            stress(&service, &text, size, threads, iterations)?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Version => {
            println!("glyphcache version {}", glyphcache::VERSION);
            println!("Glyph and glyph-run cache for shared text rendering");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CacheConfig> {
    let config = match path {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CacheConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn build_service(config: &CacheConfig, font: &Path, face_index: u32) -> Result<TextService> {
    let registry = FontRegistry::new();
    registry
        .register_file(font, face_index)
        .with_context(|| format!("Failed to load font {}", font.display()))?;
    Ok(TextService::from_config(config, registry))
}

fn render_text(
    service: &TextService,
    request: TextRequest,
    repeat: u32,
    output: Option<&Path>,
) -> Result<()> {
    if repeat == 0 {
        bail!("--repeat must be at least 1");
    }

    let t0 = Instant::now();
    let mut last = None;
    for _ in 0..repeat {
        last = Some(service.render(&request)?);
    }
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
    let Some(rendered) = last else {
        bail!("nothing rendered");
    };

    if let Some(path) = output {
        if rendered.width == 0 || rendered.height == 0 {
            warn!("Rendered line is empty, not writing {}", path.display());
        } else {
            let image = image::GrayImage::from_raw(
                rendered.width,
                rendered.height,
                rendered.bitmap.clone(),
            )
            .context("Bitmap size does not match its dimensions")?;
            image
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}x{} image to {}", rendered.width, rendered.height, path.display());
        }
    }

    let summary = json!({
        "glyphs": rendered.run.len(),
        "failed_glyphs": rendered.failed_glyphs(),
        "advance": rendered.run.advance,
        "width": rendered.width,
        "height": rendered.height,
        "baseline": rendered.baseline,
        "run_cached": rendered.run_cached,
        "repeat": repeat,
        "elapsed_ms": elapsed_ms,
        "stats": service.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn stress(
    service: &TextService,
    text: &str,
    size: f32,
    threads: Option<usize>,
    iterations: usize,
) -> Result<()> {
    let threads = threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to build thread pool")?;

    let settings = RenderSettings::new(0, size);
    let mut requests: Vec<TextRequest> = text
        .split_whitespace()
        .map(|word| TextRequest::new(word, settings))
        .collect();
    requests.push(TextRequest::new(text, settings));

    info!("Stress: {} iterations on {} thread(s)", iterations, threads);
    let t0 = Instant::now();
    let failures: usize = pool.install(|| {
        (0..iterations)
            .into_par_iter()
            .map(|i| {
                let request = &requests[i % requests.len()];
                match service.render(request) {
                    Ok(_) => 0,
                    Err(e) => {
                        warn!("Request {} failed: {}", i, e);
                        1
                    }
                }
            })
            .sum()
    });
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let summary = json!({
        "threads": threads,
        "iterations": iterations,
        "failures": failures,
        "elapsed_ms": elapsed_ms,
        "stats": service.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
