use anyhow::{Context, Result};
use cardshot::assets;
use cardshot::batch;
use cardshot::server::{ServerConfig, Service};
use cardshot::template::{DataRecord, TemplateResolver, TemplateSource};
use cardshot::{Lifecycle, OutputTarget, PaperFormat, PdfOptions, RenderConfig, ResolutionPreset, Shell, SizeSpec};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cardshot")]
#[command(about = "Render HTML card and slide templates to PNG and PDF")]
struct Cli {
    /// JSON file with engine settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chrome or Chromium executable
    #[arg(long, global = true, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Disable Chrome's sandbox (needed in some containers)
    #[arg(long, global = true)]
    no_sandbox: bool,

    /// Launch a fresh browser for every render
    #[arg(long, global = true)]
    per_call: bool,

    /// Upper bound on the wait for content to settle
    #[arg(long, global = true, value_name = "MS")]
    settle_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an HTML fragment file to PNG
    Render {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,
        /// Layout width; defaults to the preset's width
        #[arg(long)]
        width: Option<u32>,
        /// Layout height; defaults to the preset's height
        #[arg(long)]
        height: Option<u32>,
        #[arg(long, default_value = "high")]
        preset: ResolutionPreset,
        /// slide, card, or raw:<element-id>
        #[arg(long, default_value = "slide")]
        shell: Shell,
        /// Device scale factor for the capture
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        /// JSON object used to fill placeholders in the input
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,
        /// Inline local <img> sources relative to this directory
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,
    },
    /// Render a named template from a template root
    Template {
        /// Directory holding manifest.json and templates/
        #[arg(long, value_name = "DIR")]
        templates: PathBuf,
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,
        #[arg(long, default_value = "high")]
        preset: ResolutionPreset,
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,
    },
    /// Render a JSON list of {template, data} items to slide-NN.png files
    Batch {
        #[arg(long, value_name = "DIR")]
        templates: PathBuf,
        #[arg(value_name = "ITEMS")]
        items: PathBuf,
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
        #[arg(long, default_value = "high")]
        preset: ResolutionPreset,
        /// Inline local <img> sources relative to this directory
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,
    },
    /// Print a complete HTML document to PDF
    Pdf {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,
        /// JSON file with pagination options
        #[arg(long, value_name = "FILE")]
        options: Option<PathBuf>,
        /// Paper format, overriding the options file
        #[arg(long)]
        format: Option<PaperFormat>,
        #[arg(long)]
        landscape: bool,
    },
    /// Run the HTTP render service
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
        /// Worker threads; defaults to the number of CPUs
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Command::Render {
            input,
            output,
            width,
            height,
            preset,
            shell,
            scale,
            data,
            assets,
        } => {
            let mut fragment =
                fs::read_to_string(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            if let Some(data) = data {
                let record = read_data(&data)?;
                fragment = cardshot::template::fill(&fragment, &record, &default_list_keys());
            }
            let fragment = inline_assets(fragment, assets.as_deref())?;
            let size = SizeSpec::new(
                width.unwrap_or_else(|| preset.width()),
                height.unwrap_or_else(|| preset.height()),
                preset,
            )
            .with_shell(shell)
            .with_device_scale_factor(scale);

            let engine = cardshot::new_engine(config)?;
            let result = engine.render(&fragment, &OutputTarget::File(output), &size);
            engine.shutdown()?;
            result?;
        }
        Command::Template {
            templates,
            name,
            data,
            output,
            preset,
            assets,
        } => {
            let resolver = TemplateResolver::open(&templates)?;
            let record = match data {
                Some(path) => read_data(&path)?,
                None => DataRecord::new(),
            };
            let fragment = resolver.resolve(&TemplateSource::Named(name), &record)?;
            let fragment = inline_assets(fragment, assets.as_deref())?;

            let engine = cardshot::new_engine(config)?;
            let result = engine.render(&fragment, &OutputTarget::File(output), &SizeSpec::from_preset(preset));
            engine.shutdown()?;
            result?;
        }
        Command::Batch {
            templates,
            items,
            out_dir,
            preset,
            assets,
        } => {
            let resolver = TemplateResolver::open(&templates)?;
            let text = fs::read_to_string(&items).with_context(|| format!("Failed to read {}", items.display()))?;
            let items = batch::parse_items(&text)?;

            let engine = cardshot::new_engine(config)?;
            let result =
                batch::render_batch_with_assets(&engine, &resolver, &items, &out_dir, preset, assets.as_deref());
            engine.shutdown()?;
            let written = result?;
            info!("Rendered {} slide(s)", written.len());
        }
        Command::Pdf {
            input,
            output,
            options,
            format,
            landscape,
        } => {
            let html = fs::read_to_string(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let mut pdf_options = match options {
                Some(path) => {
                    let text =
                        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str::<PdfOptions>(&text)
                        .with_context(|| format!("Invalid PDF options in {}", path.display()))?
                }
                None => PdfOptions::default(),
            };
            if let Some(format) = format {
                pdf_options.format = format;
            }
            if landscape {
                pdf_options.landscape = true;
            }

            let engine = cardshot::new_engine(config)?;
            let result = engine.render_document(&html, &OutputTarget::File(output), &pdf_options);
            engine.shutdown()?;
            result?;
        }
        Command::Serve { addr, workers } => {
            let engine = Arc::new(cardshot::new_engine(config)?);
            let mut server_config = ServerConfig {
                addr,
                ..Default::default()
            };
            if let Some(workers) = workers {
                server_config.workers = workers;
            }
            Service::bind(engine, server_config)?.run()?;
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<RenderConfig> {
    let mut config = match &cli.config {
        Some(path) => RenderConfig::from_json_file(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if let Some(chrome) = &cli.chrome {
        config.chrome_path = Some(chrome.clone());
    }
    if cli.no_sandbox {
        config.sandbox = false;
    }
    if cli.per_call {
        config.lifecycle = Lifecycle::PerCall;
    }
    if let Some(ms) = cli.settle_timeout_ms {
        config.settle_timeout_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

fn read_data(path: &Path) -> Result<DataRecord> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} must contain a JSON object", path.display()))
}

fn default_list_keys() -> std::collections::HashSet<String> {
    cardshot::template::DEFAULT_LIST_KEYS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn inline_assets(fragment: String, dir: Option<&Path>) -> Result<String> {
    match dir {
        Some(dir) => Ok(assets::inline_local_images(&fragment, dir)?),
        None => Ok(fragment),
    }
}
