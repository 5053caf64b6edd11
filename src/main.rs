use clap::{Parser, Subcommand};
use imgforge::engine::Engine;
use imgforge::imaging::metadata::find_metadata;
use imgforge::validation::{RawParams, parse_params};
use imgforge::{batch, config, output, server, telemetry};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imgforge")]
#[command(about = "On-the-fly image resizing and format conversion")]
#[command(long_about = "\
On-the-fly image resizing and format conversion

Serves GET /transform/<key>?w=&h=&f=&q= over HTTP, reading originals from a
local directory, S3-compatible storage or memory. The same pipeline runs
locally through the transform command.

Parameters (all optional, none = original bytes returned as-is):
  w, h   target box in pixels (1..=4096); aspect ratio is always kept
  f      output format: jpeg, png, webp, avif
  q      quality 1..=100 for lossy formats (default 80)

Every re-encoded output has EXIF, XMP, ICC, IPTC and text metadata removed.

Run 'imgforge gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Transform parameters as CLI flags, validated like query parameters.
#[derive(clap::Args, Clone)]
struct ParamArgs {
    /// Target box width in pixels
    #[arg(short = 'w', long)]
    width: Option<String>,
    /// Target box height in pixels
    #[arg(short = 'H', long)]
    height: Option<String>,
    /// Output format (jpeg, png, webp, avif)
    #[arg(short = 'f', long)]
    format: Option<String>,
    /// Encoder quality 1..=100
    #[arg(short = 'q', long)]
    quality: Option<String>,
}

impl ParamArgs {
    fn raw(self) -> RawParams {
        RawParams {
            w: self.width,
            h: self.height,
            f: self.format,
            q: self.quality,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP transform service
    Serve,
    /// Transform local files or directories
    Transform {
        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for transformed images
        #[arg(long, short = 'o', default_value = "out")]
        out_dir: PathBuf,
        /// Descend into subdirectories
        #[arg(long, short = 'r')]
        recursive: bool,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Show format, dimensions and embedded metadata of an image
    Identify {
        file: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = config::load_config(cli.config.as_deref())?;
            telemetry::init(&config.logging)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(config))?;
        }
        Command::Transform {
            inputs,
            out_dir,
            recursive,
            params,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            telemetry::init_cli(&config.logging)?;
            let limits = config.limits()?;
            let params = parse_params(&params.raw(), &limits)?;
            let engine = Engine::with_limits(Arc::new(limits));

            let files = batch::collect_inputs(&inputs, recursive)?;
            init_thread_pool(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = batch::run(&engine, &files, &out_dir, &params, Some(tx))?;
            printer
                .join()
                .map_err(|_| "output printer thread panicked")?;
            output::print_batch_summary(&summary);
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Identify { file } => {
            let config = config::load_config(cli.config.as_deref())?;
            telemetry::init_cli(&config.logging)?;
            let engine = Engine::with_limits(Arc::new(config.limits()?));
            let data = std::fs::read(&file)?;
            let (format, dims) = engine.identify(&data)?;
            output::print_identify(&file, format, dims, &find_metadata(format, &data));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores; config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
