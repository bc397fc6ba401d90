//! Resizer command-line interface
//!
//! `serve` runs the HTTP service; `process` runs the same pipeline on one
//! local file so results can be checked without an HTTP client.

use super::config::CliConfigBuilder;
use crate::{
    config::OutputFormat,
    encoder::{DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY},
    processor::ImageProcessor,
    server::{self, DEFAULT_BIND},
    services::{ImageIOService, DEFAULT_MAX_DIMENSION},
    tracing_config::{init_cli_tracing, TracingFormat},
    types::ProcessedImage,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

/// Image resize and compression service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "resizer-server")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server exposing POST /process_image
    Serve(ServeArgs),
    /// Resize and re-encode a local image file
    Process(ProcessArgs),
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}

/// Settings shared by `serve` and `process`
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// JPEG quality used when no size budget is given (1-100)
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// WebP quality used when no size budget is given (1-100)
    #[arg(long, default_value_t = DEFAULT_WEBP_QUALITY)]
    pub webp_quality: u8,

    /// Largest accepted output width or height
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION)]
    pub max_dimension: u32,

    /// Segmentation model: an .onnx file or a model folder [default: background removal disabled]
    #[arg(short, long, env = "RESIZER_MODEL", value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Model variant inside a model folder (fp32, fp16)
    #[arg(long, requires = "model")]
    pub variant: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "RESIZER_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Maximum upload size in MiB
    #[arg(long, default_value_t = 25)]
    pub max_upload_mb: usize,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Input image file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Output file (use "-" for stdout, which requires --format)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: String,

    /// Output width in pixels
    #[arg(long)]
    pub width: NonZeroU32,

    /// Output height in pixels
    #[arg(long)]
    pub height: NonZeroU32,

    /// Output format (png, jpeg, webp, tiff, bmp) [default: from the output extension]
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Maximum output size in KiB [default: unconstrained]
    #[arg(long)]
    pub size_kb: Option<u64>,

    /// Remove the background before resizing (requires --model)
    #[arg(long)]
    pub remove_bg: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Parse arguments, install tracing and run the selected command
///
/// # Errors
/// - Tracing initialization failures
/// - Any error from the selected command
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    run(cli).await
}

/// Run a parsed command line
///
/// # Errors
/// - Invalid configuration
/// - Model loading failures
/// - Server or processing failures
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Process(args) => process(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let server_config = CliConfigBuilder::server_config(&args)?;
    let processor = load_processor(&args.pipeline).await?;

    server::serve(server_config, processor)
        .await
        .context("Server failed")
}

async fn process(args: ProcessArgs) -> Result<()> {
    let request = CliConfigBuilder::process_request(&args)?;
    let processor = Arc::new(load_processor(&args.pipeline).await?);
    let input = read_input(&args.input)?;

    let processed = tokio::task::spawn_blocking(move || processor.process_bytes(&input, &request))
        .await
        .context("Processing task panicked")?
        .with_context(|| format!("Failed to process {}", args.input))?;

    write_output(&args.output, &processed)?;
    report(&args.output, &processed);
    Ok(())
}

/// Build the processor off the async workers; model loading is CPU bound
async fn load_processor(args: &PipelineArgs) -> Result<ImageProcessor> {
    let config = CliConfigBuilder::processor_config(args)?;

    tokio::task::spawn_blocking(move || ImageProcessor::new(config))
        .await
        .context("Model loading task panicked")?
        .context("Failed to initialize image processor")
}

fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read image from stdin")?;
        return Ok(buffer);
    }

    ImageIOService::read_bytes(input).with_context(|| format!("Failed to read {input}"))
}

fn write_output(output: &str, processed: &ProcessedImage) -> Result<()> {
    if output == "-" {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(&processed.bytes)
            .and_then(|()| stdout.flush())
            .context("Failed to write image to stdout")?;
        return Ok(());
    }

    ImageIOService::save_bytes(&processed.bytes, output)
        .with_context(|| format!("Failed to write {output}"))
}

fn report(output: &str, processed: &ProcessedImage) {
    let (width, height) = processed.dimensions;
    let quality = processed
        .quality
        .map_or_else(|| "lossless".to_string(), |q| format!("quality {q}"));

    info!(
        "Wrote {} ({}x{} {}, {}, {} bytes) in {}ms",
        output,
        width,
        height,
        processed.format,
        quality,
        processed.len(),
        processed.timings.total_ms
    );
}

impl ProcessArgs {
    /// Byte budget from `--size-kb` (0 = unconstrained)
    #[must_use]
    pub fn target_bytes(&self) -> u64 {
        self.size_kb.map_or(0, |kb| kb.saturating_mul(1024))
    }
}
