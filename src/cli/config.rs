//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{PipelineArgs, ProcessArgs, ServeArgs};
use crate::{
    config::{OutputFormat, ProcessRequest},
    models::{ModelSource, ModelSpec},
    processor::{ProcessorConfig, ProcessorConfigBuilder},
    server::ServerConfig,
};
use anyhow::{bail, Context, Result};

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ProcessorConfig` from the shared pipeline arguments
    pub(crate) fn processor_config(args: &PipelineArgs) -> Result<ProcessorConfig> {
        let mut builder = ProcessorConfigBuilder::new()
            .jpeg_quality(args.jpeg_quality)
            .webp_quality(args.webp_quality)
            .max_dimension(args.max_dimension);

        if let Some(model) = &args.model {
            builder = builder.model_spec(ModelSpec {
                source: ModelSource::External(model.clone()),
                variant: args.variant.clone(),
            });
        } else {
            log::debug!("No --model given, background removal disabled");
        }

        builder.build().context("Invalid configuration")
    }

    /// Build `ServerConfig` from `serve` arguments
    pub(crate) fn server_config(args: &ServeArgs) -> Result<ServerConfig> {
        if args.max_upload_mb == 0 {
            bail!("--max-upload-mb must be positive");
        }
        let max_upload_bytes = args
            .max_upload_mb
            .checked_mul(1024 * 1024)
            .context("--max-upload-mb is too large")?;

        Ok(ServerConfig {
            bind: args.bind,
            max_upload_bytes,
        })
    }

    /// Build the request for `process`
    ///
    /// The format falls back to the output file extension.
    pub(crate) fn process_request(args: &ProcessArgs) -> Result<ProcessRequest> {
        let format = match args.format {
            Some(format) => format,
            None if args.output == "-" => bail!("--format is required when writing to stdout"),
            None => OutputFormat::from_path(&args.output)
                .with_context(|| format!("Pass --format or use a known extension for {}", args.output))?,
        };

        if args.remove_bg && args.pipeline.model.is_none() {
            bail!("--remove-bg requires --model");
        }

        Ok(ProcessRequest {
            width: args.width,
            height: args.height,
            format,
            target_bytes: args.target_bytes(),
            remove_bg: args.remove_bg,
        })
    }
}
