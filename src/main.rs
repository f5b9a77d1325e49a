use catalog_image::config::{self, ImagingConfig};
use catalog_image::imaging::{
    CutRequest, ImageProcessor, OutputFormat, ResizeRequest, RustBackend,
};
use catalog_image::sniff::MimeSniffer;
use catalog_image::upload::{UploadDescriptor, UploadValidator};
use catalog_image::{logging, output};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalog-image")]
#[command(about = "Letterboxed resizing and upload validation for catalog images")]
#[command(long_about = "\
Letterboxed resizing and upload validation for catalog images

Resizing keeps the aspect ratio: the source is scaled to fit the requested
box and centred on a white (or, for PNG and WebP, transparent) canvas.
Sources are never upscaled. JPEG output honours the EXIF orientation tag.

Every resize writes a `fileType` marker next to the output holding the
format that was actually used, which may differ from the requested one
under the `png` and `png_all` quality modes.

Run 'catalog-image gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (missing file = stock defaults)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// Target box and format shared by `resize` and `plan`.
#[derive(clap::Args, Clone)]
struct FitArgs {
    /// Requested width (0 or omitted = source width)
    #[arg(long)]
    width: Option<u32>,

    /// Requested height (0 or omitted = source height)
    #[arg(long)]
    height: Option<u32>,

    /// Output format: gif, png, jpg, jpeg, webp
    #[arg(long, default_value = "jpg")]
    format: OutputFormat,

    /// Keep the requested format even under the `png` quality mode
    #[arg(long)]
    force_format: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resize an image into a letterboxed canvas
    Resize {
        source: PathBuf,
        destination: PathBuf,
        #[command(flatten)]
        fit: FitArgs,
    },
    /// Show what a resize would do without decoding or writing anything
    Plan {
        source: PathBuf,
        #[command(flatten)]
        fit: FitArgs,
    },
    /// Copy a region of an image onto a white canvas
    Cut {
        source: PathBuf,
        destination: PathBuf,
        /// Region width (omitted = source width)
        #[arg(long)]
        width: Option<u32>,
        /// Region height (omitted = source height)
        #[arg(long)]
        height: Option<u32>,
        /// Left edge of the region
        #[arg(long, default_value_t = 0)]
        x: u32,
        /// Top edge of the region
        #[arg(long, default_value_t = 0)]
        y: u32,
        /// Output format: gif, png, jpg, jpeg, webp
        #[arg(long, default_value = "jpg")]
        format: OutputFormat,
    },
    /// Run the upload checks against files on disk
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Media type the client claimed
        #[arg(long)]
        declared_type: Option<String>,
        /// File name the client claimed (defaults to the on-disk name)
        #[arg(long)]
        name: Option<String>,
        /// Transport error code reported with the upload
        #[arg(long, default_value_t = 0)]
        error_code: i32,
    },
    /// Print the sniffed media type of each file
    Sniff {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn resize_request(source: PathBuf, destination: PathBuf, fit: &FitArgs) -> ResizeRequest {
    ResizeRequest {
        source,
        destination,
        width: fit.width,
        height: fit.height,
        format: fit.format,
        force_format: fit.force_format,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json_logs);
    let load = || -> Result<ImagingConfig, config::ConfigError> { config::load_config(&cli.config) };

    match cli.command {
        Command::Resize {
            source,
            destination,
            fit,
        } => {
            let config = load()?;
            let processor = ImageProcessor::new(RustBackend::new(), config.processor_settings());
            let request = resize_request(source, destination, &fit);
            let outcome = processor.resize(&request)?;
            if fit.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                output::print_resize_output(&request.source, &request.destination, &outcome);
            }
        }
        Command::Plan { source, fit } => {
            let config = load()?;
            let processor = ImageProcessor::new(RustBackend::new(), config.processor_settings());
            let request = resize_request(source, PathBuf::new(), &fit);
            let preview = processor.preview(&request)?;
            if fit.json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                output::print_plan_output(&request.source, &preview);
            }
        }
        Command::Cut {
            source,
            destination,
            width,
            height,
            x,
            y,
            format,
        } => {
            let config = load()?;
            let processor = ImageProcessor::new(RustBackend::new(), config.processor_settings());
            let request = CutRequest {
                source,
                destination,
                width,
                height,
                format,
                x,
                y,
            };
            let size = processor.cut(&request)?;
            for line in output::format_cut_output(&request.source, &request.destination, size) {
                println!("{}", line);
            }
        }
        Command::Validate {
            files,
            declared_type,
            name,
            error_code,
        } => {
            let config = load()?;
            let validator =
                UploadValidator::new(MimeSniffer::new(config.sniffing.external_probes));
            let mut rejected = 0;
            for file in &files {
                let mut upload = UploadDescriptor::from_path(file)?;
                upload.declared_mime_type = declared_type.clone();
                upload.error_code = error_code;
                if let Some(name) = &name {
                    upload.filename = name.clone();
                }
                let result = validator.validate(
                    &upload,
                    config.upload.max_size_bytes,
                    Some(config.upload.allowed_extensions.as_slice()),
                );
                if result.is_err() {
                    rejected += 1;
                }
                println!("{}", output::format_validate_output(&upload.filename, &result));
            }
            if rejected > 0 {
                return Err(format!("{rejected} of {} uploads rejected", files.len()).into());
            }
        }
        Command::Sniff { files } => {
            let config = load()?;
            let sniffer = MimeSniffer::new(config.sniffing.external_probes);
            for file in &files {
                let mime = sniffer.sniff(file);
                println!("{}", output::format_sniff_output(file, mime.as_deref()));
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
