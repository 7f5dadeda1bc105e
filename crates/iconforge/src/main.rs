//! iconforge: load images, filter them and export the results.
//!
//! The only part of the workspace that touches the filesystem. Images
//! are read from disk, opened as documents, run through the square
//! crop, grayscale and resolution filters, and exported:
//!
//! - `inspect`: print each document's state after filtering
//! - `export`: re-encode one filtered image in a chosen format
//! - `resize`: resample one filtered image to an exact size as PNG
//! - `icons`: render a multi-size icon bundle from the original image
//! - `batch`: compress several filtered images into one archive
//!
//! # Usage
//!
//! ```text
//! iconforge export photo.jpg --square center --grayscale 0.8 --format webp
//! iconforge resize photo.jpg 64x64 --grayscale 1
//! iconforge icons logo.png --sizes 16,32,48 --output-dir out
//! iconforge icons logo.png --standard
//! iconforge batch a.png b.jpg c.bmp --scale 0.5 --format jpeg
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand, ValueEnum};
use iconforge_export::{
    BatchItem, ExportConfig, ExportCoordinator, ExportError, ExportOutput, OutputFormat,
};
use iconforge_pipeline::{
    CropAnchor, Dimensions, DocumentContext, DocumentId, DocumentInfo, DocumentRegistry, FilterValue,
    Grayscale, ImageKind, PipelineStats, ReorderError, ResampleQuality, ResolutionScale,
    RunSummary, SquareCrop, ValidationError,
};
use serde::Serialize;

use crate::config::{AppConfig, ConfigError};

/// Square-crop, desaturate and downscale images, then export them as
/// single files, icon bundles or compressed batches.
#[derive(Parser)]
#[command(name = "iconforge", version)]
struct Cli {
    /// Configuration file (JSON with optional `editor` and `export`
    /// sections).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Full configuration as a JSON string.
    ///
    /// When provided, `--config` is ignored.
    #[arg(long, global = true)]
    config_json: Option<String>,

    /// Log at debug level. `RUST_LOG` overrides this.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print results as JSON instead of a human-readable report.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply filters and print each document's state.
    Inspect {
        /// Input images (PNG, JPEG, WebP, GIF, BMP, TIFF).
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Re-encode one filtered image.
    Export {
        /// Input image.
        image: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Png)]
        format: Format,

        /// Encoder quality (1-100). Defaults to the configured quality
        /// for the format.
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Resample one filtered image to an exact size and save it as PNG.
    Resize {
        /// Input image.
        image: PathBuf,

        /// Target size as `WIDTHxHEIGHT`. The aspect ratio is not kept.
        #[arg(value_parser = parse_size)]
        size: Dimensions,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Render an icon bundle from the original (unfiltered) image.
    Icons {
        /// Input image.
        image: PathBuf,

        /// Icon sizes, comma separated. Defaults to the configured
        /// bundle sizes.
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<u32>,

        /// Render every configured standard size.
        #[arg(long, conflicts_with = "sizes")]
        standard: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compress several filtered images into one archive.
    Batch {
        /// Input images.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Png)]
        format: Format,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Filter flags. Passing a filter's flag enables it.
#[derive(Args, Default)]
struct FilterArgs {
    /// Crop to a square hugging this anchor (center, top, bottom, left,
    /// right). Unknown anchors fall back to center.
    #[arg(long, value_name = "ANCHOR")]
    square: Option<String>,

    /// Desaturate with this intensity (0.0-1.0).
    #[arg(long, value_name = "INTENSITY")]
    grayscale: Option<f64>,

    /// Scale both axes by this factor, clamped to the configured bounds.
    #[arg(long, value_name = "FACTOR")]
    scale: Option<f64>,

    /// Resampling quality for `--scale`. Enables scaling at the default
    /// factor when given alone.
    #[arg(long, value_enum)]
    resample: Option<Resample>,

    /// Filter order, comma separated (e.g. `grayscale,square,resolution`).
    #[arg(long, value_delimiter = ',')]
    order: Vec<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Directory to write results into. Created if missing.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Run exports on the calling thread instead of a background worker.
    #[arg(long)]
    no_worker: bool,

    /// Export time budget in seconds. Defaults to the configured
    /// timeout.
    #[arg(long)]
    timeout_secs: Option<f64>,
}

/// Output format selection.
#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Lossless PNG.
    Png,
    /// Lossy JPEG (alpha dropped).
    Jpeg,
    /// Lossless WebP.
    Webp,
    /// Uncompressed bitmap.
    Bmp,
    /// Single-entry ICO (up to 256 px).
    Ico,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => Self::Png,
            Format::Jpeg => Self::Jpeg,
            Format::Webp => Self::WebP,
            Format::Bmp => Self::Bmp,
            Format::Ico => Self::Ico,
        }
    }
}

/// Resampling quality selection.
#[derive(Clone, Copy, ValueEnum)]
enum Resample {
    /// Lanczos3.
    High,
    /// Bilinear.
    Medium,
    /// Nearest neighbor.
    Low,
}

impl From<Resample> for ResampleQuality {
    fn from(resample: Resample) -> Self {
        match resample {
            Resample::High => Self::High,
            Resample::Medium => Self::Medium,
            Resample::Low => Self::Low,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: ValidationError,
    },

    #[error("invalid --timeout-secs: {0}")]
    Timeout(String),

    #[error(transparent)]
    Order(#[from] ReorderError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("document {0} is no longer open")]
    Missing(DocumentId),

    #[error("no image in the batch could be converted")]
    BatchFailed,

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Export(e)) => {
            tracing::error!(kind = e.kind(), error = %e, "export failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_lines)]
fn run(cli: &Cli) -> Result<(), CliError> {
    let config = AppConfig::load(cli.config.as_deref(), cli.config_json.as_deref())?;
    let mut registry = DocumentRegistry::new(config.editor.clone());

    match &cli.command {
        Command::Inspect { images, filters } => {
            let reports = images
                .iter()
                .map(|path| {
                    let id = open(&mut registry, path)?;
                    let summary = apply_filters(&mut registry, &id, filters)?;
                    InspectReport::new(path, &registry, &id, summary)
                })
                .collect::<Result<Vec<_>, CliError>>()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    println!("{report}");
                }
            }
        }

        Command::Export {
            image,
            filters,
            format,
            quality,
            output,
        } => {
            let id = open(&mut registry, image)?;
            apply_filters(&mut registry, &id, filters)?;
            let coordinator = coordinator(config.export, output)?;
            let exported =
                coordinator.export_single(document(&registry, &id)?, (*format).into(), *quality)?;
            let path = write_output(&output.output_dir, &exported)?;
            print_written(cli.json, &path, &exported)?;
        }

        Command::Resize {
            image,
            size,
            filters,
            output,
        } => {
            let id = open(&mut registry, image)?;
            apply_filters(&mut registry, &id, filters)?;
            let coordinator = coordinator(config.export, output)?;
            let exported = coordinator.export_resized(document(&registry, &id)?, *size)?;
            let path = write_output(&output.output_dir, &exported)?;
            print_written(cli.json, &path, &exported)?;
        }

        Command::Icons {
            image,
            sizes,
            standard,
            output,
        } => {
            let id = open(&mut registry, image)?;
            let sizes = bundle_sizes(&config.export, sizes, *standard);
            let coordinator = coordinator(config.export, output)?;
            let (exported, bundle) =
                coordinator.export_bundle(document(&registry, &id)?, &sizes)?;
            for failure in &bundle.failures {
                eprintln!("warning: {failure}");
            }
            let path = write_output(&output.output_dir, &exported)?;
            if cli.json {
                let report = serde_json::json!({
                    "file": path.display().to_string(),
                    "generated": bundle.generated,
                    "entries": bundle.entries.iter().map(|e| &e.name).collect::<Vec<_>>(),
                    "failures": bundle.failures,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_written(false, &path, &exported)?;
                for entry in &bundle.entries {
                    println!("  {} ({} bytes)", entry.name, entry.bytes.len());
                }
            }
        }

        Command::Batch {
            images,
            filters,
            format,
            output,
        } => {
            let mut ids: Vec<DocumentId> = Vec::with_capacity(images.len());
            for path in images {
                let id = open(&mut registry, path)?;
                if ids.contains(&id) {
                    tracing::warn!(path = %path.display(), "duplicate input skipped");
                    continue;
                }
                apply_filters(&mut registry, &id, filters)?;
                ids.push(id);
            }
            let documents = ids
                .iter()
                .map(|id| document(&registry, id))
                .collect::<Result<Vec<_>, _>>()?;

            let coordinator = coordinator(config.export, output)?;
            let quiet = cli.json;
            let results = coordinator.batch_compress(
                &documents,
                (*format).into(),
                &mut |p| {
                    if !quiet {
                        let name = documents.get(p.index).map_or("", |d| d.name());
                        eprintln!("[{:>3.0}%] {name}", p.progress);
                    }
                },
            )?;
            report_batch(cli.json, &results)?;

            let exported =
                ExportCoordinator::package_batch(&results)?.ok_or(CliError::BatchFailed)?;
            let path = write_output(&output.output_dir, &exported)?;
            print_written(cli.json, &path, &exported)?;
        }
    }
    Ok(())
}

/// Read and open `path`, returning the document id.
///
/// The declared type comes from the extension, or from the content
/// when the extension is unknown.
fn open(registry: &mut DocumentRegistry, path: &Path) -> Result<DocumentId, CliError> {
    let read_error = |source| CliError::Read {
        path: path.to_owned(),
        source,
    };
    let bytes = std::fs::read(path).map_err(read_error)?;
    let modified_ms = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let kind = ImageKind::from_extension(extension)
        .or_else(|| ImageKind::sniff(&bytes))
        .ok_or_else(|| CliError::Open {
            path: path.to_owned(),
            source: ValidationError::UnsupportedType(extension.to_owned()),
        })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");

    let document =
        iconforge_pipeline::open_document(registry, name, &bytes, kind.mime(), modified_ms)
            .map_err(|source| CliError::Open {
                path: path.to_owned(),
                source,
            })?;
    tracing::info!(
        path = %path.display(),
        id = %document.id(),
        dimensions = %document.original().dimensions(),
        "opened image"
    );
    Ok(document.id().clone())
}

/// Configure the document's pipeline from the flags and recompute.
fn apply_filters(
    registry: &mut DocumentRegistry,
    id: &DocumentId,
    args: &FilterArgs,
) -> Result<RunSummary, CliError> {
    let document = registry
        .get_mut(id.as_str())
        .ok_or_else(|| CliError::Missing(id.clone()))?;
    let pipeline = document.pipeline_mut();

    if let Some(anchor) = &args.square {
        let Ok(anchor) = anchor.parse::<CropAnchor>();
        pipeline.configure(SquareCrop::NAME, FilterValue::Anchor { anchor });
        pipeline.enable(SquareCrop::NAME);
    }
    if let Some(intensity) = args.grayscale {
        pipeline.configure(Grayscale::NAME, FilterValue::Intensity { intensity });
        pipeline.enable(Grayscale::NAME);
    }
    if args.scale.is_some() || args.resample.is_some() {
        let value = FilterValue::Scale {
            factor: args.scale.unwrap_or(ResolutionScale::DEFAULT_FACTOR),
            quality: args.resample.map(ResampleQuality::from).unwrap_or_default(),
        };
        pipeline.configure(ResolutionScale::NAME, value);
        pipeline.enable(ResolutionScale::NAME);
    }
    if !args.order.is_empty() {
        pipeline.reorder(args.order.as_slice())?;
    }

    let summary = document.recompute_derived();
    for failure in &summary.failures {
        eprintln!("warning: {}: {failure}", document.name());
    }
    Ok(summary)
}

fn document<'r>(
    registry: &'r DocumentRegistry,
    id: &DocumentId,
) -> Result<&'r DocumentContext, CliError> {
    registry
        .get(id.as_str())
        .ok_or_else(|| CliError::Missing(id.clone()))
}

/// Parse `WIDTHxHEIGHT`.
fn parse_size(s: &str) -> Result<Dimensions, String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let side = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("bad side {v:?}: {e}"))
    };
    Ok(Dimensions::new(side(width)?, side(height)?))
}

/// Sizes to request for an icon bundle. Non-standard sizes are allowed
/// but noted.
fn bundle_sizes(config: &ExportConfig, requested: &[u32], standard: bool) -> Vec<u32> {
    if standard {
        return config.standard_sizes.clone();
    }
    for &size in requested {
        if !config.standard_sizes.contains(&size) {
            tracing::warn!(size, standard = ?config.standard_sizes, "non-standard icon size");
        }
    }
    requested.to_vec()
}

fn coordinator(mut config: ExportConfig, args: &OutputArgs) -> Result<ExportCoordinator, CliError> {
    if let Some(secs) = args.timeout_secs {
        config.timeout =
            Duration::try_from_secs_f64(secs).map_err(|e| CliError::Timeout(e.to_string()))?;
    }
    Ok(if args.no_worker {
        ExportCoordinator::new(config)
    } else {
        ExportCoordinator::with_worker(config)
    })
}

fn write_output(dir: &Path, output: &ExportOutput) -> Result<PathBuf, CliError> {
    let write_error = |path: &Path| {
        let path = path.to_owned();
        move |source| CliError::Write { path, source }
    };
    std::fs::create_dir_all(dir).map_err(write_error(dir))?;
    let path = dir.join(output.name());
    std::fs::write(&path, output.bytes()).map_err(write_error(&path))?;
    tracing::info!(path = %path.display(), bytes = output.bytes().len(), "wrote output");
    Ok(path)
}

fn print_written(json: bool, path: &Path, output: &ExportOutput) -> Result<(), CliError> {
    if json {
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "mime": output.mime(),
            "bytes": output.bytes().len(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "wrote {} ({}, {} bytes)",
            path.display(),
            output.mime(),
            output.bytes().len()
        );
    }
    Ok(())
}

fn report_batch(json: bool, results: &[BatchItem]) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    for item in results {
        match &item.outcome {
            Ok(image) => println!(
                "  {} -> {} ({}, {} bytes)",
                item.name,
                image.name,
                image.dimensions,
                image.bytes.len()
            ),
            Err(failure) => println!("  {} failed: {}", item.name, failure.message),
        }
    }
    Ok(())
}

/// One document after filtering.
#[derive(Serialize)]
struct InspectReport {
    path: PathBuf,
    info: DocumentInfo,
    pipeline: PipelineStats,
    summary: RunSummary,
}

impl InspectReport {
    fn new(
        path: &Path,
        registry: &DocumentRegistry,
        id: &DocumentId,
        summary: RunSummary,
    ) -> Result<Self, CliError> {
        let document = document(registry, id)?;
        Ok(Self {
            path: path.to_owned(),
            info: document.info(),
            pipeline: document.pipeline().stats(),
            summary,
        })
    }
}

impl std::fmt::Display for InspectReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} ({})", self.path.display(), self.info.id)?;
        write!(f, "  original: {}", self.info.original)?;
        match self.info.derived {
            Some(derived) => writeln!(f, "  derived: {derived}")?,
            None => writeln!(f)?,
        }
        writeln!(
            f,
            "  filters:  {}/{} active [{}]",
            self.pipeline.active,
            self.pipeline.total,
            self.info.active_filters.join(", ")
        )?;
        writeln!(f, "  order:    {}", self.pipeline.order.join(" -> "))?;
        if self.summary.skipped_busy {
            writeln!(f, "  recompute skipped: pipeline busy")?;
        }
        for failure in &self.summary.failures {
            writeln!(f, "  failed:   {failure}")?;
        }
        write!(f, "  unsaved:  {}", self.info.dirty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use iconforge_pipeline::PixelBuffer;

    use super::*;

    fn registry_with(name: &str, width: u32, height: u32) -> (DocumentRegistry, DocumentId) {
        let mut registry = DocumentRegistry::new(iconforge_pipeline::EditorConfig::default());
        let id = DocumentId::new(name);
        registry.create_context(
            id.clone(),
            name,
            PixelBuffer::filled(width, height, [200, 40, 40, 255]).unwrap(),
        );
        (registry, id)
    }

    #[test]
    fn filter_flags_parse_and_split() {
        let cli = Cli::try_parse_from([
            "iconforge",
            "inspect",
            "a.png",
            "b.png",
            "--square",
            "left",
            "--grayscale",
            "0.5",
            "--order",
            "grayscale,square,resolution",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        let Command::Inspect { images, filters } = cli.command else {
            unreachable!("parsed inspect")
        };
        assert_eq!(images.len(), 2);
        assert_eq!(filters.square.as_deref(), Some("left"));
        assert_eq!(filters.grayscale, Some(0.5));
        assert_eq!(filters.order, ["grayscale", "square", "resolution"]);
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        let result =
            Cli::try_parse_from(["iconforge", "export", "a.png", "--quality", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn icon_sizes_are_comma_separated() {
        let cli =
            Cli::try_parse_from(["iconforge", "icons", "a.png", "--sizes", "16,32,48"]).unwrap();
        let Command::Icons { sizes, output, .. } = cli.command else {
            unreachable!("parsed icons")
        };
        assert_eq!(sizes, [16, 32, 48]);
        assert_eq!(output.output_dir, PathBuf::from("."));
        assert!(!output.no_worker);
    }

    #[test]
    fn standard_flag_uses_configured_sizes() {
        let cli = Cli::try_parse_from(["iconforge", "icons", "a.png", "--standard"]).unwrap();
        let Command::Icons { sizes, standard, .. } = cli.command else {
            unreachable!("parsed icons")
        };
        assert!(standard);
        let config = ExportConfig {
            standard_sizes: vec![24, 96],
            ..ExportConfig::default()
        };
        assert_eq!(bundle_sizes(&config, &sizes, standard), [24, 96]);
        assert_eq!(bundle_sizes(&config, &[20], false), [20]);
        assert!(bundle_sizes(&config, &[], false).is_empty());

        let both = ["iconforge", "icons", "a.png", "--standard", "--sizes", "16"];
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn resize_takes_width_by_height() {
        let cli = Cli::try_parse_from(["iconforge", "resize", "a.png", "64x32", "--grayscale", "1"])
            .unwrap();
        let Command::Resize { size, filters, .. } = cli.command else {
            unreachable!("parsed resize")
        };
        assert_eq!(size, Dimensions::new(64, 32));
        assert_eq!(filters.grayscale, Some(1.0));

        assert!(parse_size("64").is_err());
        assert!(parse_size("64x-1").is_err());
        assert_eq!(parse_size("16X 9").unwrap(), Dimensions::new(16, 9));
    }

    #[test]
    fn square_and_scale_flags_shape_the_derived_buffer() {
        let (mut registry, id) = registry_with("wide.png", 80, 40);
        let args = FilterArgs {
            square: Some("right".into()),
            scale: Some(0.5),
            ..FilterArgs::default()
        };
        let summary = apply_filters(&mut registry, &id, &args).unwrap();
        assert_eq!(summary.applied, ["square", "resolution"]);
        let document = document(&registry, &id).unwrap();
        assert_eq!(document.derived().unwrap().dimensions(), Dimensions::new(20, 20));
    }

    #[test]
    fn resample_alone_enables_default_scale() {
        let (mut registry, id) = registry_with("a.png", 40, 40);
        let args = FilterArgs {
            resample: Some(Resample::Low),
            ..FilterArgs::default()
        };
        apply_filters(&mut registry, &id, &args).unwrap();
        let document = document(&registry, &id).unwrap();
        assert_eq!(document.pipeline().active_filters(), ["resolution"]);
        assert_eq!(document.derived().unwrap().dimensions(), Dimensions::new(20, 20));
    }

    #[test]
    fn bad_order_is_reported() {
        let (mut registry, id) = registry_with("a.png", 10, 10);
        let args = FilterArgs {
            order: vec!["square".into()],
            ..FilterArgs::default()
        };
        assert!(matches!(
            apply_filters(&mut registry, &id, &args),
            Err(CliError::Order(_))
        ));
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let args = OutputArgs {
            output_dir: PathBuf::from("."),
            no_worker: true,
            timeout_secs: Some(-1.0),
        };
        assert!(matches!(
            coordinator(ExportConfig::default(), &args),
            Err(CliError::Timeout(_))
        ));
    }
}
