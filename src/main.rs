use clap::{ArgAction, Parser, Subcommand};
use embedded_thumbs::cache::FsCacheWriter;
use embedded_thumbs::directory::DirectorySource;
use embedded_thumbs::imaging::RustBackend;
use embedded_thumbs::job::{JobOutcome, ThumbnailJob};
use embedded_thumbs::producer::{Registry, guess_mime_type};
use embedded_thumbs::request::{Flavor, ThumbnailRequest};
use embedded_thumbs::{config, output};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "embedded-thumbs")]
#[command(about = "Thumbnails from pre-rendered folder images and embedded document previews")]
#[command(long_about = "\
Thumbnails from pre-rendered folder images and embedded document previews

Two kinds of sources are understood:

  Folders with a .thumbnails subdirectory of size-named images:

    project/
    └── .thumbnails/
        ├── 64.png
        ├── 128.png               # best fit for the 128px 'normal' flavor
        └── 256.svg

  FreeCAD documents (.FCStd), which embed Thumbnails/Thumbnail.png.

The best image is decoded straight to the requested size (never upscaled)
and written to the cache directory as <flavor>/<sha256(uri)>.png.

Run 'embedded-thumbs gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ThumbnailArgs {
    /// Folders or .FCStd files
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Configured flavor to render
    #[arg(long, default_value = "normal", conflicts_with = "size")]
    flavor: String,

    /// Custom bounding box, WxH or a single edge
    #[arg(long, value_parser = parse_size)]
    size: Option<(u32, u32)>,

    /// Where thumbnails are written
    #[arg(long, default_value = ".thumbnail-cache")]
    cache_dir: PathBuf,

    /// MIME type for every source (guessed from the path when omitted)
    #[arg(long)]
    mime: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Render thumbnails into the cache directory
    Thumbnail(ThumbnailArgs),
    /// Show which pre-rendered image a folder would use
    Select {
        /// Folder containing a .thumbnails subdirectory
        dir: PathBuf,
        /// Requested size in pixels
        #[arg(long, default_value_t = 128)]
        size: u32,
    },
    /// List configured flavors
    Flavors,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Thumbnail(args) => {
            let config = config::load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            run_thumbnails(&config, args)?;
        }
        Command::Select { dir, size } => {
            let config = config::load_config(cli.config.as_deref())?;
            let source = DirectorySource::new(
                config.directory.cache_dir_name.clone(),
                config.directory.extensions.clone(),
            );
            let cache_dir = source.cache_dir(&dir);
            let candidates = if cache_dir.is_dir() {
                source.candidates(&cache_dir)?
            } else {
                Vec::new()
            };
            let chosen = source.locate(&dir, size);
            output::print_selection(&dir, size, &candidates, chosen.as_deref().ok());
            chosen?;
        }
        Command::Flavors => {
            let config = config::load_config(cli.config.as_deref())?;
            output::print_flavors(&config.flavors);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_thumbnails(
    config: &config::ThumbsConfig,
    args: ThumbnailArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let flavor = match args.size {
        Some((width, height)) => Flavor::new(format!("{width}x{height}"), width, height),
        None => config
            .flavor(&args.flavor)
            .ok_or_else(|| format!("unknown flavor: {}", args.flavor))?,
    };

    let requests: Vec<ThumbnailRequest> = args
        .sources
        .iter()
        .map(|source| {
            let mime = args
                .mime
                .clone()
                .or_else(|| guess_mime_type(source).map(str::to_string))
                .unwrap_or_else(|| "application/octet-stream".to_string());
            ThumbnailRequest::for_path(&absolute(source), mime, flavor.clone())
        })
        .collect();

    let registry = Registry::from_config(config);
    let backend = RustBackend::new();
    let writer = FsCacheWriter::open(&args.cache_dir);
    let job = ThumbnailJob::new(&registry, &backend, &writer)
        .with_max_source_bytes(config.limits.max_source_bytes);

    let (tx, rx) = std::sync::mpsc::channel::<(JobOutcome, Option<PathBuf>)>();
    let printer = std::thread::spawn({
        let flavor = flavor.clone();
        move || {
            let (mut ready, mut failed) = (0usize, 0usize);
            for (outcome, saved_to) in rx {
                if outcome.is_ready() {
                    ready += 1;
                } else {
                    failed += 1;
                }
                output::print_outcome(&outcome, &flavor, saved_to.as_deref());
            }
            (ready, failed)
        }
    });

    requests.par_iter().for_each_with(tx, |tx, request| {
        if let Some(outcome) = job.run(request) {
            let saved_to = outcome
                .is_ready()
                .then(|| writer.thumbnail_path(&request.uri, &request.flavor));
            tx.send((outcome, saved_to)).ok();
        }
    });

    let (ready, failed) = printer
        .join()
        .map_err(|_| "output thread panicked")?;
    writer.flush()?;
    println!();
    println!("{}", output::format_summary(ready, failed));

    if failed > 0 {
        return Err(format!("{failed} of {} thumbnails failed", ready + failed).into());
    }
    Ok(())
}

/// Parse `WxH` or a single edge `N` into a bounding box.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let parse = |v: &str| -> Result<u32, String> {
        match v.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(format!("invalid size {s:?}: expected WxH or N")),
            Ok(n) => Ok(n),
        }
    };
    match s.split_once(['x', 'X']) {
        Some((w, h)) => Ok((parse(w)?, parse(h)?)),
        None => {
            let n = parse(s)?;
            Ok((n, n))
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("embedded_thumbs={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
