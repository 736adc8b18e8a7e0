use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use watermark_unblend::{
    default_output_path, is_supported_image, load_image, resolve, save_image, Error, ForceMode,
    JobRouter, LogoOverlay, MaskSet, PixelBuffer, ProcessingConfig, SessionEvent, SessionState,
    Workbench, CLEAN_SUFFIX, DEFAULT_QUEUE_DEPTH,
};

#[derive(Parser)]
#[command(
    name = "watermark-unblend",
    about = "Remove a fixed corner watermark via reverse alpha blending",
    version,
    after_help = "Simple usage: watermark-unblend <image>  (writes <name>_clean.png next to it)\n\n\
                  The mask templates are the watermark rendered as a light shape on a dark\n\
                  background, 48x48 and 96x96."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_clean.png)
    #[arg(short, long)]
    output: Option<String>,

    /// 48x48 watermark template
    #[arg(long, default_value = "assets/mask_48.png")]
    mask_small: PathBuf,

    /// 96x96 watermark template
    #[arg(long, default_value = "assets/mask_96.png")]
    mask_large: PathBuf,

    /// Watermark size: inferred from dimensions, or forced
    #[arg(short, long, value_enum, default_value_t = Mode::Auto)]
    mode: Mode,

    /// Removal strength (1.0-3.0); higher clears stubborn residue
    #[arg(short, long, default_value = "1.0")]
    gain: f32,

    /// Replacement logo drawn where the watermark was
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Logo opacity (0.0-1.0)
    #[arg(long, default_value = "0.8")]
    logo_opacity: f32,

    /// Logo scale relative to the watermark (0.1-2.0)
    #[arg(long, default_value = "1.0")]
    logo_scale: f32,

    /// Jobs allowed to wait for the kernel at once
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Auto,
    Small,
    Large,
}

impl From<Mode> for ForceMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Auto => ForceMode::Auto,
            Mode::Small => ForceMode::Small,
            Mode::Large => ForceMode::Large,
        }
    }
}

/// Outcome for one input file.
struct ProcessResult {
    path: PathBuf,
    success: bool,
    skipped: bool,
    message: String,
}

impl ProcessResult {
    fn new(path: &Path, success: bool, skipped: bool, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            success,
            skipped,
            message: message.into(),
        }
    }
}

/// An input file and where its cleaned copy goes.
struct Target {
    input: PathBuf,
    output: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }

    let config = match ProcessingConfig::new(cli.mode.into(), cli.gain) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let overlay = match build_overlay(&cli) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: Failed to load logo: {e}");
            process::exit(1);
        }
    };

    let masks = match MaskSet::load_files(&cli.mask_small, &cli.mask_large) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Fatal: Failed to load watermark masks: {e}");
            process::exit(1);
        }
    };

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    let targets = match collect_targets(input_path, cli.output.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal: Failed to start runtime: {e}");
            process::exit(1);
        }
    };

    let results = match runtime.block_on(run(&cli, masks, overlay, config, &targets)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Fatal: {e}");
            process::exit(1);
        }
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &cli);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn build_overlay(cli: &Cli) -> watermark_unblend::Result<LogoOverlay> {
    let logo = match &cli.logo {
        Some(path) => Some(image::open(path)?.to_rgba8()),
        None => None,
    };
    LogoOverlay::new(logo, cli.logo_opacity, cli.logo_scale)
}

fn collect_targets(input: &Path, output: Option<&str>) -> watermark_unblend::Result<Vec<Target>> {
    if !input.is_dir() {
        let output = output.map_or_else(|| default_output_path(input), PathBuf::from);
        return Ok(vec![Target {
            input: input.to_path_buf(),
            output,
        }]);
    }

    let Some(output_dir) = output.map(PathBuf::from) else {
        return Err(Error::InvalidConfig(
            "output directory is required for batch processing \
             (usage: watermark-unblend <input_dir> -o <output_dir>)"
                .to_string(),
        ));
    };
    std::fs::create_dir_all(&output_dir)?;

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    inputs.sort();

    Ok(inputs
        .into_iter()
        .map(|input| {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            let output = output_dir.join(format!("{stem}{CLEAN_SUFFIX}.png"));
            Target { input, output }
        })
        .collect())
}

async fn run(
    cli: &Cli,
    masks: MaskSet,
    overlay: LogoOverlay,
    config: ProcessingConfig,
    targets: &[Target],
) -> watermark_unblend::Result<Vec<ProcessResult>> {
    info!("Decoding {} images", targets.len());
    let decoded: Vec<watermark_unblend::Result<PixelBuffer>> =
        targets.par_iter().map(|t| load_image(&t.input)).collect();

    let router = JobRouter::start(masks, cli.queue_depth)?;
    let mut bench = Workbench::new(router, overlay);

    let mut results = Vec::new();
    let mut by_session = HashMap::new();

    for (target, image) in targets.iter().zip(decoded) {
        if let Ok(buffer) = &image {
            if let Err(e) = resolve(buffer.width(), buffer.height(), config.force_mode) {
                results.push(ProcessResult::new(&target.input, true, true, e.to_string()));
                continue;
            }
        }
        let id = bench.add(image, config).await?;
        by_session.insert(id, target);
    }

    while let Some(event) = bench.next_event().await {
        match event {
            SessionEvent::Ready(id) => debug!("Session {id} ready"),
            SessionEvent::Failed { session, message } => {
                error!("Session {session} failed: {message}");
            }
        }
    }

    let ready = bench.ready_outputs();
    let saved: Vec<(u64, watermark_unblend::Result<()>)> = ready
        .par_iter()
        .map(|(id, img)| {
            let target = by_session[id];
            if let Some(parent) = target.output.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        return (*id, Err(Error::Io(e)));
                    }
                }
            }
            (*id, save_image(img, &target.output))
        })
        .collect();
    let saved: HashMap<u64, watermark_unblend::Result<()>> = saved.into_iter().collect();

    let mut ids: Vec<u64> = by_session.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let target = by_session[&id];
        let result = match (saved.get(&id), bench.session(id).map(|s| s.state())) {
            (Some(Ok(())), _) => ProcessResult::new(
                &target.input,
                true,
                false,
                format!("Watermark removed -> {}", target.output.display()),
            ),
            (Some(Err(e)), _) => {
                ProcessResult::new(&target.input, false, false, format!("Failed to save: {e}"))
            }
            (None, Some(SessionState::Failed(message))) => {
                ProcessResult::new(&target.input, false, false, message.clone())
            }
            (None, _) => ProcessResult::new(&target.input, false, false, "No result from kernel"),
        };
        results.push(result);
    }

    bench.shutdown();
    Ok(results)
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    if cli.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        if !cli.quiet {
            eprintln!("[SKIP] {filename}: {}", result.message);
        }
    } else if result.success {
        if !cli.quiet {
            eprintln!("[OK] {filename}");
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if cli.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
