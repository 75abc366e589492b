//! ionreg CLI: ion-image extraction, landmark collection and registration.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use ionreg::{
    estimate_from_pairs, extract_ion_images, fit_stats, load_event_script, parse_mass_list,
    replay, run_warp_job, AffineTransform, BatchConfig, CanvasSurface, CorrespondenceSet,
    EventResponse, FigureLayout, FitStats, HookAdapter, Image, Interpolation, IonregConfig,
    LandmarkPair, SpectralDataset, WarpInput, WarpJob,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ionreg")]
#[command(about = "Register mass-spectrometry ion images onto optical tissue images")]
#[command(version)]
struct Cli {
    /// JSON configuration file; command-line flags take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract ion images from a spectral dataset into m/z tables.
    Extract(ExtractArgs),

    /// Collect landmark pairs by replaying recorded clicks on the two-panel figure.
    Hook(HookArgs),

    /// Fit the affine transform to a landmark file and report residuals.
    Fit(FitArgs),

    /// Warp one ion image or a directory of ion images onto the optical grid.
    Warp(WarpArgs),

    /// Print panel and control boxes of the figure as JSON.
    Layout(LayoutArgs),
}

#[derive(Debug, Clone, Args)]
struct ExtractArgs {
    /// Spectral dataset (JSON with per-pixel spectra).
    #[arg(long)]
    dataset: PathBuf,

    /// Comma-separated target masses, e.g. "885.5,766.5".
    #[arg(long)]
    mz: String,

    /// m/z tolerance (default from config: 1.0).
    #[arg(long)]
    tol: Option<f64>,

    /// Output directory (default from config: EIT).
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct HookArgs {
    /// Optical image (raster or table).
    #[arg(long)]
    optical: PathBuf,

    /// Ion image table.
    #[arg(long)]
    eit: PathBuf,

    /// Recorded surface events (JSON array).
    #[arg(long)]
    events: PathBuf,

    /// Landmark file written on Save (default from config: hooks.tis).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the rendered figure to this PNG after every redraw.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Figure size in surface pixels, e.g. 640x480.
    #[arg(long)]
    figure_size: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct FitArgs {
    /// Landmark file.
    #[arg(long, default_value = "hooks.tis")]
    hooks: PathBuf,

    /// Write transform and fit statistics as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("input").required(true).args(["eit", "eit_dir"])))]
struct WarpArgs {
    /// Landmark file.
    #[arg(long, default_value = "hooks.tis")]
    hooks: PathBuf,

    /// Optical image defining the output grid.
    #[arg(long)]
    optical: PathBuf,

    /// Single ion image table.
    #[arg(long)]
    eit: Option<PathBuf>,

    /// Directory of ion image tables.
    #[arg(long)]
    eit_dir: Option<PathBuf>,

    /// Output directory (default from config: EITwarp).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output file name prefix (default from config: wpd).
    #[arg(long)]
    prefix: Option<String>,

    /// Interpolation order.
    #[arg(long, value_enum)]
    interpolation: Option<InterpolationArg>,

    /// Value for output pixels that fall outside the ion image.
    #[arg(long)]
    background: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct LayoutArgs {
    #[arg(long)]
    optical: PathBuf,

    #[arg(long)]
    eit: PathBuf,

    /// Figure size in surface pixels, e.g. 640x480.
    #[arg(long)]
    figure_size: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InterpolationArg {
    Nearest,
    Bilinear,
}

impl InterpolationArg {
    fn to_core(self) -> Interpolation {
        match self {
            Self::Nearest => Interpolation::Nearest,
            Self::Bilinear => Interpolation::Bilinear,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract(args) => run_extract(&args, &config),
        Commands::Hook(args) => run_hook(&args, &config),
        Commands::Fit(args) => run_fit(&args),
        Commands::Warp(args) => run_warp(&args, &config),
        Commands::Layout(args) => run_layout(&args, &config),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<IonregConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            Ok(IonregConfig::from_json_file(p)?)
        }
        None => Ok(IonregConfig::default()),
    }
}

/// Parse `WIDTHxHEIGHT`.
fn parse_figure_size(s: &str) -> CliResult<[f64; 2]> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("figure size must look like 640x480, got '{s}'"))?;
    let w: f64 = w.trim().parse()?;
    let h: f64 = h.trim().parse()?;
    if !(w >= 1.0 && h >= 1.0) {
        return Err(format!("figure size must be positive, got '{s}'").into());
    }
    Ok([w, h])
}

fn figure_layout(
    optical: &Image,
    ion: &Image,
    figure_size: Option<&str>,
    config: &IonregConfig,
) -> CliResult<FigureLayout> {
    let mut layout_cfg = config.hook.layout.clone();
    if let Some(size) = figure_size {
        layout_cfg.figure_size = parse_figure_size(size)?;
    }
    Ok(FigureLayout::side_by_side(optical.dims(), ion.dims(), &layout_cfg))
}

// ── extract ────────────────────────────────────────────────────────────

fn run_extract(args: &ExtractArgs, config: &IonregConfig) -> CliResult<()> {
    let masses = parse_mass_list(&args.mz)?;
    let tol = args.tol.unwrap_or(config.extract.tolerance);
    let out_dir = args.out_dir.as_ref().unwrap_or(&config.extract.out_dir);

    tracing::info!("Loading dataset: {}", args.dataset.display());
    let dataset = SpectralDataset::from_json_file(&args.dataset)?;
    let written = extract_ion_images(&dataset, &masses, tol, out_dir)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

// ── hook ───────────────────────────────────────────────────────────────

fn run_hook(args: &HookArgs, config: &IonregConfig) -> CliResult<()> {
    let optical = Image::open(&args.optical)?;
    let ion = Image::open(&args.eit)?;
    tracing::info!(
        "Optical {}x{}, ion image {}x{}",
        optical.width(),
        optical.height(),
        ion.width(),
        ion.height()
    );

    let layout = figure_layout(&optical, &ion, args.figure_size.as_deref(), config)?;
    let mut surface = CanvasSurface::new(layout.clone(), config.hook.marker.clone());
    if let Some(preview) = &args.preview {
        surface = surface.with_output(preview);
    }
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| config.hook.landmark_file.clone());

    let events = load_event_script(&args.events)?;
    let mut adapter = HookAdapter::new(layout, surface, out, &optical, &ion)?;
    let responses = replay(&mut adapter, &events)?;

    let mut saved = 0usize;
    for response in &responses {
        match response {
            EventResponse::Saved(report) => {
                saved += 1;
                println!(
                    "saved {} pair(s) to {}",
                    report.pairs_written,
                    report.path.display()
                );
            }
            EventResponse::Cleared { discarded } => println!("cleared {discarded} pair(s)"),
            EventResponse::OutOfTurn { expected, got } => println!(
                "ignored click on panel {} (waiting for panel {})",
                got + 1,
                expected + 1
            ),
            _ => {}
        }
    }
    if saved == 0 {
        tracing::warn!("event script never activated Save; no landmark file written");
    }

    let session = adapter.session();
    tracing::info!(
        "{} event(s) replayed, {} complete pair(s) in session",
        events.len(),
        session.correspondences().len()
    );
    Ok(())
}

// ── fit ────────────────────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct FitOutput<'a> {
    transform: AffineTransform,
    stats: FitStats,
    pairs: &'a [LandmarkPair],
}

fn run_fit(args: &FitArgs) -> CliResult<()> {
    let set = CorrespondenceSet::read(&args.hooks)?;
    let transform = estimate_from_pairs(set.pairs())?;
    let stats = fit_stats(&transform, set.pairs());

    println!("affine transform (optical -> ion image):");
    for row in transform.to_array() {
        println!("  [{:12.6} {:12.6} {:12.6}]", row[0], row[1], row[2]);
    }
    println!(
        "pairs: {}  rms: {:.3} px  mean: {:.3} px  p95: {:.3} px  max: {:.3} px",
        stats.n_pairs, stats.rms_px, stats.mean_px, stats.p95_px, stats.max_px
    );

    if let Some(path) = &args.json {
        let output = FitOutput {
            transform,
            stats,
            pairs: set.pairs(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&output)?)?;
        tracing::info!("Fit written to {}", path.display());
    }
    Ok(())
}

// ── warp ───────────────────────────────────────────────────────────────

impl WarpArgs {
    fn to_job(&self, config: &IonregConfig) -> CliResult<WarpJob> {
        let input = match (&self.eit, &self.eit_dir) {
            (Some(file), None) => WarpInput::File(file.clone()),
            (None, Some(dir)) => WarpInput::Directory(dir.clone()),
            _ => return Err("exactly one of --eit or --eit-dir is required".into()),
        };

        let mut batch: BatchConfig = config.batch.clone();
        if let Some(out_dir) = &self.out_dir {
            batch.out_dir = out_dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            batch.prefix = prefix.clone();
        }
        if let Some(interpolation) = self.interpolation {
            batch.warp.interpolation = interpolation.to_core();
        }
        if let Some(background) = self.background {
            batch.warp.background = background;
        }

        Ok(WarpJob {
            landmarks: self.hooks.clone(),
            optical: self.optical.clone(),
            input,
            config: batch,
        })
    }
}

fn run_warp(args: &WarpArgs, config: &IonregConfig) -> CliResult<()> {
    let job = args.to_job(config)?;
    let report = run_warp_job(&job)?;

    for path in &report.written {
        println!("{}", path.display());
    }
    if !report.failed.is_empty() {
        for failure in &report.failed {
            eprintln!("failed: {}: {}", failure.path.display(), failure.reason);
        }
        return Err(format!(
            "{} of {} file(s) could not be warped",
            report.failed.len(),
            report.failed.len() + report.written.len()
        )
        .into());
    }
    Ok(())
}

// ── layout ─────────────────────────────────────────────────────────────

fn run_layout(args: &LayoutArgs, config: &IonregConfig) -> CliResult<()> {
    let optical = Image::open(&args.optical)?;
    let ion = Image::open(&args.eit)?;
    let layout = figure_layout(&optical, &ion, args.figure_size.as_deref(), config)?;
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn figure_size_parsing() {
        assert_eq!(parse_figure_size("640x480").unwrap(), [640.0, 480.0]);
        assert_eq!(parse_figure_size("800 X 600").unwrap(), [800.0, 600.0]);
        assert!(parse_figure_size("640").is_err());
        assert!(parse_figure_size("0x480").is_err());
    }

    #[test]
    fn warp_requires_exactly_one_input() {
        let base = ["ionreg", "warp", "--optical", "o.png"];
        assert!(Cli::try_parse_from(base).is_err());
        assert!(Cli::try_parse_from([&base[..], &["--eit", "a.csv", "--eit-dir", "EIT"][..]].concat()).is_err());
        assert!(Cli::try_parse_from([&base[..], &["--eit-dir", "EIT"][..]].concat()).is_ok());
    }

    #[test]
    fn warp_flags_override_config() {
        let cli = Cli::try_parse_from([
            "ionreg", "warp", "--optical", "o.png", "--eit", "a.csv", "--prefix", "al_",
            "--interpolation", "nearest",
        ])
        .unwrap();
        let Commands::Warp(args) = cli.command else {
            panic!("expected warp");
        };
        let job = args.to_job(&IonregConfig::default()).unwrap();
        assert_eq!(job.input, WarpInput::File(PathBuf::from("a.csv")));
        assert_eq!(job.config.prefix, "al_");
        assert_eq!(job.config.out_dir, PathBuf::from("EITwarp"));
        assert_eq!(job.config.warp.interpolation, Interpolation::Nearest);
        assert_eq!(job.landmarks, PathBuf::from("hooks.tis"));
    }

    #[test]
    fn fit_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = dir.path().join("hooks.tis");
        CorrespondenceSet::from_pairs(vec![
            LandmarkPair::new([0.0, 0.0], [10.0, 10.0]),
            LandmarkPair::new([1.0, 0.0], [11.0, 10.0]),
            LandmarkPair::new([0.0, 1.0], [10.0, 11.0]),
        ])
        .write(&hooks)
        .unwrap();
        let json = dir.path().join("fit.json");
        run_fit(&FitArgs {
            hooks,
            json: Some(json.clone()),
        })
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        let tx = value["transform"][0][2].as_f64().unwrap();
        assert!((tx - 10.0).abs() < 1e-9);
        assert_eq!(value["stats"]["n_pairs"], 3);
    }
}
