use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use winks_lib::{
    config::{AnalysisConfig, CacheGranularity, HarmonicIndexing, SourceConfig, SyntheticConfig},
    harmonics::HarmonicFit,
    ingest::{populate_cache, UnsupportedDecoder},
    pipeline::{analyze, NoopObserver, Observer},
    plot::{figure_from_fit, figure_from_spectrum, figure_from_waveform, Figure, Series},
    signal::{Channel, Peak, Recording, Spectrum},
    BeatResult,
};

const SPECTRUM_PLOT_POINTS: usize = 4096;

#[derive(Parser)]
#[command(
    name = "winks",
    version,
    about = "Measure the blink rates of two distant lights in a video and their beat period"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Indexing {
    Ratio,
    Nearest,
}

impl From<Indexing> for HarmonicIndexing {
    fn from(value: Indexing) -> Self {
        match value {
            Indexing::Ratio => HarmonicIndexing::Ratio,
            Indexing::Nearest => HarmonicIndexing::Nearest,
        }
    }
}

#[derive(Args)]
struct SourceArgs {
    /// TOML analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the cached sample arrays
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Generate square-wave lights instead of decoding a video
    #[arg(long)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate both blink frequencies and the beat period
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
        /// Suppress graphics, render no plots
        #[arg(short = 'b', long = "no-plots")]
        no_plots: bool,
        /// How many seconds to analyze
        #[arg(short = 't', long = "time")]
        time: Option<f64>,
        /// Peak must dominate +-window spectrum bins
        #[arg(long)]
        window: Option<usize>,
        /// Peak must exceed this amplitude
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long, value_enum)]
        harmonics: Option<Indexing>,
        /// Also cache the per-light spectra
        #[arg(long)]
        spectrum_cache: bool,
        #[arg(long, default_value = "plots")]
        plot_dir: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode the source once and write the sample cache
    Ingest {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            source,
            no_plots,
            time,
            window,
            threshold,
            harmonics,
            spectrum_cache,
            plot_dir,
            json,
        } => {
            let mut cfg = load_config(&source)?;
            if let Some(t) = time {
                cfg.max_duration = Some(t);
            }
            if let Some(window) = window {
                cfg.peaks.window = window;
            }
            if let Some(threshold) = threshold {
                cfg.peaks.threshold = threshold;
            }
            if let Some(harmonics) = harmonics {
                cfg.harmonics = harmonics.into();
            }
            if spectrum_cache {
                cfg.cache.granularity = CacheGranularity::Spectra;
            }
            cmd_analyze(&cfg, (!no_plots).then_some(plot_dir.as_path()), json)?
        }
        Commands::Ingest { source } => cmd_ingest(&load_config(&source)?)?,
    }
    Ok(())
}

fn load_config(args: &SourceArgs) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(path) => AnalysisConfig::from_toml_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = &args.cache_dir {
        cfg.cache.dir = dir.clone();
    }
    if args.synthetic && !matches!(cfg.source, SourceConfig::Synthetic(_)) {
        cfg.source = SourceConfig::Synthetic(SyntheticConfig::default());
    }
    Ok(cfg)
}

fn cmd_ingest(cfg: &AnalysisConfig) -> Result<()> {
    cfg.validate()?;
    let recording = populate_cache(cfg, &UnsupportedDecoder)?;
    println!(
        "{}",
        serde_json::json!({
            "cache_dir": cfg.cache.dir,
            "samples": recording.len(),
            "duration_s": recording.duration(),
        })
    );
    Ok(())
}

fn cmd_analyze(cfg: &AnalysisConfig, plot_dir: Option<&Path>, json: bool) -> Result<()> {
    let result = match plot_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating plot directory {}", dir.display()))?;
            analyze(cfg, &UnsupportedDecoder, &mut PngPlotter::new(dir))?
        }
        None => analyze(cfg, &UnsupportedDecoder, &mut NoopObserver)?,
    };
    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &BeatResult) {
    println!("Analysis complete");
    println!(
        "\tLight 1 was found to have a frequency of {:.4} Hz and Light 2 had a frequency of {:.4} Hz",
        result.light1_hz, result.light2_hz
    );
    println!(
        "\tThe beat period (time for a full phase-cycle) is {:.2} minutes.",
        result.beat_period_minutes
    );
}

/// Renders every pipeline observation to a PNG file.
struct PngPlotter {
    dir: PathBuf,
}

impl PngPlotter {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn render(&self, name: &str, fig: &Figure) {
        let path = self.dir.join(name);
        let drawn = draw_plotters_figure(&path, fig, true).or_else(|err| {
            // usually a missing system font; the data still gets drawn
            warn!("could not label {}: {err:#}", path.display());
            draw_plotters_figure(&path, fig, false)
        });
        if let Err(err) = drawn {
            warn!("could not draw {}: {err:#}", path.display());
        }
    }
}

fn channel_stem(channel: Channel) -> &'static str {
    match channel {
        Channel::Light1 => "light1",
        Channel::Light2 => "light2",
    }
}

impl Observer for PngPlotter {
    fn on_waveform(&mut self, recording: &Recording) {
        self.render("waveform.png", &figure_from_waveform(recording));
    }

    fn on_spectrum(&mut self, channel: Channel, spectrum: &Spectrum, peaks: &[Peak]) {
        let fig = figure_from_spectrum(channel, spectrum, peaks, SPECTRUM_PLOT_POINTS);
        self.render(&format!("{}_spectrum.png", channel_stem(channel)), &fig);
    }

    fn on_fit(&mut self, channel: Channel, fit: &HarmonicFit) {
        let fig = figure_from_fit(channel, fit);
        self.render(&format!("{}_harmonics.png", channel_stem(channel)), &fig);
    }
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

fn draw_plotters_figure(path: &Path, fig: &Figure, labelled: bool) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
    let (x_min, x_max) = padded(x_min, x_max);
    let (y_min, y_max) = padded(y_min, y_max);
    let backend = BitMapBackend::new(path, (800, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if labelled {
        builder
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    if labelled {
        chart
            .configure_mesh()
            .x_desc(fig.x.label.clone().unwrap_or_default())
            .y_desc(fig.y.label.clone().unwrap_or_default())
            .draw()?;
    }
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    &RGBColor(r, g, b),
                ))?;
            }
            Series::Points(points) => {
                let (r, g, b) = points.style.color.rgb();
                let radius = points.style.width.round() as i32;
                chart.draw_series(points.points.iter().map(|p| {
                    Circle::new((p[0], p[1]), radius, RGBColor(r, g, b).filled())
                }))?;
            }
        }
    }
    root.present()?;
    Ok(())
}
