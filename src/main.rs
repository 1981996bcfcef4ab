//! open-nmr: decode an Agilent, Bruker or JEOL 1D experiment and write its
//! processed spectrum.

use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use open_nmr::measure::units::Unit;
use open_nmr::pipeline::processing::Phase;
use open_nmr::{load_experiment, Experiment, ProcessingConfig};

#[derive(Parser)]
#[command(
    name = "open-nmr",
    version,
    about = "Process Agilent, Bruker and JEOL 1D NMR experiments"
)]
struct Cli {
    /// Input: .jdf file, fid file, or experiment directory
    #[arg(short, long)]
    r#in: PathBuf,

    /// Output spectrum as ppm/intensity TSV (or - for stdout)
    #[arg(short, long, default_value = "-")]
    out: String,

    /// Processing configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Zero-fill to this many complex points
    #[arg(long)]
    zero_fill: Option<usize>,

    /// Zero-fill to the next power of two
    #[arg(long, default_value_t = false)]
    power_of_two: bool,

    /// Exponential line broadening in Hz
    #[arg(long)]
    lb: Option<f64>,

    /// Skip the automatic zero-order phase search
    #[arg(long, default_value_t = false)]
    no_auto_phase: bool,

    /// Manual zero-order phase in units of π rad (overrides the search)
    #[arg(long, allow_hyphen_values = true)]
    ph0: Option<f64>,

    /// Manual first-order phase in units of π rad
    #[arg(long, allow_hyphen_values = true)]
    ph1: Option<f64>,

    /// Integrate a region, BEGIN:END in --unit (repeatable)
    #[arg(long = "integrate", value_name = "BEGIN:END")]
    regions: Vec<String>,

    /// Unit of the integration bounds
    #[arg(long, default_value = "ppm")]
    unit: Unit,

    /// Write the processing history as JSON
    #[arg(long)]
    history: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long, default_value_t = false)]
    verb: bool,
}

fn parse_region(region: &str) -> Result<(f64, f64), Box<dyn std::error::Error>> {
    let (a, b) = region
        .split_once(':')
        .ok_or_else(|| format!("region {:?} is not BEGIN:END", region))?;
    Ok((a.trim().parse()?, b.trim().parse()?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verb { "debug" } else { "info" }),
    )
    .format_timestamp_secs()
    .init();

    let mut config = match &cli.config {
        Some(path) => ProcessingConfig::load(path)?,
        None => ProcessingConfig::default(),
    };
    if cli.zero_fill.is_some() {
        config.zero_fill = cli.zero_fill;
    }
    if cli.lb.is_some() {
        config.line_broadening_hz = cli.lb;
    }
    if cli.no_auto_phase || cli.ph0.is_some() {
        config.auto_phase = false;
    }
    config.validate()?;

    let mut experiment = load_experiment(&cli.r#in, &config)?;
    if cli.power_of_two {
        experiment.zero_fill_to_power_of_two();
    }
    if cli.ph0.is_some() || cli.ph1.is_some() {
        experiment.set_phase(Phase {
            ph0: cli.ph0.unwrap_or(experiment.phase().ph0),
            ph1: cli.ph1.unwrap_or(0.0),
            ..experiment.phase()
        });
    }

    for region in &cli.regions {
        let (begin, end) = parse_region(region)?;
        let rec = experiment.integrate(begin, end, cli.unit)?;
        eprintln!(
            "{:>10.4} {:>10.4} {} | {:.6e} | {:.4}",
            begin, end, cli.unit, rec.value, rec.relative_value
        );
    }

    if cli.verb {
        eprintln!("{}", experiment.info().summary());
        eprintln!("Phase: {}", experiment.phase());
    }

    write_spectrum(&cli.out, &experiment)?;

    if let Some(path) = &cli.history {
        experiment.history().save_json(path)?;
    }
    Ok(())
}

fn write_spectrum(out_path: &str, experiment: &Experiment) -> Result<(), Box<dyn std::error::Error>> {
    let mut out: Box<dyn Write> = if out_path == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        Box::new(BufWriter::new(File::create(out_path)?))
    };

    let axis = experiment.axis();
    let len = experiment.spectrum().len();
    let last = len.saturating_sub(1).max(1) as f64;
    for (i, v) in experiment.spectrum().iter().enumerate() {
        let ppm = axis.fraction_to(i as f64 / last, Unit::Ppm);
        writeln!(out, "{:.6}\t{:.6e}", ppm, v)?;
    }
    out.flush()?;
    Ok(())
}
