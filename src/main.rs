//! QSSA command-line interface.
//!
//! ```sh
//! qssa-iop fit reference.json --dataset loisel23 -x 1 -y 0
//! qssa-iop invert spectra.json --config params.json --output iops.json
//! qssa-iop assess reference.json --config params.json
//! qssa-iop validate params.json
//! qssa-iop list
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;

use qssa_iop::config::{DatasetId, DatasetKey, ParameterConfiguration};
use qssa_iop::iop::diagnostics::assess;
use qssa_iop::iop::{InversionEngine, TabulatedWater};
use qssa_iop::qssa::{CoefficientStore, FitOptions, FitPolicy, fit, smooth_with_degree};
use qssa_iop::readers::create_reader;

#[derive(Parser)]
#[command(name = "qssa-iop")]
#[command(about = "QSSA retrieval of non-water absorption and backscattering")]
#[command(version)]
struct Cli {
    /// Directory holding the coefficient archives.
    #[arg(long, global = true, default_value = "qssa_store")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit and smooth QSSA coefficients from a reference dataset.
    Fit {
        /// Reference dataset (JSON with wave, Rrs, a, bb).
        reference: PathBuf,
        #[arg(long, default_value = "loisel23")]
        dataset: String,
        #[arg(short, default_value_t = 1)]
        x: u32,
        #[arg(short, default_value_t = 0)]
        y: u32,
        /// Fit every n-th wavelength.
        #[arg(long, default_value_t = 1)]
        stride: usize,
        /// Leave non-converging wavelengths out instead of failing.
        #[arg(long)]
        skip_gaps: bool,
        /// Spline degree (odd).
        #[arg(long, default_value_t = 3)]
        degree: usize,
    },
    /// Retrieve anw and bbnw from Rrs spectra.
    Invert {
        /// Spectra (JSON with wave, Rrs).
        spectra: PathBuf,
        /// Parameter configuration; defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Water table (JSON with wave, aw, bbw); bundled pure water when omitted.
        #[arg(long)]
        water: Option<PathBuf>,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Median relative offsets against a reference dataset's truth IOPs.
    Assess {
        reference: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a parameter configuration file.
    Validate { config: PathBuf },
    /// List the datasets with stored coefficients.
    List,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ParameterConfiguration> {
    match path {
        Some(path) => ParameterConfiguration::from_file(path)
            .with_context(|| format!("invalid configuration {}", path.display())),
        None => Ok(ParameterConfiguration::default()),
    }
}

fn load_water(path: Option<&Path>) -> anyhow::Result<TabulatedWater> {
    let Some(path) = path else {
        return Ok(TabulatedWater::pure_water());
    };
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid water table {}", path.display()))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let store = CoefficientStore::new(&cli.store);

    match cli.command {
        Commands::Fit {
            reference,
            dataset,
            x,
            y,
            stride,
            skip_gaps,
            degree,
        } => {
            let dataset: DatasetId = dataset.parse()?;
            let key = DatasetKey::new(dataset, x, y);

            let reference = create_reader(path_string(&reference))?.read_reference()?;
            info!("Reference dataset:\n{}", reference);

            let options = FitOptions {
                stride,
                policy: if skip_gaps {
                    FitPolicy::SkipGaps
                } else {
                    FitPolicy::Abort
                },
                ..FitOptions::default()
            };
            let report = fit(&reference, &options)?;
            let smoothed = smooth_with_degree(&report.table, degree)?;
            let path = store.save(&key, &report.table, &smoothed.curve)?;

            println!("Fitted {} wavelengths for {}", report.table.len(), key);
            if !report.gaps.is_empty() {
                println!("  Skipped: {} wavelength(s)", report.gaps.len());
            }
            if smoothed.degree_reduced() {
                println!("  Spline degree reduced to {}", smoothed.degree);
            }
            println!("  Worst relative RMS: {:.3e}", report.table.worst_rms());
            println!("  Saved: {}", path.display());
            Ok(())
        }
        Commands::Invert {
            spectra,
            config,
            water,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let water = load_water(water.as_deref())?;
            let spectra = create_reader(path_string(&spectra))?.read_spectra()?;

            let engine = InversionEngine::new(store, water);
            let results = engine.invert_batch(&spectra.wave, &spectra.rrs, &config)?;

            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("cannot create {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    serde_json::to_writer_pretty(&mut writer, &results)?;
                    writer.flush()?;
                    println!("Inverted {} spectra: {}", results.len(), path.display());
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    serde_json::to_writer_pretty(&mut stdout, &results)?;
                    writeln!(stdout)?;
                }
            }
            Ok(())
        }
        Commands::Assess { reference, config } => {
            let config = load_config(config.as_deref())?;
            let reference = create_reader(path_string(&reference))?.read_reference()?;
            let water = TabulatedWater::from_reference(&reference)?;
            let (_, curve) = store.load(config.dataset())?;

            let assessment = assess(&reference, &curve, &water, &config)?;
            println!("Samples inverted: {}", assessment.offsets.len());
            println!("Samples failed:   {}", assessment.failed.len());
            println!(
                "Median relative offset anw:  {:+.2}%",
                100.0 * assessment.median_anw()
            );
            println!(
                "Median relative offset bbnw: {:+.2}%",
                100.0 * assessment.median_bbnw()
            );
            Ok(())
        }
        Commands::Validate { config } => {
            let params = load_config(Some(config.as_path()))?;
            println!("Configuration is valid: {}", config.display());
            println!("{:#?}", params);
            Ok(())
        }
        Commands::List => {
            let keys = store.list()?;
            if keys.is_empty() {
                bail!("no coefficient archives in {}", store.root().display());
            }
            for key in keys {
                let archive = store.load_archive(&key)?;
                println!(
                    "{:<28} {:>4} rows  {:.0}-{:.0} nm  created {}",
                    key.file_stem(),
                    archive.table.len(),
                    archive.curve.support().0,
                    archive.curve.support().1,
                    archive.created.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }
    }
}
