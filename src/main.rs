use clap::Parser;
use env_logger::Env;
use neighbor_models::{analyze, AnalysisConfig, Result, StructureFormat, StructureModel};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "nbmodel")]
#[command(about = "Neighbor shells and interaction coefficients for a crystal structure")]
#[command(version)]
struct Cli {
    /// Structure file (POSCAR, CIF or XYZ, chosen by extension)
    structure: PathBuf,

    /// Analysis config; the per-user settings file is used if omitted
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" (overrides NBMODEL_LOG)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Number of threads to use (default: all available cores)
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(Env::new().filter_or("NBMODEL_LOG", "info"));
    if let Some(level) = &cli.log_level {
        logger.parse_filters(level);
    }
    logger.init();

    if let Some(threads) = cli.threads {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            Ok(()) => log::info!("using {} threads", threads),
            Err(e) => log::warn!("failed to set thread pool size: {}", e),
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::load_default(),
    };

    let path = &cli.structure;
    let structure = StructureModel::from_file(path, StructureFormat::from_path(path))?;
    let analysis = analyze(&structure, &config)?;

    // Shells and the wide coefficient table, ready for a linear fit
    let report = serde_json::json!({
        "structure": path.display().to_string(),
        "num_sites": analysis.structure.num_sites(),
        "subspecies": analysis.structure.subspecies_labels(),
        "shells": analysis.neighbors.shells(),
        "coefficients": analysis.coefficients.to_wide(),
    });
    let text = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
    println!("{}", text);
    Ok(())
}
