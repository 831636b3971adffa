//! Calibra command-line entry point.
//!
//! `calibra [-nthreads N] <config-file>` runs one calibration and, on the
//! coordinating process, prints the best objective value followed by one
//! line per variable in its declared format.

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use cal_engine::{peer, Engine, Topology};
use cal_types::{CFormat, Calibration};

const USAGE: &str = "usage: calibra [-nthreads N] <config-file>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (nthreads, config_path) = parse_args(&args)?;
    let nthreads = match nthreads {
        Some(n) => n,
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    };

    let calibration = Calibration::from_path(&config_path)
        .with_context(|| format!("loading configuration {config_path}"))?;
    let topology = Topology::from_env()?;
    let coordinator = std::env::var(peer::COORD_VAR).ok();

    let engine = Engine::new(&calibration, nthreads).with_topology(topology, coordinator);
    if let Some(report) = engine.run()? {
        let best = report
            .best()
            .context("calibration admitted no candidates")?;
        println!("error={}", CFormat::default().render(best.value));
        for (variable, value) in calibration.variables.iter().zip(&best.parameters) {
            println!("{}={}", variable.name, variable.format.render(*value));
        }
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(Option<usize>, String)> {
    match args {
        [config] => Ok((None, config.clone())),
        [flag, count, config] if flag == "-nthreads" => {
            let count: usize = count
                .parse()
                .with_context(|| format!("invalid thread count {count:?}"))?;
            if count == 0 {
                bail!("thread count must be nonzero");
            }
            Ok((Some(count), config.clone()))
        }
        _ => bail!(USAGE),
    }
}
