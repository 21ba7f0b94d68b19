//! diffex command-line interface

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, error, info};

use diffex::cli::{Cli, Commands, CommonArgs};
use diffex::data::Contrast;
use diffex::engine::DifferentialExpression;
use diffex::io::{read_intensity_table, write_post_hoc, write_result_table};
use diffex::testing::TestMethod;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Omnibus { common } => run_omnibus(&common),
        Commands::Contrasts {
            common,
            contrasts,
            method,
        } => run_contrasts(&common, &contrasts, method),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn prepare(common: &CommonArgs) -> Result<DifferentialExpression> {
    if let Some(threads) = common.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the thread pool")?;
    }

    let matrix = read_intensity_table(&common.input)?;
    info!(
        "Read {} features x {} samples from {}",
        matrix.n_features(),
        matrix.n_samples(),
        common.input.display()
    );
    let assignment = common.assignment(&matrix)?;

    fs::create_dir_all(&common.output)
        .with_context(|| format!("Failed to create output directory {}", common.output.display()))?;

    DifferentialExpression::new(&matrix, &assignment, common.config())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run_omnibus(common: &CommonArgs) -> Result<()> {
    let engine = prepare(common)?;
    let report = engine.omnibus()?;

    let table_path = common.output.join("omnibus_anova.tsv");
    write_result_table(create(&table_path)?, &report.table)?;
    let post_hoc_path = common.output.join("omnibus_tukey.tsv");
    write_post_hoc(create(&post_hoc_path)?, &report)?;

    info!(
        "Wrote {} and {}",
        table_path.display(),
        post_hoc_path.display()
    );
    Ok(())
}

fn run_contrasts(common: &CommonArgs, contrasts: &[Contrast], method: TestMethod) -> Result<()> {
    let engine = prepare(common)?;
    let slug = match method {
        TestMethod::OneWayAnova => "anova",
        TestMethod::TTest(_) => "ttest",
        TestMethod::ModeratedT => "moderated",
    };

    let mut failed = 0;
    for (contrast, report) in contrasts.iter().zip(engine.contrasts(contrasts, method)) {
        match report {
            Ok(report) => {
                let path = common
                    .output
                    .join(format!("{}_{}.tsv", slug, report.contrast));
                write_result_table(create(&path)?, &report.table)?;
                info!("Wrote {}", path.display());
            }
            Err(e) => {
                error!("Contrast {} failed: {:#}", contrast, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} contrasts failed", failed, contrasts.len());
    }
    Ok(())
}
