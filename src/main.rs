//! Command line front end: renders a JSON task list.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use icon_rasterizer::{RenderConfig, RunAborted, render_tasks, tasks_from_json};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// JSON file holding an array of render tasks
    tasks: PathBuf,
    /// JSON file with run settings (batchSize, gap, skipExisting, ...)
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Tasks composed per batch
    #[arg(long, short)]
    batch_size: Option<usize>,
    /// Vertical gap between regions, in pixels
    #[arg(long)]
    gap: Option<u32>,
    /// Leave existing output files alone
    #[arg(long)]
    skip_existing: bool,
    /// Directory to dump the task list and batch snapshots into
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// Skip loading system fonts
    #[arg(long)]
    no_system_fonts: bool,
}

impl Args {
    fn load_config(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                RenderConfig::from_json(&json)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => RenderConfig::default(),
        };
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(gap) = self.gap {
            config.gap = gap;
        }
        if self.skip_existing {
            config.skip_existing = true;
        }
        if let Some(dir) = &self.debug_dir {
            config.debug_dir = Some(dir.clone());
        }
        if self.no_system_fonts {
            config.load_system_fonts = false;
        }
        Ok(config)
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();
    let config = args.load_config()?;

    let json = fs::read_to_string(&args.tasks)
        .with_context(|| format!("failed to read {}", args.tasks.display()))?;
    let tasks = tasks_from_json(&json)
        .with_context(|| format!("failed to parse {}", args.tasks.display()))?;

    let (report, aborted) = match render_tasks(tasks, config) {
        Ok(report) => (report, None),
        Err(RunAborted { error, report }) => (report, Some(error)),
    };
    for failure in &report.failures {
        eprintln!("{failure}");
    }
    println!(
        "{} files written, {} tasks skipped, {} failures",
        report.written.len(),
        report.skipped.len(),
        report.failures.len()
    );

    if let Some(error) = aborted {
        return Err(error.into());
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
