//! Process command - normalize a single label sheet.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use danfe_core::{Pipeline, PipelineReport, ProcessOptions, RecordStatus};

use super::config::load_config;
use crate::scratch::ScratchSpace;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF (default: <input>_processado.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the pruned intermediate PDF to this path
    #[arg(long)]
    keep_precleaned: Option<PathBuf>,

    /// Write a JSON report of every pipeline decision to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Where the outputs of one input go.
pub struct OutputPaths {
    pub pdf: PathBuf,
    pub precleaned: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Default output path: `<dir>/<stem>_processado.pdf`.
pub fn default_output_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("danfe");
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}_processado.pdf", stem))
}

pub fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Processing {}", args.input.display()));

    let paths = OutputPaths {
        pdf: args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&args.input, None)),
        precleaned: args.keep_precleaned.clone(),
        report: args.report.clone(),
    };

    let pipeline = Pipeline::new(&config);
    let result = process_file(&pipeline, &args.input, &paths);
    pb.finish_and_clear();
    let report = result?;

    print_summary(&report);
    println!(
        "{} Output written to {}",
        style("✓").green(),
        paths.pdf.display()
    );
    if let Some(path) = &paths.precleaned {
        println!("{} Pre-cleaned PDF written to {}", style("✓").green(), path.display());
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Run the pipeline on one file and write its outputs.
pub fn process_file(
    pipeline: &Pipeline,
    input: &Path,
    paths: &OutputPaths,
) -> anyhow::Result<PipelineReport> {
    let data = fs::read(input)?;
    let options = ProcessOptions {
        keep_precleaned: paths.precleaned.is_some(),
    };

    let output = pipeline
        .process_with(&data, options)
        .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;

    let mut scratch = ScratchSpace::for_output(&paths.pdf)?;
    scratch.write(&paths.pdf, &output.pdf)?;
    if let (Some(path), Some(bytes)) = (&paths.precleaned, &output.precleaned) {
        ScratchSpace::for_output(path)?.write(path, bytes)?;
    }
    if let Some(path) = &paths.report {
        let json = serde_json::to_vec_pretty(&output.report)?;
        ScratchSpace::for_output(path)?.write(path, &json)?;
    }

    Ok(output.report)
}

fn print_summary(report: &PipelineReport) {
    let dropped = report.decisions.iter().filter(|d| d.is_drop()).count();
    println!(
        "{} Pages: {} in, {} dropped, {} kept",
        style("ℹ").blue(),
        report.source_pages,
        dropped,
        report.kept_pages
    );
    println!(
        "{} Records: {} generated of {} extracted, {} output pages in {}ms",
        style("ℹ").blue(),
        report.result.generated,
        report.result.attempted,
        report.result.pages,
        report.result.elapsed_ms
    );

    for outcome in &report.records {
        if let RecordStatus::Skipped { reason } = &outcome.status {
            eprintln!(
                "{} Record {} ({}...) skipped: {}",
                style("!").yellow(),
                outcome.record + 1,
                outcome.key_prefix,
                reason
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/data/lote.pdf"), None),
            PathBuf::from("/data/lote_processado.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("/data/lote.pdf"), Some(Path::new("/out"))),
            PathBuf::from("/out/lote_processado.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("lote.pdf"), None),
            PathBuf::from("lote_processado.pdf")
        );
    }
}
