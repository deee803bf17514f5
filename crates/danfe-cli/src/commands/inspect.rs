//! Inspect command - show page decisions and extracted records without
//! generating output.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use danfe_core::{Inspection, PageOutcome, Pipeline, Verdict};

use super::config::load_config;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per line item
    Csv,
    /// Plain text summary
    Text,
}

pub fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let data = fs::read(&args.input)?;
    let inspection = Pipeline::new(&config)
        .inspect(&data)
        .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&inspection)?,
        OutputFormat::Csv => format_csv(&inspection)?,
        OutputFormat::Text => format_text(&inspection),
    };
    println!("{}", output);

    Ok(())
}

fn format_csv(inspection: &Inspection) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["record", "access_key", "product_code", "description", "quantity"])?;

    for (i, record) in inspection.extraction.records.iter().enumerate() {
        let number = (i + 1).to_string();
        for item in &record.items {
            wtr.write_record([
                number.as_str(),
                record.access_key.as_str(),
                item.product_code.as_str(),
                item.description.as_str(),
                item.quantity.as_str(),
            ])?;
        }
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(inspection: &Inspection) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Pages: {} in, {} kept\n\n",
        inspection.source_pages, inspection.kept_pages
    ));

    output.push_str("Classification:\n");
    for decision in &inspection.decisions {
        let verdict = match decision.verdict {
            Verdict::Keep => style("keep").green(),
            Verdict::Drop => style("drop").red(),
        };
        output.push_str(&format!("  page {:>3}  {}", decision.page + 1, verdict));
        if !decision.reasons.is_empty() {
            output.push_str(&format!("  [{}]", decision.reason_tags()));
        }
        output.push('\n');
    }

    output.push_str("\nExtraction (pages of the pruned document):\n");
    for page in &inspection.extraction.pages {
        let outcome = match &page.outcome {
            PageOutcome::NotDanfe => "not a DANFE page".to_string(),
            PageOutcome::MissingAccessKey => "no access key".to_string(),
            PageOutcome::MissingItemSection => "no item section".to_string(),
            PageOutcome::NoValidItems => "no valid items".to_string(),
            PageOutcome::Extracted {
                items,
                merged_continuation,
            } => {
                let merged = if *merged_continuation { ", with continuation page" } else { "" };
                format!("{} item(s){}", items, merged)
            }
        };
        output.push_str(&format!("  page {:>3}  {}\n", page.page + 1, outcome));
    }

    output.push_str("\nRecords:\n");
    if inspection.extraction.records.is_empty() {
        output.push_str("  (none)\n");
    }
    for (i, record) in inspection.extraction.records.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, record.access_key));
        for item in &record.items {
            output.push_str(&format!(
                "     {} x{}  {}\n",
                item.product_code, item.quantity, item.description
            ));
        }
    }

    output
}
