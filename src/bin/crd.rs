use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kube::CustomResourceExt;
use workloadspread::api::WorkloadSpread;

/// Prints the WorkloadSpread CustomResourceDefinition.
#[derive(Parser)]
struct Args {
    /// Path to write the CRD to; `.json` selects JSON, anything else YAML.
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let crd = WorkloadSpread::crd();

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(fs::File::create(path).with_context(|| format!("create {}", path.display()))?),
        None => Box::new(io::stdout()),
    };
    let mut writer = BufWriter::new(writer);

    if args.output.as_ref().is_some_and(|path| path.extension().is_some_and(|ext| ext == "json")) {
        serde_json::to_writer_pretty(&mut writer, &crd).context("writing CRD as JSON")?;
    } else {
        serde_yaml::to_writer(&mut writer, &crd).context("writing CRD as YAML")?;
    }

    writer.flush().context("flushing CRD output")
}
