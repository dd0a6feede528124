//! Reconcile one experiment group directory and write its results as CSV.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use strain_data::{
    ExperimentGroup, GroupSettings, LayoutFormat, MultiPlateOutline, SharedPlasmidList,
    SinglePlate, WellLabel,
};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// `layout<plate>.xlsx`, OD(600) growth matrices, several time points.
    SinglePlate,
    /// `layout*.docx` numbered outline shared by several plates.
    Outline,
    /// `layout*.xlsx` strain grid with an experimental plasmid list.
    PlasmidList,
}

#[derive(Parser, Debug)]
#[clap(
    name = "strain_ingest",
    about = "Reconcile the layout, growth and production files of one experiment group"
)]
struct Args {
    /// Directory holding the files of the experiment group.
    dir: PathBuf,

    /// Layout convention of the group.
    #[clap(long, value_enum)]
    format: Format,

    /// Experiment ID prefix such as S4. Defaults to the directory name.
    #[clap(long)]
    prefix: Option<String>,

    /// Write the results to this file instead of standard output.
    #[clap(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Plasmid list entry meaning "no insertion". Repeat to give several;
    /// replaces the built-in list.
    #[clap(long = "no-insertion", value_name = "NAME")]
    no_insertion: Vec<String>,
}

impl Args {
    fn layout_format(&self) -> LayoutFormat {
        match self.format {
            Format::SinglePlate => LayoutFormat::SinglePlate(SinglePlate),
            Format::Outline => LayoutFormat::MultiPlateOutline(MultiPlateOutline),
            Format::PlasmidList => {
                let mut plasmid_list = SharedPlasmidList::default();
                if !self.no_insertion.is_empty() {
                    plasmid_list.no_insertion.clone_from(&self.no_insertion);
                }
                LayoutFormat::SharedPlasmidList(plasmid_list)
            }
        }
    }

    fn prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| {
            self.dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// One output line.
#[derive(Serialize)]
struct ResultRow<'a> {
    plate: &'a str,
    well: WellLabel,
    time: f64,
    strain: &'a str,
    iptg: bool,
    growth: Option<f64>,
    production: Option<f64>,
    suspect: bool,
    complete: bool,
}

fn write_results(group: &ExperimentGroup, writer: impl Write) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for experiment in group.experiments() {
        for (key, result) in experiment.results() {
            writer.serialize(ResultRow {
                plate: experiment.plate(),
                well: key.well,
                time: key.time.hours(),
                strain: result.strain(),
                iptg: result.iptg(),
                growth: result.growth(),
                production: result.production(),
                suspect: result.suspect(),
                complete: result.is_complete(),
            })?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = GroupSettings::from_parameters()?;
    let mut group =
        ExperimentGroup::new(&args.dir, &args.prefix(), args.layout_format(), settings)?;
    group.process_files()?;

    match &args.csv {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("While creating {path:?}"))?;
            write_results(&group, BufWriter::new(file))
                .with_context(|| format!("While writing {path:?}"))?;
        }
        None => {
            write_results(&group, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
