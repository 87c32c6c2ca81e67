mod args;

use std::env;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info, warn};
use snafu::ErrorCompat;

use cbs_survey::survey::config_reader::*;
use cbs_survey::survey::{run_survey, SurveyError, SurveyResult};

/// Reads the configuration file if any, and lets the command line override it.
///
/// Relative paths given on the command line are relative to the working
/// directory, the ones in the configuration to the configuration file.
fn load_config(args: &args::Args) -> SurveyResult<(SurveyConfig, PathBuf)> {
    let (mut config, root) = match args.config.as_deref() {
        Some(path) => {
            info!("Reading configuration {:?}", path);
            let config = read_config(path)?;
            let root = Path::new(path)
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            (config, root)
        }
        None => (SurveyConfig::default(), PathBuf::new()),
    };

    let cwd = env::current_dir().unwrap_or_default();
    let from_cli = |p: &String| cwd.join(p).display().to_string();

    if let Some(p) = &args.input {
        config.source.file_path = Some(from_cli(p));
    }
    if args.input_type.is_some() {
        config.source.provider = args.input_type.clone();
    }
    if args.excel_worksheet_name.is_some() {
        config.source.excel_worksheet_name = args.excel_worksheet_name.clone();
    }
    if args.spreadsheet_id.is_some() {
        config.source.spreadsheet_id = args.spreadsheet_id.clone();
    }
    if args.sheet_range.is_some() {
        config.source.sheet_range = args.sheet_range.clone();
    }
    if args.unmapped_columns.is_some() {
        config.unmapped_columns = args.unmapped_columns.clone();
    }
    if args.out.is_some() || args.table_out.is_some() {
        let mut output = config.output_settings.clone().unwrap_or_default();
        match args.out.as_deref() {
            Some("") | None => {}
            Some("stdout") => output.summary_path = Some("stdout".to_string()),
            Some(_) => output.summary_path = args.out.as_ref().map(from_cli),
        }
        match args.table_out.as_deref() {
            Some("") | None => {}
            Some(_) => output.table_path = args.table_out.as_ref().map(from_cli),
        }
        config.output_settings = Some(output);
    }
    debug!("load_config: config: {:?} root: {:?}", config, root);
    Ok((config, root))
}

fn run(args: &args::Args) -> Result<(), SurveyError> {
    let (config, root) = load_config(args)?;
    run_survey(&config, &root)
}

fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
