use log::{debug, info};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;

use survey_study::*;

use crate::survey::auth::CredentialStore;
use crate::survey::config_reader::*;
use crate::survey::io_sheets::{SheetSource, SheetsClient, ValuesFetcher};

pub mod auth;
pub mod config_reader;
#[cfg(test)]
mod fake_server;
mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod io_sheets;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The file {path} has no header row"))]
    EmptySource { path: String },
    #[snafu(display("The file {path} has no worksheet named {name:?}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error opening csv file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of the csv file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error writing the table to {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing json content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown source provider {provider:?} (expected xlsx, csv or sheets)"))]
    UnknownProvider { provider: String },
    #[snafu(display("Unknown unmapped column policy {policy:?} (expected player or exclude)"))]
    UnknownUnmappedPolicy { policy: String },
    #[snafu(display("The setting {name} is required for this source"))]
    MissingSetting { name: String },
    #[snafu(display("Error accessing the credential file {path}"))]
    TokenIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid url {url}"))]
    InvalidUrl {
        source: url::ParseError,
        url: String,
    },
    #[snafu(display("Request to {url} failed"))]
    Http { source: reqwest::Error, url: String },
    #[snafu(display("Cannot start the authorization listener: {message}"))]
    ConsentServer { message: String },
    #[snafu(display("Error while waiting for the authorization redirect"))]
    ConsentListener { source: std::io::Error },
    #[snafu(display("Authorization was not granted: {reason}"))]
    ConsentDenied { reason: String },
    #[snafu(display("No valid data found in sheet {range:?} of spreadsheet {spreadsheet_id}"))]
    NoValidData {
        spreadsheet_id: String,
        range: String,
    },
    #[snafu(display("Error building the study"))]
    Study { source: StudyErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// Loads a survey export from disk. Files ending in `.csv` are read as csv,
/// anything else as an Excel workbook (first worksheet).
pub fn from_file(path: &str) -> SurveyResult<Study> {
    from_file_with(path, None, UnmappedPolicy::default())
}

pub fn from_file_with(
    path: &str,
    worksheet: Option<&str>,
    policy: UnmappedPolicy,
) -> SurveyResult<Study> {
    info!("Attempting to read survey file {:?}", path);
    let table = if io_common::is_csv_path(path) {
        io_csv::read_csv_table(path)?
    } else {
        io_excel::read_excel_table(path, worksheet)?
    };
    Study::from_table_with(table, policy).context(StudySnafu {})
}

/// Loads the live responses of the survey, authorizing first if needed.
pub fn from_latest(source: &SheetSource, store: &CredentialStore) -> SurveyResult<Study> {
    from_latest_with(source, store, UnmappedPolicy::default())
}

pub fn from_latest_with(
    source: &SheetSource,
    store: &CredentialStore,
    policy: UnmappedPolicy,
) -> SurveyResult<Study> {
    let client = reqwest::blocking::Client::new();
    let credentials = auth::authorize(&client, store, &source.scopes)?;
    let sheets = SheetsClient::new(client, &credentials);
    from_sheet(&sheets, source, policy)
}

/// Builds a study from the rows returned by a fetcher. The first row holds the headers.
pub fn from_sheet<F: ValuesFetcher>(
    fetcher: &F,
    source: &SheetSource,
    policy: UnmappedPolicy,
) -> SurveyResult<Study> {
    let values = fetcher.fetch_values(source)?;
    debug!("from_sheet: {} rows fetched", values.len());
    let table = io_sheets::table_from_values(&values, source)?;
    Study::from_table_with(table, policy).context(StudySnafu {})
}

/// Loads the study described by the source settings.
pub fn read_study(
    source: &SourceSettings,
    root: &Path,
    policy: UnmappedPolicy,
) -> SurveyResult<Study> {
    let provider = source.provider()?;
    info!("read_study: provider: {:?}", provider);
    match provider {
        Provider::Xlsx | Provider::Csv => {
            let p = source.file_path(root)?;
            let table = if provider == Provider::Csv {
                io_csv::read_csv_table(&p)?
            } else {
                io_excel::read_excel_table(&p, source.excel_worksheet_name.as_deref())?
            };
            Study::from_table_with(table, policy).context(StudySnafu {})
        }
        Provider::Sheets => {
            from_latest_with(&source.sheet_source()?, &source.credential_store(root), policy)
        }
    }
}

pub fn build_summary_js(study: &Study) -> SurveyResult<JSValue> {
    let entries = serde_json::to_value(study.entries()).context(ParsingJsonSnafu {})?;
    Ok(json!({
        "summary": {
            "entries": study.len(),
            "columns": study.table().columns(),
            "unmappedColumns": study.unmapped_columns(),
        },
        "entries": entries
    }))
}

/// Loads the study of the configuration and writes the requested outputs.
pub fn run_survey(config: &SurveyConfig, root: &Path) -> SurveyResult<()> {
    info!("config: {:?}", config);
    let policy = config.unmapped_policy()?;
    let study = read_study(&config.source, root, policy)?;
    info!(
        "Loaded {} entries ({} unmapped columns)",
        study.len(),
        study.unmapped_columns().len()
    );

    let output = config.output_settings.clone().unwrap_or_default();

    let summary = build_summary_js(&study)?;
    let pretty = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;
    match output.summary_path.as_deref() {
        None | Some("stdout") => println!("{}", pretty),
        Some(p) => {
            let path = resolve_path(root, p);
            info!("Writing summary to {:?}", path);
            fs::write(&path, pretty).context(WritingOutputSnafu {
                path: path.display().to_string(),
            })?;
        }
    }

    if let Some(p) = output.table_path.as_deref() {
        let path = resolve_path(root, p);
        info!("Writing renamed table to {:?}", path);
        io_csv::write_table_csv(study.table(), &path)?;
    }
    Ok(())
}
