// Reading the live responses with the Google Sheets API.

use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use crate::survey::auth::Credentials;
use crate::survey::*;

pub const SHEETS_API_ROOT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// One range of one spreadsheet, and the scopes needed to read it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetSource {
    pub spreadsheet_id: String,
    /// A tab name or an A1 range such as `Form Responses 1!A1:AG`.
    pub range: String,
    pub scopes: Vec<String>,
}

impl SheetSource {
    pub fn new(spreadsheet_id: &str, range: &str) -> SheetSource {
        SheetSource {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            scopes: vec![SHEETS_READONLY_SCOPE.to_string()],
        }
    }
}

/// Anything that can return the cells of a sheet, row by row.
pub trait ValuesFetcher {
    fn fetch_values(&self, source: &SheetSource) -> SurveyResult<Vec<Vec<String>>>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    range: Option<String>,
    #[serde(rename = "majorDimension")]
    major_dimension: Option<String>,
    // Absent when the range is empty.
    #[serde(default)]
    values: Vec<Vec<JSValue>>,
}

pub struct SheetsClient {
    client: Client,
    api_root: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(client: Client, credentials: &Credentials) -> SheetsClient {
        SheetsClient {
            client,
            api_root: SHEETS_API_ROOT.to_string(),
            access_token: credentials.token.clone(),
        }
    }

    pub fn with_api_root(mut self, api_root: &str) -> SheetsClient {
        self.api_root = api_root.trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, source: &SheetSource) -> SurveyResult<Url> {
        let mut url = Url::parse(&self.api_root).context(InvalidUrlSnafu {
            url: &self.api_root,
        })?;
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments
                    .pop_if_empty()
                    .push(&source.spreadsheet_id)
                    .push("values")
                    .push(&source.range);
            }
            Err(_) => whatever!("Cannot use {} as the root of the sheets api", self.api_root),
        }
        Ok(url)
    }
}

impl ValuesFetcher for SheetsClient {
    fn fetch_values(&self, source: &SheetSource) -> SurveyResult<Vec<Vec<String>>> {
        let url = self.values_url(source)?;
        info!(
            "Fetching range {:?} of spreadsheet {}",
            source.range, source.spreadsheet_id
        );
        let url_s = url.to_string();
        let vr: ValueRange = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())
            .context(HttpSnafu { url: url_s })?;
        debug!(
            "fetch_values: range: {:?} major dimension: {:?} rows: {}",
            vr.range,
            vr.major_dimension,
            vr.values.len()
        );
        Ok(vr
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

// Formatted values are strings, but unformatted ranges carry numbers and booleans.
fn cell_text(cell: &JSValue) -> String {
    match cell {
        JSValue::String(s) => s.clone(),
        JSValue::Null => "".to_string(),
        other => other.to_string(),
    }
}

/// Wraps the rows of a sheet into a table, the first row being the header.
pub fn table_from_values(values: &[Vec<String>], source: &SheetSource) -> SurveyResult<Table> {
    ensure!(
        !values.is_empty(),
        NoValidDataSnafu {
            spreadsheet_id: &source.spreadsheet_id,
            range: &source.range,
        }
    );
    Table::from_string_rows(values).context(StudySnafu {})
}
