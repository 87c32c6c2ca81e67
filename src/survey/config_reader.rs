use crate::survey::*;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::survey::auth::CredentialStore;
use crate::survey::io_sheets::SheetSource;

/// The tab that Google Forms creates for the responses.
pub const DEFAULT_SHEET_RANGE: &str = "Form Responses 1";
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
pub const DEFAULT_SECRETS_PATH: &str = "credentials.json";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Xlsx,
    Csv,
    Sheets,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    /// xlsx, csv or sheets. Inferred from the other settings when missing.
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "spreadsheetId")]
    pub spreadsheet_id: Option<String>,
    #[serde(rename = "sheetRange")]
    pub sheet_range: Option<String>,
    pub scopes: Option<Vec<String>>,
    #[serde(rename = "tokenPath")]
    pub token_path: Option<String>,
    #[serde(rename = "secretsPath")]
    pub secrets_path: Option<String>,
}

impl SourceSettings {
    pub fn provider(&self) -> SurveyResult<Provider> {
        match self.provider.as_deref() {
            Some("xlsx") | Some("excel") => Ok(Provider::Xlsx),
            Some("csv") => Ok(Provider::Csv),
            Some("sheets") => Ok(Provider::Sheets),
            Some(x) => UnknownProviderSnafu { provider: x }.fail(),
            None => match self.file_path.as_deref() {
                Some(p) if io_common::is_csv_path(p) => Ok(Provider::Csv),
                Some(_) => Ok(Provider::Xlsx),
                None if self.spreadsheet_id.is_some() => Ok(Provider::Sheets),
                None => MissingSettingSnafu {
                    name: "filePath or spreadsheetId",
                }
                .fail(),
            },
        }
    }

    /// The input file, resolved against the directory of the configuration.
    pub fn file_path(&self, root: &Path) -> SurveyResult<String> {
        let p = self
            .file_path
            .as_deref()
            .context(MissingSettingSnafu { name: "filePath" })?;
        Ok(resolve_path(root, p).display().to_string())
    }

    pub fn sheet_source(&self) -> SurveyResult<SheetSource> {
        let spreadsheet_id = self.spreadsheet_id.as_deref().context(MissingSettingSnafu {
            name: "spreadsheetId",
        })?;
        let mut res = SheetSource::new(
            spreadsheet_id,
            self.sheet_range.as_deref().unwrap_or(DEFAULT_SHEET_RANGE),
        );
        if let Some(scopes) = &self.scopes {
            res.scopes = scopes.clone();
        }
        Ok(res)
    }

    pub fn credential_store(&self, root: &Path) -> CredentialStore {
        CredentialStore::new(
            resolve_path(root, self.token_path.as_deref().unwrap_or(DEFAULT_TOKEN_PATH)),
            resolve_path(
                root,
                self.secrets_path.as_deref().unwrap_or(DEFAULT_SECRETS_PATH),
            ),
        )
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// A file path, or `stdout`.
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
    #[serde(rename = "tablePath")]
    pub table_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub source: SourceSettings,
    /// player or exclude
    #[serde(rename = "unmappedColumns")]
    pub unmapped_columns: Option<String>,
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
}

impl SurveyConfig {
    pub fn unmapped_policy(&self) -> SurveyResult<UnmappedPolicy> {
        match self.unmapped_columns.as_deref() {
            None | Some("player") => Ok(UnmappedPolicy::KeepInPlayer),
            Some("exclude") => Ok(UnmappedPolicy::Exclude),
            Some(x) => UnknownUnmappedPolicySnafu { policy: x }.fail(),
        }
    }
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

/// Relative paths in a configuration are relative to the configuration file.
pub fn resolve_path(root: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_is_inferred() {
        let mut s = SourceSettings {
            file_path: Some("sources/sept15_partial_survey.xlsx".to_string()),
            ..Default::default()
        };
        assert_eq!(s.provider().unwrap(), Provider::Xlsx);
        s.file_path = Some("responses.CSV".to_string());
        assert_eq!(s.provider().unwrap(), Provider::Csv);
        s.file_path = None;
        s.spreadsheet_id = Some("abc123".to_string());
        assert_eq!(s.provider().unwrap(), Provider::Sheets);
        s.spreadsheet_id = None;
        assert!(matches!(
            s.provider(),
            Err(SurveyError::MissingSetting { .. })
        ));
        s.provider = Some("ods".to_string());
        assert!(matches!(
            s.provider(),
            Err(SurveyError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn sheet_source_defaults() {
        let s: SourceSettings = serde_json::from_str(r#"{"spreadsheetId": "abc123"}"#).unwrap();
        let source = s.sheet_source().unwrap();
        assert_eq!(source.spreadsheet_id, "abc123");
        assert_eq!(source.range, DEFAULT_SHEET_RANGE);
        assert_eq!(source.scopes, vec![SHEETS_READONLY_SCOPE.to_string()]);
    }

    #[test]
    fn parse_full_config() {
        let config: SurveyConfig = serde_json::from_str(
            r#"{
                "source": {
                    "provider": "sheets",
                    "spreadsheetId": "abc123",
                    "sheetRange": "Responses",
                    "tokenPath": "secrets/token.json",
                    "secretsPath": "/etc/survey/credentials.json"
                },
                "unmappedColumns": "exclude",
                "outputSettings": { "summaryPath": "stdout" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.unmapped_policy().unwrap(), UnmappedPolicy::Exclude);
        let store = config.source.credential_store(Path::new("/data"));
        assert_eq!(store.token_path, PathBuf::from("/data/secrets/token.json"));
        assert_eq!(
            store.secrets_path,
            PathBuf::from("/etc/survey/credentials.json")
        );
        assert_eq!(config.source.sheet_source().unwrap().range, "Responses");
    }

    #[test]
    fn unknown_unmapped_policy() {
        let config = SurveyConfig {
            unmapped_columns: Some("drop".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.unmapped_policy(),
            Err(SurveyError::UnknownUnmappedPolicy { .. })
        ));
    }
}
