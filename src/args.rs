use clap::Parser;

/// Loads the character building survey and splits every response into a character and a player.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing where the responses come from and where
    /// the outputs go. Relative paths in this file are relative to the file itself.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The survey responses, as an Excel (xlsx) or csv export. Setting this option
    /// overrides the file path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (xlsx, csv or sheets) The type of the input. By default, it is guessed from the input
    /// file extension, or is sheets when only a spreadsheet id is given.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default: the first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// The id of the Google Sheets document that collects the responses.
    #[clap(long, value_parser)]
    pub spreadsheet_id: Option<String>,

    /// (default Form Responses 1) The tab or A1 range to read from the Google Sheets document.
    #[clap(long, value_parser)]
    pub sheet_range: Option<String>,

    /// (player or exclude, default player) What to do with the columns that match no survey question.
    #[clap(long, value_parser)]
    pub unmapped_columns: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the study will be written in
    /// JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the renamed table will be written in csv format to the
    /// given location.
    #[clap(long, value_parser)]
    pub table_out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
