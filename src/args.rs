use clap::Parser;

/// This program harmonizes polling-station election results and analyzes their structure.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the study: sources, analysis settings and pairs to compare.
    /// For more information about the file format, read the manual of the vote_structure crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the summary of a study in JSON format. If provided, voteatlas will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the study will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory path or empty) If specified, all the matrices and analysis tables are written as CSV files under
    /// this directory. Setting this option overrides the directory that may be specified with the --config option.
    #[clap(long, value_parser)]
    pub output_dir: Option<String>,

    /// (file path or empty) A single input file to process. Setting this option overrides the sources that may be
    /// specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (presidentielle, legislative, regionale, europeenne or municipale) The election type of --input.
    #[clap(long, value_parser)]
    pub election_type: Option<String>,

    /// When using an Excel file with --input, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
