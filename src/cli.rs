use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{io_utils::DEFAULT_BATCH_SIZE, sniff::DEFAULT_ROWS_TO_SNIFF};

#[derive(Debug, Parser)]
#[command(author, version, about = "Stream CSV rows through composable transform stages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Strip comments, key rows by header, cast columns and write the result
    Process(ProcessArgs),
    /// Infer per-column cast types from a sample of rows
    Sniff(SniffArgs),
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Input CSV file to process (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Keep rows whose first cell looks like a comment
    #[arg(long = "no-comments")]
    pub no_comments: bool,
    /// Treat rows starting with this character as comments
    #[arg(long = "comment-char", conflicts_with = "comment_pattern")]
    pub comment_char: Option<char>,
    /// Regular expression matched against the first cell of each row
    #[arg(long = "comment-pattern")]
    pub comment_pattern: Option<String>,
    /// Use header cells as keys verbatim instead of trimming them
    #[arg(long = "no-keyify")]
    pub no_keyify: bool,
    /// Convert captured header cells to snake_case keys
    #[arg(long = "snake-case-keys", conflicts_with = "no_keyify")]
    pub snake_case_keys: bool,
    /// Comma-separated header to use instead of the first row
    #[arg(long = "header", value_delimiter = ',')]
    pub header: Vec<String>,
    /// Cast directives of the form `column:kind` (kinds: int, long, float, double, decimal, boolean, string)
    #[arg(long = "cast", action = clap::ArgAction::Append)]
    pub casts: Vec<String>,
    /// YAML cast plan, as written by `sniff -o`
    #[arg(long = "plan")]
    pub plan: Option<PathBuf>,
    /// Infer casts for columns not covered by --cast or --plan
    #[arg(long = "sniff")]
    pub sniff: bool,
    /// Rows to sample when sniffing
    #[arg(long = "sample-rows", default_value_t = DEFAULT_ROWS_TO_SNIFF, requires = "sniff")]
    pub sample_rows: usize,
    /// Keep the original cell when a cast fails instead of aborting
    #[arg(long = "lenient")]
    pub lenient: bool,
    /// Rows written per batch
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,
    /// Render output as an aligned table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct SniffArgs {
    /// Input CSV file to inspect (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Rows to sample after the header
    #[arg(long = "sample-rows", default_value_t = DEFAULT_ROWS_TO_SNIFF)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Convert header cells to snake_case keys
    #[arg(long = "snake-case-keys")]
    pub snake_case_keys: bool,
    /// Write the inferred cast plan as YAML
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print classifications as JSON instead of a table
    #[arg(long = "json")]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("Batch size must be greater than zero".to_string()),
        Ok(size) => Ok(size),
        Err(err) => Err(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn process_arguments_parse() {
        let cli = Cli::try_parse_from([
            "csv-stages",
            "process",
            "-i",
            "in.csv",
            "--cast",
            "qty:long",
            "--cast",
            "price:double",
            "--header",
            "a,b",
            "--comment-char",
            "$",
        ])
        .unwrap();
        let Commands::Process(args) = cli.command else {
            panic!("expected process");
        };
        assert_eq!(args.casts, vec!["qty:long", "price:double"]);
        assert_eq!(args.header, vec!["a", "b"]);
        assert_eq!(args.comment_char, Some('$'));
        assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result =
            Cli::try_parse_from(["csv-stages", "process", "-i", "in.csv", "--batch-size", "0"]);
        assert!(result.is_err());
    }
}
