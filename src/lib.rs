pub mod caster;
pub mod casts;
pub mod cli;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod plan;
pub mod process;
pub mod row;
pub mod sniff;
pub mod table;
pub mod transform;

use std::{env, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    caster::ExceptionHandler,
    cli::{Cli, Commands},
    io_utils::WriteOptions,
    plan::CastPlan,
    sniff::CastRules,
    transform::{CastWithOptions, RowStream, RowStreamExt, comments::DEFAULT_COMMENT_PATTERN},
};

pub use caster::{CastSpec, cast_row};
pub use casts::{CastFn, CastKind, CastOptions};
pub use data::Value;
pub use error::{CastError, Error};
pub use process::{ProcessOptions, process, process_structs};
pub use row::{Column, Record, Row};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_stages", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Process(args) => handle_process(&args),
        Commands::Sniff(args) => handle_sniff(&args),
    }
}

fn input_rows(
    input: &std::path::Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
) -> Result<(u8, impl Iterator<Item = error::Result<Row>> + use<>)> {
    let encoding = resolve_encoding_label(encoding)?;
    let delimiter = io_utils::resolve_input_delimiter(input, delimiter);
    let reader = io_utils::open_csv_reader(io_utils::open_input(input)?, delimiter);
    Ok((delimiter, io_utils::decoded_rows(reader, encoding)))
}

fn resolve_encoding_label(label: Option<&str>) -> Result<&'static encoding_rs::Encoding> {
    io_utils::resolve_encoding(label).context("Resolving character encoding")
}

fn process_options(args: &cli::ProcessArgs) -> ProcessOptions {
    let lenient: Option<ExceptionHandler> = args
        .lenient
        .then(|| Arc::new(|_: &Column, value: &Value| value.clone()) as ExceptionHandler);
    let options = ProcessOptions {
        keyify: !args.no_keyify,
        header: (!args.header.is_empty()).then(|| args.header.clone()),
        remove_comments: !args.no_comments,
        comment_re: args
            .comment_pattern
            .clone()
            .unwrap_or_else(|| DEFAULT_COMMENT_PATTERN.to_string()),
        comment_char: args.comment_char,
        cast_exception_handler: lenient,
        ..ProcessOptions::default()
    };
    if args.snake_case_keys {
        options.snake_case_keys()
    } else {
        options
    }
}

fn explicit_plan(args: &cli::ProcessArgs) -> Result<CastPlan> {
    let mut plan = match &args.plan {
        Some(path) => CastPlan::load(path)?,
        None => CastPlan::default(),
    };
    plan.merge(CastPlan::parse_directives(&args.casts)?);
    debug!("Explicit cast plan: {:?}", plan.columns);
    Ok(plan)
}

fn handle_process(args: &cli::ProcessArgs) -> Result<()> {
    let (delimiter, rows) = input_rows(
        &args.input,
        args.delimiter,
        args.input_encoding.as_deref(),
    )?;
    info!(
        "Processing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let explicit = explicit_plan(args)?;
    let mut options = process_options(args);

    let stream: RowStream<'static> = if args.sniff {
        let keyed = process(rows, &options);
        let (result, replay) =
            sniff::sniff_buffered(keyed, &CastRules::standard(), args.sample_rows)
                .with_context(|| format!("Sniffing {:?}", args.input))?;
        let mut plan = result.to_plan();
        plan.merge(explicit);
        info!(
            "Sniffed {} column(s); casting {} column(s)",
            result.len(),
            plan.columns.len()
        );
        let cast_options = CastWithOptions {
            exception_handler: options.cast_exception_handler.clone(),
            ..CastWithOptions::default()
        };
        Box::new(replay.cast_with(plan.to_cast_spec()?, cast_options))
    } else {
        if !explicit.is_empty() {
            options.cast_fns = Some(explicit.to_cast_spec()?);
        }
        process(rows, &options)
    };

    if args.table {
        let rows = stream
            .collect::<error::Result<Vec<_>>>()
            .with_context(|| format!("Processing {:?}", args.input))?;
        print!("{}", table::render_rows(&rows));
        info!("Rendered {} row(s) as a table", rows.len());
        return Ok(());
    }

    let output_path = args.output.as_deref();
    let output_encoding = resolve_encoding_label(args.output_encoding.as_deref())?;
    let write_options = WriteOptions {
        delimiter: Some(io_utils::resolve_output_delimiter(
            output_path,
            args.output_delimiter,
            delimiter,
        )),
        batch_size: args.batch_size,
        ..WriteOptions::default()
    };
    let writer = io_utils::open_output(output_path, output_encoding)?;
    let written = io_utils::write_stream_to(writer, stream, &write_options)
        .with_context(|| format!("Processing {:?}", args.input))?;
    info!(
        "Wrote {} row(s) to {}",
        written,
        output_path
            .map(|p| format!("{p:?}"))
            .unwrap_or_else(|| "stdout".to_string())
    );
    Ok(())
}

fn column_label(column: &Column) -> String {
    match column {
        Column::Index(idx) => idx.to_string(),
        Column::Key(key) => key.clone(),
    }
}

fn handle_sniff(args: &cli::SniffArgs) -> Result<()> {
    let (delimiter, rows) = input_rows(
        &args.input,
        args.delimiter,
        args.input_encoding.as_deref(),
    )?;
    info!(
        "Sniffing '{}' with delimiter '{}' ({} sample row(s))",
        args.input.display(),
        printable_delimiter(delimiter),
        args.sample_rows
    );
    let options = if args.snake_case_keys {
        ProcessOptions::default().snake_case_keys()
    } else {
        ProcessOptions::default()
    };
    let keyed = process(rows, &options);
    let result = sniff::sniff(keyed, &CastRules::standard(), args.sample_rows)
        .with_context(|| format!("Sniffing {:?}", args.input))?;

    if args.json {
        let entries = result
            .iter()
            .map(|(column, classification)| {
                serde_json::json!({ "column": column, "classification": classification })
            })
            .collect::<Vec<_>>();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Serializing sniff result")?
        );
    } else {
        let rows = result
            .iter()
            .map(|(column, classification)| vec![column_label(column), classification.to_string()])
            .collect::<Vec<_>>();
        print!(
            "{}",
            table::render_table(&["column".to_string(), "classification".to_string()], &rows)
        );
    }

    if let Some(path) = &args.output {
        let plan = result.to_plan();
        plan.save(path)
            .with_context(|| format!("Writing cast plan to {path:?}"))?;
        info!(
            "Cast plan for {} column(s) written to {:?}",
            plan.columns.len(),
            path
        );
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
