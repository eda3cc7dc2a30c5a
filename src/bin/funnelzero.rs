//! funnelzero command-line tool
//!
//! Parses indicator workbooks, derives conversion funnels, and computes
//! registration-cohort conversion, writing JSON.

use chrono::Datelike;
use std::fs::File;
use std::io::{self, Write};
use std::process;

use funnelzero::cohort::{self, CohortColumns, CohortPeriod, Window};
use funnelzero::{
    export, FunnelBuilder, FunnelConfig, FunnelError, ParserBuilder, SourceLimits, WorkbookSource,
};

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} parse <input.xlsx> [<output.json>|-]", program);
    eprintln!(
        "  {} funnel <input.xlsx> [--period <P>] [--stages <stages.json>] [--returning <name>]",
        program
    );
    eprintln!(
        "  {} cohort <input.xlsx> [--period <MMDD-MMDD>]... [--year <YYYY>] [--retention <1,7,30>]",
        program
    );
    eprintln!("\nOptions:");
    eprintln!("  --period <P>         Target period (funnel, overrides the stage file) or median range (cohort, repeatable)");
    eprintln!("  --stages <file>      Stage configuration as JSON (default: new-user funnel)");
    eprintln!("  --returning <name>   Indicator holding returning paying users");
    eprintln!("  --year <YYYY>        Year for MMDD-MMDD ranges (default: latest registration year)");
    eprintln!("  --retention <days>   Comma-separated retention days (default: 1,7,30)");
    eprintln!("\nSet RUST_LOG=debug for diagnostic output.");
}

/// `--name value`形式のオプションの値を取り出す
fn option_value<'a>(args: &'a [String], i: usize) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            process::exit(1);
        }
    }
}

/// 出力先を開く（`-`は標準出力）
fn open_output(path: Option<&str>) -> Result<Box<dyn Write>, FunnelError> {
    match path {
        None | Some("-") => Ok(Box::new(io::stdout().lock())),
        Some(path) => Ok(Box::new(File::create(path)?)),
    }
}

fn run_parse(args: &[String]) -> Result<(), FunnelError> {
    let input_path = &args[0];
    let parser = ParserBuilder::new().build()?;
    let model = parser.parse_workbook(File::open(input_path)?)?;

    let output = open_output(args.get(1).map(String::as_str))?;
    export::write_model_json(&model, output)
}

fn run_funnel(args: &[String]) -> Result<(), FunnelError> {
    let input_path = &args[0];
    let mut period: Option<String> = None;
    let mut stages_path: Option<String> = None;
    let mut returning: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--period" => period = Some(option_value(args, i).to_string()),
            "--stages" => stages_path = Some(option_value(args, i).to_string()),
            "--returning" => returning = Some(option_value(args, i).to_string()),
            other => {
                eprintln!("Error: Unknown option: {}", other);
                process::exit(1);
            }
        }
        i += 2;
    }

    let mut builder = match (&stages_path, &period) {
        (Some(path), _) => {
            FunnelBuilder::from_config(FunnelConfig::from_json_reader(File::open(path)?)?)
        }
        (None, Some(period)) => {
            FunnelBuilder::from_config(FunnelConfig::new_user_conversion(period.as_str()))
        }
        (None, None) => {
            return Err(FunnelError::Config(
                "--period is required unless --stages provides a target period".to_string(),
            ))
        }
    };
    if let Some(period) = period {
        builder = builder.with_target_period(period);
    }
    if let Some(returning) = returning {
        builder = builder.with_returning_indicator(returning);
    }
    let deriver = builder.build()?;

    let parser = ParserBuilder::new().build()?;
    let model = parser.parse_workbook(File::open(input_path)?)?;
    let report = deriver.derive(&model);

    export::write_report_json(&report, open_output(None)?)
}

fn run_cohort(args: &[String]) -> Result<(), FunnelError> {
    let input_path = &args[0];
    let mut labels: Vec<String> = Vec::new();
    let mut year: Option<i32> = None;
    let mut retention_days: Option<Vec<u32>> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--period" => labels.push(option_value(args, i).to_string()),
            "--year" => {
                let value = option_value(args, i);
                year = Some(value.parse::<i32>().map_err(|_| {
                    FunnelError::Config(format!("Invalid year: {}", value))
                })?);
            }
            "--retention" => {
                let value = option_value(args, i);
                let days = value
                    .split(',')
                    .map(|day| day.trim().parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| FunnelError::Config(format!("Invalid retention days: {}", value)))?;
                retention_days = Some(days);
            }
            other => {
                eprintln!("Error: Unknown option: {}", other);
                process::exit(1);
            }
        }
        i += 2;
    }

    let mut source = WorkbookSource::open(File::open(input_path)?, SourceLimits::default())?;
    let records = cohort::load_user_records(&mut source, &CohortColumns::default())?;

    let year = year
        .or_else(|| records.iter().map(|r| r.registered_at.year()).max())
        .unwrap_or(1970);
    let periods = labels
        .iter()
        .map(|label| CohortPeriod::from_label(label, year))
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = cohort::summarize(&records, &Window::DEFAULT, &periods);
    if let Some(days) = retention_days {
        summary.retention = cohort::retention_summary(&records, &days);
    }
    export::write_cohort_json(&summary, open_output(None)?)
}

fn print_error(e: &FunnelError) {
    match e {
        FunnelError::Io(io_err) => {
            eprintln!("I/O Error: {}", io_err);
            eprintln!("Please check that the file exists and you have permission to access it.");
        }
        FunnelError::Workbook(err) => {
            eprintln!("Workbook Error: {}", err);
            eprintln!("The file may not be a valid XLSX/XLS/ODS workbook or may be corrupted.");
        }
        FunnelError::Json(err) => {
            eprintln!("JSON Error: {}", err);
            eprintln!("Please check the stage configuration file.");
        }
        FunnelError::Config(msg) => eprintln!("Configuration Error: {}", msg),
        FunnelError::EmptySource(msg) => eprintln!("Empty Source: {}", msg),
        FunnelError::LimitExceeded(msg) => {
            eprintln!("Limit Exceeded: {}", msg);
            eprintln!("The workbook is larger than the configured limits.");
        }
        FunnelError::Record { row, message } => {
            eprintln!("Invalid Record:");
            eprintln!("  Row: {}", row);
            eprintln!("  Details: {}", message);
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("funnelzero");

    if args.len() < 3 {
        print_usage(program);
        process::exit(1);
    }

    let rest = &args[2..];
    let result = match args[1].as_str() {
        "parse" => run_parse(rest),
        "funnel" => run_funnel(rest),
        "cohort" => run_cohort(rest),
        other => {
            eprintln!("Error: Unknown command: {}", other);
            print_usage(program);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        print_error(&e);
        process::exit(1);
    }
}
