//! Benchmark Report - Mean and coefficient of variation per measured column
//!
//! Usage:
//!   bench_report results.csv
//!   bench_report results.csv --group-by test nice
//!
//! Prints a CSV summary to stdout. Every column whose non-empty cells all
//! parse as numbers is summarized, except bookkeeping columns and the
//! grouping columns themselves.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Columns written by the benchmark runner that are never measurements
const IGNORED_COLUMNS: &[&str] = &["test", "nice", "affinity", "iteration", "ended"];

#[derive(Parser, Debug)]
#[command(name = "bench_report")]
#[command(about = "Summarize benchmark results as mean and CV% per column")]
struct Args {
    /// Input CSV file with a header row
    input_file: PathBuf,

    /// Column names to group by
    #[arg(short, long, num_args = 1..)]
    group_by: Vec<String>,
}

// ============================================================================
// CSV INPUT
// ============================================================================

#[derive(Debug)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            bail!("file is empty");
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() > headers.len() {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                bail!(
                    "line {}: expected {} fields, saw {}",
                    line,
                    headers.len(),
                    record.len()
                );
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Parsed cells of a column, `None` for empty cells. Fails on the first
    /// cell that is not a number.
    fn numbers(&self, index: usize) -> Option<Vec<Option<f64>>> {
        self.rows
            .iter()
            .map(|row| {
                let cell = row[index].trim();
                if cell.is_empty() {
                    Some(None)
                } else {
                    cell.parse::<f64>().ok().map(Some)
                }
            })
            .collect()
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Mean and coefficient of variation (population standard deviation over the
/// mean, in percent). Empty cells are skipped; a column with no values yields
/// zeros.
fn summarize(values: &[Option<f64>]) -> (f64, f64) {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return (0.0, 0.0);
    }

    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = if mean != 0.0 {
        variance.sqrt() / mean * 100.0
    } else {
        0.0
    };
    (mean, cv)
}

/// Three decimals, printed the way Python prints floats (`12.0`,
/// `1.2345678901234568e+16`)
fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    // Past 1e15 a float has no thousandths left to round
    let rounded = if value.abs() < 1e15 {
        (value * 1000.0).round() / 1000.0
    } else {
        value
    };
    // Adding 0.0 turns -0.0 into 0.0
    let text = format!("{:?}", rounded + 0.0);
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => text,
    }
}

fn to_csv(rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush report: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Numeric group keys sort by value, anything else as text
fn compare_keys(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x.parse::<f64>(), y.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// ============================================================================
// REPORT
// ============================================================================

fn numeric_columns(table: &Table, group_by: &[String]) -> Vec<usize> {
    (0..table.headers.len())
        .filter(|&i| {
            let name = table.headers[i].as_str();
            !IGNORED_COLUMNS.contains(&name)
                && !group_by.iter().any(|g| g == name)
                && table.numbers(i).is_some()
        })
        .collect()
}

fn report(table: &Table, group_by: &[String]) -> Result<String> {
    let mut group_indices = Vec::new();
    for name in group_by {
        match table.column(name) {
            Some(i) => group_indices.push(i),
            None => bail!("Column '{}' not found in CSV", name),
        }
    }

    let numeric = numeric_columns(table, group_by);
    if numeric.is_empty() {
        bail!("No numeric columns found");
    }
    let columns: Vec<(usize, Vec<Option<f64>>)> = numeric
        .into_iter()
        .filter_map(|i| table.numbers(i).map(|values| (i, values)))
        .collect();

    if group_indices.is_empty() {
        let mut rows = vec![vec![
            "column".to_string(),
            "mean".to_string(),
            "cv_%".to_string(),
        ]];
        for (i, values) in &columns {
            let (mean, cv) = summarize(values);
            rows.push(vec![
                table.headers[*i].clone(),
                format_value(mean),
                format_value(cv),
            ]);
        }
        return to_csv(&rows);
    }

    // Rows with an empty grouping cell belong to no group
    let mut groups: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (r, row) in table.rows.iter().enumerate() {
        let key: Vec<String> = group_indices.iter().map(|&g| row[g].clone()).collect();
        if key.iter().any(|k| k.trim().is_empty()) {
            continue;
        }
        groups.entry(key).or_default().push(r);
    }
    let mut keys: Vec<&Vec<String>> = groups.keys().collect();
    keys.sort_by(|a, b| compare_keys(a, b));

    let mut header: Vec<String> = group_by.to_vec();
    for (i, _) in &columns {
        header.push(format!("{}_mean", table.headers[*i]));
        header.push(format!("{}_cv%", table.headers[*i]));
    }
    let mut rows = vec![header];

    for key in keys {
        let members = &groups[key];
        let mut line = key.clone();
        for (_, values) in &columns {
            let subset: Vec<Option<f64>> = members.iter().map(|&r| values[r]).collect();
            let (mean, cv) = summarize(&subset);
            line.push(format_value(mean));
            line.push(format_value(cv));
        }
        rows.push(line);
    }
    to_csv(&rows)
}

fn run(args: &Args) -> Result<String> {
    let text = fs::read_to_string(&args.input_file)
        .with_context(|| format!("Error reading file {}", args.input_file.display()))?;
    let table = Table::parse(&text)
        .with_context(|| format!("Error reading file {}", args.input_file.display()))?;
    report(&table, &args.group_by)
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(csv) => print!("{}", csv),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
