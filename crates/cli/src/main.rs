//! # cellcalc-cli
//!
//! Command-line interface for evaluating a single worksheet function call
//! against a JSON sheet.

use anyhow::{bail, Context, Result};
use cellcalc_formulas::{parse_number, FunctionRegistry, RegistryOptions, SheetContext};
use cellcalc_primitives::{CellAddress, CellRange, ErrorCode, Value};
use clap::Parser;
use colored::Colorize;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// cellcalc - evaluate worksheet functions
#[derive(Parser)]
#[command(name = "cellcalc")]
#[command(author, version, about = "Evaluate one worksheet function call", long_about = None)]
struct Cli {
    /// Function name (e.g. SUM)
    #[arg(value_name = "FUNCTION", required_unless_present = "list")]
    function: Option<String>,

    /// Operands: A1, A1:B4, TRUE, 12.5, #N/A, _ (blank); anything else is text
    #[arg(value_name = "OPERAND", allow_hyphen_values = true)]
    operands: Vec<String>,

    /// JSON sheet mapping A1 addresses to cell values
    #[arg(short, long, value_name = "FILE")]
    sheet: Option<PathBuf>,

    /// Cell the call is evaluated from
    #[arg(short, long, value_name = "CELL", required_unless_present = "list")]
    at: Option<String>,

    /// JSON registry options file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format (json, table)
    #[arg(short = 'f', long = "format", default_value = "table")]
    format: OutputFormat,

    /// List registered functions and exit
    #[arg(short, long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output format for results.
#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text output (default)
    #[default]
    Table,
}

/// One entry of a sheet file: a bare value, or an object marking the value
/// as the result of the cell's own formula.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SheetCell {
    Evaluated {
        value: serde_json::Value,
        #[serde(default)]
        formula: bool,
    },
    Plain(serde_json::Value),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let options = match &cli.config {
        Some(path) => load_options(path)?,
        None => RegistryOptions::default(),
    };
    let registry = FunctionRegistry::with_options(options)?;

    if cli.list {
        print_functions(&registry, cli.format)?;
        return Ok(());
    }

    let name = cli.function.as_deref().context("Missing function name")?;
    let at = cli.at.as_deref().context("Missing --at cell")?;
    let src = CellAddress::from_a1(at).with_context(|| format!("Invalid --at cell: '{at}'"))?;

    let sheet = match &cli.sheet {
        Some(path) => load_sheet(path)?,
        None => SheetContext::new(),
    };
    let sheet = Arc::new(sheet);

    let operands = cli
        .operands
        .iter()
        .map(|token| parse_operand(token, &sheet))
        .collect::<Result<Vec<_>>>()?;

    info!(function = name, operands = operands.len(), cell = %src, "evaluating");
    let value = registry.call(name, &operands, src)?;
    print_value(name, src, &value, cli.format)
}

/// Load registry options from a JSON file.
fn load_options(path: &Path) -> Result<RegistryOptions> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let options: RegistryOptions = serde_json::from_str(&source)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    info!(max_operands = options.max_operands, "loaded registry options");
    Ok(options)
}

/// Load a sheet file into a context.
fn load_sheet(path: &Path) -> Result<SheetContext> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sheet: {}", path.display()))?;
    let sheet = parse_sheet(&source).with_context(|| format!("Invalid sheet: {}", path.display()))?;
    info!(cells = sheet.len(), "loaded sheet");
    Ok(sheet)
}

fn parse_sheet(source: &str) -> Result<SheetContext> {
    let cells: HashMap<String, SheetCell> = serde_json::from_str(source)?;
    let mut sheet = SheetContext::new();
    for (a1, cell) in cells {
        let addr = CellAddress::from_a1(&a1).with_context(|| format!("Invalid cell: '{a1}'"))?;
        match cell {
            SheetCell::Evaluated { value, formula } => {
                let value = json_to_value(&value).with_context(|| format!("Cell {a1}"))?;
                if formula {
                    sheet.set_evaluated(addr, value)?;
                } else {
                    sheet.set(addr, value)?;
                }
            }
            SheetCell::Plain(value) => {
                let value = json_to_value(&value).with_context(|| format!("Cell {a1}"))?;
                sheet.set(addr, value)?;
            }
        }
    }
    Ok(sheet)
}

/// Convert a JSON cell value; strings that are error labels become errors.
fn json_to_value(json: &serde_json::Value) -> Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Blank,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(n) => Value::Number(n),
            None => bail!("Number out of range: {n}"),
        },
        serde_json::Value::String(s) => match ErrorCode::from_label(s) {
            Some(code) => Value::Error(code),
            None => Value::Text(s.clone()),
        },
        other => bail!("Unsupported cell value: {other}"),
    })
}

/// Parse a CLI operand token into a Value.
fn parse_operand(token: &str, sheet: &Arc<SheetContext>) -> Result<Value> {
    let trimmed = token.trim();
    if let Some(text) = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Ok(Value::Text(text.to_string()));
    }
    if trimmed == "_" {
        return Ok(Value::Blank);
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(Value::Boolean(true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(Value::Boolean(false));
    }
    if let Some(code) = ErrorCode::from_label(trimmed) {
        return Ok(Value::Error(code));
    }
    if let Some(n) = parse_number(trimmed) {
        return Ok(Value::Number(n));
    }
    if trimmed.contains(':') {
        if let Ok(range) = CellRange::from_a1(trimmed) {
            return Ok(sheet.area(range));
        }
    } else if let Ok(addr) = CellAddress::from_a1(trimmed) {
        return Ok(sheet.cell(addr)?);
    }
    Ok(Value::Text(token.to_string()))
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => serde_json::json!(n),
        Value::Text(s) => serde_json::json!(s),
        Value::Boolean(b) => serde_json::json!(b),
        Value::Blank => serde_json::Value::Null,
        Value::Error(code) => serde_json::json!({ "error": code.label() }),
        Value::CellRef(_) | Value::AreaRef(_) => serde_json::json!(value.to_string()),
    }
}

fn print_value(name: &str, src: CellAddress, value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "function": name.to_uppercase(),
                "cell": src.to_a1(),
                "kind": value.kind_name(),
                "value": value_to_json(value),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            let rendered = match value {
                Value::Error(code) => code.label().red().bold().to_string(),
                Value::Text(s) => format!("\"{s}\"").green().to_string(),
                Value::Blank => "(blank)".dimmed().to_string(),
                other => other.to_string().green().to_string(),
            };
            println!("{} @ {} = {}", name.to_uppercase().cyan(), src, rendered);
        }
    }
    Ok(())
}

fn print_functions(registry: &FunctionRegistry, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = registry
                .names()
                .into_iter()
                .filter_map(|name| registry.get(name).map(|def| (name, def)))
                .map(|(name, def)| {
                    serde_json::json!({
                        "name": name,
                        "arity": def.arity(),
                        "metadata": def.metadata,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => {
            for name in registry.names() {
                if let Some(def) = registry.get(name) {
                    println!("{:<12} {}", name.cyan(), def.expected_args_label());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_sheet() -> Arc<SheetContext> {
        Arc::new(SheetContext::new())
    }

    #[test]
    fn test_parse_operand_scalars() {
        let sheet = empty_sheet();
        assert_eq!(parse_operand("TRUE", &sheet).unwrap(), Value::Boolean(true));
        assert_eq!(parse_operand("false", &sheet).unwrap(), Value::Boolean(false));
        assert_eq!(parse_operand("12.5", &sheet).unwrap(), Value::Number(12.5));
        assert_eq!(parse_operand("-3", &sheet).unwrap(), Value::Number(-3.0));
        assert_eq!(parse_operand("_", &sheet).unwrap(), Value::Blank);
        assert_eq!(
            parse_operand("#N/A", &sheet).unwrap(),
            Value::Error(ErrorCode::NA)
        );
        assert_eq!(parse_operand("hello", &sheet).unwrap(), Value::from("hello"));
        assert_eq!(parse_operand("\"A1\"", &sheet).unwrap(), Value::from("A1"));
        assert_eq!(parse_operand("inf", &sheet).unwrap(), Value::from("inf"));
    }

    #[test]
    fn test_parse_operand_references() {
        let mut ctx = SheetContext::new();
        ctx.set(CellAddress::new(0, 0), Value::Number(4.0)).unwrap();
        let sheet = Arc::new(ctx);

        match parse_operand("A1", &sheet).unwrap() {
            Value::CellRef(cell) => assert_eq!(cell.inner(), &Value::Number(4.0)),
            other => panic!("expected cell ref, got {other:?}"),
        }
        match parse_operand("A1:B3", &sheet).unwrap() {
            Value::AreaRef(area) => assert_eq!(area.range().size(), 6),
            other => panic!("expected area ref, got {other:?}"),
        }
        assert_eq!(parse_operand("A1:", &sheet).unwrap(), Value::from("A1:"));
    }

    #[test]
    fn test_parse_sheet() {
        let sheet = parse_sheet(
            r##"{"A1": 1, "A2": "text", "A3": true, "A4": "#DIV/0!", "B1": {"value": 2, "formula": true}}"##,
        )
        .unwrap();
        assert_eq!(sheet.get(&CellAddress::new(0, 0)), Value::Number(1.0));
        assert_eq!(sheet.get(&CellAddress::new(1, 0)), Value::from("text"));
        assert_eq!(sheet.get(&CellAddress::new(2, 0)), Value::Boolean(true));
        assert_eq!(
            sheet.get(&CellAddress::new(3, 0)),
            Value::Error(ErrorCode::DivZero)
        );
        assert!(sheet.is_formula(&CellAddress::new(0, 1)));
        assert!(!sheet.is_formula(&CellAddress::new(0, 0)));
    }

    #[test]
    fn test_parse_sheet_rejects_bad_input() {
        assert!(parse_sheet(r#"{"1A": 1}"#).is_err());
        assert!(parse_sheet(r#"{"A1": [1, 2]}"#).is_err());
        assert!(parse_sheet("not json").is_err());
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(value_to_json(&Value::Number(2.5)), serde_json::json!(2.5));
        assert_eq!(value_to_json(&Value::Blank), serde_json::Value::Null);
        assert_eq!(
            value_to_json(&Value::Error(ErrorCode::NumError)),
            serde_json::json!({"error": "#NUM!"})
        );
    }

    #[test]
    fn test_end_to_end_sum_over_sheet() {
        let sheet = Arc::new(parse_sheet(r#"{"A1": 1, "A2": 2, "A3": "x"}"#).unwrap());
        let registry = FunctionRegistry::default();
        let operands = vec![
            parse_operand("A1:A3", &sheet).unwrap(),
            parse_operand("10", &sheet).unwrap(),
        ];
        let value = registry
            .call("SUM", &operands, CellAddress::from_a1("C1").unwrap())
            .unwrap();
        assert_eq!(value, Value::Number(13.0));
    }
}
