pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use colored::Colorize;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
///
/// JSON and table output carry the envelope's warnings themselves; for CSV
/// and minimal output they are echoed to stderr so they are not lost.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => {
            echo_warnings(value);
            csv_out::print_csv(value)
        }
        OutputFormat::Minimal => {
            echo_warnings(value);
            minimal::print_minimal(value)
        }
    }
}

fn echo_warnings(value: &Value) {
    let warnings = value
        .get("warnings")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for w in warnings {
        eprintln!("{}: {}", "warning".yellow().bold(), w);
    }
}
