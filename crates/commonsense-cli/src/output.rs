//! Output formatting for commonsense-cli (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use commonsense_client::{DataPoint, Sensor, SensorMetatags};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data);
            }
        }
    }
}

/// Print data as CSV
fn print_csv<T: Serialize>(data: &[T]) {
    if data.is_empty() {
        return;
    }

    // Get field names from the first item
    let first = serde_json::to_value(&data[0]).unwrap_or_default();
    if let serde_json::Value::Object(map) = &first {
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        println!("{}", headers.join(","));

        for item in data {
            if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        row.get(*h)
                            .map(|v| match v {
                                serde_json::Value::String(s) => escape_csv(s),
                                other => escape_csv(&other.to_string()),
                            })
                            .unwrap_or_default()
                    })
                    .collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Sensor display for sensors command
#[derive(Debug, Tabled, Serialize)]
pub struct SensorRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Display Name")]
    pub display_name: String,
    #[tabled(rename = "Device")]
    pub device_type: String,
    #[tabled(rename = "Type")]
    pub data_type: String,
    #[tabled(rename = "Stored")]
    pub stored: String,
}

impl From<Sensor> for SensorRow {
    fn from(s: Sensor) -> Self {
        Self {
            id: s.id,
            name: s.name,
            display_name: s.display_name,
            device_type: s.device_type,
            data_type: s.data_type,
            stored: if s.use_data_storage { "yes" } else { "no" }.to_string(),
        }
    }
}

/// Sensor display for metatags command
#[derive(Debug, Tabled, Serialize)]
pub struct MetatagRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Tags")]
    pub tags: String,
}

impl From<SensorMetatags> for MetatagRow {
    fn from(m: SensorMetatags) -> Self {
        let mut tags: Vec<String> = m
            .metatags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        tags.sort();
        Self {
            id: m.sensor.id,
            name: m.sensor.name,
            tags: tags.join(" "),
        }
    }
}

/// Data point display for data command
#[derive(Debug, Tabled, Serialize)]
pub struct DataRow {
    #[tabled(rename = "Sensor")]
    pub sensor: String,
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl DataRow {
    pub fn new(sensor_id: &str, point: DataPoint) -> Self {
        let time = point
            .timestamp()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| point.date.to_string());
        Self {
            sensor: point.sensor_id.unwrap_or_else(|| sensor_id.to_string()),
            time,
            value: point.value,
        }
    }
}
