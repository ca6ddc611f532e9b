//! Output formatting for text and JSON.

use anyhow::Result;
use bluetemp_store::StoredRecord;
use bluetemp_types::{Climate, Reading};
use time::format_description::well_known::Rfc3339;

use crate::cli::OutputFormat;

/// Format a temperature and humidity pair.
pub fn format_climate(climate: &Climate, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "Temperature: {:.2} °C\nHumidity:    {:.2} %\n",
            climate.temperature, climate.humidity
        )),
        OutputFormat::Json => json_line(climate),
    }
}

/// Format a single characteristic value.
pub fn format_reading(reading: &Reading, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{:.2} {}\n", reading.value, reading.role.unit())),
        OutputFormat::Json => json_line(reading),
    }
}

/// Format stored records, newest first.
pub fn format_records(records: &[StoredRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                return Ok("No stored readings\n".to_string());
            }
            let mut out = format!("{:<26} {:>10} {:>10}\n", "Recorded", "Temp °C", "RH %");
            for record in records {
                let when = record
                    .created_at
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| record.created_at.to_string());
                out.push_str(&format!(
                    "{when:<26} {:>10.2} {:>10.2}\n",
                    record.temperature, record.humidity
                ));
            }
            Ok(out)
        }
        OutputFormat::Json => json_line(records),
    }
}

fn json_line<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}
