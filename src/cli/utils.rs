use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::services::import::ImportReport;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print an import report: the whole report as JSON, or one line per row plus a summary
pub fn output_import_report(output_format: &OutputFormat, report: &ImportReport) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            for result in &report.results {
                let outcome = match (&result.error, result.created, result.updated) {
                    (Some(err), _, _) => format!("error: {}", err),
                    (None, true, _) => "created".to_string(),
                    (None, _, true) => "updated".to_string(),
                    (None, false, false) => "skipped".to_string(),
                };
                let id = result.student_id.map(|id| format!(" #{}", id)).unwrap_or_default();
                println!("row {:>5}  {:<16}{}  {}", result.row, result.student_number, id, outcome);
            }
            println!(
                "{} rows: {} created, {} updated, {} failed",
                report.total, report.created, report.updated, report.failed
            );
        }
    }
    Ok(())
}
