use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

use crate::asr::TranscriptionResult;
use crate::utils::ensure_parent_dir;

/// Serialize any record as pretty JSON
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

/// Save the full result record as pretty JSON
pub fn save_json(result: &TranscriptionResult, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    fs_err::write(path, to_pretty_json(result)?)?;
    tracing::debug!("Result saved to: {}", path.display());
    Ok(())
}

/// Save only the recognized text
pub fn save_text(result: &TranscriptionResult, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    fs_err::write(path, &result.result_text)?;
    tracing::debug!("Transcript saved to: {}", path.display());
    Ok(())
}

/// Write whichever of the two files were requested
pub fn persist(
    result: &TranscriptionResult,
    json_path: Option<&Path>,
    text_path: Option<&Path>,
) -> Result<()> {
    if let Some(path) = json_path {
        save_json(result, path)?;
        eprintln!("{} {}", style("Result saved to:").green(), path.display());
    }
    if let Some(path) = text_path {
        save_text(result, path)?;
        eprintln!("{} {}", style("Transcript saved to:").green(), path.display());
    }
    Ok(())
}

/// Print a result: success to stdout, error to stderr
pub fn emit(result: &TranscriptionResult) -> Result<()> {
    let content = to_pretty_json(result)?;
    if result.is_success() {
        println!("{}", content);
    } else {
        eprintln!("{}", content);
    }
    Ok(())
}

/// Print any record to stdout as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", to_pretty_json(value)?);
    Ok(())
}

/// `{"status":"error","error":...}` for failures that produced no result record
pub fn error_record(message: &str) -> serde_json::Value {
    json!({ "status": "error", "error": message })
}

/// Print an error record to stderr
pub fn print_error(message: &str) {
    let record = error_record(message);
    let content = serde_json::to_string_pretty(&record).unwrap_or_else(|_| record.to_string());
    eprintln!("{}", content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::{interpret, Mode, RawExchange, Stage};
    use std::collections::HashMap;

    fn result(body: &str) -> TranscriptionResult {
        let exchange = RawExchange {
            status: 200,
            headers: HashMap::new(),
            body: body.to_string(),
            stage: Stage::Flash,
        };
        interpret(&exchange, Mode::Flash, "req-1")
    }

    #[test]
    fn test_save_json_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out").join("result.json");
        let text_path = dir.path().join("out").join("result.txt");

        let result = result(r#"{"result":{"text":"你好，世界"}}"#);
        persist(&result, Some(&json_path), Some(&text_path)).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(saved["status"], "success");
        assert_eq!(saved["result_text"], "你好，世界");
        assert_eq!(saved["request_id"], "req-1");
        assert!(saved.get("error_kind").is_none());

        assert_eq!(std::fs::read_to_string(&text_path).unwrap(), "你好，世界");
    }

    #[test]
    fn test_save_text_writes_empty_file_for_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("empty.txt");

        save_text(&result("{}"), &text_path).unwrap();
        assert_eq!(std::fs::read_to_string(&text_path).unwrap(), "");
    }

    #[test]
    fn test_error_record() {
        assert_eq!(
            error_record("boom"),
            json!({ "status": "error", "error": "boom" })
        );
    }
}
