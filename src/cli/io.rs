//! JSON output for the CLI
//!
//! One JSON object per image on stdout:
//! - `{"status":"ok","device":...,"data":...}`
//! - `{"status":"error","device":...,"code":...,"message":...}`

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

fn ok_value(device: &str, data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "device": device,
        "data": data
    })
}

fn error_value(device: &str, code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "device": device,
        "code": code,
        "message": message
    })
}

fn write_line<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a success response for one image to stdout
pub fn write_response(device: &str, data: Value) -> CliResult<()> {
    write_line(&mut io::stdout(), &ok_value(device, data))
}

/// Write an error response for one image to stdout
pub fn write_error(device: &str, code: &str, message: &str) -> CliResult<()> {
    write_line(&mut io::stdout(), &error_value(device, code, message))
}
