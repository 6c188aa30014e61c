//! Output handling for CLI
//!
//! - JSON commands write a single JSON object to stdout
//! - `cat` writes raw bytes to stdout

use std::io::Write;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::errors::CliResult;
use crate::versions::ContentHandle;

/// Write a success response as one JSON line
pub fn write_response<W: Write, T: Serialize>(out: &mut W, data: &T) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_line(out, &response)
}

/// Write an error response as one JSON line
pub fn write_error<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_line(out, &response)
}

fn write_line<W: Write>(out: &mut W, value: &serde_json::Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Stream one version to stdout, returning the bytes written
pub async fn write_content(mut handle: ContentHandle) -> CliResult<u64> {
    let mut stdout = tokio::io::stdout();
    let written = tokio::io::copy(&mut handle, &mut stdout).await?;
    stdout.flush().await?;
    Ok(written)
}
