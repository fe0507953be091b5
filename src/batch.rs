//! Batch scripts: one cell edit or sheet command per line.
//!
//! ```text
//! # comment
//! A1 5
//! B1 =A1*2
//! :insert-row 1
//! :delete-col C
//! :clear A2
//! ```

use crate::error::{CliError, Result};
use cellflow_core::{CellRef, Document};
use cellflow_engine::engine::decode_column;
use std::io::Read;
use std::path::Path;

/// Read the script from `path`, or from stdin when no path is given.
pub fn read_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut script = String::new();
            std::io::stdin().read_to_string(&mut script)?;
            Ok(script)
        }
    }
}

/// Apply every line of `script` to `doc`, stopping at the first failure.
pub fn run_script(doc: &mut Document, script: &str) -> Result<()> {
    for (index, line) in script.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        run_line(doc, trimmed).map_err(|message| {
            tracing::warn!(line = line_no, %message, "script line rejected");
            CliError::Script {
                line: line_no,
                message,
            }
        })?;
    }
    Ok(())
}

fn run_line(doc: &mut Document, line: &str) -> std::result::Result<(), String> {
    if let Some(command) = line.strip_prefix(':') {
        return run_command(doc, command);
    }

    let (addr, input) = match line.split_once(char::is_whitespace) {
        Some((addr, input)) => (addr, input.trim_start()),
        None => (line, ""),
    };
    let at = parse_address(addr)?;
    doc.update_value(&at, input).map_err(|e| e.to_string())
}

fn run_command(doc: &mut Document, command: &str) -> std::result::Result<(), String> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts
        .next()
        .ok_or_else(|| format!("Command :{} requires an argument", name))?;
    if let Some(extra) = parts.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }

    let result = match name {
        "clear" => doc.clear(&parse_address(arg)?),
        "insert-row" => doc.insert_row(parse_row(arg)?),
        "delete-row" => doc.delete_row(parse_row(arg)?),
        "insert-col" => doc.insert_column(parse_column(arg)?),
        "delete-col" => doc.delete_column(parse_column(arg)?),
        _ => return Err(format!("Unknown command: :{}", name)),
    };
    result.map_err(|e| e.to_string())
}

fn parse_address(addr: &str) -> std::result::Result<CellRef, String> {
    CellRef::from_str(addr).ok_or_else(|| format!("Invalid cell address: {}", addr))
}

/// 1-based row number as displayed, to a 0-based index.
fn parse_row(arg: &str) -> std::result::Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("Invalid row number: {}", arg)),
    }
}

/// Column label as displayed, to a 0-based index.
fn parse_column(arg: &str) -> std::result::Result<usize, String> {
    decode_column(&arg.to_ascii_uppercase()).ok_or_else(|| format!("Invalid column: {}", arg))
}
