use std::path::Path;

use crate::error::{Result, WinkError};

/// Parse newline-delimited floating point samples, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed.parse().map_err(|_| {
            WinkError::MalformedData(format!("line {} is not f64: {}", idx + 1, trimmed))
        })?;
        out.push(val);
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path).map_err(|e| WinkError::io(path, e))?;
    parse_f64_series(&text).map_err(|e| match e {
        WinkError::MalformedData(msg) => {
            WinkError::MalformedData(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Render samples one per line. Shortest round-trip formatting keeps values bit-exact.
pub fn format_f64_series(values: &[f64]) -> String {
    let mut out = String::with_capacity(values.len() * 20);
    for v in values {
        out.push_str(&format!("{v:?}\n"));
    }
    out
}
