use serde_json::Value;
use std::io::{self, Read};

/// Read a request from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive) or empty.
///
/// JSON is expected; YAML is accepted as a fallback.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => v,
        Err(json_err) => serde_yaml::from_str::<Value>(trimmed)
            .map_err(|_| format!("stdin is neither valid JSON nor YAML: {json_err}"))?,
    };
    Ok(Some(value))
}
