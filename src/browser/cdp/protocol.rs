//! Wire shapes and page-side scripts used by the CDP driver.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

/// Characters of the data URL pulled back per evaluation; keeps frames small.
pub const EXPORT_CHUNK_CHARS: usize = 1 << 20;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Incoming DevTools message: either a command response or an event.
#[derive(Debug, Deserialize)]
pub struct Incoming {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<RemoteError>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

/// What the export script reports about the page's canvas.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ExportStatus {
    Missing,
    Failed { error: String },
    Ready { length: usize },
}

/// Extracts the websocket URL from Chromium's `DevTools listening on ws://...` stderr line.
pub fn parse_devtools_line(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix("DevTools listening on ")
        .map(|url| url.trim().to_string())
        .filter(|url| url.starts_with("ws://"))
}

pub fn inject_settings_script(settings_json: &str) -> String {
    format!(
        r#"(() => {{
  window.captureSettings = {settings_json};
  window.dispatchEvent(new CustomEvent("capturesettings", {{ detail: window.captureSettings }}));
  return true;
}})()"#
    )
}

pub const EXPORT_SURFACE_SCRIPT: &str = r#"(() => {
  const canvas = document.querySelector("canvas");
  if (!canvas) return { state: "missing" };
  try {
    window.__viewcapExport = canvas.toDataURL("image/png");
    return { state: "ready", length: window.__viewcapExport.length };
  } catch (e) {
    return { state: "failed", error: String(e) };
  }
})()"#;

pub fn read_chunk_script(offset: usize, len: usize) -> String {
    format!(
        "window.__viewcapExport.slice({}, {})",
        offset,
        offset.saturating_add(len)
    )
}

pub const RELEASE_EXPORT_SCRIPT: &str = "(() => { delete window.__viewcapExport; return true; })()";

/// Decodes a `data:image/png;base64,...` URL into raw PNG bytes.
pub fn decode_png_data_url(data_url: &str) -> Result<Vec<u8>, String> {
    let payload = data_url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or_else(|| {
            let head: String = data_url.chars().take(32).collect();
            format!("surface export is not a PNG data URL (starts with {:?})", head)
        })?;
    STANDARD
        .decode(payload)
        .map_err(|e| format!("surface export is not valid base64: {}", e))
}

/// Human-readable summary of a `Runtime.evaluate` exception.
pub fn describe_exception(details: &Value) -> String {
    details
        .pointer("/exception/description")
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("uncaught exception")
        .to_string()
}
