//! Headless mode - NDJSON host bridge on stdin/stdout
//!
//! Stands in for a host application: method calls are read from stdin, one
//! JSON object per line, and responses plus host callbacks are written to
//! stdout as NDJSON.
//!
//! # Input Format
//!
//! ```json
//! {"id":1,"method":"startScan","arguments":[9]}
//! {"id":2,"method":"changeScanArea","arguments":{"scanAreaWidth":200,"scanAreaHeight":200,"cutOutBottomOffset":50}}
//! ```
//!
//! # Example Output
//!
//! ```json
//! {"event":"ready","view_id":0,"decoder":"qr","timestamp":1704700001000}
//! {"event":"callback","view_id":0,"method":"onPermissionSet","arguments":true,"timestamp":1704700001002}
//! {"event":"response","id":1,"response":{"status":"success","result":null},"timestamp":1704700001003}
//! ```

pub mod runner;

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use qrscan_app::MethodResponse;
use qrscan_core::HostEvent;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// Lines emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Bridge is accepting calls
    Ready {
        view_id: i32,
        decoder: String,
        timestamp: i64,
    },

    /// Answer to an inbound call, echoing its id
    Response {
        id: Value,
        response: MethodResponse,
        timestamp: i64,
    },

    /// Host callback raised by the view
    Callback {
        view_id: i32,
        method: String,
        arguments: Value,
        timestamp: i64,
    },

    /// Result of `scan-image` for one file
    ImageScanned {
        path: String,
        codes: Vec<String>,
        timestamp: i64,
    },

    /// `scan-image` failed for one file
    ImageFailed {
        path: String,
        code: String,
        message: String,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// Bridge shut down
    Stopped { timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn ready(view_id: i32, decoder: &str) -> Self {
        Self::Ready {
            view_id,
            decoder: decoder.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn response(id: Value, response: MethodResponse) -> Self {
        Self::Response {
            id,
            response,
            timestamp: Self::now(),
        }
    }

    pub fn callback(view_id: i32, event: &HostEvent) -> Self {
        let arguments = match event {
            HostEvent::RecognizeQr(code) => serde_json::to_value(code).unwrap_or(Value::Null),
            HostEvent::PermissionSet(granted) => Value::Bool(*granted),
        };
        Self::Callback {
            view_id,
            method: event.method_name().to_string(),
            arguments,
            timestamp: Self::now(),
        }
    }

    pub fn image_scanned(path: &Path, codes: Vec<String>) -> Self {
        Self::ImageScanned {
            path: path.display().to_string(),
            codes,
            timestamp: Self::now(),
        }
    }

    pub fn image_failed(path: &Path, error: &qrscan_core::Error) -> Self {
        Self::ImageFailed {
            path: path.display().to_string(),
            code: error.code().to_string(),
            message: error.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn stopped() -> Self {
        Self::Stopped {
            timestamp: Self::now(),
        }
    }
}
