//! Outbound events delivered to the host application

use serde::{Deserialize, Serialize};

use crate::types::BarcodeResult;

/// Payload of `onRecognizeQR`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedCode {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub format: String,
    #[serde(default)]
    pub raw_bytes: Option<Vec<u8>>,
}

impl From<BarcodeResult> for RecognizedCode {
    fn from(result: BarcodeResult) -> Self {
        Self {
            code: result.text,
            format: result.format.name().to_string(),
            raw_bytes: result.raw_bytes,
        }
    }
}

/// Host callback invocations, one channel per view instance.
///
/// Serialized the way a method channel carries them: the callback name in
/// `method` and its payload in `arguments`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "method", content = "arguments")]
pub enum HostEvent {
    #[serde(rename = "onRecognizeQR")]
    RecognizeQr(RecognizedCode),

    #[serde(rename = "onPermissionSet")]
    PermissionSet(bool),
}

impl HostEvent {
    pub fn method_name(&self) -> &'static str {
        match self {
            HostEvent::RecognizeQr(_) => "onRecognizeQR",
            HostEvent::PermissionSet(_) => "onPermissionSet",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BarcodeFormat;

    #[test]
    fn test_recognized_code_wire_shape() {
        let result = BarcodeResult::new(
            Some("hello".to_string()),
            Some(vec![104, 105]),
            BarcodeFormat::QrCode,
        );
        let event = HostEvent::RecognizeQr(result.into());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["method"], "onRecognizeQR");
        assert_eq!(json["arguments"]["code"], "hello");
        assert_eq!(json["arguments"]["type"], "QR_CODE");
        assert_eq!(json["arguments"]["rawBytes"][1], 105);
    }

    #[test]
    fn test_permission_event_wire_shape() {
        let json = serde_json::to_value(HostEvent::PermissionSet(false)).unwrap();
        assert_eq!(json["method"], "onPermissionSet");
        assert_eq!(json["arguments"], false);
        assert_eq!(HostEvent::PermissionSet(true).method_name(), "onPermissionSet");
    }
}
