//! Pattern matching over crawler log lines.

use lazy_static::lazy_static;
use regex::Regex;

/// Marker the crawler prints before a base64 login QR code image.
pub const QR_CODE_MARKER: &str = "QRCODE_BASE64:";

lazy_static! {
    static ref LOGIN_SUCCESS: Regex = Regex::new(r"(?i)login .*successful").unwrap();
}

/// The base64 QR code image embedded in a log line, if any.
pub fn extract_qr_code(message: &str) -> Option<&str> {
    let index = message.find(QR_CODE_MARKER)?;
    let payload = message[index + QR_CODE_MARKER.len()..].trim();
    (!payload.is_empty()).then_some(payload)
}

pub fn is_login_success(message: &str) -> bool {
    LOGIN_SUCCESS.is_match(message)
        || message.contains("登录成功")
        || message.contains("Login successful")
}
