//! Argument rendering.
//!
//! Turns [`LogArg`] values into display strings. Output must stay
//! single-line-safe and terminal-safe: raw bytes are always hex, and strings
//! are hex-encoded unless every byte is printable ASCII or tab/CR/LF.

use crate::event::LogArg;

/// Renders every argument, preserving order and length.
#[must_use]
pub fn render_args(args: &[LogArg]) -> Vec<String> {
    args.iter().map(render_arg).collect()
}

/// Renders a single argument.
#[must_use]
pub fn render_arg(arg: &LogArg) -> String {
    match arg {
        LogArg::Bytes(bytes) => hex::encode(bytes),
        LogArg::Str(text) => render_str(text),
        LogArg::Display(value) => value.to_string(),
    }
}

fn render_str(text: &str) -> String {
    if is_ascii_safe(text) {
        text.to_string()
    } else {
        hex::encode(text.as_bytes())
    }
}

/// Returns `true` if every byte is printable ASCII (`0x20..=0x7E`) or one of
/// tab, carriage return, line feed.
#[must_use]
pub fn is_ascii_safe(data: &str) -> bool {
    data.bytes()
        .all(|b| matches!(b, 0x20..=0x7E | b'\t' | b'\r' | b'\n'))
}
