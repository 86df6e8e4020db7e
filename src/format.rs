//! Formatters turning converted events into sink-ready bytes.

use std::fmt::Write as _;

use chrono::DateTime;

use crate::error::FormatError;
use crate::event::ConvertedEvent;
use crate::frame::{FrameCodec, JsonMarshaller, Marshaller};
use crate::output::LogFormatter;

/// Messages are padded to this many characters so argument columns line up.
pub const MESSAGE_FIXED_LENGTH: usize = 40;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// ============================================================================
// Plain
// ============================================================================

/// Single-line human-readable formatter.
///
/// ```text
/// DEBUG[2022-03-28 13:22:34.061] [net/peers] [round-7] connected              peer = ab12 count = 3
/// ```
///
/// The logger-name and correlation columns are off by default. Arguments are
/// printed as `key = value ` pairs; a trailing key without a value is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter {
    logger_name: bool,
    correlation: bool,
}

impl PlainFormatter {
    /// Creates a formatter printing level, timestamp, message and arguments.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            logger_name: false,
            correlation: false,
        }
    }

    /// Adds the `[logger name]` column.
    #[must_use]
    pub const fn with_logger_name(mut self) -> Self {
        self.logger_name = true;
        self
    }

    /// Adds the `[correlation]` column.
    #[must_use]
    pub const fn with_correlation(mut self) -> Self {
        self.correlation = true;
        self
    }

    fn render(&self, event: &ConvertedEvent) -> String {
        let mut line = String::with_capacity(128);
        let timestamp = DateTime::from_timestamp_nanos(event.timestamp).format(TIMESTAMP_FORMAT);
        let _ = write!(line, "{:<5}[{timestamp}] ", event.log_level);
        if self.logger_name {
            let _ = write!(line, "[{}] ", event.logger_name);
        }
        if self.correlation {
            let _ = write!(line, "[{}] ", event.correlation);
        }
        let _ = write!(
            line,
            "{:<width$} ",
            event.message,
            width = MESSAGE_FIXED_LENGTH
        );
        for pair in event.args.chunks_exact(2) {
            let _ = write!(line, "{} = {} ", pair[0], pair[1]);
        }
        line.push('\n');
        line
    }
}

impl LogFormatter for PlainFormatter {
    fn format(&self, event: Option<&ConvertedEvent>) -> Result<Vec<u8>, FormatError> {
        Ok(event.map(|e| self.render(e).into_bytes()).unwrap_or_default())
    }
}

// ============================================================================
// JSON
// ============================================================================

/// One wire-form JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl LogFormatter for JsonFormatter {
    fn format(&self, event: Option<&ConvertedEvent>) -> Result<Vec<u8>, FormatError> {
        let Some(event) = event else {
            return Ok(Vec::new());
        };
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        Ok(line)
    }
}

// ============================================================================
// Frame
// ============================================================================

/// Frames each event with a [`FrameCodec`]; used on the relay's outbound path.
///
/// An absent event is framed as the default converted event.
#[derive(Debug, Clone)]
pub struct FrameFormatter<M = JsonMarshaller> {
    codec: FrameCodec<ConvertedEvent, M>,
}

impl<M: Marshaller + Default> Default for FrameFormatter<M> {
    fn default() -> Self {
        Self::new(FrameCodec::default())
    }
}

impl<M: Marshaller> FrameFormatter<M> {
    /// Creates a formatter around `codec`.
    #[must_use]
    pub const fn new(codec: FrameCodec<ConvertedEvent, M>) -> Self {
        Self { codec }
    }
}

impl<M: Marshaller> LogFormatter for FrameFormatter<M> {
    fn format(&self, event: Option<&ConvertedEvent>) -> Result<Vec<u8>, FormatError> {
        let frame = match event {
            Some(event) => self.codec.encode(event)?,
            None => self.codec.encode(&ConvertedEvent::default())?,
        };
        Ok(frame)
    }
}

// ============================================================================
// Null
// ============================================================================

/// Placeholder formatter. Reports itself absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFormatter;

impl LogFormatter for NullFormatter {
    fn format(&self, _event: Option<&ConvertedEvent>) -> Result<Vec<u8>, FormatError> {
        Ok(Vec::new())
    }

    fn is_absent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogLevel;

    // 2022-03-28 13:22:34.061 UTC
    const TS: i64 = 1_648_473_754_061_000_000;

    fn event() -> ConvertedEvent {
        ConvertedEvent {
            logger_name: "consensus/spos/bls".to_string(),
            correlation: "2/0/2/(END_ROUND)".to_string(),
            message: "step 3: block header final info".to_string(),
            log_level: LogLevel::Debug,
            args: vec!["PubKeysBitmap".to_string(), "1f".to_string()],
            timestamp: TS,
        }
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn plain_default_columns() {
        let out = text(PlainFormatter::new().format(Some(&event())).unwrap());
        assert_eq!(
            out,
            "DEBUG[2022-03-28 13:22:34.061] step 3: block header final info          PubKeysBitmap = 1f \n"
        );
    }

    #[test]
    fn plain_with_name_and_correlation() {
        let formatter = PlainFormatter::new().with_logger_name().with_correlation();
        let out = text(formatter.format(Some(&event())).unwrap());
        assert!(out.starts_with(
            "DEBUG[2022-03-28 13:22:34.061] [consensus/spos/bls] [2/0/2/(END_ROUND)] step 3:"
        ));
    }

    #[test]
    fn plain_pads_level_and_message() {
        let converted = ConvertedEvent {
            log_level: LogLevel::Info,
            message: "short".to_string(),
            ..ConvertedEvent::default()
        };
        let out = text(PlainFormatter::new().format(Some(&converted)).unwrap());
        assert_eq!(
            out,
            format!("INFO [1970-01-01 00:00:00.000] short{} \n", " ".repeat(35))
        );
    }

    #[test]
    fn plain_long_message_is_not_truncated() {
        let long = "m".repeat(60);
        let converted = ConvertedEvent {
            message: long.clone(),
            ..ConvertedEvent::default()
        };
        let out = text(PlainFormatter::new().format(Some(&converted)).unwrap());
        assert!(out.contains(&format!("{long} \n")));
    }

    #[test]
    fn plain_drops_unpaired_trailing_key() {
        let converted = ConvertedEvent {
            args: vec!["a".into(), "1".into(), "dangling".into()],
            ..ConvertedEvent::default()
        };
        let out = text(PlainFormatter::new().format(Some(&converted)).unwrap());
        assert!(out.ends_with("a = 1 \n"));
        assert!(!out.contains("dangling"));
    }

    #[test]
    fn absent_event_formats_to_empty_buffer() {
        assert!(PlainFormatter::new().format(None).unwrap().is_empty());
        assert!(JsonFormatter.format(None).unwrap().is_empty());
    }

    #[test]
    fn json_formatter_emits_wire_object_per_line() {
        let out = text(JsonFormatter.format(Some(&event())).unwrap());
        assert!(out.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(value["LoggerName"], "consensus/spos/bls");
        assert_eq!(value["LogLevel"], 1);
        assert_eq!(value["Timestamp"], TS);
    }

    #[test]
    fn frame_formatter_output_decodes_with_same_codec() {
        let codec: FrameCodec<ConvertedEvent> = FrameCodec::default();
        let formatter = FrameFormatter::new(codec.clone());

        let frame = formatter.format(Some(&event())).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        let decoded = codec.decode(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded, event());

        let absent = formatter.format(None).unwrap();
        assert_eq!(absent, codec.encode(&ConvertedEvent::default()).unwrap());
    }

    #[test]
    fn only_null_formatter_is_absent() {
        assert!(NullFormatter.is_absent());
        assert!(!PlainFormatter::new().is_absent());
        assert!(!JsonFormatter.is_absent());
        assert!(!FrameFormatter::<JsonMarshaller>::default().is_absent());
    }
}
