//! Named loggers and the registry that owns them.
//!
//! A [`LoggerRegistry`] is created once at process start around a
//! [`DistributionEngine`]. [`Logger`] handles obtained from it filter by
//! level, stamp the registry's correlation token, and broadcast through the
//! engine.
//!
//! Levels are set with patterns of comma-separated `name:LEVEL` entries
//! applied left to right. `*` matches every logger and also sets the level
//! new loggers start with:
//!
//! ```text
//! *:INFO,net:DEBUG,storage:NONE
//! ```

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{LevelPatternError, Result};
use crate::event::{Correlation, LogArg, LogEvent, LogLevel};
use crate::output::DistributionEngine;
use crate::relay::{ControlCommand, ControlHandler};

/// Level new loggers start with unless a `*` pattern changed it.
pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const WILDCARD: &str = "*";

/// State shared between the registry and every logger it hands out.
struct Shared {
    engine: Arc<DistributionEngine>,
    correlation: RwLock<Correlation>,
}

impl Shared {
    fn correlation(&self) -> Correlation {
        self.correlation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ============================================================================
// Logger
// ============================================================================

/// A named logger.
pub struct Logger {
    name: String,
    level: AtomicU8,
    shared: Arc<Shared>,
}

impl Logger {
    /// Logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current threshold.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::from_code(self.level.load(Ordering::Relaxed)).unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Sets the threshold; `LogLevel::None` silences the logger.
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Returns `true` if an event at `level` would be broadcast.
    #[must_use]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level >= self.level()
    }

    /// Logs at `level`. Below the threshold nothing is built or broadcast.
    pub fn log(&self, level: LogLevel, message: &str, args: Vec<LogArg>) {
        if !self.is_enabled(level) {
            return;
        }
        let event = LogEvent::new(level, message)
            .with_logger_name(self.name.as_str())
            .with_correlation(self.shared.correlation())
            .with_args(args);
        self.shared.engine.output(Some(&event));
    }

    /// Logs at trace level.
    pub fn trace(&self, message: &str, args: Vec<LogArg>) {
        self.log(LogLevel::Trace, message, args);
    }

    /// Logs at debug level.
    pub fn debug(&self, message: &str, args: Vec<LogArg>) {
        self.log(LogLevel::Debug, message, args);
    }

    /// Logs at info level.
    pub fn info(&self, message: &str, args: Vec<LogArg>) {
        self.log(LogLevel::Info, message, args);
    }

    /// Logs at warning level.
    pub fn warn(&self, message: &str, args: Vec<LogArg>) {
        self.log(LogLevel::Warning, message, args);
    }

    /// Logs at error level.
    pub fn error(&self, message: &str, args: Vec<LogArg>) {
        self.log(LogLevel::Error, message, args);
    }

    /// Logs `err` at error level, using its message as the event message.
    /// `None` logs nothing.
    pub fn log_if_error(&self, err: Option<&(dyn Error + '_)>, args: Vec<LogArg>) {
        if let Some(err) = err {
            self.log(LogLevel::Error, &err.to_string(), args);
        }
    }

    /// Forwards a pre-built event unchanged, whatever its level. `None` is a
    /// no-op.
    pub fn log_event(&self, event: Option<&LogEvent>) {
        if let Some(event) = event {
            self.shared.engine.output(Some(event));
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owner of all named loggers of a process.
pub struct LoggerRegistry {
    shared: Arc<Shared>,
    loggers: DashMap<String, Arc<Logger>>,
    default_level: AtomicU8,
}

impl LoggerRegistry {
    /// Creates a registry broadcasting through `engine`.
    #[must_use]
    pub fn new(engine: Arc<DistributionEngine>) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                correlation: RwLock::new(Correlation::default()),
            }),
            loggers: DashMap::new(),
            default_level: AtomicU8::new(DEFAULT_LOG_LEVEL as u8),
        }
    }

    /// The engine every logger broadcasts through.
    #[must_use]
    pub fn engine(&self) -> &Arc<DistributionEngine> {
        &self.shared.engine
    }

    /// Returns the logger called `name`, creating it at the default level.
    pub fn get_or_create(&self, name: &str) -> Arc<Logger> {
        if let Some(logger) = self.loggers.get(name) {
            return Arc::clone(logger.value());
        }
        let logger = self
            .loggers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Logger {
                    name: name.to_string(),
                    level: AtomicU8::new(self.default_level.load(Ordering::Relaxed)),
                    shared: Arc::clone(&self.shared),
                })
            });
        Arc::clone(logger.value())
    }

    /// Level new loggers start with.
    #[must_use]
    pub fn default_level(&self) -> LogLevel {
        LogLevel::from_code(self.default_level.load(Ordering::Relaxed)).unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Applies a level pattern.
    ///
    /// The whole pattern is validated before any entry is applied. A bare
    /// level (`DEBUG`) is shorthand for `*:DEBUG`; empty entries are ignored.
    ///
    /// # Errors
    ///
    /// [`LevelPatternError`] for a malformed entry or unknown level name;
    /// nothing is changed.
    pub fn set_levels(&self, pattern: &str) -> std::result::Result<(), LevelPatternError> {
        let entries = parse_level_pattern(pattern)?;
        for (name, level) in entries {
            if name == WILDCARD {
                self.default_level.store(level as u8, Ordering::Relaxed);
                for logger in &self.loggers {
                    logger.set_level(level);
                }
            } else {
                self.get_or_create(name).set_level(level);
            }
        }
        debug!(pattern, "log levels applied");
        Ok(())
    }

    /// Renders the current levels as a pattern, default first then loggers
    /// sorted by name. Feeding it back to [`set_levels`](Self::set_levels)
    /// reproduces the configuration.
    #[must_use]
    pub fn levels_pattern(&self) -> String {
        let mut entries: Vec<(String, LogLevel)> = self
            .loggers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().level()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut pattern = format!("{WILDCARD}:{}", self.default_level());
        for (name, level) in entries {
            pattern.push_str(&format!(",{name}:{level}"));
        }
        pattern
    }

    /// Replaces the correlation token stamped on subsequent events.
    pub fn set_correlation(&self, correlation: Correlation) {
        *self
            .shared
            .correlation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = correlation;
    }

    /// Current correlation token.
    #[must_use]
    pub fn correlation(&self) -> Correlation {
        self.shared.correlation()
    }
}

impl ControlHandler for LoggerRegistry {
    fn handle_command(&self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::ApplyProfile { levels } => self.set_levels(&levels)?,
            ControlCommand::SetCorrelation { token } => self.set_correlation(Correlation(token)),
        }
        Ok(())
    }
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("loggers", &self.loggers.len())
            .field("default_level", &self.default_level())
            .finish_non_exhaustive()
    }
}

/// Parses a level pattern into `(name, level)` entries in application order.
///
/// # Errors
///
/// [`LevelPatternError`] for the first malformed entry or unknown level.
pub fn parse_level_pattern(
    pattern: &str,
) -> std::result::Result<Vec<(&str, LogLevel)>, LevelPatternError> {
    pattern
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, level) = match entry.split_once(':') {
                Some((name, level)) => (name.trim(), level),
                None => (WILDCARD, entry),
            };
            if name.is_empty() {
                return Err(LevelPatternError::MalformedEntry(entry.to_string()));
            }
            Ok((name, level.parse::<LogLevel>()?))
        })
        .collect()
}
