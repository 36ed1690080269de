/// Logger Gateway
///
/// Process-wide indirection point through which executed statements are
/// reported. Commands look the logger up with [`current`] on every execution,
/// so a logger installed with [`set_logger`] or [`with_logger`] takes effect
/// for the very next statement.
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::sync::{Arc, Mutex, RwLock};
use tracing::level_filters::LevelFilter;

/// Severity levels understood by the gateway. Lower is more verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Level {
    /// Returns the integer severity used by [`Logger::level`].
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parses a level name (`"debug"`, `"info"`, ...) or its integer form.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" | "0" => Some(Level::Debug),
            "info" | "1" => Some(Level::Info),
            "warn" | "warning" | "2" => Some(Level::Warn),
            "error" | "3" => Some(Level::Error),
            "fatal" | "4" => Some(Level::Fatal),
            _ => None,
        }
    }
}

/// A sink for statement log records.
///
/// `debug` must not fail; implementations swallow their own I/O problems.
pub trait Logger: Send + Sync {
    /// Current severity threshold; `0` admits DEBUG records.
    fn level(&self) -> i32;

    /// Emits one DEBUG record.
    fn debug(&self, message: &str);

    /// Whether a DEBUG record would be kept.
    fn debug_enabled(&self) -> bool {
        self.level() <= Level::Debug.as_i32()
    }
}

/// Default logger, forwarding records to `tracing` on the `dosql::query` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    /// Fixed level; `None` follows the active subscriber's max level
    level: Option<Level>,
}

impl TracingLogger {
    /// A logger whose level follows the installed `tracing` subscriber.
    pub fn new() -> Self {
        TracingLogger { level: None }
    }

    /// A logger with a fixed severity threshold.
    pub fn with_level(level: Level) -> Self {
        TracingLogger { level: Some(level) }
    }
}

impl Logger for TracingLogger {
    fn level(&self) -> i32 {
        if let Some(level) = self.level {
            return level.as_i32();
        }
        let max = LevelFilter::current();
        if max >= LevelFilter::DEBUG {
            Level::Debug.as_i32()
        } else if max >= LevelFilter::INFO {
            Level::Info.as_i32()
        } else if max >= LevelFilter::WARN {
            Level::Warn.as_i32()
        } else if max >= LevelFilter::ERROR {
            Level::Error.as_i32()
        } else {
            Level::Fatal.as_i32()
        }
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "dosql::query", "{}", message);
    }
}

/// Logger that keeps every DEBUG record in memory.
#[derive(Debug)]
pub struct MemoryLogger {
    level: i32,
    records: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new(level: i32) -> Self {
        MemoryLogger {
            level,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the records emitted so far, oldest first.
    pub fn records(&self) -> Vec<String> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of `debug` calls received.
    pub fn debug_calls(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl Logger for MemoryLogger {
    fn level(&self) -> i32 {
        self.level
    }

    fn debug(&self, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(message.to_string());
        }
    }
}

static GLOBAL_LOGGER: Lazy<RwLock<Arc<dyn Logger>>> =
    Lazy::new(|| RwLock::new(Arc::new(TracingLogger::new())));

thread_local! {
    static SCOPED_LOGGER: RefCell<Vec<Arc<dyn Logger>>> = RefCell::new(Vec::new());
}

/// Returns the logger in effect for the calling thread.
///
/// A logger installed with [`with_logger`] on this thread wins over the
/// global one.
pub fn current() -> Arc<dyn Logger> {
    if let Some(scoped) = SCOPED_LOGGER.with(|stack| stack.borrow().last().cloned()) {
        return scoped;
    }
    match GLOBAL_LOGGER.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Replaces the global logger, returning the one previously installed.
pub fn set_logger(logger: Arc<dyn Logger>) -> Arc<dyn Logger> {
    let mut guard = match GLOBAL_LOGGER.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    std::mem::replace(&mut *guard, logger)
}

/// Runs `f` with `logger` installed for the current thread only.
pub fn with_logger<T>(logger: Arc<dyn Logger>, f: impl FnOnce() -> T) -> T {
    struct Restore;

    impl Drop for Restore {
        fn drop(&mut self) {
            SCOPED_LOGGER.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }

    SCOPED_LOGGER.with(|stack| stack.borrow_mut().push(logger));
    let _restore = Restore;
    f()
}
