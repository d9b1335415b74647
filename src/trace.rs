use core::fmt::{self, Display, Formatter, Write as _};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Display for TraceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceLevel::Debug => "DEBUG",
            TraceLevel::Info => "INFO",
            TraceLevel::Warn => "WARN",
            TraceLevel::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub level: TraceLevel,
    pub depth: usize,
    pub message: String,
}

/// Append-only log of one top-level resolution.
///
/// Only filled when the crate is built with the `diagnostics` feature,
/// the rendered text is attached to [`crate::ResolveErrorKind::ResolveFailed`].
#[derive(Debug, Default)]
pub struct Trace {
    entries: Mutex<Vec<TraceEntry>>,
}

impl Trace {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&self, level: TraceLevel, depth: usize, message: impl Into<String>) {
        self.entries.lock().push(TraceEntry {
            level,
            depth,
            message: message.into(),
        });
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }

    /// One line per entry, indented by depth
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for TraceEntry { level, depth, message } in self.entries.lock().iter() {
            let _ = writeln!(rendered, "{:indent$}[{level}] {message}", "", indent = depth * 2);
        }
        rendered
    }
}
