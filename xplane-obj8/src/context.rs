//! Per-pass export context: debug switch plus a diagnostics sink.
//!
//! The baker, reducer and serializer never touch global state; callers hand a
//! mutable context down the call tree and inspect it when the pass finishes.

/// Diagnostics collaborator for one export pass.
///
/// Messages are forwarded to the `log` facade and retained so the caller can
/// decide what to do with a finished (or failed) pass.
#[derive(Debug, Default)]
pub struct ExportContext {
    /// When set, the serializer writes `#`-prefixed annotation comments into
    /// the directive stream.
    pub debug: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ExportContext {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Record a user-data problem. The pass degrades (omits a directive or
    /// skips a payload) instead of aborting.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{message}");
        self.errors.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        log::info!("{}", message.as_ref());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
