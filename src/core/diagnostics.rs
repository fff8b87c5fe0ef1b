/// Severity level of a message emitted by vboxfleet operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Diagnostic detail, shown only with `--debug`.
    Debug,
    /// Informational narration.
    Info,
    /// Something failed but the workflow continues.
    Warning,
}
