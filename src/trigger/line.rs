//! Boolean-level line abstraction shared by the hardware backends.

use thiserror::Error;

/// Errors raised by a trigger line backend.
#[derive(Debug, Clone, Error)]
pub enum LineError {
    /// The backend could not be opened (no chip, no permission, no display…).
    #[error("trigger line unavailable: {0}")]
    Unavailable(String),

    /// A single read failed on an opened line.
    #[error("trigger line read failed: {0}")]
    Read(String),
}

/// A digital input that reports whether the trigger is currently asserted.
///
/// Implementations release their underlying resource on drop.
pub trait LevelReader: Send {
    /// `true` while the button (or key) is held down.
    fn is_asserted(&mut self) -> Result<bool, LineError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Sample `line` once; a failed read is logged and counts as "released".
pub(crate) fn sample(line: &mut dyn LevelReader) -> bool {
    match line.is_asserted() {
        Ok(level) => level,
        Err(e) => {
            log::debug!("trigger: {} read failed: {e}", line.backend());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenLine;

    impl LevelReader for BrokenLine {
        fn is_asserted(&mut self) -> Result<bool, LineError> {
            Err(LineError::Read("EIO".into()))
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn read_error_counts_as_released() {
        assert!(!sample(&mut BrokenLine));
    }

    #[test]
    fn level_reader_is_object_safe() {
        let _: Box<dyn LevelReader> = Box::new(BrokenLine);
    }
}

// ---------------------------------------------------------------------------
// ScriptedLine  (test-only)
// ---------------------------------------------------------------------------

/// A line whose level follows a fixed timeline measured from construction.
///
/// Each `(until, level)` step holds `level` until `until` has elapsed; past
/// the last step the line reads released.
#[cfg(test)]
pub(crate) struct ScriptedLine {
    start: std::time::Instant,
    steps: Vec<(std::time::Duration, bool)>,
}

#[cfg(test)]
impl ScriptedLine {
    pub(crate) fn new(steps: &[(u64, bool)]) -> Self {
        Self {
            start: std::time::Instant::now(),
            steps: steps
                .iter()
                .map(|&(ms, level)| (std::time::Duration::from_millis(ms), level))
                .collect(),
        }
    }

    /// Held down forever.
    pub(crate) fn held() -> Self {
        Self::new(&[(3_600_000, true)])
    }
}

#[cfg(test)]
impl LevelReader for ScriptedLine {
    fn is_asserted(&mut self) -> Result<bool, LineError> {
        let elapsed = self.start.elapsed();
        Ok(self
            .steps
            .iter()
            .find(|(until, _)| elapsed < *until)
            .map(|&(_, level)| level)
            .unwrap_or(false))
    }

    fn backend(&self) -> &'static str {
        "scripted"
    }
}
