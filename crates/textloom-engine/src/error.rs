use thiserror::Error;

/// Failures surfaced by the command router.
///
/// The display strings are a UI contract: toolbars gate undo/redo buttons on
/// the exact "Nothing to undo"/"Nothing to redo" messages, and the cross-block
/// rejection must contain "Cross-block". Not-found targets are deliberately
/// absent here — those are logged no-ops inside the engine, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("No selection")]
    NoSelection,

    #[error("Cross-block formatting is not supported")]
    CrossBlockFormat,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Invalid anchor")]
    InvalidAnchor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_contract_strings() {
        assert_eq!(CommandError::NoSelection.to_string(), "No selection");
        assert_eq!(CommandError::NothingToUndo.to_string(), "Nothing to undo");
        assert_eq!(CommandError::NothingToRedo.to_string(), "Nothing to redo");
        assert!(CommandError::CrossBlockFormat.to_string().contains("Cross-block"));
    }
}
