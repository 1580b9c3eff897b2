//! Observable label storage events
//!
//! Events are explicit and typed.

use std::fmt;

use super::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Read path
    /// An index block position passed every structural check
    IndexAccepted,
    /// An index block position failed a structural check
    IndexRejected,
    /// The current index block was chosen
    IndexSelected,
    /// No index block decoded at any label size (FATAL at this layer)
    IndexInvalid,
    /// Label size guessed from raw headers for display
    LabelSizeGuessed,

    // Mutation
    /// A mutation was refused by a precondition
    MutationRefused,
    InitBegin,
    /// One index block of a reinitialization reached the device
    InitIndexWritten,
    InitComplete,
    InitFailed,
    ZeroComplete,
    WriteComplete,

    // Transfer
    /// A chunked transfer stopped early
    TransferAborted,

    // Kernel view
    KernelViewReloaded,
    KernelViewRefreshFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::IndexAccepted => "INDEX_ACCEPTED",
            Event::IndexRejected => "INDEX_REJECTED",
            Event::IndexSelected => "INDEX_SELECTED",
            Event::IndexInvalid => "INDEX_INVALID",
            Event::LabelSizeGuessed => "LABEL_SIZE_GUESSED",
            Event::MutationRefused => "MUTATION_REFUSED",
            Event::InitBegin => "INIT_BEGIN",
            Event::InitIndexWritten => "INIT_INDEX_WRITTEN",
            Event::InitComplete => "INIT_COMPLETE",
            Event::InitFailed => "INIT_FAILED",
            Event::ZeroComplete => "ZERO_COMPLETE",
            Event::WriteComplete => "WRITE_COMPLETE",
            Event::TransferAborted => "TRANSFER_ABORTED",
            Event::KernelViewReloaded => "KERNEL_VIEW_RELOADED",
            Event::KernelViewRefreshFailed => "KERNEL_VIEW_REFRESH_FAILED",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::IndexAccepted | Event::IndexRejected => Severity::Trace,
            Event::IndexInvalid => Severity::Fatal,
            Event::InitFailed | Event::TransferAborted | Event::KernelViewRefreshFailed => {
                Severity::Error
            }
            Event::MutationRefused | Event::LabelSizeGuessed => Severity::Warn,
            _ => Severity::Info,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Event; 16] = [
        Event::ConfigLoaded,
        Event::IndexAccepted,
        Event::IndexRejected,
        Event::IndexSelected,
        Event::IndexInvalid,
        Event::LabelSizeGuessed,
        Event::MutationRefused,
        Event::InitBegin,
        Event::InitIndexWritten,
        Event::InitComplete,
        Event::InitFailed,
        Event::ZeroComplete,
        Event::WriteComplete,
        Event::TransferAborted,
        Event::KernelViewReloaded,
        Event::KernelViewRefreshFailed,
    ];

    #[test]
    fn test_event_names_unique_and_upper_snake() {
        let mut seen = std::collections::HashSet::new();
        for event in ALL {
            let s = event.as_str();
            assert!(seen.insert(s), "duplicate event name {}", s);
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_invalid_index_is_fatal() {
        for event in ALL {
            assert_eq!(event.is_fatal(), event == Event::IndexInvalid);
        }
    }
}
