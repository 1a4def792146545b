//! Maps `Box<dyn Error>` from trait boundaries to typed `CraneError`.
//!
//! The transport traits in `crane_traits` use `Box<dyn Error + Send + Sync>`;
//! this module converts those to our typed error enum, with an optional
//! feature-gated path for `crane_hardware::HwError` downcasting.

use crate::error::CraneError;

/// Map a trait-boundary error to a typed `CraneError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CraneError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<crane_hardware::error::HwError>() {
            return match hw {
                crane_hardware::error::HwError::Timeout => CraneError::Timeout,
                crane_hardware::error::HwError::Closed => CraneError::Disconnected,
                other => CraneError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CraneError::Timeout
    } else {
        CraneError::Transport(s)
    }
}
