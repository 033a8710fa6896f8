//! Thread priority levels

use core::fmt;
use crate::{PkError, PkResult};

/// Type-safe thread priority (higher is more urgent)
///
/// Unlike active object priorities, zero is a valid level here: it is the
/// natural priority of background threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority level
    pub const LOWEST: Priority = Priority(0);

    /// Highest priority supported by the kernel
    pub const HIGHEST: Priority = Priority(250);

    /// Create a new priority level
    pub fn new(priority: u8) -> PkResult<Self> {
        if priority > Self::HIGHEST.0 {
            Err(PkError::InvalidPriority)
        } else {
            Ok(Priority(priority))
        }
    }

    /// Create priority without validation (const fn)
    ///
    /// Out-of-range values are rejected later, when the thread is registered.
    pub const fn new_unchecked(priority: u8) -> Self {
        Priority(priority)
    }

    /// Get the raw priority value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Check if this priority is within the supported range
    pub const fn is_valid(self) -> bool {
        self.0 <= Self::HIGHEST.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Priority {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Priority({})", self.0);
    }
}

/// Macro to create compile-time priority constants
#[macro_export]
macro_rules! priority {
    ($value:literal) => {
        $crate::Priority::new_unchecked($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_range() {
        assert!(Priority::new(0).is_ok());
        assert!(Priority::new(250).is_ok());
        assert_eq!(Priority::new(251), Err(PkError::InvalidPriority));
    }

    #[test]
    fn test_unchecked_priority_validity() {
        assert!(priority!(7).is_valid());
        assert!(!Priority::new_unchecked(255).is_valid());
    }
}
