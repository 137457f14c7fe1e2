//! Log-level control handle.
//!
//! The subscriber lives with the host-side driver, not the runtime, so
//! the runtime receives a callback that reconfigures the active filter.

use tracing::level_filters::LevelFilter;
use tracing::warn;

type ApplyFn = dyn Fn(LevelFilter) -> bool + Send + Sync;

/// Applies log-level changes to whatever subscriber the caller installed.
pub struct LogLevelControl {
    apply: Box<ApplyFn>,
}

impl LogLevelControl {
    pub fn new<F>(apply: F) -> Self
    where
        F: Fn(LevelFilter) -> bool + Send + Sync + 'static,
    {
        Self {
            apply: Box::new(apply),
        }
    }

    /// A control that accepts every change without applying anything.
    pub fn noop() -> Self {
        Self::new(|_| true)
    }

    /// Apply a new maximum level. Returns whether the change took effect.
    pub fn set(&self, level: LevelFilter) -> bool {
        (self.apply)(level)
    }

    /// Parse a level name ("trace".."off") and apply it.
    pub fn set_by_name(&self, name: &str) -> bool {
        match name.parse::<LevelFilter>() {
            Ok(level) => self.set(level),
            Err(_) => {
                warn!("Unknown log level: {}", name);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_set_by_name_applies_parsed_level() {
        let seen = std::sync::Arc::new(Mutex::new(None));
        let seen_clone = std::sync::Arc::clone(&seen);
        let control = LogLevelControl::new(move |level| {
            *seen_clone.lock().unwrap() = Some(level);
            true
        });

        assert!(control.set_by_name("debug"));
        assert_eq!(*seen.lock().unwrap(), Some(LevelFilter::DEBUG));
        assert!(!control.set_by_name("extreme"));
    }
}
