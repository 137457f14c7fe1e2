//! Debugger-check countermeasure.
//!
//! The host periodically probes for an attached debugger and misbehaves
//! when one is present. The guard resolves the probe site and, while
//! enabled, keeps it neutralized so development tooling can attach.

use tracing::{debug, info};

use crate::error::Result;
use crate::scan::{PatternScanner, builtin};

pub struct HookGuard {
    check_site: u64,
    enabled: bool,
}

impl HookGuard {
    /// Resolve the debugger-check site. Auto-enables in debug builds.
    pub fn new(scanner: &PatternScanner) -> Result<Self> {
        let check_site = scanner.find(builtin::DEBUG_CHECK)?;
        debug!("Debugger check at {:#x}", check_site);

        let mut guard = Self {
            check_site,
            enabled: false,
        };
        if cfg!(debug_assertions) {
            guard.enable();
        }
        Ok(guard)
    }

    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        info!("Neutralizing debugger check at {:#x}", self.check_site);
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        info!("Restoring debugger check at {:#x}", self.check_site);
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn check_site(&self) -> u64 {
        self.check_site
    }

    /// Restore the original check before the runtime goes away.
    pub fn dispose(&mut self) {
        self.disable();
    }
}
