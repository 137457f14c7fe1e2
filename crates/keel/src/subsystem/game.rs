//! Host-facing game subsystems.
//!
//! Framework wraps the host main-loop tick, ClientState the session
//! state block, NetworkHandlers the inbound packet dispatch. Each
//! resolves its anchor address at construction and exposes hook
//! enable/disable; hooks stay disabled until the supervisor flips them
//! on at the end of startup, after everything they call into exists.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::scan::{PatternScanner, builtin};

/// Host main-loop integration.
pub struct Framework {
    tick_site: u64,
    hooked: bool,
}

impl Framework {
    pub fn new(scanner: &PatternScanner) -> Result<Self> {
        let tick_site = scanner.find(builtin::FRAMEWORK_TICK)?;
        debug!("Framework tick at {:#x}", tick_site);
        Ok(Self {
            tick_site,
            hooked: false,
        })
    }

    pub fn enable(&mut self) {
        if self.hooked {
            warn!("Framework hook already enabled");
            return;
        }
        info!("Hooking framework tick at {:#x}", self.tick_site);
        self.hooked = true;
    }

    pub fn disable(&mut self) {
        if !self.hooked {
            return;
        }
        info!("Unhooking framework tick");
        self.hooked = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.hooked
    }

    pub fn tick_site(&self) -> u64 {
        self.tick_site
    }

    pub fn dispose(&mut self) {
        self.disable();
    }
}

/// Client session state access.
pub struct ClientState {
    state_block: u64,
    hooked: bool,
}

impl ClientState {
    pub fn new(scanner: &PatternScanner) -> Result<Self> {
        let state_block = scanner.find(builtin::CLIENT_STATE)?;
        debug!("Client state block at {:#x}", state_block);
        Ok(Self {
            state_block,
            hooked: false,
        })
    }

    pub fn enable(&mut self) {
        if self.hooked {
            warn!("Client state hook already enabled");
            return;
        }
        info!("Hooking client state at {:#x}", self.state_block);
        self.hooked = true;
    }

    pub fn disable(&mut self) {
        if !self.hooked {
            return;
        }
        info!("Unhooking client state");
        self.hooked = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.hooked
    }

    pub fn state_block(&self) -> u64 {
        self.state_block
    }

    pub fn dispose(&mut self) {
        self.disable();
    }
}

/// Inbound packet dispatch interception.
pub struct NetworkHandlers {
    dispatch_site: u64,
}

impl NetworkHandlers {
    pub fn new(scanner: &PatternScanner) -> Result<Self> {
        let dispatch_site = scanner.find(builtin::NETWORK_DISPATCH)?;
        debug!("Network dispatch at {:#x}", dispatch_site);
        Ok(Self { dispatch_site })
    }

    pub fn dispatch_site(&self) -> u64 {
        self.dispatch_site
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessContext;
    use crate::scan::{materialize_pattern, parse_pattern};

    fn scanner_with(patterns: &[&str]) -> PatternScanner {
        let mut image = vec![0xCC; 8];
        for pattern in patterns {
            let bytes = parse_pattern(pattern).unwrap();
            image.extend(materialize_pattern(&bytes, 0x00));
            image.extend([0xCC; 8]);
        }
        PatternScanner::new(ProcessContext::from_image(0x1000, image))
    }

    #[test]
    fn test_framework_hook_lifecycle() {
        let scanner = scanner_with(&[builtin::FRAMEWORK_TICK]);
        let mut framework = Framework::new(&scanner).unwrap();

        assert!(!framework.is_enabled());
        framework.enable();
        assert!(framework.is_enabled());
        framework.dispose();
        assert!(!framework.is_enabled());
    }

    #[test]
    fn test_client_state_requires_signature() {
        let scanner = scanner_with(&[builtin::FRAMEWORK_TICK]);
        assert!(ClientState::new(&scanner).is_err());

        let scanner = scanner_with(&[builtin::CLIENT_STATE]);
        assert!(ClientState::new(&scanner).is_ok());
    }

    #[test]
    fn test_network_handlers_resolve_dispatch() {
        let scanner = scanner_with(&[builtin::NETWORK_DISPATCH]);
        let handlers = NetworkHandlers::new(&scanner).unwrap();
        assert!(handlers.dispatch_site() >= 0x1000);
    }
}
