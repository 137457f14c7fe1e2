//! Slash-command routing and the built-in command set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::logctl::LogLevelControl;
use crate::signal::Signal;
use crate::subsystem::localization::LocalizationService;

pub type CommandHandler = Arc<dyn Fn(&str) + Send + Sync>;

struct CommandInfo {
    help: String,
    handler: CommandHandler,
}

/// Registry and dispatcher for chat-style `/command args` input.
pub struct CommandRouter {
    commands: Mutex<HashMap<String, CommandInfo>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
        }
    }

    /// Register a command. The name is stored without the leading slash.
    pub fn register<F>(&self, name: &str, help: &str, handler: F) -> Result<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let name = name.trim_start_matches('/').to_ascii_lowercase();
        let mut commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
        if commands.contains_key(&name) {
            return Err(Error::CommandExists(name));
        }
        debug!("Registered command /{}", name);
        commands.insert(
            name,
            CommandInfo {
                help: help.to_string(),
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let name = name.trim_start_matches('/').to_ascii_lowercase();
        let removed = self
            .commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&name)
            .is_some();
        if removed {
            debug!("Unregistered command /{}", name);
        }
        removed
    }

    /// Dispatch one input line. Returns whether a handler ran.
    pub fn dispatch(&self, line: &str) -> bool {
        let line = line.trim();
        let Some(body) = line.strip_prefix('/') else {
            return false;
        };
        let (name, args) = body.split_once(' ').unwrap_or((body, ""));
        let name = name.to_ascii_lowercase();

        // Clone the handler out so it runs without the registry lock; a
        // handler may consult the router itself (e.g. /help).
        let handler = {
            let commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
            match commands.get(&name) {
                Some(info) => Arc::clone(&info.handler),
                None => {
                    debug!("Unknown command: /{}", name);
                    return false;
                }
            }
        };
        handler(args.trim());
        true
    }

    /// Registered command names with their help text, sorted.
    pub fn help_entries(&self) -> Vec<(String, String)> {
        let commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<(String, String)> = commands
            .iter()
            .map(|(name, info)| (name.clone(), info.help.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim_start_matches('/').to_ascii_lowercase();
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&name)
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// The runtime's own command set.
pub struct BuiltinCommands {
    names: Vec<&'static str>,
}

impl BuiltinCommands {
    /// Register the built-in commands on `router`.
    ///
    /// Each command receives only the handle it acts through: the unload
    /// command the unload-request signal, the loglevel command the
    /// subscriber control, the language command the localization service.
    pub fn register(
        router: &Arc<CommandRouter>,
        unload: Arc<Signal>,
        log_control: Arc<LogLevelControl>,
        localization: Arc<LocalizationService>,
    ) -> Result<Self> {
        // Weak, or the router would hold a handler that keeps it alive.
        let help_router = Arc::downgrade(router);
        router.register("help", "List available commands", move |_| {
            let Some(router) = help_router.upgrade() else {
                return;
            };
            for (name, help) in router.help_entries() {
                info!("/{} - {}", name, help);
            }
        })?;

        router.register("version", "Show runtime version", |_| {
            info!("keel {}", env!("CARGO_PKG_VERSION"));
        })?;

        router.register("unload", "Unload the runtime from the host", move |_| {
            info!("Unload requested via command");
            unload.set();
        })?;

        router.register("language", "Show the active language", move |_| {
            info!("Active language: {}", localization.language());
        })?;

        router.register("loglevel", "Set the log level (trace..off)", move |args| {
            if log_control.set_by_name(args) {
                info!("Log level set to {}", args);
            }
        })?;

        Ok(Self {
            names: vec!["help", "version", "unload", "language", "loglevel"],
        })
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_register_and_dispatch() {
        let router = CommandRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        router
            .register("ping", "test", move |args| {
                assert_eq!(args, "pong");
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(router.dispatch("/ping pong"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let router = CommandRouter::new();
        router.register("x", "", |_| {}).unwrap();
        assert!(matches!(
            router.register("/X", "", |_| {}).unwrap_err(),
            Error::CommandExists(_)
        ));
    }

    #[test]
    fn test_unknown_command_is_noop() {
        let router = CommandRouter::new();
        assert!(!router.dispatch("/nothing here"));
        assert!(!router.dispatch("plain text"));
    }

    #[test]
    fn test_unregister() {
        let router = CommandRouter::new();
        router.register("gone", "", |_| {}).unwrap();
        assert!(router.unregister("gone"));
        assert!(!router.unregister("gone"));
        assert!(!router.dispatch("/gone"));
    }

    #[test]
    fn test_help_can_reenter_the_router() {
        let router = Arc::new(CommandRouter::new());
        let unload = Arc::new(Signal::new());
        let dir = tempfile::tempdir().unwrap();
        let loc = Arc::new(LocalizationService::new(dir.path(), Some("en")));
        let _builtins = BuiltinCommands::register(
            &router,
            unload,
            Arc::new(LogLevelControl::noop()),
            loc,
        )
        .unwrap();

        // /help walks the registry from inside a handler.
        assert!(router.dispatch("/help"));
    }

    #[test]
    fn test_builtins_register_and_unload_signals() {
        let router = Arc::new(CommandRouter::new());
        let unload = Arc::new(Signal::new());
        let dir = tempfile::tempdir().unwrap();
        let loc = Arc::new(LocalizationService::new(dir.path(), Some("en")));

        let builtins = BuiltinCommands::register(
            &router,
            Arc::clone(&unload),
            Arc::new(LogLevelControl::noop()),
            loc,
        )
        .unwrap();

        for name in builtins.names() {
            assert!(router.contains(name), "missing builtin /{name}");
        }
        assert!(!unload.is_set());
        assert!(router.dispatch("/unload"));
        assert!(unload.is_set());
    }
}
