//! Subsystem lifecycle supervisor.
//!
//! Owns every subsystem the runtime constructs inside the host process
//! and drives the two sequences that matter: the ordered, dependency-
//! aware startup and the ordered, failure-tolerant teardown. Both are
//! expressed as explicit step tables so the per-step failure policy is
//! data, not scattered control flow.
//!
//! Thread roles: `start` and `dispose` run on whichever thread the
//! injecting caller uses; `unload` may be called from any thread and
//! only signals; a host-owned thread blocks in `wait_for_unload` and
//! performs `dispose`; the original injector blocks in
//! `wait_for_unload_finish` on a signal it owns and sets itself after
//! teardown. No step is cancellable once begun, and no step enforces a
//! timeout — a hang in a subsystem constructor or the first-frame font
//! wait stalls the starting thread.

mod diag;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::config::{Configuration, StartInfo, StartOptions};
use crate::error::{Error, Result};
use crate::logctl::LogLevelControl;
use crate::process::ProcessContext;
use crate::scan::PatternScanner;
use crate::signal::Signal;
use crate::subsystem::{
    BuiltinCommands, ChatFeatureSet, ClientState, CommandRouter, DataAssets, Framework, HookGuard,
    LanguageSource, LocalizationService, NetworkHandlers, NetworkOptimizer, OverlayRuntime,
    OverlayShell, PluginCatalog, PluginRuntime, SeasonalBanner, StringDecoder,
};

/// Where the supervisor is in its one-shot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LifecycleState {
    NotStarted,
    Starting,
    Ready,
    FailedDuringStart,
    Unloading,
    Disposed,
}

/// What a startup step failure does to the rest of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Abort startup and force a full unload.
    Fatal,
    /// Log and continue; the feature stays unavailable for the session.
    Soft,
}

struct StartStep {
    name: &'static str,
    policy: StepPolicy,
    run: fn(&mut Supervisor, &StartOptions) -> Result<()>,
}

/// Startup order. Each step's output is a precondition for later steps;
/// the sequence is the dependency DAG collapsed to one linear schedule.
const START_SEQUENCE: &[StartStep] = &[
    StartStep {
        name: "config",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_config,
    },
    StartStep {
        name: "scanner",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_scanner,
    },
    StartStep {
        name: "hook-guard",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_hook_guard,
    },
    StartStep {
        name: "game-subsystems",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_game_subsystems,
    },
    StartStep {
        name: "localization",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_localization,
    },
    StartStep {
        name: "plugin-catalog",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_plugin_catalog,
    },
    StartStep {
        name: "ui-shell",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_ui_shell,
    },
    StartStep {
        name: "overlay",
        policy: StepPolicy::Soft,
        run: Supervisor::step_overlay,
    },
    StartStep {
        name: "seasonal",
        policy: StepPolicy::Soft,
        run: Supervisor::step_seasonal,
    },
    StartStep {
        name: "data-assets",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_data_assets,
    },
    StartStep {
        name: "string-decoder",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_string_decoder,
    },
    StartStep {
        name: "commands",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_commands,
    },
    StartStep {
        name: "chat-features",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_chat_features,
    },
    StartStep {
        name: "plugins",
        policy: StepPolicy::Soft,
        run: Supervisor::step_plugins,
    },
    StartStep {
        name: "enable-hooks",
        policy: StepPolicy::Fatal,
        run: Supervisor::step_enable_hooks,
    },
];

/// Teardown order. The overlay entry must stay ahead of the plugins
/// entry: the frame pump is joined before extension callbacks are
/// dropped, so no draw can fire into a half-unloaded extension.
const DISPOSE_SEQUENCE: &[(&str, fn(&mut Supervisor) -> Result<()>)] = &[
    ("seasonal", Supervisor::teardown_seasonal),
    ("overlay", Supervisor::teardown_overlay),
    ("plugins", Supervisor::teardown_plugins),
    ("game-subsystems", Supervisor::teardown_game_subsystems),
    ("unload-signal", Supervisor::teardown_unload_signal),
    ("network-optimizer", Supervisor::teardown_netopt),
    ("scanner", Supervisor::teardown_scanner),
    ("data-assets", Supervisor::teardown_assets),
    ("hook-guard", Supervisor::teardown_hook_guard),
];

pub struct Supervisor {
    start_info: StartInfo,
    log_control: Arc<LogLevelControl>,
    unload_requested: Arc<Signal>,
    unload_finished: Arc<Signal>,
    is_ready: AtomicBool,
    state: LifecycleState,
    injected_context: Option<ProcessContext>,

    configuration: Option<Configuration>,
    scanner: Option<PatternScanner>,
    hook_guard: Option<HookGuard>,
    framework: Option<Framework>,
    netopt: Option<NetworkOptimizer>,
    net_handlers: Option<NetworkHandlers>,
    client_state: Option<ClientState>,
    localization: Option<Arc<LocalizationService>>,
    catalog: Option<PluginCatalog>,
    shell: Option<Arc<OverlayShell>>,
    overlay: Option<OverlayRuntime>,
    seasonal: Option<SeasonalBanner>,
    assets: Option<Arc<DataAssets>>,
    strings: Option<Arc<StringDecoder>>,
    commands: Option<Arc<CommandRouter>>,
    builtins: Option<BuiltinCommands>,
    chat: Option<ChatFeatureSet>,
    plugins: Option<PluginRuntime>,
}

impl Supervisor {
    /// Create the supervisor.
    ///
    /// `unload_finished` is owned by the caller: the supervisor never
    /// sets it, only hands out waits on it. The caller sets it after
    /// `dispose` returns.
    pub fn new(
        start_info: StartInfo,
        log_control: LogLevelControl,
        unload_finished: Arc<Signal>,
    ) -> Self {
        Self {
            start_info,
            log_control: Arc::new(log_control),
            unload_requested: Arc::new(Signal::new()),
            unload_finished,
            is_ready: AtomicBool::new(false),
            state: LifecycleState::NotStarted,
            injected_context: None,
            configuration: None,
            scanner: None,
            hook_guard: None,
            framework: None,
            netopt: None,
            net_handlers: None,
            client_state: None,
            localization: None,
            catalog: None,
            shell: None,
            overlay: None,
            seasonal: None,
            assets: None,
            strings: None,
            commands: None,
            builtins: None,
            chat: None,
            plugins: None,
        }
    }

    /// Supply an already-captured module snapshot instead of snapshotting
    /// the current process at startup.
    pub fn with_module_image(mut self, context: ProcessContext) -> Self {
        self.injected_context = Some(context);
        self
    }

    // ---- lifecycle surface -------------------------------------------------

    /// Run the ordered startup sequence.
    ///
    /// Runs to completion on the calling thread. Never propagates a
    /// subsystem error: a fatal step failure logs, forces a full unload
    /// and returns with `is_ready()` still false.
    pub fn start(&mut self, options: StartOptions) {
        if self.state != LifecycleState::NotStarted {
            warn!("start() called in state {}, ignoring", self.state);
            return;
        }

        info!(
            "Runtime starting (host version {}, overlay={}, plugins={})",
            self.start_info.host_version, options.load_overlay, options.load_plugins
        );
        self.state = LifecycleState::Starting;

        match self.run_start_sequence(&options) {
            Ok(()) => {
                self.is_ready.store(true, Ordering::SeqCst);
                self.state = LifecycleState::Ready;
                diag::emit_snapshot(self, self.overlay.is_some());
                info!("Runtime ready");
            }
            Err(e) => {
                error!("Startup failed: {}. Forcing unload.", e);
                self.state = LifecycleState::FailedDuringStart;
                self.unload();
            }
        }
    }

    fn run_start_sequence(&mut self, options: &StartOptions) -> Result<()> {
        for step in START_SEQUENCE {
            debug!("Startup step '{}'", step.name);
            match (step.run)(self, options) {
                Ok(()) => {}
                Err(e) if step.policy == StepPolicy::Soft => {
                    warn!("Step '{}' failed, continuing without it: {}", step.name, e);
                }
                Err(e) => {
                    error!("Step '{}' failed: {}", step.name, e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Request unload. Non-blocking, idempotent, callable from any thread.
    pub fn unload(&self) {
        if self.unload_requested.is_set() {
            debug!("Unload already requested");
            return;
        }
        info!("Unload requested");
        self.unload_requested.set();
    }

    /// Block until an unload has been requested.
    pub fn wait_for_unload(&self) {
        self.unload_requested.wait();
    }

    /// Block until the caller reports teardown finished.
    pub fn wait_for_unload_finish(&self) {
        self.unload_finished.wait();
    }

    /// Run the ordered teardown sequence.
    ///
    /// Called exactly once by the host after `wait_for_unload` returns.
    /// Every step is individually guarded: one failing step is logged
    /// and the remaining steps still run.
    pub fn dispose(&mut self) {
        if self.state == LifecycleState::Disposed {
            warn!("dispose() called twice, ignoring");
            return;
        }

        info!("Runtime teardown starting");
        self.state = LifecycleState::Unloading;

        for (name, run) in DISPOSE_SEQUENCE {
            debug!("Teardown step '{}'", name);
            if let Err(e) = run(self) {
                warn!("Teardown step '{}' failed, continuing: {}", name, e);
            }
        }

        self.is_ready.store(false, Ordering::SeqCst);
        self.state = LifecycleState::Disposed;
        info!("Runtime disposed");
    }

    // ---- startup steps -----------------------------------------------------

    fn step_config(&mut self, _options: &StartOptions) -> Result<()> {
        self.configuration = Some(Configuration::load(&self.start_info.config_path)?);
        Ok(())
    }

    fn step_scanner(&mut self, _options: &StartOptions) -> Result<()> {
        let context = match self.injected_context.take() {
            Some(context) => context,
            None => ProcessContext::current()?,
        };
        self.scanner = Some(PatternScanner::new(context));
        Ok(())
    }

    fn step_hook_guard(&mut self, _options: &StartOptions) -> Result<()> {
        self.hook_guard = Some(HookGuard::new(self.scanner()?)?);
        Ok(())
    }

    fn step_game_subsystems(&mut self, _options: &StartOptions) -> Result<()> {
        self.framework = Some(Framework::new(self.scanner()?)?);
        self.netopt = Some(NetworkOptimizer::new());
        self.net_handlers = Some(NetworkHandlers::new(self.scanner()?)?);
        self.client_state = Some(ClientState::new(self.scanner()?)?);
        Ok(())
    }

    fn step_localization(&mut self, _options: &StartOptions) -> Result<()> {
        let override_ = self
            .configuration
            .as_ref()
            .and_then(|c| c.language_override.as_deref());
        self.localization = Some(Arc::new(LocalizationService::new(
            &self.start_info.asset_dir,
            override_,
        )));
        Ok(())
    }

    fn step_plugin_catalog(&mut self, _options: &StartOptions) -> Result<()> {
        self.catalog = Some(PluginCatalog::new(
            self.start_info.plugin_dir.clone(),
            self.start_info.default_plugin_dir.clone(),
            self.start_info.host_version.clone(),
        ));
        Ok(())
    }

    fn step_ui_shell(&mut self, _options: &StartOptions) -> Result<()> {
        self.shell = Some(Arc::new(OverlayShell::new()));
        Ok(())
    }

    fn step_overlay(&mut self, options: &StartOptions) -> Result<()> {
        if !options.load_overlay {
            info!("Overlay suppressed by start options");
            return Ok(());
        }

        let mut overlay = OverlayRuntime::new(self.scanner()?)?;
        let shell = self
            .shell
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("ui-shell"))?;
        overlay.on_draw(OverlayShell::draw_callback(shell));
        overlay.enable();
        overlay.wait_for_fonts();
        self.overlay = Some(overlay);
        Ok(())
    }

    fn step_seasonal(&mut self, _options: &StartOptions) -> Result<()> {
        self.seasonal = Some(SeasonalBanner::attach(
            self.overlay.as_ref(),
            Local::now().date_naive(),
        ));
        Ok(())
    }

    fn step_data_assets(&mut self, _options: &StartOptions) -> Result<()> {
        let language = self
            .localization
            .as_ref()
            .map(|l| l.language().to_string())
            .unwrap_or_else(|| self.start_info.language.clone());
        self.assets = Some(Arc::new(DataAssets::new(
            &self.start_info.asset_dir,
            &language,
        )?));
        Ok(())
    }

    fn step_string_decoder(&mut self, _options: &StartOptions) -> Result<()> {
        let assets = self
            .assets
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("data-assets"))?;
        self.strings = Some(Arc::new(StringDecoder::new(Arc::clone(assets))));
        Ok(())
    }

    fn step_commands(&mut self, _options: &StartOptions) -> Result<()> {
        let localization = self
            .localization
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("localization"))?;

        let router = Arc::new(CommandRouter::new());
        self.builtins = Some(BuiltinCommands::register(
            &router,
            Arc::clone(&self.unload_requested),
            Arc::clone(&self.log_control),
            Arc::clone(localization),
        )?);
        self.commands = Some(router);
        Ok(())
    }

    fn step_chat_features(&mut self, _options: &StartOptions) -> Result<()> {
        let router = self
            .commands
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("commands"))?;
        let localization = self
            .localization
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("localization"))?;
        let strings = self
            .strings
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("string-decoder"))?;

        self.chat = Some(ChatFeatureSet::new(
            Arc::clone(router),
            Arc::clone(localization),
            Arc::clone(strings),
        )?);
        Ok(())
    }

    fn step_plugins(&mut self, options: &StartOptions) -> Result<()> {
        if !options.load_plugins {
            info!("Extension loading suppressed by start options");
            return Ok(());
        }

        let catalog = self
            .catalog
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("plugin-catalog"))?;
        let removed = catalog.cleanup_stale()?;
        if removed > 0 {
            info!("Removed {} stale extension(s)", removed);
        }
        self.plugins = Some(PluginRuntime::load_all(catalog));
        Ok(())
    }

    fn step_enable_hooks(&mut self, _options: &StartOptions) -> Result<()> {
        self.framework
            .as_mut()
            .ok_or(Error::SubsystemUnavailable("framework"))?
            .enable();
        self.client_state
            .as_mut()
            .ok_or(Error::SubsystemUnavailable("client-state"))?
            .enable();
        Ok(())
    }

    fn scanner(&self) -> Result<&PatternScanner> {
        self.scanner
            .as_ref()
            .ok_or(Error::SubsystemUnavailable("scanner"))
    }

    // ---- teardown steps ----------------------------------------------------

    fn teardown_seasonal(&mut self) -> Result<()> {
        if let Some(mut seasonal) = self.seasonal.take() {
            seasonal.dispose(self.overlay.as_ref());
        }
        Ok(())
    }

    fn teardown_overlay(&mut self) -> Result<()> {
        if let Some(mut overlay) = self.overlay.take() {
            overlay.dispose();
        }
        self.shell = None;
        Ok(())
    }

    fn teardown_plugins(&mut self) -> Result<()> {
        if let Some(mut plugins) = self.plugins.take() {
            plugins.unload_all();
        }
        self.catalog = None;
        Ok(())
    }

    fn teardown_game_subsystems(&mut self) -> Result<()> {
        if let Some(framework) = self.framework.as_mut() {
            framework.dispose();
        }
        self.framework = None;
        if let Some(client_state) = self.client_state.as_mut() {
            client_state.dispose();
        }
        self.client_state = None;
        self.net_handlers = None;
        Ok(())
    }

    /// Drop the in-process writers of the unload-request signal. The
    /// signal itself stays alive for late waiters; only the command
    /// surfaces that could still set it go away here.
    fn teardown_unload_signal(&mut self) -> Result<()> {
        if let Some(mut chat) = self.chat.take() {
            chat.dispose();
        }
        self.builtins = None;
        self.commands = None;
        debug!("Unload-request signal released");
        Ok(())
    }

    fn teardown_netopt(&mut self) -> Result<()> {
        if let Some(netopt) = self.netopt.as_mut() {
            netopt.dispose();
        }
        self.netopt = None;
        Ok(())
    }

    fn teardown_scanner(&mut self) -> Result<()> {
        self.scanner = None;
        Ok(())
    }

    fn teardown_assets(&mut self) -> Result<()> {
        // Decoder first; it reads through the assets.
        self.strings = None;
        self.assets = None;
        self.localization = None;
        Ok(())
    }

    fn teardown_hook_guard(&mut self) -> Result<()> {
        if let Some(guard) = self.hook_guard.as_mut() {
            guard.dispose();
        }
        self.hook_guard = None;
        Ok(())
    }

    // ---- observers ---------------------------------------------------------

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Readable from any thread.
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    pub fn start_info(&self) -> &StartInfo {
        &self.start_info
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.localization.as_ref().map(|l| l.language())
    }

    pub fn language_source(&self) -> Option<LanguageSource> {
        self.localization.as_ref().map(|l| l.source())
    }

    pub fn overlay_loaded(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.as_ref().map(PluginRuntime::count).unwrap_or(0)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins
            .as_ref()
            .map(|p| p.names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn hooks_enabled(&self) -> bool {
        self.framework.as_ref().is_some_and(Framework::is_enabled)
            && self
                .client_state
                .as_ref()
                .is_some_and(ClientState::is_enabled)
    }

    pub fn command_router(&self) -> Option<Arc<CommandRouter>> {
        self.commands.as_ref().map(Arc::clone)
    }

    /// Handle to the unload-request signal, for hosts that wire it to
    /// their own machinery (e.g. a ctrl-c handler).
    pub fn unload_signal(&self) -> Arc<Signal> {
        Arc::clone(&self.unload_requested)
    }

    /// Startup step names with their failure policies, in order.
    pub fn startup_order() -> Vec<(&'static str, StepPolicy)> {
        START_SEQUENCE.iter().map(|s| (s.name, s.policy)).collect()
    }

    /// Teardown step names, in order.
    pub fn teardown_order() -> Vec<&'static str> {
        DISPOSE_SEQUENCE.iter().map(|(name, _)| *name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[&str], name: &str) -> usize {
        order
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("step '{name}' missing"))
    }

    #[test]
    fn test_overlay_disposed_strictly_before_plugins() {
        let order = Supervisor::teardown_order();
        assert!(position(&order, "overlay") < position(&order, "plugins"));
    }

    #[test]
    fn test_seasonal_disposed_before_overlay() {
        let order = Supervisor::teardown_order();
        assert!(position(&order, "seasonal") < position(&order, "overlay"));
    }

    #[test]
    fn test_startup_policy_table() {
        let order = Supervisor::startup_order();
        let policy_of = |name: &str| {
            order
                .iter()
                .find(|(n, _)| *n == name)
                .unwrap_or_else(|| panic!("step '{name}' missing"))
                .1
        };

        assert_eq!(policy_of("overlay"), StepPolicy::Soft);
        assert_eq!(policy_of("seasonal"), StepPolicy::Soft);
        assert_eq!(policy_of("plugins"), StepPolicy::Soft);
        for fatal in [
            "config",
            "scanner",
            "hook-guard",
            "game-subsystems",
            "data-assets",
            "commands",
            "enable-hooks",
        ] {
            assert_eq!(policy_of(fatal), StepPolicy::Fatal, "{fatal}");
        }
    }

    #[test]
    fn test_scanner_precedes_its_dependents() {
        let names: Vec<&str> = Supervisor::startup_order()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        let scanner = position(&names, "scanner");
        for dependent in ["hook-guard", "game-subsystems", "overlay"] {
            assert!(scanner < position(&names, dependent), "{dependent}");
        }
        assert!(position(&names, "data-assets") < position(&names, "string-decoder"));
        assert!(position(&names, "plugin-catalog") < position(&names, "plugins"));
    }
}
