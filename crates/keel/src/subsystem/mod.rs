//! Subsystems composed by the supervisor.
//!
//! Each is independently constructible with a fallible constructor, an
//! optional enable/disable pair, and a dispose path. Construction takes
//! only the specific handles a subsystem needs; none of them hold a
//! reference back to the supervisor.

pub mod assets;
pub mod chat;
pub mod commands;
pub mod game;
pub mod hook_guard;
pub mod localization;
pub mod netopt;
pub mod overlay;
pub mod plugins;
pub mod seasonal;
pub mod strings;

pub use assets::DataAssets;
pub use chat::ChatFeatureSet;
pub use commands::{BuiltinCommands, CommandRouter};
pub use game::{ClientState, Framework, NetworkHandlers};
pub use hook_guard::HookGuard;
pub use localization::{LanguageSource, LocalizationService};
pub use netopt::NetworkOptimizer;
pub use overlay::{OverlayRuntime, OverlayShell};
pub use plugins::{PluginCatalog, PluginManifest, PluginRuntime};
pub use seasonal::SeasonalBanner;
pub use strings::StringDecoder;
