//! # keel
//!
//! Lifecycle supervisor for a runtime injected into a long-running host
//! process. The runtime discovers host functions by signature, hosts
//! third-party extensions and an overlay UI, and must come up and tear
//! down in strict dependency order while the host keeps running around
//! it.
//!
//! This crate provides:
//! - The ordered, failure-policy-driven startup and teardown supervisor
//! - One-shot cross-thread unload signaling
//! - Signature scanning over the host module
//! - The subsystem contracts the supervisor composes (overlay, data
//!   assets, commands, extensions, ...)

pub mod config;
pub mod error;
pub mod filter;
pub mod logctl;
pub mod process;
pub mod scan;
pub mod signal;
pub mod subsystem;
pub mod supervisor;

pub use config::{Configuration, StartInfo, StartOptions};
pub use error::{Error, Result};
pub use filter::{PreviousFilter, replace_exception_filter};
pub use logctl::LogLevelControl;
pub use process::ProcessContext;
pub use scan::{PatternScanner, builtin, format_pattern, materialize_pattern, parse_pattern};
pub use signal::Signal;
pub use subsystem::{
    BuiltinCommands, ChatFeatureSet, ClientState, CommandRouter, DataAssets, Framework, HookGuard,
    LanguageSource, LocalizationService, NetworkHandlers, NetworkOptimizer, OverlayRuntime,
    OverlayShell, PluginCatalog, PluginManifest, PluginRuntime, SeasonalBanner, StringDecoder,
};
pub use supervisor::{LifecycleState, StepPolicy, Supervisor};
