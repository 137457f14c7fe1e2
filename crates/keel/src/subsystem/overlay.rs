//! Overlay rendering runtime.
//!
//! Hooks the host's present call site and pumps draw callbacks on a
//! dedicated frame thread. Subscribers (the runtime's own UI shell,
//! extensions, the seasonal banner) are invoked once per frame while the
//! runtime is enabled. `dispose` stops and joins the frame thread before
//! returning, so after it returns no subscriber callback will ever fire
//! again — teardown relies on that to unload extensions safely.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::scan::{PatternScanner, builtin};
use crate::signal::Signal;

pub type DrawCallback = Box<dyn FnMut() + Send>;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct Subscriber {
    id: u64,
    callback: DrawCallback,
}

/// The runtime's own top-level UI window set.
///
/// Draws whatever windows are open each frame; here it only tracks frame
/// delivery, which is what startup and teardown care about.
pub struct OverlayShell {
    draws: AtomicU64,
    visible: AtomicBool,
}

impl OverlayShell {
    pub fn new() -> Self {
        Self {
            draws: AtomicU64::new(0),
            visible: AtomicBool::new(true),
        }
    }

    pub fn draw(&self) {
        if self.visible.load(Ordering::Relaxed) {
            self.draws.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn draw_count(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }

    /// A draw callback delivering frames to this shell.
    pub fn draw_callback(shell: &Arc<Self>) -> DrawCallback {
        let shell = Arc::clone(shell);
        Box::new(move || shell.draw())
    }
}

impl Default for OverlayShell {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OverlayRuntime {
    present_site: u64,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    next_id: AtomicU64,
    fonts_ready: Arc<Signal>,
    stop: Arc<Signal>,
    pump: Option<JoinHandle<()>>,
}

impl OverlayRuntime {
    /// Resolve the present call site. Does not start drawing yet.
    pub fn new(scanner: &PatternScanner) -> Result<Self> {
        let present_site = scanner.find(builtin::OVERLAY_PRESENT)?;
        debug!("Present call site at {:#x}", present_site);

        Ok(Self {
            present_site,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            fonts_ready: Arc::new(Signal::new()),
            stop: Arc::new(Signal::new()),
            pump: None,
        })
    }

    pub fn present_site(&self) -> u64 {
        self.present_site
    }

    /// Subscribe to the per-frame draw event.
    ///
    /// Callbacks run on the frame thread and must not subscribe or
    /// unsubscribe re-entrantly.
    pub fn on_draw(&self, callback: DrawCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber { id, callback });
        id
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Start the frame pump. Font resources become ready after the first
    /// delivered frame.
    pub fn enable(&mut self) {
        if self.pump.is_some() {
            return;
        }

        info!("Overlay enabled at present site {:#x}", self.present_site);
        let subscribers = Arc::clone(&self.subscribers);
        let fonts_ready = Arc::clone(&self.fonts_ready);
        let stop = Arc::clone(&self.stop);

        self.pump = Some(std::thread::spawn(move || {
            loop {
                {
                    let mut subs = subscribers.lock().unwrap_or_else(|e| e.into_inner());
                    for sub in subs.iter_mut() {
                        (sub.callback)();
                    }
                }
                fonts_ready.set();
                if stop.wait_timeout(FRAME_INTERVAL) {
                    break;
                }
            }
            debug!("Frame pump stopped");
        }));
    }

    /// Block until first-frame font resources are built.
    pub fn wait_for_fonts(&self) {
        self.fonts_ready.wait();
    }

    pub fn is_enabled(&self) -> bool {
        self.pump.is_some()
    }

    /// Stop the frame pump and drop every subscriber.
    ///
    /// Joins the pump thread; when this returns, no callback fires again.
    pub fn dispose(&mut self) {
        self.stop.set();
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
            info!("Overlay disposed");
        }
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Drop for OverlayRuntime {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessContext;
    use crate::scan::{materialize_pattern, parse_pattern};

    fn overlay() -> OverlayRuntime {
        let pattern = parse_pattern(builtin::OVERLAY_PRESENT).unwrap();
        let image = materialize_pattern(&pattern, 0x00);
        let scanner = PatternScanner::new(ProcessContext::from_image(0x2000, image));
        OverlayRuntime::new(&scanner).unwrap()
    }

    #[test]
    fn test_construction_requires_present_signature() {
        let scanner = PatternScanner::new(ProcessContext::from_image(0x0, vec![0xCC; 32]));
        assert!(OverlayRuntime::new(&scanner).is_err());
    }

    #[test]
    fn test_frames_reach_subscribers() {
        let mut overlay = overlay();
        let shell = Arc::new(OverlayShell::new());
        overlay.on_draw(OverlayShell::draw_callback(&shell));

        overlay.enable();
        overlay.wait_for_fonts();
        assert!(shell.draw_count() >= 1);
        overlay.dispose();
    }

    #[test]
    fn test_dispose_stops_frame_delivery() {
        let mut overlay = overlay();
        let shell = Arc::new(OverlayShell::new());
        overlay.on_draw(OverlayShell::draw_callback(&shell));

        overlay.enable();
        overlay.wait_for_fonts();
        overlay.dispose();

        let after_dispose = shell.draw_count();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(shell.draw_count(), after_dispose);
        assert_eq!(overlay.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_removes_callback() {
        let overlay = overlay();
        let id = overlay.on_draw(Box::new(|| {}));
        assert_eq!(overlay.subscriber_count(), 1);
        assert!(overlay.unsubscribe(id));
        assert!(!overlay.unsubscribe(id));
        assert_eq!(overlay.subscriber_count(), 0);
    }

    #[test]
    fn test_hidden_shell_skips_draws() {
        let shell = OverlayShell::new();
        shell.set_visible(false);
        shell.draw();
        assert_eq!(shell.draw_count(), 0);
    }
}
