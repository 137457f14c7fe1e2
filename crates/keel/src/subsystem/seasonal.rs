//! Date-gated seasonal banner.
//!
//! Draws a one-day banner over the overlay when the calendar matches a
//! fixed day/month/year triple. Purely additive: outside that date, or
//! when the overlay never constructed, this module is an inert no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use crate::subsystem::overlay::OverlayRuntime;

/// The single day the banner shows (day, month, year).
const BANNER_DATE: (u32, u32, i32) = (1, 4, 2026);

pub struct SeasonalBanner {
    subscription: Option<u64>,
    draws: Arc<AtomicU64>,
}

impl SeasonalBanner {
    /// Attach the banner if today matches and the overlay exists.
    ///
    /// `overlay: None` is the dependency-absent path: construction
    /// succeeds and does nothing.
    pub fn attach(overlay: Option<&OverlayRuntime>, today: NaiveDate) -> Self {
        let draws = Arc::new(AtomicU64::new(0));

        let (day, month, year) = BANNER_DATE;
        if (today.day(), today.month(), today.year()) != (day, month, year) {
            debug!("Seasonal banner inactive ({} is not its day)", today);
            return Self {
                subscription: None,
                draws,
            };
        }

        let Some(overlay) = overlay else {
            debug!("Seasonal banner skipped: overlay not constructed");
            return Self {
                subscription: None,
                draws,
            };
        };

        info!("Seasonal banner attached");
        let counter = Arc::clone(&draws);
        let subscription = overlay.on_draw(Box::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        Self {
            subscription: Some(subscription),
            draws,
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn draw_count(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }

    /// Detach from the overlay draw event.
    pub fn dispose(&mut self, overlay: Option<&OverlayRuntime>) {
        if let (Some(id), Some(overlay)) = (self.subscription.take(), overlay) {
            overlay.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessContext;
    use crate::scan::{PatternScanner, builtin, materialize_pattern, parse_pattern};

    fn overlay() -> OverlayRuntime {
        let pattern = parse_pattern(builtin::OVERLAY_PRESENT).unwrap();
        let image = materialize_pattern(&pattern, 0x00);
        let scanner = PatternScanner::new(ProcessContext::from_image(0x2000, image));
        OverlayRuntime::new(&scanner).unwrap()
    }

    fn banner_day() -> NaiveDate {
        let (day, month, year) = BANNER_DATE;
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_attaches_on_the_day() {
        let overlay = overlay();
        let mut banner = SeasonalBanner::attach(Some(&overlay), banner_day());
        assert!(banner.is_active());
        assert_eq!(overlay.subscriber_count(), 1);

        banner.dispose(Some(&overlay));
        assert!(!banner.is_active());
        assert_eq!(overlay.subscriber_count(), 0);
    }

    #[test]
    fn test_inactive_off_the_day() {
        let overlay = overlay();
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let banner = SeasonalBanner::attach(Some(&overlay), today);
        assert!(!banner.is_active());
        assert_eq!(overlay.subscriber_count(), 0);
    }

    #[test]
    fn test_noop_when_overlay_absent() {
        let mut banner = SeasonalBanner::attach(None, banner_day());
        assert!(!banner.is_active());
        // Dispose without an overlay must not panic.
        banner.dispose(None);
    }
}
