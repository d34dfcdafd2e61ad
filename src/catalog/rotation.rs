//! Minute-parity rotation of the `latest` tag
//!
//! Simulated canary rollout. Releases are split into an `odd` and an `even`
//! cohort; the cohort matching the parity of the current wall-clock minute
//! carries `latest`.
//!
//! ```text
//! minute % 2 != 0  ->  odd  is latest, even is demoted
//! minute % 2 == 0  ->  even is latest, odd  is demoted
//! ```
//!
//! [`TagRotator::run`] polls the clock once per second and rotates whenever
//! the minute changes, so a rotation lands up to one second late.

use crate::catalog::Catalog;
use crate::release::tag;
use chrono::{Local, Timelike};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// How often the rotator looks at the clock.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Rotation cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    /// Releases tagged `odd`
    Odd,
    /// Releases tagged `even`
    Even,
}

impl Cohort {
    /// The cohort that should carry `latest` during `minute`.
    #[must_use]
    pub const fn for_minute(minute: u32) -> Self {
        if minute % 2 != 0 { Self::Odd } else { Self::Even }
    }

    /// The cohort demoted when this one is promoted.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Odd => Self::Even,
            Self::Even => Self::Odd,
        }
    }

    /// Tag identifying members of this cohort.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Odd => tag::ODD,
            Self::Even => tag::EVEN,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Background policy that moves `latest` between cohorts.
pub struct TagRotator {
    catalog: Arc<Catalog>,
    clock: fn() -> u32,
    /// Minute applied by the last [`rotate_now`](Self::rotate_now).
    seeded_minute: Option<u32>,
}

/// Current local wall-clock minute.
fn local_minute() -> u32 {
    Local::now().minute()
}

impl TagRotator {
    /// Create a rotator reading the local wall clock.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            clock: local_minute,
            seeded_minute: None,
        }
    }

    /// Replace the minute source. Tests use this to pin the parity.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u32) -> Self {
        self.clock = clock;
        self
    }

    /// Rotate for an explicit minute and return the promoted cohort.
    pub fn rotate_for_minute(&self, minute: u32) -> Cohort {
        let target = Cohort::for_minute(minute);
        let demoted = target.other();

        info!("Adding {} tag to {target} releases (minute {minute})", tag::LATEST);
        let (removed, added) = self.catalog.move_tag(tag::LATEST, demoted.tag(), target.tag());
        debug!("Rotation demoted {removed} and promoted {added} releases");

        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string_pretty(&self.catalog.snapshot()) {
                Ok(dump) => debug!("Catalog after rotation:\n{dump}"),
                Err(e) => debug!("Could not serialize catalog for logging: {e}"),
            }
        }

        target
    }

    /// Rotate for the current minute. Called once right after loading.
    ///
    /// The minute is remembered, so a later [`run`](Self::run) rotates as
    /// soon as the clock has moved past it.
    pub fn rotate_now(&mut self) -> Cohort {
        let minute = (self.clock)();
        self.seeded_minute = Some(minute);
        self.rotate_for_minute(minute)
    }

    /// Rotate on every minute change, forever.
    ///
    /// Does not rotate on entry; call [`rotate_now`](Self::rotate_now) first.
    /// Without a seed, the minute read on entry is taken as already applied.
    pub async fn run(self) {
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_minute = self.seeded_minute.unwrap_or_else(|| (self.clock)());

        loop {
            ticker.tick().await;
            let minute = (self.clock)();
            if minute != last_minute {
                last_minute = minute;
                self.rotate_for_minute(minute);
            }
        }
    }
}
