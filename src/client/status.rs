use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::client::{BUILD_FLAVOR, ClientContext};

/// Periodic "still alive" line, independent of the update loop.
///
/// Each line carries a running counter and the version of the image that
/// printed it, so a log tail shows exactly when a restart took effect.
pub struct StatusReporter {
    ctx: Arc<ClientContext>,
    flavor: Option<&'static str>,
    counter: u64,
}

impl StatusReporter {
    /// Reporter for the running binary.
    #[must_use]
    pub const fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            ctx,
            flavor: BUILD_FLAVOR,
            counter: 0,
        }
    }

    /// Override the build flavor shown in the line.
    #[must_use]
    pub fn with_flavor(mut self, flavor: Option<&'static str>) -> Self {
        self.flavor = flavor;
        self
    }

    /// Advance the counter and render the next line.
    pub fn next_line(&mut self) -> String {
        self.counter += 1;
        status_line(self.counter, &self.ctx, self.flavor)
    }

    /// Log a status line every `interval`, forever.
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            info!("{}", self.next_line());
        }
    }
}

/// `[<n>] version <v> (<platform>[, <flavor>])`
#[must_use]
pub fn status_line(counter: u64, ctx: &ClientContext, flavor: Option<&str>) -> String {
    match flavor {
        Some(flavor) => format!(
            "[{counter}] version {} ({}, {flavor})",
            ctx.current_version, ctx.platform
        ),
        None => format!(
            "[{counter}] version {} ({})",
            ctx.current_version, ctx.platform
        ),
    }
}
