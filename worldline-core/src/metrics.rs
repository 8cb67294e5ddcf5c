//! Synchronization counters and span names.
//!
//! Lock-free `AtomicU64` counters bumped on the hot path (ingestion,
//! transport callbacks) and read on export. [`SyncCounters::snapshot`]
//! returns a plain copy that can be asserted on in tests or rendered as
//! Prometheus text.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

macro_rules! counters {
    ($( $(#[$doc:meta])* $field:ident => $help:literal ),+ $(,)?) => {
        /// Atomic counters for synchronization events.
        #[derive(Debug)]
        pub struct SyncCounters {
            $( $(#[$doc])* pub $field: AtomicU64, )+
        }

        impl SyncCounters {
            /// A new set of zeroed counters.
            #[must_use]
            pub const fn new() -> Self {
                Self { $( $field: AtomicU64::new(0), )+ }
            }

            /// Copy every counter.
            #[must_use]
            pub fn snapshot(&self) -> CounterSnapshot {
                CounterSnapshot { $( $field: self.$field.load(Ordering::Relaxed), )+ }
            }
        }

        /// Counter values at one point in time.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
        pub struct CounterSnapshot {
            $( $(#[$doc])* pub $field: u64, )+
        }

        impl CounterSnapshot {
            /// `(name, help, value)` for every counter.
            #[must_use]
            pub fn entries(&self) -> Vec<(&'static str, &'static str, u64)> {
                vec![ $( (stringify!($field), $help, self.$field), )+ ]
            }
        }
    };
}

counters! {
    /// Stream items applied to the world.
    items_ingested => "Stream items applied to the world",
    /// Deliveries skipped because the id was already claimed.
    duplicates_skipped => "Deliveries skipped as duplicates",
    /// Push items held back because they were ahead of the remote tick.
    items_deferred => "Push items deferred until the next poll",
    /// Hydration attempts started.
    hydrate_attempts => "Hydration attempts",
    /// Hydration attempts that failed.
    hydrate_failures => "Failed hydration attempts",
    /// Steady-state poll passes completed.
    polls => "Steady-state poll passes",
    /// Poll passes that failed.
    poll_failures => "Failed poll passes",
    /// Push connections opened.
    transport_connects => "Push connections opened",
    /// Push connections lost or closed.
    transport_disconnects => "Push connections closed",
    /// Reconnect attempts scheduled.
    transport_reconnects => "Reconnect attempts scheduled",
    /// Inbound frames dropped as malformed.
    frames_dropped => "Malformed inbound frames dropped",
    /// Outbound messages queued while disconnected.
    outbound_queued => "Outbound messages queued",
    /// Outbound messages flushed after reconnect.
    outbound_flushed => "Outbound messages flushed",
    /// Outbound messages dropped because the queue was full.
    outbound_dropped => "Outbound messages dropped",
    /// Interventions accepted.
    interventions_applied => "Interventions applied",
    /// Interventions rejected by the remote authority.
    interventions_rejected => "Interventions rejected",
}

impl SyncCounters {
    /// Add `n` to `counter`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Add one to `counter`.
    pub fn bump(counter: &AtomicU64) {
        Self::add(counter, 1);
    }
}

impl Default for SyncCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        for (name, help, value) in self.entries() {
            out.push_str(&format!(
                "# HELP worldline_{name}_total {help}\n\
                 # TYPE worldline_{name}_total counter\n\
                 worldline_{name}_total {value}\n"
            ));
        }
        out
    }
}

/// Render the current counter values as Prometheus text.
#[must_use]
pub fn render_prometheus(counters: &SyncCounters) -> String {
    counters.snapshot().to_prometheus()
}

// ---------------------------------------------------------------------------
// Tracing span names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::info_span!`.
pub mod spans {
    /// One hydration attempt.
    pub const HYDRATE: &str = "worldline::hydrate";
    /// One steady-state poll pass.
    pub const POLL: &str = "worldline::poll";
    /// Handling one inbound push message.
    pub const PUSH: &str = "worldline::push";
    /// One local simulator step.
    pub const SIMULATE: &str = "worldline::simulate";
}
