//! Logging setup for processes embedding the producer pool.
//!
//! The pool itself only emits `tracing` events; hosts that do not install
//! their own subscriber can call [`init_logging`] once at startup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` is honoured unless `verbose` is set. Returns `false` if a global
/// subscriber was already installed.
pub fn init_logging(json: bool, verbose: bool) -> bool {
    let env_filter = if verbose {
        EnvFilter::new("sink_producers=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sink_producers=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
