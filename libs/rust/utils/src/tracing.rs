use std::panic;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Noisy transport crates that are silenced unless RUST_LOG asks for them
const SILENCED_TARGETS: [&str; 4] = ["hyper_util", "hyper", "reqwest", "h2"];

pub fn setup_tracing() {
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    for target in SILENCED_TARGETS {
        if let Ok(directive) = format!("{target}=off").parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_writer(std::io::stdout);

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Route panics through tracing so they land in the same JSON stream as
/// everything else.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let backtrace = backtrace::Backtrace::new();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let payload = info.payload();

        if let Some(s) = payload.downcast_ref::<&str>() {
            error!(panic_message = *s, location = %location, backtrace = ?backtrace, "Panic occurred with message");
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!(panic_message = %s, location = %location, backtrace = ?backtrace, "Panic occurred with message");
        } else {
            error!(location = %location, backtrace = ?backtrace, "Panic occurred but the payload is not a string");
        }
    }));
}
