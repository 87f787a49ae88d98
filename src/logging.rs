use tracing_subscriber::EnvFilter;

/// Structured logs go to stderr; stdout carries the protocol. Filter
/// overridable via `GRADEBOOKD_LOG` (or the standard `RUST_LOG`).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("GRADEBOOKD_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("gradebookd=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
