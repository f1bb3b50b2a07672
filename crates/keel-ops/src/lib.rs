//! High-level operations wiring the tool surface to the restore engine.

pub mod assets;
pub mod ops_restore;
pub mod ops_verify;

/// Install the global tracing subscriber, honoring `KEEL_LOG`-style env
/// filters. Embedding tools call this once at startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
