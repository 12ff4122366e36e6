use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber on stderr and route `log` records into it.
/// `RUST_LOG` overrides `default_directive`.
pub fn init(default_directive: &str) -> Result<(), String> {
    LogTracer::init().map_err(|e| format!("Failed to bridge log records: {}", e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to install tracing subscriber: {}", e))?;
    Ok(())
}
