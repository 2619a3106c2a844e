use std::env;
use tracing_subscriber::EnvFilter;

/// Filter directive enabling `level` for each of `targets`, e.g. `mp4mux=debug,stsdgen=debug`.
pub fn log_filter(level: &str, targets: &[&str]) -> String {
    targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global subscriber. An explicit `RUST_LOG` takes precedence over `env_filter`.
pub fn set_log(env_filter: String) {
    let filter = match env::var("RUST_LOG") {
        Ok(from_env) if !from_env.is_empty() => EnvFilter::new(from_env),
        _ => EnvFilter::new(env_filter),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
