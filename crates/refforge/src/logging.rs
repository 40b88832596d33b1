use std::env;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over the verbose flag.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if verbose {
        tracing::debug!("verbose logging enabled");
    }
}

/// Console line outside the tracing stream, for end-of-run summaries.
pub fn stage(stage: &str, message: impl AsRef<str>) {
    eprintln!("[refforge::{}] {}", stage, message.as_ref());
}

pub fn env_flag() -> bool {
    env::var("REFFORGE_VERBOSE")
        .map(|value| parse_bool(value.trim()))
        .unwrap_or(false)
}

pub(crate) fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("1"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("on"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("maybe"));
    }
}
