use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

/// Environment variable holding the default log filter.
pub const LOG_ENV: &str = "QUIRE_LOG";
pub const DEFAULT_FILTER: &str = "info";

/// Prints nothing, so log lines carry no timestamp prefix.
struct EmptyTime;

impl FormatTime for EmptyTime {
    fn format_time(&self, _: &mut Writer<'_>) -> std::fmt::Result {
        Ok(())
    }
}

/// Picks the filter directive: an explicit one first, then `QUIRE_LOG`,
/// then `info`.
fn filter_directive(explicit: Option<&str>, env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(env)
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs the global subscriber writing to stderr. Calling it twice keeps
/// the first subscriber.
pub fn init_logging(filter: Option<&str>) {
    let directive = filter_directive(filter, std::env::var(LOG_ENV).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let format = format().with_timer(EmptyTime).with_level(true).with_target(true);

    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .try_init();
    if installed.is_err() {
        tracing::debug!("logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter_directive(Some("debug"), Some("warn".into())), "debug");
        assert_eq!(filter_directive(None, Some("quire=trace".into())), "quire=trace");
        assert_eq!(filter_directive(None, None), "info");
        assert_eq!(filter_directive(None, Some("  ".into())), "info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(Some("warn"));
        init_logging(Some("debug"));
    }
}
