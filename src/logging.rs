use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding an `EnvFilter` directive, e.g. `apicontract=debug`.
pub const LOG_ENV: &str = "APICONTRACT_LOG";

static INIT: Once = Once::new();

/// Directive used when `APICONTRACT_LOG` is unset or unparsable.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Filter from an explicit directive, falling back to the default one.
pub fn filter_from(directive: Option<&str>, verbose: bool) -> EnvFilter {
    directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose)))
}

/// Installs a compact stderr subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let filter = filter_from(std::env::var(LOG_ENV).ok().as_deref(), verbose);

        let console = fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);

        if tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init()
            .is_err()
        {
            tracing::debug!("global subscriber already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    fn enabled_under(filter: EnvFilter, level: Level) -> bool {
        let subscriber = tracing_subscriber::registry().with(filter);
        tracing::subscriber::with_default(subscriber, || match level {
            Level::TRACE => tracing::enabled!(Level::TRACE),
            Level::DEBUG => tracing::enabled!(Level::DEBUG),
            _ => tracing::enabled!(Level::INFO),
        })
    }

    #[test]
    fn explicit_directive_wins() {
        let filter = filter_from(Some("apicontract=trace"), false);
        assert!(enabled_under(filter, Level::TRACE));
    }

    #[test]
    fn unparsable_directive_falls_back() {
        assert!(enabled_under(filter_from(Some("apicontract=loud"), true), Level::DEBUG));
        assert!(!enabled_under(filter_from(Some("apicontract=loud"), false), Level::DEBUG));
        assert!(enabled_under(filter_from(None, false), Level::INFO));
    }

    #[test]
    fn verbose_selects_debug() {
        assert_eq!(default_directive(true), "debug");
        assert_eq!(default_directive(false), "info");
    }
}
