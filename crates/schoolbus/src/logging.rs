//! Logging setup for schoolbus.
//!
//! Log lines go to stderr so that command output on stdout (tables, JSON,
//! CSV reports) can be piped without noise.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything, including request traces.
    Trace,
}

impl Verbosity {
    /// Derive the verbosity from the `-q` flag and the `-v` count.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set.
    ///
    /// The HTTP stack stays at `warn` unless tracing is requested.
    #[must_use]
    pub fn default_directives(self) -> String {
        let http_level = if self == Self::Trace { "debug" } else { "warn" };
        format!(
            "schoolbus={},busctl={},reqwest={http_level},hyper={http_level}",
            self.level(),
            self.level()
        )
    }
}

/// Initialize the logging system.
///
/// Call once at startup. `RUST_LOG` takes precedence over `verbosity`.
///
/// ```no_run
/// use schoolbus::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity != Verbosity::Normal)
            .with_file(false)
            .with_line_number(false),
    );

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = subscriber.try_init();
}

/// Minimal logging for tests: warnings and errors only.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 2), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(false, 9), Verbosity::Trace);
    }

    #[test]
    fn test_verbosity_level() {
        assert_eq!(Verbosity::Quiet.level(), Level::ERROR);
        assert_eq!(Verbosity::Normal.level(), Level::INFO);
        assert_eq!(Verbosity::Verbose.level(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.level(), Level::TRACE);
    }

    #[test]
    fn test_default_directives() {
        let normal = Verbosity::Normal.default_directives();
        assert!(normal.contains("schoolbus=INFO"));
        assert!(normal.contains("reqwest=warn"));

        let trace = Verbosity::Trace.default_directives();
        assert!(trace.contains("schoolbus=TRACE"));
        assert!(trace.contains("reqwest=debug"));
    }

    #[test]
    fn test_directives_parse() {
        for v in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(v.default_directives()).is_ok());
        }
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Verbose);
        init_test_logging();
    }
}
