//! Severity names.
//!
//! Operators write syslog-style names (`ALERT`, `CRIT`, `NOTICE`, ...) in the
//! configuration; tracing only knows five levels, so the syslog names fold
//! onto the nearest one.

use tracing::Level;
use tracing::level_filters::LevelFilter;

/// Parse a severity name, case-insensitively.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "EMERG" | "ALERT" | "CRIT" | "ERR" | "ERROR" => Some(Level::ERROR),
        "WARNING" | "WARN" => Some(Level::WARN),
        "NOTICE" | "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

/// Parse a severity name into a filter; `OFF` is accepted here as well.
pub fn level_filter(name: &str) -> Option<LevelFilter> {
    if name.trim().eq_ignore_ascii_case("off") {
        return Some(LevelFilter::OFF);
    }
    parse_level(name).map(LevelFilter::from_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syslog_names_fold_onto_tracing_levels() {
        assert_eq!(parse_level("ALERT"), Some(Level::ERROR));
        assert_eq!(parse_level("crit"), Some(Level::ERROR));
        assert_eq!(parse_level("Warning"), Some(Level::WARN));
        assert_eq!(parse_level("NOTICE"), Some(Level::INFO));
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" TRACE "), Some(Level::TRACE));
    }

    #[test]
    fn test_unknown_level() {
        assert_eq!(parse_level("LOUD"), None);
        assert_eq!(parse_level(""), None);
    }

    #[test]
    fn test_level_filter_accepts_off() {
        assert_eq!(level_filter("off"), Some(LevelFilter::OFF));
        assert_eq!(level_filter("INFO"), Some(LevelFilter::INFO));
        assert_eq!(level_filter("bogus"), None);
    }
}
