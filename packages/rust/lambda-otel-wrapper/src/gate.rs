use crate::constants::env_vars;
use crate::error::WrapperError;
use std::{env, fmt};

/// Process-level routing decision, taken once at startup.
///
/// # Configuration
///
/// - `OBS_ENABLED`: `1` or `true` (case-insensitive) selects [`Mode::Instrumented`];
///   any other value, or no value, selects [`Mode::Bypass`]. Wrappers that only
///   honour `1` treat `true` as disabled, so use `1` where both are deployed
/// - `ORIGINAL_HANDLER`: identity of the wrapped handler, required in both modes
///
/// # Example
///
/// ```
/// use lambda_otel_wrapper::Mode;
///
/// let mode = Mode::resolve(|name| match name {
///     "OBS_ENABLED" => Some("1".to_string()),
///     "ORIGINAL_HANDLER" => Some("./handler".to_string()),
///     _ => None,
/// })
/// .unwrap();
/// assert!(mode.is_instrumented());
/// assert_eq!(mode.handler(), "./handler");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Forward invocations to the handler without touching telemetry.
    Bypass { handler: String },
    /// Bootstrap telemetry and wrap every invocation in a span.
    Instrumented { handler: String },
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Bypass { .. } => write!(f, "bypass"),
            Mode::Instrumented { .. } => write!(f, "instrumented"),
        }
    }
}

impl Mode {
    /// Resolve the mode from the process environment.
    pub fn from_env() -> Result<Self, WrapperError> {
        Self::resolve(|name| env::var(name).ok())
    }

    /// Resolve the mode from an arbitrary name → value lookup.
    ///
    /// The handler identity is checked before anything else happens so that a
    /// misconfigured process fails the same way whatever the switch says.
    pub fn resolve<F>(lookup: F) -> Result<Self, WrapperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let handler = lookup(env_vars::ORIGINAL_HANDLER)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(WrapperError::MissingHandler)?;

        let enabled = lookup(env_vars::OBS_ENABLED)
            .map(|value| {
                let value = value.trim();
                value == "1" || value.eq_ignore_ascii_case("true")
            })
            .unwrap_or(false);

        Ok(if enabled {
            Mode::Instrumented { handler }
        } else {
            Mode::Bypass { handler }
        })
    }

    pub fn handler(&self) -> &str {
        match self {
            Mode::Bypass { handler } | Mode::Instrumented { handler } => handler,
        }
    }

    pub fn is_instrumented(&self) -> bool {
        matches!(self, Mode::Instrumented { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn lookup(
        enabled: Option<&'static str>,
        handler: Option<&'static str>,
    ) -> impl Fn(&str) -> Option<String> {
        move |name| match name {
            "OBS_ENABLED" => enabled.map(str::to_string),
            "ORIGINAL_HANDLER" => handler.map(str::to_string),
            _ => None,
        }
    }

    #[test]
    fn test_switch_values() {
        let test_cases = [
            (Some("1"), true),
            (Some("true"), true),
            (Some("TRUE"), true),
            (Some(" True "), true),
            (Some("0"), false),
            (Some("false"), false),
            (Some("yes"), false),
            (Some(""), false),
            (None, false),
        ];

        for (value, instrumented) in test_cases {
            let mode = Mode::resolve(lookup(value, Some("./handler"))).unwrap();
            assert_eq!(
                mode.is_instrumented(),
                instrumented,
                "Failed for OBS_ENABLED: {:?}",
                value
            );
            assert_eq!(mode.handler(), "./handler");
        }
    }

    #[test]
    fn test_missing_handler_is_fatal_in_both_modes() {
        for enabled in [None, Some("1")] {
            assert_eq!(
                Mode::resolve(lookup(enabled, None)),
                Err(WrapperError::MissingHandler)
            );
            assert_eq!(
                Mode::resolve(lookup(enabled, Some("   "))),
                Err(WrapperError::MissingHandler)
            );
        }
    }

    #[test]
    fn test_display() {
        let bypass = Mode::Bypass {
            handler: "h".to_string(),
        };
        let instrumented = Mode::Instrumented {
            handler: "h".to_string(),
        };
        assert_eq!(bypass.to_string(), "bypass");
        assert_eq!(instrumented.to_string(), "instrumented");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("OBS_ENABLED", "true");
        env::set_var("ORIGINAL_HANDLER", "/var/task/handler");
        assert_eq!(
            Mode::from_env(),
            Ok(Mode::Instrumented {
                handler: "/var/task/handler".to_string()
            })
        );

        env::remove_var("ORIGINAL_HANDLER");
        assert_eq!(Mode::from_env(), Err(WrapperError::MissingHandler));

        env::remove_var("OBS_ENABLED");
    }
}
