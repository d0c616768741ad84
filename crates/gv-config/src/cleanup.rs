//! Operator-level skip-cleanup signal.

/// Environment variable that leaves fixtures in place for post-mortem inspection.
pub const SKIP_CLEANUP_ENV: &str = "GV_SKIP_CLEANUP";

/// Whether teardown removes what setup created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Consult `GV_SKIP_CLEANUP` each time teardown is about to run.
    #[default]
    FromEnv,
    /// Never clean up (CLI flag or `skip_cleanup = true`).
    Skip,
    /// Always clean up, ignoring the environment.
    Always,
}

impl CleanupPolicy {
    pub fn from_flags(skip_requested: bool) -> Self {
        if skip_requested { Self::Skip } else { Self::FromEnv }
    }

    /// Read at teardown time, not at construction.
    pub fn should_skip(&self) -> bool {
        match self {
            Self::Skip => true,
            Self::Always => false,
            Self::FromEnv => is_truthy(std::env::var(SKIP_CLEANUP_ENV).ok().as_deref()),
        }
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn restore_env_var(original: Option<String>) {
        // SAFETY: test-scoped env mutation; every env test is #[serial].
        unsafe {
            match original {
                Some(value) => std::env::set_var(SKIP_CLEANUP_ENV, value),
                None => std::env::remove_var(SKIP_CLEANUP_ENV),
            }
        }
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(is_truthy(Some(value)), "{value:?} should be truthy");
        }
        for value in ["", "0", "false", "no", "off", "maybe"] {
            assert!(!is_truthy(Some(value)), "{value:?} should be falsy");
        }
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_explicit_policies_ignore_env() {
        assert!(CleanupPolicy::Skip.should_skip());
        assert!(!CleanupPolicy::Always.should_skip());
        assert_eq!(CleanupPolicy::from_flags(true), CleanupPolicy::Skip);
        assert_eq!(CleanupPolicy::from_flags(false), CleanupPolicy::FromEnv);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_variable_at_call_time() {
        let original = std::env::var(SKIP_CLEANUP_ENV).ok();
        let policy = CleanupPolicy::FromEnv;

        // SAFETY: serialized with the other env tests.
        unsafe { std::env::remove_var(SKIP_CLEANUP_ENV) };
        assert!(!policy.should_skip());

        // SAFETY: serialized with the other env tests.
        unsafe { std::env::set_var(SKIP_CLEANUP_ENV, "true") };
        assert!(policy.should_skip());

        restore_env_var(original);
    }
}
