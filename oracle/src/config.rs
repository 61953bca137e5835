use crate::oracle::FreedPolicy;
use crate::syntax::layout::Target;

pub const DEFAULT_CALL_DEPTH: usize = 64;

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Data model the object layouts are computed for.
    pub target: Target,
    pub freed: FreedPolicy,
    /// Also run scenarios marked `#[ignore]`.
    pub run_ignored: bool,
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: Target::default(),
            freed: FreedPolicy::default(),
            run_ignored: false,
            max_call_depth: DEFAULT_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown target '{0}', expected one of x86_64, i686, aarch64")]
    UnknownTarget(String),
    #[error("unknown freed policy '{0}', expected 'unknown' or 'stale'")]
    UnknownFreedPolicy(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

impl Config {
    pub const TARGET_VAR: &'static str = "OBJSIZE_TARGET";
    pub const FREED_VAR: &'static str = "OBJSIZE_FREED";
    pub const RUN_IGNORED_VAR: &'static str = "OBJSIZE_RUN_IGNORED";
    pub const CALL_DEPTH_VAR: &'static str = "OBJSIZE_MAX_CALL_DEPTH";

    /// Build a configuration from variables, falling back to the defaults for
    /// those `lookup` does not provide.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(name) = lookup(Self::TARGET_VAR) {
            config.target = Target::from_name(&name).ok_or(ConfigError::UnknownTarget(name))?;
        }
        if let Some(name) = lookup(Self::FREED_VAR) {
            config.freed = FreedPolicy::from_name(&name).ok_or(ConfigError::UnknownFreedPolicy(name))?;
        }
        if let Some(value) = lookup(Self::RUN_IGNORED_VAR) {
            config.run_ignored = match value.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => return Err(ConfigError::InvalidValue { key: Self::RUN_IGNORED_VAR, value }),
            };
        }
        if let Some(value) = lookup(Self::CALL_DEPTH_VAR) {
            config.max_call_depth = match value.parse() {
                Ok(depth) if depth > 0 => depth,
                _ => return Err(ConfigError::InvalidValue { key: Self::CALL_DEPTH_VAR, value }),
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn defaults_without_variables() {
        assert_eq!(Config::from_lookup(lookup(&[])), Ok(Config::default()));
    }

    #[test]
    fn reads_variables() {
        let vars = [("OBJSIZE_TARGET", "i686"), ("OBJSIZE_FREED", "stale"), ("OBJSIZE_RUN_IGNORED", "1")];
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.target, Target::I686);
        assert_eq!(config.freed, FreedPolicy::Stale);
        assert!(config.run_ignored);
        assert_eq!(config.max_call_depth, DEFAULT_CALL_DEPTH);
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(
            Config::from_lookup(lookup(&[("OBJSIZE_TARGET", "mips")])),
            Err(ConfigError::UnknownTarget("mips".into()))
        );
        assert!(matches!(
            Config::from_lookup(lookup(&[("OBJSIZE_MAX_CALL_DEPTH", "0")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
