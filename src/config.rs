use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;

use crate::batch::PackCache;
use crate::optimizer::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(env_string)
    }

    /// Creates a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api: ApiConfig::from_lookup(&lookup),
            optimizer: OptimizerConfig::from_lookup(&lookup),
            catalog: CatalogConfig::from_lookup(&lookup),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "LOAD_IT_NOW_API_HOST";
    const PORT_VAR: &'static str = "LOAD_IT_NOW_API_PORT";

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host_value = lookup(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match lookup(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration of the packing pipeline.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
    batch_cache_capacity: usize,
}

impl OptimizerConfig {
    const TIME_BUDGET_VAR: &'static str = "LOAD_IT_NOW_WALL_TIME_BUDGET_MS";
    const MAX_DEPTH_VAR: &'static str = "LOAD_IT_NOW_WALL_MAX_DEPTH";
    const MAX_NODES_VAR: &'static str = "LOAD_IT_NOW_WALL_MAX_NODES";
    const GRAVITY_ITERATIONS_VAR: &'static str = "LOAD_IT_NOW_GRAVITY_ITERATIONS";
    const SUPPORT_RATIO_VAR: &'static str = "LOAD_IT_NOW_SUPPORT_RATIO";
    const ALLOW_ROTATION_VAR: &'static str = "LOAD_IT_NOW_ALLOW_ROTATION";
    const TAIL_FILL_VAR: &'static str = "LOAD_IT_NOW_TAIL_FILL";
    const BATCH_CACHE_VAR: &'static str = "LOAD_IT_NOW_BATCH_CACHE_CAPACITY";

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        // 0 disables the deadline; the node budget then bounds the search alone.
        let time_budget_ms = load_with_warning(
            &lookup,
            Self::TIME_BUDGET_VAR,
            PackingConfig::DEFAULT_WALL_TIME_BUDGET_MS,
            |_| true,
            "",
            "Warning: Adjusted search time budget changes result quality",
        );

        let max_depth = load_with_warning(
            &lookup,
            Self::MAX_DEPTH_VAR,
            PackingConfig::DEFAULT_WALL_MAX_DEPTH,
            |value| value > 0,
            "must be greater than 0",
            "Warning: Adjusted search depth changes result quality",
        );

        let max_nodes = load_with_warning(
            &lookup,
            Self::MAX_NODES_VAR,
            PackingConfig::DEFAULT_WALL_MAX_NODES,
            |value| value > 0,
            "must be greater than 0",
            "Warning: Adjusted node budget changes result quality",
        );

        let gravity_iterations = load_with_warning(
            &lookup,
            Self::GRAVITY_ITERATIONS_VAR,
            PackingConfig::DEFAULT_GRAVITY_MAX_ITERATIONS,
            |value| value > 0,
            "must be greater than 0",
            "Warning: Adjusted compaction passes may leave boxes floating",
        );

        let support_ratio = load_with_warning(
            &lookup,
            Self::SUPPORT_RATIO_VAR,
            PackingConfig::DEFAULT_SUPPORT_RATIO,
            |value: f64| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Warning: Adjusted minimum support may lead to unstable stacks",
        );

        let batch_cache_capacity = load_with_warning(
            &lookup,
            Self::BATCH_CACHE_VAR,
            PackCache::DEFAULT_CAPACITY,
            |value| value > 0,
            "must be greater than 0",
            "Warning: Adjusted batch cache size changes memory use",
        );

        let allow_rotation = lookup(Self::ALLOW_ROTATION_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ALLOW_ROTATION_VAR))
            .unwrap_or(true);
        let tail_fill = lookup(Self::TAIL_FILL_VAR)
            .and_then(|raw| parse_bool(&raw, Self::TAIL_FILL_VAR))
            .unwrap_or(true);

        let time_budget = (time_budget_ms > 0).then(|| Duration::from_millis(time_budget_ms));
        let packing = PackingConfig::builder()
            .wall_time_budget(time_budget)
            .wall_max_depth(max_depth)
            .wall_max_nodes(max_nodes)
            .gravity_max_iterations(gravity_iterations)
            .support_ratio(support_ratio)
            .allow_rotation(allow_rotation)
            .tail_fill(tail_fill)
            .build();

        Self {
            packing,
            batch_cache_capacity,
        }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Maximum number of distinct inputs the batch cache remembers.
    pub fn batch_cache_capacity(&self) -> usize {
        self.batch_cache_capacity
    }
}

/// Where the container catalog comes from.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    path: Option<PathBuf>,
}

impl CatalogConfig {
    const PATH_VAR: &'static str = "LOAD_IT_NOW_CATALOG_PATH";

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            path: lookup(Self::PATH_VAR).map(PathBuf::from),
        }
    }

    /// JSON catalog file, `None` for the built-in containers.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_with_warning<T>(
    lookup: impl Fn(&str) -> Option<String>,
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> T
where
    T: std::str::FromStr + std::fmt::Display + PartialEq + Copy,
    T::Err: std::fmt::Display,
{
    match lookup(var_name) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    if value != default {
                        warn!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("ON", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn defaults_without_variables() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.api.port(), 8080);
        assert!(config.api.binds_to_all_interfaces());
        assert!(config.api.uses_default_host());
        assert_eq!(config.optimizer.packing_config(), PackingConfig::default());
        assert_eq!(config.optimizer.batch_cache_capacity(), PackCache::DEFAULT_CAPACITY);
        assert!(config.catalog.path().is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LOAD_IT_NOW_API_HOST", "127.0.0.1"),
            ("LOAD_IT_NOW_API_PORT", "9000"),
            ("LOAD_IT_NOW_WALL_TIME_BUDGET_MS", "0"),
            ("LOAD_IT_NOW_WALL_MAX_NODES", "5000"),
            ("LOAD_IT_NOW_SUPPORT_RATIO", "0.75"),
            ("LOAD_IT_NOW_TAIL_FILL", "off"),
            ("LOAD_IT_NOW_BATCH_CACHE_CAPACITY", "64"),
            ("LOAD_IT_NOW_CATALOG_PATH", "containers.json"),
        ]));

        assert_eq!(config.api.socket_addr().to_string(), "127.0.0.1:9000");
        assert!(!config.api.binds_to_all_interfaces());
        let packing = config.optimizer.packing_config();
        assert_eq!(packing.wall_time_budget, None);
        assert_eq!(packing.wall_max_nodes, 5000);
        assert_eq!(packing.support_ratio, 0.75);
        assert!(!packing.tail_fill);
        assert!(packing.allow_rotation);
        assert_eq!(config.optimizer.batch_cache_capacity(), 64);
        assert_eq!(config.catalog.path(), Some(Path::new("containers.json")));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LOAD_IT_NOW_API_HOST", "not-an-ip"),
            ("LOAD_IT_NOW_API_PORT", "0"),
            ("LOAD_IT_NOW_WALL_MAX_DEPTH", "-3"),
            ("LOAD_IT_NOW_SUPPORT_RATIO", "1.5"),
            ("LOAD_IT_NOW_ALLOW_ROTATION", "maybe"),
            ("LOAD_IT_NOW_BATCH_CACHE_CAPACITY", "0"),
        ]));

        assert_eq!(config.api.port(), 8080);
        assert_eq!(config.api.display_host(), "0.0.0.0");
        let packing = config.optimizer.packing_config();
        assert_eq!(packing.wall_max_depth, PackingConfig::DEFAULT_WALL_MAX_DEPTH);
        assert_eq!(packing.support_ratio, PackingConfig::DEFAULT_SUPPORT_RATIO);
        assert!(packing.allow_rotation);
        assert_eq!(config.optimizer.batch_cache_capacity(), PackCache::DEFAULT_CAPACITY);
    }
}
