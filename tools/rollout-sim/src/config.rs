use anyhow::{Context, Result};
use fleet_reconcile::Health;

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of instances in the group.
    pub group_size: usize,

    /// Image the group currently runs.
    pub from_image: String,

    /// Image the group is updated to.
    pub to_image: String,

    /// Health reported by replacement instances.
    pub replacement_health: Health,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl SimConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let group_size = match std::env::var("FLEET_SIM_GROUP_SIZE") {
            Ok(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid FLEET_SIM_GROUP_SIZE: {raw:?}"))?,
            Err(_) => 3,
        };

        let from_image =
            std::env::var("FLEET_SIM_FROM_IMAGE").unwrap_or_else(|_| "app:v1".to_string());
        let to_image = std::env::var("FLEET_SIM_TO_IMAGE").unwrap_or_else(|_| "app:v2".to_string());

        let replacement_health = match std::env::var("FLEET_SIM_REPLACEMENT_HEALTH") {
            Ok(raw) => parse_health(&raw)?,
            Err(_) => Health::Healthy,
        };

        let log_level = std::env::var("FLEET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            group_size,
            from_image,
            to_image,
            replacement_health,
            log_level,
        })
    }
}

fn parse_health(raw: &str) -> Result<Health> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "healthy" => Ok(Health::Healthy),
        "unhealthy" => Ok(Health::Unhealthy),
        "unknown" => Ok(Health::Unknown),
        _ => anyhow::bail!("invalid FLEET_SIM_REPLACEMENT_HEALTH: {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_health() {
        assert_eq!(parse_health("Healthy").unwrap(), Health::Healthy);
        assert_eq!(parse_health("unknown").unwrap(), Health::Unknown);
        assert!(parse_health("green").is_err());
    }
}
