use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use geocoin_core::{Position, StashPolicy};
use geocoin_system_session::Config;
use serde::Deserialize;

/// Optional settings read from a TOML configuration file.
///
/// Every key may be omitted; present keys replace the built-in defaults and
/// are themselves replaced by command-line flags.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    seed: Option<u64>,
    tile_width: Option<f64>,
    visibility_radius: Option<u32>,
    spawn_probability: Option<f64>,
    min_coins: Option<u32>,
    max_coins: Option<u32>,
    stash_policy: Option<StashPolicy>,
    origin: Option<Position>,
}

impl ConfigFile {
    /// Loads the configuration file at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid configuration at {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse configuration toml contents")
    }

    /// Overlays the present keys onto `config`.
    pub(crate) fn apply(self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(tile_width) = self.tile_width {
            config.tile_width = tile_width;
        }
        if let Some(radius) = self.visibility_radius {
            config.visibility_radius = radius;
        }
        if let Some(probability) = self.spawn_probability {
            config.spawn_probability = probability;
        }
        if let Some(min_coins) = self.min_coins {
            config.min_coins = min_coins;
        }
        if let Some(max_coins) = self.max_coins {
            config.max_coins = max_coins;
        }
        if let Some(policy) = self.stash_policy {
            config.stash_policy = policy;
        }
        if let Some(origin) = self.origin {
            config.origin = origin;
        }
    }
}

/// Rejects settings the session cannot play with.
pub(crate) fn validate(config: &Config) -> Result<()> {
    if !config.tile_width.is_finite() || config.tile_width <= 0.0 {
        bail!("tile width must be a positive number, got {}", config.tile_width);
    }
    if !(0.0..=1.0).contains(&config.spawn_probability) {
        bail!(
            "spawn probability must lie within 0..=1, got {}",
            config.spawn_probability
        );
    }
    if config.min_coins > config.max_coins {
        bail!(
            "minimum coin count {} exceeds maximum {}",
            config.min_coins,
            config.max_coins
        );
    }
    if !config.origin.is_finite() {
        bail!("origin must have finite coordinates");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        let file = ConfigFile::parse("").expect("empty file parses");
        assert_eq!(file, ConfigFile::default());

        let mut config = Config::default();
        file.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn present_keys_replace_defaults() {
        let file = ConfigFile::parse(
            r#"
                seed = 24301
                visibility_radius = 4
                stash_policy = "home-cell"
                origin = { lat = 36.9894, lng = -122.0627 }
            "#,
        )
        .expect("configuration parses");

        let mut config = Config::default();
        file.apply(&mut config);
        assert_eq!(config.seed, 24301);
        assert_eq!(config.visibility_radius, 4);
        assert_eq!(config.stash_policy, StashPolicy::HomeCell);
        assert_eq!(config.origin, Position::new(36.9894, -122.0627));
        assert_eq!(config.tile_width, Config::default().tile_width);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ConfigFile::parse("cache_size = 3").is_err());
    }

    #[test]
    fn validation_catches_unplayable_settings() {
        assert!(validate(&Config::default()).is_ok());
        assert!(validate(&Config {
            tile_width: 0.0,
            ..Config::default()
        })
        .is_err());
        assert!(validate(&Config {
            spawn_probability: 1.5,
            ..Config::default()
        })
        .is_err());
        assert!(validate(&Config {
            min_coins: 5,
            max_coins: 2,
            ..Config::default()
        })
        .is_err());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = ConfigFile::load(Path::new("/nonexistent/geocoin.toml"))
            .expect_err("file is missing");
        assert!(format!("{error:#}").contains("/nonexistent/geocoin.toml"));
    }
}
