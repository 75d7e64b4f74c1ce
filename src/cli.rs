use crate::config::{ViewerConfigOverrides, DEFAULT_CONFIG_PATH};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    width: Option<u32>,
    height: Option<u32>,
    config: Option<PathBuf>,
    paths: Vec<PathBuf>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw) = iter.next() {
            let arg = raw.as_ref();
            let Some(key) = arg.strip_prefix("--") else {
                overrides.paths.push(PathBuf::from(arg));
                continue;
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "width" => {
                    overrides.width =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid width '{value}'"))?);
                }
                "height" => {
                    overrides.height =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid height '{value}'"))?);
                }
                "config" => overrides.config = Some(PathBuf::from(value)),
                _ => bail!("Unknown flag '{arg}'. Supported flags: --width, --height, --config."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Files and folders to ingest as one bundle at startup.
    pub fn initial_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn config_overrides(&self) -> ViewerConfigOverrides {
        ViewerConfigOverrides { width: self.width, height: self.height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_config_and_paths() {
        let args = ["viewer", "--width", "1600", "assets/hero", "--height", "900", "--config", "alt.json", "x.skel"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.config_overrides(), ViewerConfigOverrides { width: Some(1600), height: Some(900) });
        assert_eq!(overrides.config_path(), PathBuf::from("alt.json"));
        assert_eq!(overrides.initial_paths(), [PathBuf::from("assets/hero"), PathBuf::from("x.skel")]);
    }

    #[test]
    fn latest_flag_wins_and_config_defaults() {
        let overrides = CliOverrides::parse(["viewer", "--width", "800", "--width", "1920"]).expect("parse overrides");
        assert_eq!(overrides.config_overrides().width, Some(1920));
        assert_eq!(overrides.config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(overrides.initial_paths().is_empty());
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["viewer", "--width"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_bad_numbers() {
        let err = CliOverrides::parse(["viewer", "--vsync", "off"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOverrides::parse(["viewer", "--height", "tall"]).unwrap_err();
        assert!(err.to_string().contains("Invalid height"));
    }
}
