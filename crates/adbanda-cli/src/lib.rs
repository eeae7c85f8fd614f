//! Shared plumbing for the adbanda binaries

use std::path::PathBuf;

use adbanda_core::config::{AppConfig, CONFIG_FILENAME};

/// Initialize logging - set RUST_LOG=debug for verbose output
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,ort=warn"))
        .format_timestamp_millis()
        .init();
}

/// Options every binary accepts
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// YAML config file (missing file means defaults)
    #[arg(long, default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Directory holding yamnet.onnx and trained models
    #[arg(long)]
    pub models_dir: Option<PathBuf>,
}

impl CommonArgs {
    /// Load the config file and apply command line overrides
    pub fn app_config(&self) -> AppConfig {
        let mut config = AppConfig::load(&self.config);
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestArgs {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("adbanda.yaml");
        let args =
            TestArgs::try_parse_from(["test", "--config", missing.to_str().unwrap()]).unwrap();
        let config = args.common.app_config();
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.train.epochs, 6);
    }

    #[test]
    fn test_models_dir_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adbanda.yaml");
        std::fs::write(&path, "models_dir: /srv/models\ntrain:\n  epochs: 12\n").unwrap();

        let args = TestArgs::try_parse_from([
            "test",
            "--config",
            path.to_str().unwrap(),
            "--models-dir",
            "elsewhere",
        ])
        .unwrap();
        let config = args.common.app_config();
        assert_eq!(config.models_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.train.epochs, 12);
    }
}
