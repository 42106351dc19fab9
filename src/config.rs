use crate::batch::Pipeline;
use crate::cli::Cli;
use crate::client::{Client, ClientOptions};
use crate::compositor::DisplayOptions;
use crate::encoder::{EncoderOptions, FfmpegEncoder};
use crate::logging::LoggingOptions;
use crate::mode::ModeSet;
use crate::place::{find_place, Place};
use anyhow::Result;
use chrono::Duration;
use etcetera::{choose_app_strategy, AppStrategy, AppStrategyArgs};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_with::DurationSeconds;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(skip)]
    pub config_path: PathBuf,
    pub main: MainConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: Self::default_path(),
            main: MainConfig::default(),
        }
    }
}

#[serde_with::serde_as]
#[derive(Debug, Deserialize, Serialize)]
pub struct MainConfig {
    /// Frame cache and finished videos live under here
    pub data_dir: PathBuf,
    /// Holds map/, footer/ and font/
    pub asset_dir: PathBuf,
    pub places: Vec<Place>,
    #[serde_as(as = "DurationSeconds<i64>")]
    pub refresh_interval: Duration,
    pub display: DisplayOptions,
    pub modes: ModeSet,
    pub client: ClientOptions,
    pub encoder: EncoderOptions,
    pub logging: LoggingOptions,
}

impl Default for MainConfig {
    fn default() -> Self {
        let dirs = Config::default_dirs();
        Self {
            data_dir: dirs.data.clone(),
            asset_dir: dirs.data.join("assets"),
            places: Place::defaults(),
            refresh_interval: Duration::minutes(15),
            display: DisplayOptions::default(),
            modes: ModeSet::default(),
            client: ClientOptions::default(),
            encoder: EncoderOptions::default(),
            logging: LoggingOptions::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        let mut path = PathBuf::from(&Self::default_dirs().config);
        path.push("config.yml");
        path
    }

    pub fn default_dirs() -> &'static DefaultDirs {
        DEFAULT_DIRS.get_or_init(|| match choose_app_strategy(AppStrategyArgs {
            top_level_domain: "org".to_string(),
            author: "sublipri".to_string(),
            app_name: "Cloudcast".to_string(),
        }) {
            Ok(strategy) => DefaultDirs {
                config: strategy.config_dir(),
                data: strategy.data_dir(),
            },
            // No home directory, e.g. a bare service account
            Err(_) => {
                let base = PathBuf::from(".cloudcast");
                DefaultDirs {
                    config: base.clone(),
                    data: base,
                }
            }
        })
    }

    pub fn from_cli(args: &Cli) -> Result<Self> {
        let config_path = if let Some(path) = &args.config_path {
            path.to_owned()
        } else {
            Self::default_path()
        };

        let main = Self::extract(Self::figment(&config_path).merge(Serialized::defaults(args)))?;

        Ok(Config { config_path, main })
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(MainConfig::default()))
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed("CLOUDCAST_").split("__"))
    }

    fn extract(figment: Figment) -> Result<MainConfig> {
        let main: MainConfig = figment.extract()?;
        main.modes.validate()?;
        Ok(main)
    }

    pub fn write_config_file(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(&self.main)?;
        fs::write(&self.config_path, yaml)?;
        Ok(())
    }

    pub fn place(&self, key: &str) -> Result<&Place> {
        find_place(&self.main.places, key)
    }

    pub fn pipeline(&self) -> Result<Pipeline<Client, FfmpegEncoder>> {
        Pipeline::new(
            Client::new(&self.main.client),
            FfmpegEncoder::new(self.main.encoder.clone()),
            &self.main.data_dir,
            &self.main.asset_dir,
            &self.main.display,
            self.main.modes.clone(),
        )
    }

    /// A pipeline that can look up and clean videos but not build them.
    pub fn storage(&self) -> Pipeline<Client, FfmpegEncoder> {
        Pipeline::with_compositors(
            Client::new(&self.main.client),
            FfmpegEncoder::new(self.main.encoder.clone()),
            &self.main.data_dir,
            self.main.modes.clone(),
            HashMap::new(),
        )
    }
}

static DEFAULT_DIRS: OnceCell<DefaultDirs> = OnceCell::new();

#[derive(Debug, Deserialize, Serialize)]
pub struct DefaultDirs {
    pub config: PathBuf,
    pub data: PathBuf,
}
