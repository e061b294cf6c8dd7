use once_cell::sync::Lazy;
use serde_derive::Deserialize;

pub static CONFIG: Lazy<Config> = Lazy::new(|| Config::new().expect("Config could not be loaded."));

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: log::Level,
}

#[derive(Debug, Deserialize)]
pub struct Map {
    pub zoom: u32,
    pub center: Center,
}

#[derive(Debug, Deserialize)]
pub struct Center {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct GeocoderConfig {
    pub endpoint: String,
    /// Required credential. Expected in config/local.toml.
    pub api_key: Option<String>,
    pub banner_on_reverse_failure: bool,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub map: Map,
    pub geocoder: GeocoderConfig,
}

impl Config {
    pub fn new() -> Result<Self, config::ConfigError> {
        let mut s = config::Config::new();

        // Start off by merging in the "default" configuration file
        s.merge(config::File::with_name("config/default"))?;

        // Add in a local configuration file
        // This file shouldn't be checked in to git
        s.merge(config::File::with_name("config/local").required(false))?;

        s.try_into()
    }
}
