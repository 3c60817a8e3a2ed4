use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use models::Result;
use serde::{Deserialize, Deserializer};
use twilight_model::id::{marker::ChannelMarker, Id};

const CONFIG_FILES: [&str; 3] = ["config.yaml", "config.yml", "config.json"];
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5436";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "Token")]
    pub token: String,
    #[serde(alias = "authToken", alias = "AuthToken", alias = "authtoken")]
    pub auth_token: String,
    #[serde(
        alias = "mainChannelId",
        alias = "mainChannelID",
        alias = "MainChannelID",
        alias = "mainchannelid",
        deserialize_with = "string_or_number"
    )]
    pub main_channel_id: String,
    #[serde(alias = "listenAddr")]
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            auth_token: String::new(),
            main_channel_id: String::new(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl Config {
    /// Reads the config file (if any) and applies environment overrides.
    pub fn load() -> Config {
        Config::load_from(config_path().as_deref(), |key| env::var(key).ok())
    }

    /// A missing or broken file leaves the defaults in place.
    pub fn load_from(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Config {
        let mut config = match path {
            Some(path) => Config::from_file(path).unwrap_or_else(|e| {
                log::error!("Unable to read config {}: {}", path.display(), e);
                Config::default()
            }),
            None => {
                log::debug!("No config file found, using defaults");
                Config::default()
            }
        };
        config.apply_env(lookup);
        config
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        Config::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Config> {
        // JSON is valid YAML, so one parser covers both file types.
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.token = token;
        }
        if let Some(auth_token) = lookup("WEBHOOK_AUTH_TOKEN") {
            self.auth_token = auth_token;
        }
        if let Some(channel_id) = lookup("DISCORD_CHANNEL_ID") {
            self.main_channel_id = channel_id;
        }
        if let Some(addr) = lookup("WEBHOOK_ADDR") {
            self.listen_addr = addr;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err("No token provided. Please check your config file for a token".into());
        }
        if self.auth_token.is_empty() {
            log::warn!("No webhook auth token set, any \"Bearer \" header will be accepted");
        }
        if self.channel_id().is_none() {
            log::warn!(
                "Main channel id {:?} is not a valid Discord id, build notifications will be dropped",
                self.main_channel_id
            );
        }
        Ok(())
    }

    pub fn channel_id(&self) -> Option<Id<ChannelMarker>> {
        self.main_channel_id
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(Id::new_checked)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }

    CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

// Snowflakes are often written unquoted in YAML/JSON.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
