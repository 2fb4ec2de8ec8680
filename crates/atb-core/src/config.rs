use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::UserId, errors::Error, sync::DEFAULT_RELEASE_DELAY, Result};

/// Typed runtime configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_proxy_url: Option<String>,
    pub owner_id: UserId,
    pub start_command: String,

    // Storage
    pub blacklist_database: PathBuf,
    pub gpt_database: PathBuf,

    // GPT proxy
    pub gpt_proxy_port: u16,
    pub gpt_timeout: Duration,

    // Dispatch
    pub button_lock_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let owner_id = env_i64("BOT_OWNER_ID").map(UserId).ok_or_else(|| {
            Error::Config("BOT_OWNER_ID environment variable is required".to_string())
        })?;

        let telegram_proxy_url = env_str("TELEGRAM_PROXY_URL").and_then(non_empty);
        let start_command = env_str("START_COMMAND")
            .and_then(non_empty)
            .unwrap_or_else(|| "start".to_string());

        let blacklist_database = env_path("BLACKLIST_DATABASE")
            .unwrap_or_else(|| PathBuf::from("data/blacklist.db"));
        let gpt_database =
            env_path("GPT_DATABASE").unwrap_or_else(|| PathBuf::from("data/gpt.db"));

        let gpt_proxy_port = env_u16("GPT_PROXY_PORT").unwrap_or(8000);
        let gpt_timeout = Duration::from_secs(env_u64("GPT_PROXY_TIMEOUT_SECS").unwrap_or(120));

        let button_lock_delay = env_u64("BUTTON_LOCK_DELAY_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RELEASE_DELAY);

        Ok(Self {
            telegram_bot_token,
            telegram_proxy_url,
            owner_id,
            start_command,
            blacklist_database,
            gpt_database,
            gpt_proxy_port,
            gpt_timeout,
            button_lock_delay,
        })
    }

    pub fn gpt_proxy_base(&self) -> String {
        format!("http://127.0.0.1:{}", self.gpt_proxy_port)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}
