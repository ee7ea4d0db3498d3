use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Runtime settings: built-in defaults, then an optional `ptt.toml` in the
/// working directory, then `PTT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub concurrency: usize,
    pub download_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub db_path: PathBuf,
    pub jsonl_dir: PathBuf,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("ptt").required(false))
                .add_source(Environment::with_prefix("PTT")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings = defaults(Config::builder())?
            .add_source(builder.build()?)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

fn defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(builder
        .set_default("base_url", "https://www.ptt.cc")?
        .set_default("concurrency", 16_i64)?
        .set_default("download_delay_ms", 400_i64)?
        .set_default("max_retries", 5_i64)?
        .set_default("request_timeout_secs", 30_i64)?
        .set_default(
            "user_agent",
            concat!("ptt_harvester/", env!("CARGO_PKG_VERSION")),
        )?
        .set_default("db_path", "data/ptt.sqlite")?
        .set_default("jsonl_dir", "data/jsonl")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let s = Settings::from_builder(Config::builder()).unwrap();
        assert_eq!(s.base_url, "https://www.ptt.cc");
        assert_eq!(s.concurrency, 16);
        assert_eq!(s.download_delay_ms, 400);
        assert_eq!(s.max_retries, 5);
        assert_eq!(s.db_path, PathBuf::from("data/ptt.sqlite"));
    }

    #[test]
    fn overrides_win() {
        let s = Settings::from_builder(
            Config::builder()
                .set_override("concurrency", 4_i64)
                .unwrap()
                .set_override("jsonl_dir", "/tmp/out")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(s.concurrency, 4);
        assert_eq!(s.jsonl_dir, PathBuf::from("/tmp/out"));
        assert_eq!(s.download_delay_ms, 400);
    }
}
