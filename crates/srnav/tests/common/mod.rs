//! Common test utilities for srnav integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated home directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".srnav");
        Ok(Self { temp_dir, data_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// srnav with HOME pointed at the temp dir
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_srnav"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Config with a key and a façade address nothing listens on
    pub fn create_config(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let config = r#"{
  "providers": { "openrouter": { "api_key": "sk-or-test" } },
  "navigator": { "model": "test/model", "max_steps": 7, "settle_delay_ms": 0 },
  "screen_reader": { "base_url": "http://127.0.0.1:9", "timeout_secs": 2 }
}"#;
        std::fs::write(self.config_file(), config)?;
        Ok(())
    }
}
