use std::path::PathBuf;

use clap::Parser;
use poolctl_core::LogPager;

use crate::token_store::{FileTokenStore, TOKEN_KEY};

#[derive(Debug, Parser)]
#[command(name = "poolctl", about = "Admin console for the key pool proxy")]
pub struct CliConfig {
    /// Backend base URL
    #[arg(long, env = "POOLCTL_SERVER_URL", default_value = "http://127.0.0.1:8000")]
    pub server_url: String,

    /// Where the session token is kept between runs
    #[arg(long, env = "POOLCTL_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Log output. The terminal is owned by the UI, so logs go to a file.
    #[arg(long, env = "POOLCTL_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Rows per log page (20, 50, 100 or 200)
    #[arg(long, env = "POOLCTL_PAGE_SIZE", default_value_t = LogPager::DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

impl CliConfig {
    /// Falls back to the working directory on platforms without a data dir.
    pub fn token_path(&self) -> PathBuf {
        self.token_file
            .clone()
            .or_else(FileTokenStore::default_path)
            .unwrap_or_else(|| PathBuf::from(TOKEN_KEY))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("poolctl")
                .join("poolctl.log")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CliConfig::parse_from(["poolctl"]);
        assert_eq!(config.server_url, "http://127.0.0.1:8000");
        assert_eq!(config.page_size, 50);
        assert!(config.log_path().ends_with("poolctl/poolctl.log"));
    }

    #[test]
    fn explicit_paths_win() {
        let config = CliConfig::parse_from([
            "poolctl",
            "--server-url",
            "http://pool.internal:9000",
            "--token-file",
            "/tmp/tok",
            "--page-size",
            "100",
        ]);
        assert_eq!(config.server_url, "http://pool.internal:9000");
        assert_eq!(config.token_path(), PathBuf::from("/tmp/tok"));
        assert_eq!(config.page_size, 100);
    }
}
