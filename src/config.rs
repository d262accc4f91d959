/// Configuration management for the Matchday club server
use crate::error::{ClubError, ClubResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub vote: VoteConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Identifier of the club this deployment serves. Threaded through every
    /// entry point explicitly; there is no module-level club constant.
    pub club_id: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub club_db: PathBuf,
}

/// Vote lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteConfig {
    /// Seconds between scheduled auto-close runs
    pub close_interval_secs: u64,
    /// Maximum events selected per indexed run
    pub selection_cap: usize,
    /// Documents per atomic batch chunk
    pub batch_chunk_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ClubResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("CLUB_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("CLUB_PORT")
            .unwrap_or_else(|_| "8300".to_string())
            .parse()
            .map_err(|_| ClubError::Validation("Invalid port number".to_string()))?;

        let club_id = env::var("CLUB_ID")
            .map_err(|_| ClubError::Validation("CLUB_ID is required".to_string()))?;

        let data_directory: PathBuf = env::var("CLUB_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let club_db = env::var("CLUB_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("club.sqlite"));

        let close_interval_secs = env::var("CLUB_VOTE_CLOSE_INTERVAL_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .unwrap_or(600);
        let selection_cap = env::var("CLUB_VOTE_SELECTION_CAP")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .unwrap_or(200);
        let batch_chunk_size = env::var("CLUB_VOTE_BATCH_CHUNK_SIZE")
            .unwrap_or_else(|_| "400".to_string())
            .parse()
            .unwrap_or(400);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(AppConfig {
            service: ServiceConfig {
                hostname,
                port,
                club_id,
            },
            storage: StorageConfig {
                data_directory,
                club_db,
            },
            vote: VoteConfig {
                close_interval_secs,
                selection_cap,
                batch_chunk_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ClubResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ClubError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.service.club_id.is_empty() {
            return Err(ClubError::Validation("Club id cannot be empty".to_string()));
        }

        if self.vote.batch_chunk_size == 0 || self.vote.selection_cap == 0 {
            return Err(ClubError::Validation(
                "Vote batch sizes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8300,
                club_id: "fc-riverside".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                club_db: "./data/club.sqlite".into(),
            },
            vote: VoteConfig {
                close_interval_secs: 600,
                selection_cap: 200,
                batch_chunk_size: 400,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_club_id() {
        let mut config = sample();
        config.service.club_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut config = sample();
        config.vote.batch_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
