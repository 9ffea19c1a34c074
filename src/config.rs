use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Consumer configuration
    pub consumer_partitions: usize,
    pub consumer_queue_capacity: usize,
    pub handler_timeout_ms: u64,
    pub max_redeliveries: u32,
    pub redelivery_backoff_ms: u64,

    // Comment settings
    pub comment_delete_max_retries: u32,

    // Hot article ranking
    pub hot_article_limit: usize,
    pub hot_article_retention_days: i64,
    pub counter_cleanup_interval_secs: u64,

    // Id generation
    pub snowflake_node_id: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "rainbow_board_sync=debug,tower_http=debug".to_string()),

            consumer_partitions: env::var("CONSUMER_PARTITIONS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,
            consumer_queue_capacity: env::var("CONSUMER_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()?,
            handler_timeout_ms: env::var("HANDLER_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            max_redeliveries: env::var("MAX_REDELIVERIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            redelivery_backoff_ms: env::var("REDELIVERY_BACKOFF_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            comment_delete_max_retries: env::var("COMMENT_DELETE_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            hot_article_limit: env::var("HOT_ARTICLE_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            hot_article_retention_days: env::var("HOT_ARTICLE_RETENTION_DAYS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            counter_cleanup_interval_secs: env::var("COUNTER_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,

            snowflake_node_id: env::var("SNOWFLAKE_NODE_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
        })
    }

    pub fn handler_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "rainbow_board_sync=debug,tower_http=debug".to_string(),
            consumer_partitions: 4,
            consumer_queue_capacity: 1024,
            handler_timeout_ms: 3000,
            max_redeliveries: 3,
            redelivery_backoff_ms: 100,
            comment_delete_max_retries: 3,
            hot_article_limit: 10,
            hot_article_retention_days: 10,
            counter_cleanup_interval_secs: 300,
            snowflake_node_id: 1,
        }
    }
}
