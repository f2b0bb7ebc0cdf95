use dotenvy::dotenv;
use std::env;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    /// Unique name for this process instance; fan-out envelopes carry it so a
    /// process can recognize and skip its own broadcasts.
    pub instance_name: String,
    pub max_page_size: usize,
    /// Per-connection outbound buffer. Delivery drops events on a full buffer
    /// rather than blocking the publisher.
    pub connection_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let instance_name =
            env::var("INSTANCE_NAME").unwrap_or_else(|_| format!("instance-{}", Uuid::new_v4()));
        let max_page_size = env::var("MAX_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);
        if max_page_size == 0 {
            return Err(crate::error::AppError::Config(
                "MAX_PAGE_SIZE must be positive".into(),
            ));
        }
        let connection_buffer = env::var("CONNECTION_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64);
        if connection_buffer == 0 {
            return Err(crate::error::AppError::Config(
                "CONNECTION_BUFFER must be positive".into(),
            ));
        }

        Ok(Self {
            redis_url,
            instance_name,
            max_page_size,
            connection_buffer,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".into(),
            instance_name: format!("instance-{}", Uuid::new_v4()),
            max_page_size: 100,
            connection_buffer: 64,
        }
    }
}
