use std::fmt::Display;
use std::str::FromStr;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_CHANNEL_CAPACITY: usize = 32;
const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    /// Buffer of the server channel and of every connection channel.
    pub channel_capacity: usize,
    /// Largest WebSocket frame accepted from a client. Bootstrap snapshots
    /// carry the whole room history in one frame.
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("SKETCHROOM_BIND")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.into());
        let channel_capacity = parse_or(
            "SKETCHROOM_CHANNEL_CAPACITY",
            lookup("SKETCHROOM_CHANNEL_CAPACITY"),
            DEFAULT_CHANNEL_CAPACITY,
        );
        let max_frame_size = parse_or(
            "SKETCHROOM_MAX_FRAME_SIZE",
            lookup("SKETCHROOM_MAX_FRAME_SIZE"),
            DEFAULT_MAX_FRAME_SIZE,
        );
        Self {
            bind,
            // tokio channels panic on a zero buffer
            channel_capacity: if channel_capacity == 0 {
                log::warn!("SKETCHROOM_CHANNEL_CAPACITY must be positive, using default");
                DEFAULT_CHANNEL_CAPACITY
            } else {
                channel_capacity
            },
            max_frame_size: if max_frame_size == 0 {
                log::warn!("SKETCHROOM_MAX_FRAME_SIZE must be positive, using default");
                DEFAULT_MAX_FRAME_SIZE
            } else {
                max_frame_size
            },
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
{
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
