//! Runtime configuration read from the environment.
use crate::sink::LogOptions;

const DEFAULT_LINE_BUFFER_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for environment variable `{key}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("environment variable `LINE_BUFFER_SIZE` must be greater than zero")]
    ZeroBuffer,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to watch, `None` watches all namespaces (`NAMESPACE`).
    pub namespace: Option<String>,
    /// Prefix forwarded lines with kubelet timestamps (`LOG_TIMESTAMPS`).
    pub log_timestamps: bool,
    /// Historic lines replayed when a stream connects (`LOG_TAIL_LINES`).
    pub tail_lines: Option<i64>,
    /// Capacity of the channel between tails and the writer (`LINE_BUFFER_SIZE`).
    pub line_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            log_timestamps: false,
            tail_lines: None,
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let namespace = lookup("NAMESPACE").map(|value| value.trim().to_owned());
        let log_timestamps = lookup("LOG_TIMESTAMPS")
            .map(|value| parse("LOG_TIMESTAMPS", &value))
            .transpose()?
            .unwrap_or(false);
        let tail_lines = lookup("LOG_TAIL_LINES")
            .map(|value| parse::<u32>("LOG_TAIL_LINES", &value))
            .transpose()?
            .map(i64::from);
        let line_buffer_size = lookup("LINE_BUFFER_SIZE")
            .map(|value| parse("LINE_BUFFER_SIZE", &value))
            .transpose()?
            .unwrap_or(DEFAULT_LINE_BUFFER_SIZE);
        if line_buffer_size == 0 {
            return Err(Error::ZeroBuffer);
        }

        Ok(Self {
            namespace,
            log_timestamps,
            tail_lines,
            line_buffer_size,
        })
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            timestamps: self.log_timestamps,
            tail_lines: self.tail_lines,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidValue {
        key,
        value: value.to_owned(),
    })
}
