use beacon_core::config::ConfigError;
use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(ConfigError),
    #[error("Radio initialization failed")]
    Radio,
    #[error("WiFi controller initialization failed")]
    Wifi,
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}
