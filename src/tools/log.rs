use std::str::FromStr;

use tracing::Level;

pub enum LogServiceType {
    Register,
    Database,
    Recognition,
    Identity,
    Other
}
impl LogServiceType {
    fn as_str(&self) -> &'static str {
        match self {
            LogServiceType::Register => "REGISTER",
            LogServiceType::Database => "DATABASE",
            LogServiceType::Recognition => "RECOGNITION",
            LogServiceType::Identity => "IDENTITY",
            LogServiceType::Other => "OTHER"
        }
    }
}

pub fn init_tracing(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

pub fn log_info(service: LogServiceType, message: String) {
    tracing::info!(service = service.as_str(), "{}", message)
}

pub fn log_warn(service: LogServiceType, message: String) {
    tracing::warn!(service = service.as_str(), "{}", message)
}

pub fn log_error(service: LogServiceType, message: String) {
    tracing::error!(service = service.as_str(), "{}", message)
}
