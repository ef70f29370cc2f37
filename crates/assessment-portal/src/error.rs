use crate::config::ConfigError;
use crate::submissions::{BlobStoreError, RecordStoreError, ServiceError};
use crate::telemetry::TelemetryError;
use std::fmt;

/// Process-level failure surfaced by the binary's commands.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    RecordStore(RecordStoreError),
    BlobStore(BlobStoreError),
    Service(ServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::RecordStore(err) => write!(f, "record store error: {}", err),
            AppError::BlobStore(err) => write!(f, "blob store error: {}", err),
            AppError::Service(err) => write!(f, "assessment service error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::RecordStore(err) => Some(err),
            AppError::BlobStore(err) => Some(err),
            AppError::Service(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RecordStoreError> for AppError {
    fn from(value: RecordStoreError) -> Self {
        Self::RecordStore(value)
    }
}

impl From<BlobStoreError> for AppError {
    fn from(value: BlobStoreError) -> Self {
        Self::BlobStore(value)
    }
}

impl From<ServiceError> for AppError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}
