use thiserror::Error;

/// 设备注册中心错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device already reserved: {0}")]
    AlreadyReserved(String),

    #[error("Device reserved by another holder: {0}")]
    NotHolder(String),

    #[error("Reservation holder must not be empty")]
    InvalidHolder,
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("QUIC connection error: {0}")]
    QuicError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
