use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("room is full")]
    RoomFull,

    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("operation {0} is already in the requested state")]
    WrongState(String),

    #[error("import room id {imported} does not match target room {target}")]
    RoomMismatch { imported: String, target: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
