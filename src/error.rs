use thiserror::Error;

/// Crate-wide error type. Variants mirror the domain error kinds the wire
/// layer (out of scope here) maps to HTTP status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("queue does not exist: {0}")]
    QueueDoesNotExist(String),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("move task not found: {0}")]
    MoveTaskNotFound(String),

    #[error("queue already exists with different attributes: {0}")]
    QueueNameExists(String),

    #[error("queue was deleted recently: {0}")]
    QueueDeletedRecently(String),

    #[error("receipt handle is invalid")]
    ReceiptHandleIsInvalid,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("message too large: {0} bytes exceeds the 1,048,576 byte limit")]
    MessageTooLarge(usize),

    #[error("batch request too long: {0} bytes exceeds the 262,144 byte limit")]
    BatchRequestTooLong(usize),

    #[error("too many entries in batch request: {0}")]
    TooManyEntriesInBatchRequest(usize),

    #[error("batch request is empty")]
    EmptyBatchRequest,

    #[error("batch entry ids are not distinct")]
    BatchEntryIdsNotDistinct,

    #[error("invalid batch entry id: {0}")]
    InvalidBatchEntryId(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("purge queue already in progress")]
    PurgeQueueInProgress,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl BusError {
    /// HTTP status an external wire-protocol front end would map this to (§6/§7).
    pub fn status_code(&self) -> u16 {
        match self {
            BusError::QueueDoesNotExist(_)
            | BusError::TopicNotFound(_)
            | BusError::SubscriptionNotFound(_)
            | BusError::MoveTaskNotFound(_) => 400,
            BusError::QueueNameExists(_)
            | BusError::QueueDeletedRecently(_)
            | BusError::PurgeQueueInProgress => 409,
            BusError::ReceiptHandleIsInvalid
            | BusError::InvalidParameter(_)
            | BusError::MessageTooLarge(_)
            | BusError::BatchRequestTooLong(_)
            | BusError::TooManyEntriesInBatchRequest(_)
            | BusError::EmptyBatchRequest
            | BusError::BatchEntryIdsNotDistinct
            | BusError::InvalidBatchEntryId(_)
            | BusError::UnsupportedOperation(_) => 400,
            BusError::InternalError(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BusError::QueueDoesNotExist(_) => "QueueDoesNotExist",
            BusError::TopicNotFound(_) => "TopicNotFound",
            BusError::SubscriptionNotFound(_) => "SubscriptionNotFound",
            BusError::MoveTaskNotFound(_) => "MoveTaskNotFound",
            BusError::QueueNameExists(_) => "QueueNameExists",
            BusError::QueueDeletedRecently(_) => "QueueDeletedRecently",
            BusError::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            BusError::InvalidParameter(_) => "InvalidParameter",
            BusError::MessageTooLarge(_) => "MessageTooLarge",
            BusError::BatchRequestTooLong(_) => "BatchRequestTooLong",
            BusError::TooManyEntriesInBatchRequest(_) => "TooManyEntriesInBatchRequest",
            BusError::EmptyBatchRequest => "EmptyBatchRequest",
            BusError::BatchEntryIdsNotDistinct => "BatchEntryIdsNotDistinct",
            BusError::InvalidBatchEntryId(_) => "InvalidBatchEntryId",
            BusError::UnsupportedOperation(_) => "UnsupportedOperation",
            BusError::PurgeQueueInProgress => "PurgeQueueInProgress",
            BusError::InternalError(_) => "InternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::InvalidParameter(e.to_string())
    }
}
