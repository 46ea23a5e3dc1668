use thiserror::Error;

/// A fetched object failed its structural or value invariants.
///
/// Schema failures are never retried: refetching will not repair malformed data.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("listenAddresses must contain at least one address")]
    EmptyListenAddresses,

    #[error("identity URI {uri:?} must start with {prefix:?} and be longer than {min_len} characters")]
    InvalidIdentityUri {
        uri: String,
        prefix: &'static str,
        min_len: usize,
    },

    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("timestamp {0} is not within a reasonable range")]
    TimestampOutOfRange(i64),

    #[error("payload is not valid base64 text: {0}")]
    InvalidPayload(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
