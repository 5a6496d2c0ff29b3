//! Error types for the allow-list reconciler.

use thiserror::Error;

/// Error raised by the engine executor (the routing-engine command channel).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The underlying process could not be spawned or communicated with.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The engine rejected a command batch.
    #[error("engine rejected command batch: {0}")]
    Rejected(String),
    /// The engine's stdout could not be decoded as UTF-8.
    #[error("engine produced non-UTF8 output")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Error raised while allocating a route-map sequence number.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    /// No free sequence number remains in the required band.
    #[error("no free route-map sequence number in the {0} band")]
    SequenceSpaceExhausted(&'static str),
}

/// Error raised while validating an incoming configuration-database event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidEvent {
    /// The event key did not match `DEPLOYMENT_ID|<id>[|<community>]`.
    #[error("malformed key: {0}")]
    MalformedKey(String),
    /// A `SET` carried neither `prefixes_v4` nor `prefixes_v6`, or both were empty.
    #[error("SET for {0} carries no prefixes")]
    NoPrefixes(String),
    /// A prefix failed to validate under its declared family.
    #[error("invalid {family} prefix `{prefix}` for {key}")]
    InvalidPrefix {
        /// The event key this prefix belongs to.
        key: String,
        /// `ipv4` or `ipv6`.
        family: &'static str,
        /// The offending text.
        prefix: String,
    },
}

/// Top-level error, used where a caller needs one type spanning the whole pipeline.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// See [`InvalidEvent`].
    #[error(transparent)]
    InvalidEvent(#[from] InvalidEvent),
    /// See [`SequenceError`].
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// See [`EngineError`].
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The feature is disabled in constants; the event was ignored.
    #[error("bgp allow-list feature is disabled")]
    FeatureDisabled,
}
