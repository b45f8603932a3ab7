//! Asynchronous write failures

use thiserror::Error;

/// A write that failed after `write_point` returned.
///
/// Delivered on the sink's error channel; the affected points are lost.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The write buffer was full and the point was discarded
    #[error("write buffer full, dropped point of measurement '{measurement}'")]
    BufferFull { measurement: String },

    /// The writer has stopped and the point was discarded
    #[error("writer stopped, dropped point of measurement '{measurement}'")]
    Closed { measurement: String },

    /// The request never got a response
    #[error("transport error writing {points} points: {reason}")]
    Transport { points: usize, reason: String },

    /// The store answered with a non-success status
    #[error("store rejected {points} points with status {status}: {body}")]
    Rejected { points: usize, status: u16, body: String },

    /// Points that could not be encoded (no valid field)
    #[error("skipped {0} points without encodable fields")]
    Unencodable(usize),
}
