use thiserror::Error;

/// Failures crossing the remote-model boundary.
///
/// Each variant maps to one stage of a job's life, so callers can report
/// where a run died without parsing message strings.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The client is not usable yet (typically: no API key configured).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The initial submission was rejected or never reached the service.
    #[error("submission failed: {0}")]
    Submission(String),

    /// A poll round-trip failed, or the service reported the job as failed.
    #[error("poll failed: {0}")]
    Poll(String),

    /// The job finished but carried no retrievable result.
    #[error("generation finished but returned no result")]
    ResultMissing,

    /// Fetching the finished bytes failed.
    #[error("download failed: {0}")]
    Download(String),
}
