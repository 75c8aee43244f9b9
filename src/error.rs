// src/error.rs

/// Configuration-level failures. Fetch failures never surface here; producers
/// report those through `anyhow` and the source boundary turns them into
/// "no data this cycle".
#[derive(Debug, thiserror::Error)]
pub enum QstError {
    #[error("unknown QST type '{0}'")]
    UnknownType(String),

    #[error("QST type '{0}' is not available in this build")]
    Unavailable(String),

    #[error("invalid QST frequency '{0}' (expected minutes like \"60\" or \":MM\")")]
    BadFrequency(String),

    #[error("no QST entry named '{0}'")]
    UnknownEntry(String),
}
