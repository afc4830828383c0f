use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A failed OS counter query. Samplers degrade these to zero/empty values
/// for the current cycle; they never reach the caller.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{call} returned kern_return_t {code}")]
    Kernel { call: &'static str, code: i32 },

    #[error("{name} query failed: {source}")]
    Sysctl {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {}: {detail}", .path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("unexpected counter buffer size: got {actual}, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("counter queries are not supported on {0}")]
    Unsupported(&'static str),
}
