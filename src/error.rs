//! Error taxonomy for the supervisor core.
//!
//! Fatal setup failures (fork, pipe creation, the readiness primitive itself
//! failing) are distinguished from per-run failures that the loop is expected
//! to absorb and log.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("fork() failed")]
    Fork {
        #[source]
        cause: nix::Error,
    },

    #[error("pipe() failed")]
    Pipe {
        #[source]
        cause: nix::Error,
    },

    #[error("select() failed")]
    Select {
        #[source]
        cause: nix::Error,
    },

    #[error("io error")]
    Io {
        #[from]
        cause: std::io::Error,
    },

    #[error("run table is full ({max} runs already live)")]
    TableFull { max: usize },
}

impl From<nix::Error> for Error {
    fn from(cause: nix::Error) -> Self {
        Error::Io {
            cause: std::io::Error::from_raw_os_error(cause as i32),
        }
    }
}
