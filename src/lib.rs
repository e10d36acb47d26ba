//! Single-threaded process supervisor and output-capture executor.
//!
//! The supervisor launches one distinguished *control* child, multiplexes the
//! stdout/stderr of that child and of every *job* child spawned on its behalf,
//! mirrors both streams to the filesystem, and keeps three CSV ledgers
//! (`invoked`, `running`, `finished`) in sync with the live set of children.

pub mod buffer;
pub mod error;
pub mod ledger;
pub mod paths;
pub mod pipe;
pub mod protocol;
pub mod run;
pub mod run_id;
pub mod run_kind;
pub mod run_table;
pub mod sample;
pub mod spawn;
pub mod supervisor;
pub mod timestamp;
pub mod util;

pub use error::Error;
pub use run_kind::RunKind;
pub use supervisor::Supervisor;
