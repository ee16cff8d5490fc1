// src/lib.rs
pub mod blocking;
pub mod error;
pub mod evaluation;
pub mod external;
pub mod io;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod rl;
pub mod utils;

pub use error::LinkageError;
pub use pipeline::run_linkage;
