//! CMDB Core: domain models, repository traits and error types shared by
//! the persistence and engine crates.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{CmdbError, CmdbResult, ErrorKind};
