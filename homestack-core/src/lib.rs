pub mod backup;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod process;
pub mod report;
pub mod schedule;
pub mod storage;
pub mod workload;

pub use error::{Result, StackError};
