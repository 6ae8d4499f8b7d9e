//! Common utilities shared by every stage

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use cancel::{CancelToken, StageContext};
pub use error::{Error, Result, Stage};
