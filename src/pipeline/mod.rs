//! External tool stages: build, merge, report
//!
//! Each stage renders its configured command line, runs it to completion and
//! turns a non-zero exit status into a typed error.

pub mod build;
pub mod image;
pub mod layout;
pub mod report;
pub mod tool;

pub use build::{build, BuildTarget};
pub use image::compose;
pub use layout::{FlashImageLayout, Segment};
