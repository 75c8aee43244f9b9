// src/qst/producers/mod.rs
pub mod cap;
pub mod exec;
pub mod file;
pub mod position;
#[cfg(feature = "rss")]
pub mod rss;
pub mod text;
pub mod unavailable;
pub mod weather;
