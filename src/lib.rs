// src/lib.rs

//! Content repository to search index synchronization library.

pub mod error;
pub mod extensions;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
