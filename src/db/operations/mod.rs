#![allow(dead_code)]

pub mod chunks;
pub mod curriculum;
pub mod embeddings;
pub mod scores;
pub mod sessions;
