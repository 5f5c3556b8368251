#![allow(dead_code)]

pub mod embedding;
pub mod filters;
pub mod search;

pub use embedding::QueryEmbeddingService;
pub use filters::infer_filters;
pub use search::Retriever;
