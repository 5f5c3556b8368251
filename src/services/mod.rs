#![allow(dead_code)]

pub mod curriculum;
pub mod embedding_provider;
pub mod llm_provider;
