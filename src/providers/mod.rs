//! HTTP clients for the external model services

mod openai;
mod rerank;

pub use openai::{OpenAiChatClient, OpenAiClassifier, OpenAiRewriteProvider};
pub use rerank::HttpReranker;
