//! Embedding providers. The hashed embedder is the guaranteed in-process
//! provider; the ONNX provider is selected when a local model is installed.

mod hashed;
mod onnx;

pub use hashed::HashedEmbedder;
pub use onnx::OnnxEmbedder;
