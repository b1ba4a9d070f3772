//! Query modules, one per concern: crud, search, embeddings,
//! conversations, maintenance.

pub mod conversation_ops;
pub mod embedding_ops;
pub mod maintenance;
pub mod memory_crud;
pub mod memory_search;
