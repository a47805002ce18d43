//! In-process knowledge-graph backends for Magnet AI.
//!
//! [`InMemoryGraphStore`] implements the vector-search capability the
//! retrieval tools call into; [`InMemoryCatalog`] supplies per-graph
//! settings and prompt templates. Both can be populated from a
//! [`GraphFixture`].

pub mod catalog;
pub mod fixture;
pub mod store;
pub mod vector;

pub use catalog::InMemoryCatalog;
pub use fixture::{FixtureGraph, GraphFixture};
pub use store::{InMemoryGraphStore, StoredChunk, StoredDocument};
pub use vector::cosine_similarity;
