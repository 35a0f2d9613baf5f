//! Sideload Client
//!
//! Blocking client library for JSON:API services secured by OAuth2
//! client-credentials. It authenticates on construction, issues HTTP calls,
//! transparently refreshes an expired bearer token, and decodes JSON:API's
//! normalized `data` + `included` response shape into flat, denormalized
//! entities.
//!
//! # Overview
//!
//! A JSON:API response references related entities by type and id, with the
//! full representations sideloaded once in an `included` array. This crate
//! turns that shape back into self-contained objects:
//!
//! 1. `included` is grouped by entity type, keyed by id
//! 2. Each primary `data` row starts from its attributes plus its id
//! 3. Every relationship resolves recursively against the sideloaded set,
//!    nesting the resolved entity (or an ordered list of them) under the
//!    relationship name
//!
//! References whose target was not sideloaded resolve to an id-only stub;
//! reference cycles terminate at the first repeated entity on a resolution
//! path.
//!
//! # Usage
//!
//! ```ignore
//! use sideload_client::{ApiClient, ClientConfig, IndexingBehavior, sync_chunks};
//! use serde_json::json;
//!
//! // Connecting performs the credential exchange immediately; a failed
//! // exchange fails construction.
//! let client = ApiClient::connect(ClientConfig::new(
//!     "https://shop.example",
//!     "my-client-id",
//!     "my-client-secret",
//! ))?;
//!
//! // Fetch and flatten a JSON:API collection
//! let products = client.fetch_flattened("product")?;
//!
//! // Push a large batch in chunks
//! let operations: Vec<serde_json::Value> = // build your sync operations
//! # vec![];
//! for chunk in sync_chunks(&operations, 100)? {
//!     client.sync_call(json!(chunk), Some(IndexingBehavior::UseQueueIndexing))?;
//! }
//! ```

pub mod chunk;
pub mod client;
pub mod denormalize;
pub mod document;
pub mod error;
pub mod id;
pub mod transport;

// Re-export main types for convenience
pub use crate::chunk::sync_chunks;
pub use crate::client::{ApiClient, ClientConfig, IndexingBehavior};
pub use crate::denormalize::{
    denormalize, denormalize_value, group_included, FlatEntity, IncludedIndex,
};
pub use crate::document::{Document, EntityRef, ResourceObject};
pub use crate::error::ApiError;
pub use crate::id::generate_entity_id;
pub use crate::transport::{Body, HttpTransport, Method, Request, Response, ReqwestTransport};
