//! # Infrastructure Layer
//!
//! Concrete collaborators for the Domain traits: project store, host
//! sandbox, search client, preview bus, plus logging setup.

pub mod logging;
pub mod memory_store;
pub mod preview;
pub mod search;
pub mod tools;

pub use memory_store::MemoryFileStore;
pub use preview::PreviewBus;
pub use search::HttpSearchClient;
pub use tools::LocalSandbox;
