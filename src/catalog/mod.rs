//! Stream catalog module
//!
//! Immutable stream definitions, their selection flags and partitions. The
//! definitions are plain data; one generic engine interprets all of them.

mod loader;
mod partition;
mod types;

pub use loader::Catalog;
pub use partition::{Partition, PartitionConfig};
pub use types::{CatalogFile, StreamDefinition, StreamOverride};
