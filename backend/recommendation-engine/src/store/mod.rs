mod memory;
mod neo4j;
mod traits;

pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;
pub use traits::{MetadataStore, RatingStore, StoreError};

#[cfg(test)]
pub(crate) use traits::{MockMetadataStore, MockRatingStore};
