//! Store abstractions used by the import pipeline
//!
//! The pipeline only needs two capabilities from persistence: bounded
//! membership queries over the team roster, and bounded atomic write groups
//! for operations. [`RosterStore`] and [`OperationStore`] describe exactly that,
//! so the SQLite [`crate::database::Database`] and the [`InMemoryStore`] used in
//! tests are interchangeable.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryStore;
pub use traits::*;
