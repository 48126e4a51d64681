//! Collections Module
//!
//! Indexing structures used alongside the cache: a bijective map and a
//! two-level row/column table.

mod bimap;
mod table;


pub use bimap::BiMap;
pub use table::Table;
