pub mod entry;
pub mod memory;
pub mod watchlist;

pub use entry::{Entry, EntryCreate, EntryUpdate, MediaKind};
pub use memory::MemoryNote;
pub use watchlist::{WatchlistCreate, WatchlistItem};
