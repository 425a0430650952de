//! The public windowed store and its range iterator.

mod iterator;
mod store;

pub use iterator::WindowStoreIter;
pub use store::WindowStore;
