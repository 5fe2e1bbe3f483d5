mod index_list;
mod lru_cache;

pub use index_list::{IndexList, IndexListIter};
pub use lru_cache::{LruCache, SmallKeyLruCache};
