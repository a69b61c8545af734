//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod jobs;
pub mod kv;
pub mod mediacrawler;
pub mod sse;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use deps::ServerDeps;
pub use kv::{KeyValueStore, MemoryStore, RedisStore};
pub use mediacrawler::MediaCrawlerAdapter;
pub use stream_hub::StreamHub;
pub use test_dependencies::{FlakyStore, MockCrawler, TestDependencies};
pub use traits::*;
