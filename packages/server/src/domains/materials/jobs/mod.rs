pub mod crawl;
pub mod resolve;

pub use crawl::CrawlJobHandler;
pub use resolve::{resolve_output_for_job, ResolvedOutput};
