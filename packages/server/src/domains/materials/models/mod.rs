pub mod job;
pub mod search;

pub use job::{MaterialsJobData, MaterialsJobResult};
pub use search::{JobResultView, JobStatusView, SearchQuery, SearchResponse};
