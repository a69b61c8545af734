// Materials discovery pipeline - API core
//
// Drives an external browser-automation crawler through durable background
// jobs, caches finished results, and streams job progress to clients.
//
// The job handler and facade live in domains/materials; queue, worker, store
// and SSE plumbing live in kernel/.

pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
