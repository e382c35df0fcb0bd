//! Record processing: the concurrent fetch pool, the single-consumer report
//! pipeline and the orchestration that connects them.

pub mod fetch_pool;
pub(crate) mod lifecycle;
pub mod orchestrator;
pub mod pipeline;
pub mod substitute;
