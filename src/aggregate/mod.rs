mod service;
pub mod summary;

pub use service::AggregationService;
