mod service;

pub use service::{NewReading, ReadingStore};
