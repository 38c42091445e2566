mod service;

pub use service::DeviceDirectory;
