// Adapters layer: concrete backends for the domain ports.

pub mod context;
pub mod local;
pub mod postgres;
pub mod s3;
