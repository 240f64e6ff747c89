pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{context::TransferContext, local::LocalStorage, postgres::PostgresStore, s3::S3Storage};
pub use config::descriptor::{LocationOverride, LocationSpec, ResolvedLocation, TransferDescriptor};
pub use config::job::{JobConfig, TransferJob};
pub use core::{engine::TransferEngine, pipeline::TransferPipeline};
pub use domain::model::{Format, Record, RecordSet, TableRef, TransformPolicy};
pub use utils::error::{ErrorKind, Result, TransferError};
