pub mod codec;
pub mod engine;
pub mod pipeline;

pub use crate::domain::model::{Format, Record, RecordSet, TableRef, TransformPolicy};
pub use crate::domain::ports::{Backends, IngestMode, RelationalStore, Storage};
pub use crate::utils::error::Result;
