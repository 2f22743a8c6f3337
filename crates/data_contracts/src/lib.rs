//! Shared data contracts for record shards, label tables, and run artifacts.

pub mod artifacts;
pub mod labels;
pub mod record;

pub use artifacts::{checkpoint_file_name, checkpoint_wildcard, prediction_file_name, Split};
pub use labels::{SubmissionRow, TestRow, TrainRow};
pub use record::{ExampleRecord, RecordError, RecordReader, RecordWriter};
