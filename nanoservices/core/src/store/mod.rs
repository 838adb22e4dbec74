pub mod db;

pub use db::{PipelineRunRow, RunSummary, StageRunRow, Store};
