pub mod common;
pub mod configuration;
pub mod error;
pub mod jobs;
pub mod map_reduce_seq;
pub mod mr_parallel;
pub mod pipeline;
pub mod shuffle;
pub mod step;
pub mod telemetry;

pub use common::{
    record_stream, Combiner, FnMapper, FnReducer, GroupedEntry, JobOutput, JobReport, Key,
    MapReduce, Mapper, RecordStream, Reducer, Scheduler, StepReport,
};
pub use error::{MalformedRecord, MrError};
pub use map_reduce_seq::{Sequential, SequentialMapReduce};
pub use mr_parallel::ParallelMapReduce;
pub use pipeline::{Pipeline, Stage};
pub use step::{NoCombiner, Passthrough, Step};
