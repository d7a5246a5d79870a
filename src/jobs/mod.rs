//! Reference jobs built on the engine.

pub mod aggregate;
pub mod funnel;
pub mod keywords;
pub mod matrix;
pub mod retail;
pub mod similarity;
pub mod text;
