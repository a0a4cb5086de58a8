pub mod rule;
pub mod run;
pub mod stats;
pub mod task;
