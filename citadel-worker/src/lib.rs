//! Background half of citadel: the execution engine, the feed sync pipeline,
//! the activity layer, the workflows, and the judgement engine.

pub mod activities;
pub mod engine;
pub mod fetch;
pub mod judge;
pub mod worker;
pub mod workflows;

pub use activities::Activities;
pub use worker::Worker;
pub use workflows::Workflows;
