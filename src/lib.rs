pub mod config;
pub mod fakes;
pub mod gemini;
pub mod git;
pub mod pipeline;
pub mod scheduler;
pub mod stages;
