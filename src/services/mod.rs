pub mod assets;
pub mod gallery;
pub mod job_store;
pub mod materialize;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
