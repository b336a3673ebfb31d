pub mod gallery;
pub mod generation;
pub mod job;
pub mod options;
