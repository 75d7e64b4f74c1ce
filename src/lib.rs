pub mod app;
pub mod assets;
pub mod camera;
pub mod cli;
pub mod config;
pub mod grid;
pub mod ingest;
pub mod input;
pub mod instance;
pub mod session;

pub use app::{run, App};
