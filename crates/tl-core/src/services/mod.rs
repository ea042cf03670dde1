pub mod config_loader;
pub mod definition;
pub mod graph;
pub mod launcher;
pub mod runtime;
pub mod topology;
