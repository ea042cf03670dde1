pub mod app;
pub mod event;
pub mod keys;
pub mod report;
pub mod ui;
