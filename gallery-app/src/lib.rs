pub mod app;
pub mod cache;
pub mod runner;
pub mod sync;
pub mod transcode;
pub mod upload;
pub mod view;
