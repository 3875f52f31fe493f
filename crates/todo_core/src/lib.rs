pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod presenter;
pub mod repository;
pub mod storage;
pub mod view_model;
