pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod guard;
pub mod llm;
pub mod model;
pub mod objects;
pub mod range;
pub mod report;
pub mod stats;
pub mod storage;
