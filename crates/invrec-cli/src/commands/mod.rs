pub mod batch;
pub mod config;
pub mod import;
pub mod inspect;
pub mod output;
