pub mod error;
pub mod file_config;
pub mod git;
pub mod icons;
pub mod jsonl_log;
