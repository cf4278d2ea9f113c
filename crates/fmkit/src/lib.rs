pub mod agent;
pub mod chunker;
pub mod config;
pub mod errors;
pub mod flows;
pub mod models;
pub mod profiles;
pub mod prompt_template;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod supervisor;
pub mod templates;
pub mod tools;
pub mod transcript;
