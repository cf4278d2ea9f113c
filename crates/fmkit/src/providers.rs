pub mod base;
pub mod errors;
pub mod openai;
pub mod stream;
pub mod utils;

#[cfg(test)]
pub mod mock;
