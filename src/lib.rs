// src/lib.rs
pub mod embedding;
pub mod matching;
pub mod models;
pub mod store;
pub mod utils;
pub mod validator;
