pub mod address;
pub mod matching;
pub mod stats_models;
