// src/models/mod.rs
pub mod chat;
pub mod dataset;
