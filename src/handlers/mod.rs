// src/handlers/mod.rs

pub mod certificates;
pub mod questions;
pub mod responses;
