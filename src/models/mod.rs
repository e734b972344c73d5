// src/models/mod.rs

pub mod certificate;
pub mod question;
pub mod response;
