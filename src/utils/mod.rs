// src/utils/mod.rs

pub mod archive;
pub mod file_ext;
pub mod multipart;
pub mod slug;
pub mod storage;
