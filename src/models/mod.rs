// src/models/mod.rs

pub mod user;
pub mod session;
pub mod task;
pub mod checklist;
pub mod fms;
pub mod notification;
pub mod request;
