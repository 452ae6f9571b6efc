pub mod auth_cmd;
pub mod common;
pub mod config;
pub mod diary;
pub mod memo;
pub mod status;
pub mod sync;
