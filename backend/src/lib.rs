//! Certificate template rendering, variable binding, draft reconciliation and
//! export, plus the actix-web host exposing them.

pub mod config;
pub mod drafts;
pub mod error;
pub mod export;
pub mod job_controller;
pub mod render;
pub mod sample_data;
pub mod services;
pub mod variables;
