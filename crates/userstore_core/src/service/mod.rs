//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep CLI and other outer layers decoupled from storage details.

pub mod user_service;
