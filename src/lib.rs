//! Matchday - club community backend
//!
//! Single-tenant server for a sports club: event posts with an attendance
//! voting window, a scheduled auto-close engine with an operational fallback,
//! and an idempotent, audited moderation pipeline for member content.

pub mod api;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod autoclose;
pub mod comments;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod idempotency;
pub mod jobs;
pub mod members;
pub mod moderation;
pub mod posts;
pub mod push;
pub mod rbac;
pub mod rules;
pub mod server;
pub mod store;
pub mod time_policy;
pub mod vote;
