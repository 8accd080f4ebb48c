//! Tenant-aware API gateway for the AKLOW business assistant.
//!
//! The browser app talks only to this service. It verifies the caller's
//! session, forwards to the orchestrator, agent and Python backends with
//! service-to-service headers, and relays what comes back. A few concerns
//! live here directly: shared chat snapshots, per-user preferences, mocked
//! OAuth connections, and the OpenAI voice and ChatKit calls.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod models;
pub mod openai;
pub mod share;
pub mod upstream;
