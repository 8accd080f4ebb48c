//! Domain models for the AKLOW gateway.
//!
//! Most traffic is relayed untouched, so the gateway models only what it
//! owns itself:
//!
//! - [`SharedSnapshot`]: ephemeral, in-process copies of a chat shared by link.
//! - [`AutopilotSettings`] and [`RecentCommand`]: per-user preferences.
//! - [`IntegrationConnection`]: a tenant's (mocked) OAuth connection to a provider.

mod integration;
mod preferences;
mod share;

pub use integration::*;
pub use preferences::*;
pub use share::*;
