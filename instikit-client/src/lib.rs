//! InstiKit Client - The outbound request pipeline
//!
//! Every call to the institute API passes through [`ApiClient`], which owns
//! three cross-cutting policies so call sites never see them:
//!
//! - bearer-credential attachment from the shared [`AuthHandle`],
//! - global session teardown on credential expiry (once per session
//!   generation, no matter how many in-flight requests report it),
//! - bounded exponential backoff on server-side throttling.
//!
//! The backoff schedule itself is a pure function in [`backoff`], so the
//! retry arithmetic is testable without a transport or a clock.

pub mod auth;
pub mod backoff;
pub mod endpoints;
pub mod pipeline;

pub use auth::AuthHandle;
pub use backoff::RetryPolicy;
pub use endpoints::{AuthApi, LoginData, LoginRequest, ProfileUpdate};
pub use pipeline::ApiClient;
