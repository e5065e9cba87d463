// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound request path: scope check, throttle, execute

pub mod executor;
pub mod scope;
pub mod throttle;

pub use executor::{ProbeRequest, ProbeResponse, RequestExecutor, MAX_BODY_BYTES};
pub use scope::ScopeGuard;
pub use throttle::RateLimiter;
