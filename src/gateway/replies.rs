//! Fixed user-facing replies
//!
//! These strings are all a chat surface ever sees when something goes wrong.
//! They carry no internal detail.

use crate::core::error::UpstreamError;

pub const OWNER_DENIED: &str =
    "Even the owner can't get that one through. The request matches a blocked pattern.";
pub const BANNED: &str = "You are temporarily blocked from using the assistant.";
pub const WARNING: &str =
    "That request goes against the usage rules. Repeated attempts will lead to a temporary block.";

pub const RATE_LIMITED: &str = "The assistant is busy right now. Please try again in a minute.";
pub const UNAVAILABLE: &str =
    "The assistant service is temporarily unavailable. Please try again shortly.";
pub const TIMEOUT: &str = "The assistant took too long to answer. Please try again.";
pub const CONNECTION: &str = "Could not reach the assistant service. Please try again later.";
pub const MISCONFIGURED: &str =
    "The assistant is not configured correctly. Please contact an administrator.";
pub const EMPTY_RESPONSE: &str =
    "The assistant returned an empty answer. Please rephrase or try again.";
pub const GENERIC: &str = "Something went wrong while answering. Please try again later.";

pub fn for_upstream_error(err: &UpstreamError) -> &'static str {
    match err {
        UpstreamError::RateLimited => RATE_LIMITED,
        UpstreamError::Unavailable(_) => UNAVAILABLE,
        UpstreamError::Timeout(_) => TIMEOUT,
        UpstreamError::ConnectionRefused => CONNECTION,
        UpstreamError::Authentication(_) => MISCONFIGURED,
        UpstreamError::EmptyResponse => EMPTY_RESPONSE,
        UpstreamError::Rejected { .. } | UpstreamError::Transport(_) => GENERIC,
    }
}
