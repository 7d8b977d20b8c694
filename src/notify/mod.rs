//! Outbound user notifications.

pub mod email;

pub use email::ResetMailer;

/// Reset link as shown to the user; `base` is the frontend origin, if any.
pub fn reset_link(base: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", base.trim_end_matches('/'))
}
