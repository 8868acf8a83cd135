//! Crate version and User-Agent construction.

use sha2::{Digest, Sha256};

/// Current crate version.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the User-Agent string sent with every request.
pub fn build_user_agent(suffix: Option<&str>) -> String {
    let mut ua = format!(
        "clashroyale-rs/{} ({}; {})",
        SDK_VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    if let Some(s) = suffix {
        ua.push(' ');
        ua.push_str(s);
    }

    ua
}

/// Short SHA-256 fingerprint of a token, safe to put in logs.
pub(crate) fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..4])
}
