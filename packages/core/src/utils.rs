// ABOUTME: Shared utility functions for Agentbay
// ABOUTME: Identifier generation and shared-secret verification

use subtle::ConstantTimeEq;

/// Generate a unique record ID (hyphenated UUID v4)
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Compare a presented secret with the configured one in constant time.
/// An empty configured secret never matches.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
