//! Prometheus metrics for token issuance and key management.
//!
//! Provides counters and histograms for observability.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};
use std::time::Duration;

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_tokens_issued_total",
        "Total number of access tokens issued",
        &["algorithm"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Issuance failures counter.
pub static ISSUANCE_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_issuance_failures_total",
        "Total number of failed token issuances",
        &["reason"]
    )
    .expect("Failed to register issuance_failures metric")
});

/// Key rotations counter.
pub static KEY_ROTATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_key_rotations_total",
        "Total number of committed signing key rotations",
        &["trigger"]
    )
    .expect("Failed to register key_rotations metric")
});

/// Credential cache lookups counter.
pub static CREDENTIAL_CACHE: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_issuer_credential_cache_total",
        "Total number of credential cache lookups",
        &["cache", "result"]
    )
    .expect("Failed to register credential_cache metric")
});

/// RSA key generation latency.
pub static KEY_GENERATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "token_issuer_key_generation_seconds",
        "RSA signing key generation latency in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register key_generation metric")
});

/// Record a token issuance.
pub fn record_token_issued(algorithm: &str) {
    TOKENS_ISSUED.with_label_values(&[algorithm]).inc();
}

/// Record a failed issuance.
pub fn record_issuance_failure(reason: &str) {
    ISSUANCE_FAILURES.with_label_values(&[reason]).inc();
}

/// Record a committed key rotation.
pub fn record_key_rotation(trigger: &str) {
    KEY_ROTATIONS.with_label_values(&[trigger]).inc();
}

/// Record a cache lookup.
pub fn record_cache_lookup(cache: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CREDENTIAL_CACHE.with_label_values(&[cache, result]).inc();
}

/// Record RSA key generation latency.
pub fn observe_key_generation(elapsed: Duration) {
    KEY_GENERATION_SECONDS.observe(elapsed.as_secs_f64());
}

/// Render every registered metric in the text exposition format.
#[must_use]
pub fn gather() -> String {
    let mut buffer = Vec::new();
    if TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .is_err()
    {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_gather() {
        record_token_issued("RS256");
        record_issuance_failure("claim_conflict");
        record_key_rotation("no_active_key");
        record_cache_lookup("public-keys", false);
        observe_key_generation(Duration::from_millis(120));

        let text = gather();
        assert!(text.contains("token_issuer_tokens_issued_total"));
        assert!(text.contains("token_issuer_issuance_failures_total"));
        assert!(text.contains("token_issuer_key_rotations_total"));
        assert!(text.contains("token_issuer_credential_cache_total"));
        assert!(text.contains("token_issuer_key_generation_seconds"));
    }
}
