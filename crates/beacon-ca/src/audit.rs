//! Audit records for issued certificates.
//!
//! One record per successful issuance, handed to a pluggable sink. The
//! record deliberately excludes the raw token and any key material.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

/// What gets recorded about an issuance
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Effective OIDC issuer URL
    pub issuer: String,
    /// Principal name bound into the certificate
    pub subject: String,
    /// Leaf serial, lowercase hex
    pub serial: String,
    /// SHA-256 of the leaf DER, lowercase hex
    pub fingerprint: String,
    /// CT log id, hex, when an SCT was obtained
    pub sct_log_id: Option<String>,
    /// CT timestamp (ms since epoch), when an SCT was obtained
    pub sct_timestamp: Option<u64>,
}

impl AuditRecord {
    /// Compute the leaf fingerprint field
    pub fn fingerprint_of(leaf_der: &[u8]) -> String {
        hex_lower(&Sha256::digest(leaf_der))
    }
}

/// Destination for audit records. Implementations must be safe for
/// concurrent use.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Default sink: structured tracing fields
#[derive(Debug, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, record: &AuditRecord) {
        info!(
            issuer = %record.issuer,
            subject = %record.subject,
            serial = %record.serial,
            fingerprint = %record.fingerprint,
            sct_log_id = record.sct_log_id.as_deref().unwrap_or("-"),
            sct_timestamp = record.sct_timestamp.unwrap_or(0),
            "Issued certificate"
        );
    }
}

/// Lowercase hex without an external dependency
pub fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = AuditRecord::fingerprint_of(b"leaf");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, hex_lower(&Sha256::digest(b"leaf")));
    }
}
