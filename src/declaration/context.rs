//! Synthesis context
//!
//! Carries the process-wide naming decided at startup (the tenant derived
//! from the partition) into every builder call.

/// Name of the shared application namespace inside the tenant.
pub const SHARED_APPLICATION: &str = "Shared";

/// Suffix appended to the configured partition to form the tenant name.
pub const TENANT_SUFFIX: &str = "_AS3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisContext {
    tenant: String,
}

impl SynthesisContext {
    /// Build the context for a configured partition, e.g. `k8s` -> `k8s_AS3`.
    pub fn new(partition: &str) -> Self {
        Self { tenant: format!("{}{}", partition, TENANT_SUFFIX) }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Full pointer path `/<tenant>/Shared/<name>` for any reference,
    /// using only the reference's last `/` segment.
    pub fn pointer(&self, reference: &str) -> String {
        format!("/{}/{}/{}", self.tenant, SHARED_APPLICATION, last_segment(reference))
    }
}

/// Last `/`-delimited segment of a reference string.
pub fn last_segment(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}
