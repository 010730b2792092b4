use ehrgate_auth::AuthResult;
use ehrgate_core::AuditEntry;
use ehrgate_storage::Invocation;

use super::Gateway;

// Reading or verifying the trail is not itself audited.
impl Gateway {
    /// Audit entries with `start <= timestamp <= end`, on the audit channel.
    pub fn get_audit_logs(
        &self,
        inv: Invocation<'_>,
        start: i64,
        end: i64,
    ) -> AuthResult<Vec<AuditEntry>> {
        let caller = self.caller(inv)?;
        self.audit_log(inv).query(&caller, start, end)
    }

    /// Verifies the audit hash chain and returns the number of entries.
    pub fn verify_audit_chain(&self, inv: Invocation<'_>) -> AuthResult<u64> {
        let caller = self.caller(inv)?;
        self.audit_log(inv).verify_chain(&caller)
    }
}
