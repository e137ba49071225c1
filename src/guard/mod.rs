pub mod gate;
pub mod patterns;

pub use gate::*;
pub use patterns::*;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the request to the downstream handler unchanged.
    Pass,
    /// Reject with 403 before any application logic runs.
    Deny(DenyReason),
}

/// Why a request was rejected. The body text is a fixed contract; nothing
/// about the matched rule or the caller's history is echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    OriginUnverifiable,
    IpBlocked,
    SuspiciousRequest,
}

impl DenyReason {
    pub fn status(&self) -> u16 {
        403
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::OriginUnverifiable => "Access Denied: Unable to verify request origin.",
            DenyReason::IpBlocked => {
                "Access Denied: Your IP address has been blocked due to suspicious activity."
            }
            DenyReason::SuspiciousRequest => "Access Denied: Suspicious request detected.",
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            DenyReason::OriginUnverifiable => "origin_unverifiable",
            DenyReason::IpBlocked => "ip_blocked",
            DenyReason::SuspiciousRequest => "suspicious_request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_messages_are_fixed() {
        assert_eq!(
            DenyReason::OriginUnverifiable.message(),
            "Access Denied: Unable to verify request origin."
        );
        assert_eq!(
            DenyReason::IpBlocked.message(),
            "Access Denied: Your IP address has been blocked due to suspicious activity."
        );
        assert_eq!(
            DenyReason::SuspiciousRequest.message(),
            "Access Denied: Suspicious request detected."
        );
    }

    #[test]
    fn test_all_denials_are_403() {
        for reason in [
            DenyReason::OriginUnverifiable,
            DenyReason::IpBlocked,
            DenyReason::SuspiciousRequest,
        ] {
            assert_eq!(reason.status(), 403);
        }
    }
}
