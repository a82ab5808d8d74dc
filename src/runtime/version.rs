//! Docker API version strings (`1.24`, `1.41`, ...).

use std::cmp::Ordering;
use std::fmt;

/// A dotted API version compared component by component.
///
/// Missing or non-numeric components count as zero, so `"1.30"` sorts after
/// `"1.29"` and `"1"` equals `"1.0"`.
#[derive(Debug, Clone, Default)]
pub struct ApiVersion(Vec<u64>);

impl ApiVersion {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.trim()
                .trim_start_matches('v')
                .split('.')
                .map(|part| part.parse().unwrap_or(0))
                .collect(),
        )
    }

    fn component(&self, idx: usize) -> u64 {
        self.0.get(idx).copied().unwrap_or(0)
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for ApiVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for ApiVersion {}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed `major.minor` protocol version a client binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u64,
    pub minor: u64,
}

impl ProtocolVersion {
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    pub fn to_version(self) -> ApiVersion {
        ApiVersion(vec![self.major, self.minor])
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_numerically() {
        assert!(ApiVersion::parse("1.30") > ApiVersion::parse("1.29"));
        assert!(ApiVersion::parse("1.9") < ApiVersion::parse("1.10"));
        assert!(ApiVersion::parse("1.29") >= ProtocolVersion::new(1, 29).to_version());
        assert_eq!(ApiVersion::parse("1"), ApiVersion::parse("1.0"));
    }

    #[test]
    fn garbage_counts_as_zero() {
        assert_eq!(ApiVersion::parse(""), ApiVersion::parse("0"));
        assert!(ApiVersion::parse("x.y") < ApiVersion::parse("1.24"));
    }

    #[test]
    fn const_renders_dotted() {
        assert_eq!(ProtocolVersion::new(1, 24).to_string(), "1.24");
    }
}
