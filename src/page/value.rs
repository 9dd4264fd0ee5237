use std::fmt;

use super::VALUE_LEN;

/// A fixed-width, 120-byte record value.
///
/// Shorter strings are stored NUL-padded; longer strings are truncated to
/// `VALUE_LEN` bytes. This mirrors the reference `char value[120]` field:
/// there is no length-prefix, no variable-length encoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Value(pub [u8; VALUE_LEN]);

impl Value {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; VALUE_LEN];
        let n = bytes.len().min(VALUE_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);
        Value(buf)
    }

    /// Render the stored bytes as a `String`, stopping at the first NUL
    /// (or at `VALUE_LEN` if the value fills the whole field).
    pub fn as_str(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(VALUE_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::from_bytes(s.as_bytes())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.as_str())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_string() {
        let v = Value::from("hello");
        assert_eq!(v.as_str(), "hello");
    }

    #[test]
    fn truncates_long_string() {
        let long = "x".repeat(200);
        let v = Value::from(long.as_str());
        assert_eq!(v.as_str().len(), VALUE_LEN);
    }

    #[test]
    fn pads_with_nul() {
        let v = Value::from("a");
        assert_eq!(v.0[1], 0);
        assert_eq!(v.0[VALUE_LEN - 1], 0);
    }
}
