use alloc::boxed::Box;
use serde::Deserialize;

/// Every JSON response from the backend is wrapped in this envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    /// Human-readable reason, usually only present on failure.
    pub message: Option<Box<str>>,
}

impl<T> Envelope<T> {
    /// Splits the envelope into its payload or the server's stated reason for
    /// refusing the request. A successful envelope without data yields `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, Option<Box<str>>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Envelope;

    #[test]
    fn failure_carries_message() {
        let env: Envelope<u32> = serde_json::from_str(r#"{"success":false,"message":"Room is closed"}"#).unwrap();
        assert_eq!(env.into_result().unwrap_err().as_deref(), Some("Room is closed"));
    }

    #[test]
    fn success_without_data() {
        let env: Envelope<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(env.into_result().unwrap(), None);
    }
}
