use serde::{Deserialize, Serialize};
use std::fmt;

/// Page-level secrets issued by the Facebook app dashboard.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessengerCredentials {
    pub page_access_token: String,
    pub app_secret: String,
    pub validation_token: String,
}

impl fmt::Debug for MessengerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessengerCredentials")
            .field("page_access_token", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("validation_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let creds = MessengerCredentials {
            page_access_token: "EAAB-page".into(),
            app_secret: "s3cr3t".into(),
            validation_token: "verify-me".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("EAAB-page"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("verify-me"));
    }
}
