//! Google ID-token verification via the tokeninfo endpoint

use super::AuthError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity asserted by a verified Google ID token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

/// Resolves a Google ID token to an identity
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, AuthError>;
}

/// Production verifier backed by Google's tokeninfo endpoint
pub struct TokenInfoVerifier {
    client: Client,
    client_id: String,
    endpoint: String,
}

impl TokenInfoVerifier {
    pub fn new(client_id: String) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Google(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            client_id,
            endpoint: TOKENINFO_URL.to_string(),
        })
    }
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, AuthError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AuthError::Google(format!("tokeninfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Google(format!(
                "tokeninfo rejected token: HTTP {}",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Google(format!("unreadable tokeninfo response: {e}")))?;
        check_token_info(info, &self.client_id)
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

fn check_token_info(info: TokenInfo, client_id: &str) -> Result<GoogleIdentity, AuthError> {
    if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
        return Err(AuthError::Google("Wrong issuer.".to_string()));
    }
    if info.aud != client_id {
        return Err(AuthError::Google("Token was issued for another client".to_string()));
    }
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AuthError::Google("Token carries no email".to_string()))?;

    Ok(GoogleIdentity {
        subject: info.sub,
        email,
        name: info.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(iss: &str, aud: &str, email: Option<&str>) -> TokenInfo {
        TokenInfo {
            iss: iss.to_string(),
            aud: aud.to_string(),
            sub: "1234".to_string(),
            email: email.map(String::from),
            name: Some("Grace".to_string()),
        }
    }

    #[test]
    fn test_accepts_both_issuer_forms() {
        for iss in GOOGLE_ISSUERS {
            let identity = check_token_info(info(iss, "client", Some("g@example.com")), "client")
                .unwrap();
            assert_eq!(identity.subject, "1234");
            assert_eq!(identity.email, "g@example.com");
            assert_eq!(identity.name.as_deref(), Some("Grace"));
        }
    }

    #[test]
    fn test_rejects_wrong_issuer_audience_or_missing_email() {
        assert!(check_token_info(info("evil.com", "client", Some("g@example.com")), "client").is_err());
        assert!(check_token_info(
            info("accounts.google.com", "other", Some("g@example.com")),
            "client"
        )
        .is_err());
        assert!(check_token_info(info("accounts.google.com", "client", None), "client").is_err());
    }

    #[test]
    fn test_tokeninfo_deserializes_extra_fields() {
        let raw = r#"{
            "iss": "https://accounts.google.com",
            "aud": "client",
            "sub": "42",
            "email": "x@example.com",
            "email_verified": "true",
            "exp": "1700000000"
        }"#;
        let parsed: TokenInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.sub, "42");
        assert!(parsed.name.is_none());
    }
}
