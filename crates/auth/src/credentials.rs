//! Secure API credential management.
//!
//! Uses the `secrecy` crate to prevent accidental logging of secret keys
//! and ensures memory is zeroed on drop.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};

/// Environment variable holding the API key.
const API_KEY_VAR: &str = "COINBASE_API_KEY";
/// Environment variable holding the API secret.
const API_SECRET_VAR: &str = "COINBASE_API_SECRET";

/// API credentials for authenticated requests and feed subscriptions.
///
/// The secret is wrapped in `SecretString` which:
/// - Prevents accidental Debug/Display printing
/// - Zeros memory on drop via zeroize
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    secret_key: SecretString,
}

impl ApiCredentials {
    /// Load credentials from environment variables.
    ///
    /// Looks for:
    /// - `COINBASE_API_KEY` - The API key (public)
    /// - `COINBASE_API_SECRET` - The API secret (private)
    ///
    /// # Errors
    /// Returns `AuthError::MissingEnvVar` if either variable is not set and
    /// `AuthError::EmptyCredential` if either is set to an empty string.
    pub fn from_env() -> Result<Self, AuthError> {
        // Load .env file if present (ignores errors if file doesn't exist)
        dotenvy::dotenv().ok();

        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| AuthError::MissingEnvVar(API_KEY_VAR.into()))?;

        let secret_key = std::env::var(API_SECRET_VAR)
            .map_err(|_| AuthError::MissingEnvVar(API_SECRET_VAR.into()))?;

        Self::try_new(api_key, secret_key)
    }

    /// Create credentials from explicit values, rejecting empty ones.
    pub fn try_new(api_key: String, secret_key: String) -> Result<Self, AuthError> {
        if api_key.trim().is_empty() {
            return Err(AuthError::EmptyCredential("api key"));
        }
        if secret_key.is_empty() {
            return Err(AuthError::EmptyCredential("api secret"));
        }
        Ok(Self::new(api_key, secret_key))
    }

    /// Create credentials from explicit values.
    ///
    /// Useful for testing or when credentials come from other sources.
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key: SecretString::from(secret_key),
        }
    }

    /// Get the API key (public, safe to log).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Expose the secret for signing.
    ///
    /// **WARNING**: Only use this for cryptographic operations.
    /// Never log or display the return value.
    pub fn expose_secret(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}
