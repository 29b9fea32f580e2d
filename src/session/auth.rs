//! Credentials and the authenticated-hello digest
//!
//! Credentials are held as *references* (`${env.NAME}`, `${NAME}`,
//! `${file.PATH}`) or literal values, and are only resolved through a
//! [`SecretResolver`] while a hello is being built. Resolved secrets are
//! dropped when the handshake returns.

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::CredentialError;

/// Resolved secret value; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a resolved value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the value is empty or whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Resolves credential references at the moment of use
pub trait SecretResolver: Send + Sync {
    /// Resolve `reference`. Values that are not references are returned
    /// unchanged.
    fn resolve(&self, reference: &str) -> Result<Secret, CredentialError>;
}

/// Check if `value` is a `${...}` reference
#[must_use]
pub fn is_reference(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("${") && value.ends_with('}')
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves `${env.NAME}` / `${NAME}` from the environment and
/// `${file.PATH}` from the first line of a secrets file
pub struct EnvSecretResolver {
    lookup: Lookup,
}

impl Default for EnvSecretResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvSecretResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSecretResolver").finish_non_exhaustive()
    }
}

impl EnvSecretResolver {
    /// Resolver backed by the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolver backed by a custom variable lookup
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl SecretResolver for EnvSecretResolver {
    fn resolve(&self, reference: &str) -> Result<Secret, CredentialError> {
        if !is_reference(reference) {
            return Ok(Secret::new(reference));
        }
        let trimmed = reference.trim();
        let inner = trimmed[2..trimmed.len() - 1].trim();
        if inner.is_empty() {
            return Err(CredentialError::Malformed {
                reference: reference.to_string(),
            });
        }

        if let Some(path) = inner.strip_prefix("file.") {
            let contents = std::fs::read_to_string(path).map_err(|err| CredentialError::File {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
            let line = contents.lines().next().unwrap_or("").trim_end();
            return Ok(Secret::new(line));
        }

        let name = inner.strip_prefix("env.").unwrap_or(inner);
        (self.lookup)(name)
            .map(Secret::new)
            .ok_or_else(|| CredentialError::Unset {
                reference: reference.to_string(),
            })
    }
}

/// User name and optional password, each a literal or a reference
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: Option<String>,
}

impl Credentials {
    /// Credentials for an authenticated hello
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: Some(password.into()),
        }
    }

    /// Credentials for a plain (unauthenticated) hello
    pub fn anonymous(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: None,
        }
    }

    /// User name as configured (may be a reference)
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Check if a password is configured
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub(crate) fn resolve(
        &self,
        resolver: &dyn SecretResolver,
    ) -> Result<(String, Option<Secret>), CredentialError> {
        let user = resolver.resolve(&self.user)?;
        if user.is_blank() {
            return Err(CredentialError::BlankUser);
        }
        let password = match self.password.as_deref() {
            Some(reference) if !reference.trim().is_empty() => {
                Some(resolver.resolve(reference)?).filter(|p| !p.is_blank())
            }
            _ => None,
        };
        Ok((user.expose().trim().to_string(), password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Stored password digest: SHA-256(user ‖ password ‖ user ‖ password)
#[must_use]
pub fn password_hash(user: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(password.as_bytes());
    hasher.update(user.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Hello authenticator: hex SHA-256(user ‖ pwhash ‖ time ‖ user ‖ pwhash),
/// with `time` as big-endian 32-bit Unix seconds
#[must_use]
pub fn authenticator(user: &str, pw_hash: &[u8; 32], time: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(pw_hash);
    hasher.update(time.to_be_bytes());
    hasher.update(user.as_bytes());
    hasher.update(pw_hash);
    hex::encode(hasher.finalize())
}

/// Build the body of an authenticated hello sent at `now`
pub(crate) fn auth_hello_body(
    user: &str,
    password: &Secret,
    now: DateTime<Utc>,
    version: u32,
) -> String {
    let time = u32::try_from(now.timestamp()).unwrap_or(u32::MAX);
    let pw_hash = password_hash(user, password.expose());
    let stamp = now.format("%y%j%H%M%S");
    format!(
        "{user} {stamp} {} {version}",
        authenticator(user, &pw_hash, time)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn resolver(vars: &[(&str, &str)]) -> EnvSecretResolver {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvSecretResolver::with_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn test_reference_forms() {
        let r = resolver(&[("DDS_USER", "alice"), ("DDS_PASS", "s3cret")]);
        assert_eq!(r.resolve("${env.DDS_USER}").unwrap().expose(), "alice");
        assert_eq!(r.resolve("${DDS_PASS}").unwrap().expose(), "s3cret");
        assert_eq!(r.resolve("literal").unwrap().expose(), "literal");
        assert_eq!(
            r.resolve("${env.MISSING}").unwrap_err(),
            CredentialError::Unset {
                reference: "${env.MISSING}".to_string()
            }
        );
        assert!(matches!(
            r.resolve("${ }"),
            Err(CredentialError::Malformed { .. })
        ));
    }

    #[test]
    fn test_file_reference_missing() {
        let r = resolver(&[]);
        let err = r.resolve("${file./nonexistent/ddsacq/secret}").unwrap_err();
        assert!(matches!(err, CredentialError::File { .. }));
    }

    #[test]
    fn test_secrets_never_printed() {
        let creds = Credentials::new("alice", "hunter2");
        let text = format!("{creds:?}");
        assert!(!text.contains("hunter2"));
        assert_eq!(format!("{:?}", Secret::new("hunter2")), "Secret(***)");
    }

    #[test]
    fn test_blank_password_means_anonymous() {
        let r = resolver(&[("EMPTY", "")]);
        let (user, pw) = Credentials::new("bob", "${EMPTY}").resolve(&r).unwrap();
        assert_eq!(user, "bob");
        assert!(pw.is_none());

        let err = Credentials::anonymous("  ").resolve(&r).unwrap_err();
        assert_eq!(err, CredentialError::BlankUser);
    }

    #[test]
    fn test_authenticator_depends_on_all_inputs() {
        let hash = password_hash("user", "pw");
        let a = authenticator("user", &hash, 1_000);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, authenticator("user", &hash, 1_001));
        assert_ne!(a, authenticator("user", &password_hash("user", "pw2"), 1_000));
        assert_eq!(a, authenticator("user", &hash, 1_000));
    }

    #[test]
    fn test_auth_hello_body_layout() {
        let now = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let body = auth_hello_body("user", &Secret::new("pw"), now, 14);
        let parts: Vec<&str> = body.split(' ').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "user");
        assert_eq!(parts[1], "24034040506");
        assert_eq!(parts[3], "14");
    }
}
