//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Password credentials
//!
//! Passwords are stored as argon2id PHC strings. Hashing is deliberately slow, so both hashing
//! and verification run on tokio's blocking pool instead of the async workers.

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::fmt;
use thiserror::Error;

/// Errors from hashing or verifying a credential
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The hasher rejected the password or parameters
    #[error("Hashing failed: {0}")]
    Hash(String),

    /// A stored credential is not a valid PHC string
    #[error("Malformed credential: {0}")]
    Malformed(String),

    /// The blocking task was cancelled or panicked
    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A salted password hash in PHC string format
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a previously stored PHC string
    pub fn from_phc(phc: impl Into<String>) -> Result<Self, CredentialError> {
        let phc = phc.into();
        if let Err(e) = PasswordHash::new(&phc) {
            return Err(CredentialError::Malformed(e.to_string()));
        }
        Ok(Self(phc))
    }

    /// Get the PHC string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the hash itself.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Hashes and verifies passwords with argon2id
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// Use custom argon2 cost parameters (memory in KiB, iterations, lanes)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, CredentialError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub async fn hash(&self, password: &str) -> Result<Credential, CredentialError> {
        let hasher = self.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password)).await?
    }

    /// Check a password against a stored credential
    ///
    /// The cost parameters recorded in the credential are used, not this hasher's.
    pub async fn verify(
        &self,
        password: &str,
        credential: &Credential,
    ) -> Result<bool, CredentialError> {
        let hasher = self.clone();
        let password = password.to_owned();
        let credential = credential.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &credential)).await?
    }

    /// Hash on the current thread
    pub fn hash_blocking(&self, password: &str) -> Result<Credential, CredentialError> {
        let salt = SaltString::generate(&mut password_hash::rand_core::OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(Credential(hash.to_string()))
    }

    /// Verify on the current thread
    pub fn verify_blocking(
        &self,
        password: &str,
        credential: &Credential,
    ) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(credential.as_str())
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Hash(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialHasher {
        CredentialHasher::with_params(8, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = cheap();
        let credential = hasher.hash("hunter2").await.unwrap();
        assert!(credential.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify("hunter2", &credential).await.unwrap());
        assert!(!hasher.verify("hunter3", &credential).await.unwrap());
    }

    #[test]
    fn test_salt_is_random() {
        let hasher = cheap();
        let a = hasher.hash_blocking("same").unwrap();
        let b = hasher.hash_blocking("same").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify_blocking("same", &a).unwrap());
        assert!(hasher.verify_blocking("same", &b).unwrap());
    }

    #[test]
    fn test_from_phc() {
        let stored = cheap().hash_blocking("pw").unwrap();
        let reloaded = Credential::from_phc(stored.as_str()).unwrap();
        assert_eq!(stored, reloaded);
        assert!(matches!(
            Credential::from_phc("not a hash"),
            Err(CredentialError::Malformed(_))
        ));
    }

    #[test]
    fn test_debug_hides_hash() {
        let credential = cheap().hash_blocking("pw").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(..)");
    }

    #[test]
    fn test_invalid_params() {
        assert!(CredentialHasher::with_params(0, 0, 0).is_err());
    }
}
