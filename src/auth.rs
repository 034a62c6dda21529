//! Authentication module.

mod google;

pub use google::{FederatedProfile, GoogleIdentity, IdentityProvider};

use crate::db::{Database, NewUser, User};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Turn a display name or email local part into a username candidate.
pub fn derive_username(seed: &str) -> String {
    let base: String = seed
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    if base.is_empty() {
        "reader".to_string()
    } else {
        base
    }
}

/// Access token claims. The subject is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub iat: usize,
    pub exp: usize,
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_days: u32,
    identity: Arc<dyn IdentityProvider>,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(
        db: Database,
        jwt_secret: &str,
        token_days: u32,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            db,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_days,
            identity,
        }
    }

    /// Register a new account and issue a token.
    pub fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<(User, String)> {
        let email = email.trim();
        let username = username.trim();

        if email.is_empty() || username.is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "Please provide all required fields".to_string(),
            ));
        }

        if let Some(existing) = self.db.find_user_by_email_or_username(email, username)? {
            let message = if existing.email == email {
                "Email already registered"
            } else {
                "Username already taken"
            };
            return Err(AppError::Conflict(message.to_string()));
        }

        let full_name = full_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(username);

        let user = self.db.create_user(&NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            full_name: Some(full_name.to_string()),
            ..Default::default()
        })?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown email and wrong password fail identically.
    pub fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "Please provide email and password".to_string(),
            ));
        }

        let invalid = || AppError::InvalidCredential("Invalid credentials".to_string());

        let user = self
            .db
            .get_user_by_email(email.trim())?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    /// Log in with an email vouched for by a federated provider,
    /// creating the account on first use.
    pub fn social_login(
        &self,
        email: &str,
        name: Option<&str>,
        provider: &str,
        photo_url: Option<&str>,
    ) -> Result<(User, String)> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::InvalidInput("Email is required".to_string()));
        }

        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let seed = name.unwrap_or_else(|| email.split('@').next().unwrap_or(email));

        let user = self.find_or_create_federated(email, seed, name, provider, photo_url)?;
        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    /// Verify a Google access token with the identity provider and log in.
    pub async fn google_login(&self, access_token: &str) -> Result<(User, String)> {
        if access_token.trim().is_empty() {
            return Err(AppError::InvalidInput("Token is required".to_string()));
        }

        let profile = self.identity.fetch_profile(access_token.trim()).await?;
        let seed = profile
            .email
            .split('@')
            .next()
            .unwrap_or(&profile.email)
            .to_string();

        let user = self.find_or_create_federated(
            &profile.email,
            &seed,
            profile.name.as_deref(),
            "Google",
            profile.picture.as_deref(),
        )?;
        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    fn find_or_create_federated(
        &self,
        email: &str,
        username_seed: &str,
        name: Option<&str>,
        provider: &str,
        photo_url: Option<&str>,
    ) -> Result<User> {
        if let Some(user) = self.db.get_user_by_email(email)? {
            return Ok(user);
        }

        let username = self.unique_username(&derive_username(username_seed))?;

        // Federated accounts never log in with a password.
        let password_hash = hash_password(&generate_token())?;

        let user = self.db.create_user(&NewUser {
            email: email.to_string(),
            full_name: Some(name.unwrap_or(&username).to_string()),
            username,
            password_hash,
            bio: Some(format!("Joined via {}", provider)),
            profile_picture: photo_url.map(str::to_string),
        })?;

        tracing::info!(user_id = user.id, provider, "Federated account created");
        Ok(user)
    }

    /// First free username among `base`, `base1`, `base2`, ...
    fn unique_username(&self, base: &str) -> Result<String> {
        if !self.db.username_exists(base)? {
            return Ok(base.to_string());
        }

        let mut suffix = 1u32;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if !self.db.username_exists(&candidate)? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    /// Sign a token for a user.
    pub fn issue_token(&self, user_id: i64) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::days(self.token_days as i64);

        let claims = Claims {
            sub: user_id,
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Check a token signature and expiry.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::CredentialExpired,
                _ => AppError::InvalidCredential("Invalid token".to_string()),
            })
    }

    /// Resolve a token to the user it was issued for.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.validate_token(token)?;
        self.db
            .get_user_by_id(claims.sub)?
            .ok_or(AppError::UnknownSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoIdentity;

    #[async_trait]
    impl IdentityProvider for NoIdentity {
        async fn fetch_profile(&self, _access_token: &str) -> Result<FederatedProfile> {
            Err(AppError::InvalidCredential(
                "Google authentication failed".to_string(),
            ))
        }
    }

    fn service() -> AuthService {
        AuthService::new(
            Database::open_memory().unwrap(),
            "test-secret",
            7,
            Arc::new(NoIdentity),
        )
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 43); // Base64 of 32 bytes
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_derive_username() {
        assert_eq!(derive_username("Ada Lovelace"), "adalovelace");
        assert_eq!(derive_username("j.doe"), "j.doe");
        assert_eq!(derive_username("!!!"), "reader");
    }

    #[test]
    fn test_token_round_trip() {
        let auth = service();
        let token = auth.issue_token(42).unwrap();
        assert_eq!(auth.validate_token(&token).unwrap().sub, 42);
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let auth = service();
        let other = AuthService::new(
            Database::open_memory().unwrap(),
            "another-secret",
            7,
            Arc::new(NoIdentity),
        );
        let token = other.issue_token(1).unwrap();

        assert!(matches!(
            auth.validate_token(&token),
            Err(AppError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = service();
        let past = chrono::Utc::now().timestamp() as usize - 7200;
        let claims = Claims {
            sub: 1,
            iat: past,
            exp: past + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            auth.validate_token(&token),
            Err(AppError::CredentialExpired)
        ));
    }

    #[test]
    fn test_token_for_deleted_user() {
        let auth = service();
        let token = auth.issue_token(999).unwrap();
        assert!(matches!(
            auth.authenticate(&token),
            Err(AppError::UnknownSubject)
        ));
    }

    #[test]
    fn test_register_reports_which_field_conflicts() {
        let auth = service();
        auth.register("ada@example.edu", "ada", "secret", None)
            .unwrap();

        let err = auth
            .register("ada@example.edu", "other", "secret", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");

        let err = auth
            .register("new@example.edu", "ada", "secret", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[test]
    fn test_register_requires_fields() {
        let auth = service();
        assert!(matches!(
            auth.register("", "ada", "secret", None),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.register("ada@example.edu", "ada", "", None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_login_does_not_reveal_unknown_email() {
        let auth = service();
        auth.register("ada@example.edu", "ada", "secret", Some("Ada"))
            .unwrap();

        let unknown = auth.login("nobody@example.edu", "secret").unwrap_err();
        let wrong = auth.login("ada@example.edu", "nope").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());

        let (user, token) = auth.login("ada@example.edu", "secret").unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Ada"));
        assert_eq!(auth.authenticate(&token).unwrap().id, user.id);
    }

    #[test]
    fn test_social_login_suffixes_taken_usernames() {
        let auth = service();
        auth.register("first@example.edu", "adalovelace", "secret", None)
            .unwrap();

        let (user, _) = auth
            .social_login("ada@example.edu", Some("Ada Lovelace"), "GitHub", None)
            .unwrap();
        assert_eq!(user.username, "adalovelace1");
        assert_eq!(user.bio.as_deref(), Some("Joined via GitHub"));

        // Same email resolves to the same account.
        let (again, _) = auth
            .social_login("ada@example.edu", None, "GitHub", None)
            .unwrap();
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn test_google_login_rejected_by_provider() {
        let auth = service();
        assert!(matches!(
            auth.google_login("bogus").await,
            Err(AppError::InvalidCredential(_))
        ));
        assert!(matches!(
            auth.google_login("").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
