//! Storage key names.
//!
//! Three keys hold a session: `<prefix>.userId`, `<prefix>.loginToken` and
//! `<prefix>.loginTokenExpires`. Apps that share one store between several
//! servers (a dedicated connection, or an app under a path prefix) get a
//! `:<url>[:<path-prefix>]` suffix on each key so their sessions don't
//! collide.

use rand::Rng;

use crate::ClientConfig;

/// The storage keys of one session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Key of the user id.
    pub user_id: String,
    /// Key of the resume token.
    pub login_token: String,
    /// Key of the token expiry (RFC 3339).
    pub login_token_expires: String,
}

impl StorageKeys {
    /// Keys `<prefix>.<name><suffix>`.
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            user_id: format!("{prefix}.userId{suffix}"),
            login_token: format!("{prefix}.loginToken{suffix}"),
            login_token_expires: format!("{prefix}.loginTokenExpires{suffix}"),
        }
    }

    /// The keys a manager with `config`, talking to `url`, uses.
    pub fn for_config(config: &ClientConfig, url: &str) -> Self {
        let path_prefix = config
            .root_url_path_prefix
            .as_deref()
            .filter(|p| !p.is_empty());
        let suffix = if path_prefix.is_some() || config.dedicated_connection {
            namespace(url, path_prefix)
        } else {
            String::new()
        };
        Self::new(&config.key_prefix, &suffix)
    }

    /// The same keys with `id` appended to each, so concurrent test runs
    /// sharing a store don't see each other's sessions.
    pub fn isolated(&self, id: &str) -> Self {
        Self {
            user_id: format!("{}{id}", self.user_id),
            login_token: format!("{}{id}", self.login_token),
            login_token_expires: format!("{}{id}", self.login_token_expires),
        }
    }
}

/// `:<url>` or `:<url>:<path-prefix>`.
pub fn namespace(url: &str, path_prefix: Option<&str>) -> String {
    match path_prefix {
        Some(prefix) => format!(":{url}:{prefix}"),
        None => format!(":{url}"),
    }
}

/// Characters that can't be confused with each other when read aloud or
/// handwritten.
const UNMISTAKABLE_CHARS: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTWXYZabcdefghijkmnopqrstuvwxyz";

/// A random 17-character id.
pub fn random_id() -> String {
    let mut rng = rand::rng();
    (0..17)
        .map(|_| UNMISTAKABLE_CHARS[rng.random_range(0..UNMISTAKABLE_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_config_default_connection_has_no_namespace() {
        let keys = StorageKeys::for_config(&ClientConfig::default(), "https://example.com");
        assert_eq!(keys.user_id, "tokenward.userId");
        assert_eq!(keys.login_token, "tokenward.loginToken");
        assert_eq!(keys.login_token_expires, "tokenward.loginTokenExpires");
    }

    #[test]
    fn test_for_config_dedicated_connection_namespaces_by_url() {
        let config = ClientConfig {
            dedicated_connection: true,
            ..ClientConfig::default()
        };
        let keys = StorageKeys::for_config(&config, "https://other.example.com");
        assert_eq!(keys.login_token, "tokenward.loginToken:https://other.example.com");
    }

    #[test]
    fn test_for_config_path_prefix_adds_prefix_segment() {
        let config = ClientConfig {
            root_url_path_prefix: Some("/app".into()),
            ..ClientConfig::default()
        };
        let keys = StorageKeys::for_config(&config, "https://example.com");
        assert_eq!(keys.user_id, "tokenward.userId:https://example.com:/app");
    }

    #[test]
    fn test_for_config_empty_path_prefix_is_ignored() {
        let config = ClientConfig {
            root_url_path_prefix: Some(String::new()),
            ..ClientConfig::default()
        };
        let keys = StorageKeys::for_config(&config, "https://example.com");
        assert_eq!(keys.user_id, "tokenward.userId");
    }

    #[test]
    fn test_isolated_appends_id_to_every_key() {
        let keys = StorageKeys::new("p", "").isolated("XYZ");
        assert_eq!(keys.user_id, "p.userIdXYZ");
        assert_eq!(keys.login_token, "p.loginTokenXYZ");
        assert_eq!(keys.login_token_expires, "p.loginTokenExpiresXYZ");
    }

    #[test]
    fn test_random_id_shape() {
        let id = random_id();
        assert_eq!(id.len(), 17);
        assert!(id.bytes().all(|b| UNMISTAKABLE_CHARS.contains(&b)));
        assert_ne!(random_id(), id);
    }
}
