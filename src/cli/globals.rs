use secrecy::SecretString;

/// Application credentials registered with the identity provider.
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "client-id.apps.example.com".to_string(),
            SecretString::from("s3cret".to_string()),
        );
        assert_eq!(args.client_id, "client-id.apps.example.com");
        assert_eq!(args.client_secret.expose_secret(), "s3cret");
    }

    #[test]
    fn test_global_args_debug_does_not_leak_secret() {
        let args = GlobalArgs::new(
            "client-id".to_string(),
            SecretString::from("s3cret".to_string()),
        );
        let debug = format!("{args:?}");
        assert!(!debug.contains("s3cret"));
    }
}
