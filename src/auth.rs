use std::fmt;

/// Environment variable holding the GitHub personal access token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_ACCESS_TOKEN";

/// A GitHub personal access token.
///
/// Wrapped so that the secret never leaks through `Debug` output or logs.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Source of the credential used to authenticate against the GitHub API.
///
/// The fetch machinery never reads the environment itself; callers inject
/// whichever source fits (environment, config file, test fixture).
pub trait CredentialSource: Send + Sync {
    fn github_token(&self) -> Option<Token>;
}

/// Reads the personal access token from `GITHUB_ACCESS_TOKEN`.
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn github_token(&self) -> Option<Token> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Token)
    }
}

/// A fixed token (or none), used for CLI flags and tests.
pub struct StaticCredentials(pub Option<Token>);

impl CredentialSource for StaticCredentials {
    fn github_token(&self) -> Option<Token> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::from("ghp_very_secret");
        assert_eq!(format!("{:?}", token), "Token(***)");
    }

    #[test]
    fn test_static_credentials() {
        let source = StaticCredentials(Some(Token::from("abc")));
        assert_eq!(source.github_token().unwrap().as_str(), "abc");

        let empty = StaticCredentials(None);
        assert!(empty.github_token().is_none());
    }
}
