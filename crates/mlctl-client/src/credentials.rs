use std::fmt;
use std::str::FromStr;

/// Bearer token used to authenticate against the management endpoint.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
}

impl AccessToken {
    pub const ENV_VAR: &'static str = "MLCTL_ACCESS_TOKEN";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Reads the token from the `MLCTL_ACCESS_TOKEN` environment variable.
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let token = std::env::var(Self::ENV_VAR)?;
        Ok(Self::new(token))
    }

    pub fn secret(&self) -> &str {
        &self.token
    }
}

// Never print the token itself.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken").finish_non_exhaustive()
    }
}

impl FromStr for AccessToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            Err("Access token cannot be empty".to_string())
        } else {
            Ok(Self::new(trimmed))
        }
    }
}
