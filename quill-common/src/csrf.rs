use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::fmt::{Debug, Formatter};

pub const CSRF_COOKIE_NAME: &str = "csrftoken";
pub const CSRF_FORM_FIELD: &str = "csrf_token";
pub const CSRF_TOKEN_LEN: usize = 32;

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    #[must_use]
    pub fn generate_random() -> Self {
        let bytes: [u8; CSRF_TOKEN_LEN] = rand::random();
        Self(BASE64_URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accepts a cookie value only if it has the shape of a generated token.
    #[must_use]
    pub fn from_cookie(value: &str) -> Option<Self> {
        let decoded = BASE64_URL_SAFE_NO_PAD.decode(value).ok()?;
        (decoded.len() == CSRF_TOKEN_LEN).then(|| Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Constant time with respect to the submitted content.
    #[must_use]
    pub fn matches(&self, submitted: &str) -> bool {
        let expected = self.0.as_bytes();
        let submitted = submitted.as_bytes();

        expected.len() == submitted.len()
            && expected
                .iter()
                .zip(submitted)
                .fold(0, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl Debug for CsrfToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CsrfToken").field(&"[redacted]").finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::csrf::CsrfToken;

    #[test]
    fn generated_tokens_survive_the_cookie_round_trip() {
        let token = CsrfToken::generate_random();
        let restored = CsrfToken::from_cookie(token.as_str()).unwrap();

        assert_eq!(restored, token);
        assert_ne!(CsrfToken::generate_random(), token);
    }

    #[test]
    fn rejects_foreign_cookie_values() {
        assert!(CsrfToken::from_cookie("").is_none());
        assert!(CsrfToken::from_cookie("not base64 at all!").is_none());
        assert!(CsrfToken::from_cookie("c2hvcnQ").is_none());
    }

    #[test]
    fn matching() {
        let token = CsrfToken::generate_random();

        assert!(token.matches(token.as_str()));
        assert!(!token.matches(""));
        assert!(!token.matches(&token.as_str()[1..]));
        assert!(!token.matches(CsrfToken::generate_random().as_str()));
    }
}
