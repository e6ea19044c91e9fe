//! SASL PLAIN initial response decoding (RFC 4616)
//!
//! `[authzid] NUL authcid NUL password`

use std::fmt;

use thiserror::Error;
use zeroize::Zeroizing;

const NUL: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlainDecodeError {
    #[error("PLAIN response contains no NUL after the authorization id")]
    MissingAuthzidTerminator,
    #[error("PLAIN response contains no NUL after the authentication id")]
    MissingAuthcidTerminator,
    #[error("PLAIN response contains no password")]
    EmptyPassword,
    #[error("PLAIN response field is not valid UTF-8")]
    InvalidUtf8,
}

/// Decoded PLAIN credentials
///
/// The password is wiped from memory when the value is dropped.
pub struct PlainCredentials {
    authzid: Option<String>,
    authcid: String,
    password: Zeroizing<String>,
}

impl PlainCredentials {
    /// Authorization identity, `None` when the client sent an empty one
    pub fn authzid(&self) -> Option<&str> {
        self.authzid.as_deref()
    }

    /// Authentication identity (user name)
    pub fn authcid(&self) -> &str {
        &self.authcid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for PlainCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainCredentials")
            .field("authzid", &self.authzid)
            .field("authcid", &self.authcid)
            .field("password", &"***")
            .finish()
    }
}

/// Decode a PLAIN initial response
pub fn decode_plain(response: &[u8]) -> Result<PlainCredentials, PlainDecodeError> {
    let authzid_end = response
        .iter()
        .position(|b| *b == NUL)
        .ok_or(PlainDecodeError::MissingAuthzidTerminator)?;

    let rest = &response[authzid_end + 1..];
    let authcid_len = rest
        .iter()
        .position(|b| *b == NUL)
        .ok_or(PlainDecodeError::MissingAuthcidTerminator)?;

    let password = &rest[authcid_len + 1..];
    if password.is_empty() {
        return Err(PlainDecodeError::EmptyPassword);
    }

    let authzid = utf8(&response[..authzid_end])?;
    let authcid = utf8(&rest[..authcid_len])?;
    let password = Zeroizing::new(utf8(password)?.to_string());

    Ok(PlainCredentials {
        authzid: (!authzid.is_empty()).then(|| authzid.to_string()),
        authcid: authcid.to_string(),
        password,
    })
}

fn utf8(bytes: &[u8]) -> Result<&str, PlainDecodeError> {
    std::str::from_utf8(bytes).map_err(|_| PlainDecodeError::InvalidUtf8)
}
