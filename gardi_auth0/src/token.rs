//! Extraction of a bearer token from an `Authorization` header

use gardi::JwtRef;

use crate::AuthError;

/// Extracts the bearer token from a raw `Authorization` header value
///
/// The header must consist of the literal scheme `Bearer` (case
/// sensitive) followed by exactly one token segment.
///
/// # Errors
///
/// Returns [`AuthError::MissingAuthorizationHeader`] when no header was
/// supplied, and [`AuthError::MalformedHeader`] when the header does not
/// have the required two-part shape.
pub fn extract_token(header: Option<&str>) -> Result<&JwtRef, AuthError> {
    let header = header.ok_or(AuthError::MissingAuthorizationHeader)?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(JwtRef::from_str(token)),
        (Some("Bearer"), None, _) => Err(AuthError::MalformedHeader("token not found")),
        _ => Err(AuthError::MalformedHeader("header must be bearer token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_header_is_missing() {
        assert_eq!(
            extract_token(None),
            Err(AuthError::MissingAuthorizationHeader)
        );
    }

    #[test]
    fn well_formed_header_yields_token() {
        let token = extract_token(Some("Bearer abc.def.ghi")).expect("valid header");
        assert_eq!(token.as_str(), "abc.def.ghi");
    }

    #[test]
    fn scheme_is_case_sensitive() {
        assert_eq!(
            extract_token(Some("bearer abc.def.ghi")),
            Err(AuthError::MalformedHeader("header must be bearer token"))
        );
    }

    #[test]
    fn scheme_without_token_is_malformed() {
        assert_eq!(
            extract_token(Some("Bearer")),
            Err(AuthError::MalformedHeader("token not found"))
        );
    }

    #[test]
    fn three_part_header_is_malformed() {
        assert_eq!(
            extract_token(Some("Bearer abc.def.ghi extra")),
            Err(AuthError::MalformedHeader("header must be bearer token"))
        );
    }

    #[test]
    fn wrong_scheme_is_malformed() {
        assert_eq!(
            extract_token(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedHeader("header must be bearer token"))
        );
    }
}
