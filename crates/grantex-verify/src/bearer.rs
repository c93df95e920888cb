//! Bearer token extraction from `Authorization` headers

/// Return the token from an `Authorization: Bearer <token>` header value
///
/// The value must be exactly two space-separated parts with the scheme
/// spelled `Bearer`; anything else yields `None`.
///
/// ```rust
/// use grantex_verify::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token("Bearer eyJhbGciOi.x.y"), Some("eyJhbGciOi.x.y"));
/// assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
/// ```
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    let mut parts = authorization.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}
