//! Cookie parsing, `Set-Cookie` building and sealing over the `cookie` crate

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use cookie::time::{Duration, OffsetDateTime};
use cookie::{Cookie, CookieJar, Key};

/// Attributes applied to a cookie written by a middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    /// Seconds; zero leaves a browser-session cookie, negative expires it
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
}

/// How a cookie value is protected with a [`Key`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seal {
    /// Readable by the client, tamper-evident
    Signed,
    /// Encrypted and authenticated
    Private,
}

/// Find the value of the named cookie across every `Cookie` header
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
}

/// Build a cookie carrying `options`.
///
/// A positive `max_age` sets both `Max-Age` and `Expires`; a negative one
/// produces a removal cookie.
pub fn build_cookie(name: &str, value: impl Into<String>, options: &CookieOptions) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), value.into()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only)
        .build();

    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        cookie.set_domain(domain.to_string());
    }

    if options.max_age > 0 {
        let max_age = Duration::seconds(options.max_age);
        cookie.set_max_age(max_age);
        // Dates past year 9999 cannot be written; Max-Age alone still applies
        if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
            cookie.set_expires(expires);
        }
    } else if options.max_age < 0 {
        cookie.make_removal();
    }

    cookie
}

/// Render a cookie as a `Set-Cookie` header value
pub fn set_cookie_header(cookie: &Cookie<'_>) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
}

/// Replace the cookie's value with its sealed form, keeping its attributes
pub fn seal(cookie: Cookie<'static>, key: &Key, seal: Seal) -> Option<Cookie<'static>> {
    let name = cookie.name().to_string();
    let mut jar = CookieJar::new();
    match seal {
        Seal::Signed => jar.signed_mut(key).add(cookie),
        Seal::Private => jar.private_mut(key).add(cookie),
    }
    jar.get(&name).cloned()
}

/// Verify (and decrypt) a sealed value; `None` if it was tampered with
pub fn unseal(name: &str, value: &str, key: &Key, seal: Seal) -> Option<String> {
    let mut jar = CookieJar::new();
    jar.add_original(Cookie::new(name.to_string(), value.to_string()));
    let cookie = match seal {
        Seal::Signed => jar.signed(key).get(name),
        Seal::Private => jar.private(key).get(name),
    };
    cookie.map(|cookie| cookie.value().to_string())
}
