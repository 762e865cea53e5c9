pub mod cookie;

pub use self::cookie::{build_cookie, get_cookie, seal, set_cookie_header, unseal, CookieOptions, Seal};
