//! Auth cookies
//!
//! The refresh token travels only in an http-only cookie scoped to the API
//! root. Cross-site deployments need `SameSite=None`, which browsers accept
//! only together with `Secure`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use medicore_auth::config::{CookieConfig, OAuthConfig};
use medicore_auth::IssuedRefreshToken;
use time::Duration;

fn base(config: &CookieConfig, name: String, value: String) -> Cookie<'static> {
    let (same_site, secure) = if config.cross_site {
        (SameSite::None, true)
    } else {
        (SameSite::Lax, config.secure)
    };

    let mut cookie = Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .path(config.path.clone())
        .build();
    if let Some(domain) = &config.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Refresh cookie living as long as the token it carries
pub fn refresh_cookie(
    config: &CookieConfig,
    refresh: &IssuedRefreshToken,
    lifetime: std::time::Duration,
) -> Cookie<'static> {
    let mut cookie = base(config, config.refresh_name.clone(), refresh.token.clone());
    cookie.set_max_age(Duration::seconds(lifetime.as_secs() as i64));
    cookie
}

/// Add the refresh cookie to a jar
pub fn set_refresh(
    jar: CookieJar,
    config: &CookieConfig,
    refresh: &IssuedRefreshToken,
    lifetime: std::time::Duration,
) -> CookieJar {
    jar.add(refresh_cookie(config, refresh, lifetime))
}

/// Expire both auth cookies with the attributes they were set with
pub fn clear_auth(jar: CookieJar, config: &CookieConfig) -> CookieJar {
    let mut jar = jar;
    for name in [&config.refresh_name, &config.access_name] {
        let mut cookie = base(config, name.clone(), String::new());
        cookie.make_removal();
        jar = jar.add(cookie);
    }
    jar
}

/// Raw refresh token presented by the client, if any
pub fn refresh_token<'a>(jar: &'a CookieJar, config: &CookieConfig) -> Option<&'a str> {
    jar.get(&config.refresh_name)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
}

/// Short-lived cookie holding the OAuth `state` between start and callback
pub fn oauth_state_cookie(cookies: &CookieConfig, oauth: &OAuthConfig, state: &str) -> Cookie<'static> {
    let mut cookie = base(cookies, oauth.state_cookie.clone(), state.to_string());
    // The callback is a top-level navigation from the provider
    if !cookies.cross_site {
        cookie.set_same_site(SameSite::Lax);
    }
    cookie.set_max_age(Duration::seconds(oauth.state_ttl.as_secs() as i64));
    cookie
}

pub fn clear_oauth_state(jar: CookieJar, cookies: &CookieConfig, oauth: &OAuthConfig) -> CookieJar {
    let mut cookie = base(cookies, oauth.state_cookie.clone(), String::new());
    cookie.make_removal();
    jar.add(cookie)
}
