//! SSRF-safe validation of user-supplied image URLs.
//!
//! A handler may later fetch `imageUrl` server-side, so the URL must not be
//! able to point at loopback or private network services.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

use crate::config::ImageUrlPolicy;

pub const MAX_PATH_LEN: usize = 255;
pub const MAX_QUERY_LEN: usize = 512;

/// Why an image URL was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlViolation {
    #[error("not a valid URL")]
    Unparseable,

    #[error("scheme must be https")]
    InsecureScheme,

    #[error("host is missing")]
    MissingHost,

    #[error("host {0} is a private or loopback address")]
    PrivateHost(String),

    #[error("host {0} is not allowed")]
    HostNotAllowed(String),

    #[error("file extension {0:?} is not allowed")]
    ExtensionNotAllowed(String),

    #[error("path is longer than {MAX_PATH_LEN} characters")]
    PathTooLong,

    #[error("query is longer than {MAX_QUERY_LEN} characters")]
    QueryTooLong,
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 10
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || a == 127
        || a == 0
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    ip.to_ipv4_mapped().is_some_and(is_blocked_v4)
}

fn is_local_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("localhost") || name.to_ascii_lowercase().ends_with(".localhost")
}

/// Host as compared against the allow-list: no trailing dot on names,
/// no brackets around IPv6 literals.
fn canonical_host(host: &str) -> &str {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
}

/// Validate `raw` against the policy, returning the parsed URL.
pub fn validate_image_url(raw: &str, policy: &ImageUrlPolicy) -> Result<Url, UrlViolation> {
    let url = Url::parse(raw).map_err(|_| UrlViolation::Unparseable)?;

    if url.scheme() != "https" {
        return Err(UrlViolation::InsecureScheme);
    }

    let host = url.host().ok_or(UrlViolation::MissingHost)?;
    let host_str = match &host {
        Host::Ipv6(ip) => ip.to_string(),
        other => canonical_host(&other.to_string()).to_string(),
    };
    let blocked = match &host {
        Host::Ipv4(ip) => is_blocked_v4(*ip),
        Host::Ipv6(ip) => is_blocked_v6(*ip),
        Host::Domain(_) => is_local_name(&host_str),
    };
    if blocked {
        return Err(UrlViolation::PrivateHost(host_str));
    }

    if !policy.allowed_hosts.is_empty()
        && !policy
            .allowed_hosts
            .iter()
            .any(|allowed| canonical_host(allowed).eq_ignore_ascii_case(&host_str))
    {
        return Err(UrlViolation::HostNotAllowed(host_str));
    }

    let path = url.path();
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !policy.allowed_extensions.iter().any(|e| *e == extension) {
        return Err(UrlViolation::ExtensionNotAllowed(extension));
    }

    if path.len() > MAX_PATH_LEN {
        return Err(UrlViolation::PathTooLong);
    }
    if url.query().is_some_and(|q| q.len() > MAX_QUERY_LEN) {
        return Err(UrlViolation::QueryTooLong);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_policy() -> ImageUrlPolicy {
        ImageUrlPolicy::default()
    }

    #[test]
    fn test_accepts_public_https_image() {
        let url = validate_image_url("https://cdn.example.com/styles/bob.PNG?w=400", &open_policy()).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_rejects_private_and_insecure_even_when_allow_listed() {
        let policy = ImageUrlPolicy {
            allowed_hosts: vec![
                "127.0.0.1".into(),
                "10.1.2.3".into(),
                "192.168.1.1".into(),
                "cdn.example.com".into(),
            ],
            ..Default::default()
        };

        for raw in [
            "https://127.0.0.1/a.png",
            "https://10.1.2.3/a.png",
            "https://192.168.1.1/a.png",
        ] {
            assert!(
                matches!(validate_image_url(raw, &policy), Err(UrlViolation::PrivateHost(_))),
                "{raw} should be blocked"
            );
        }

        assert_eq!(
            validate_image_url("http://cdn.example.com/a.png", &policy),
            Err(UrlViolation::InsecureScheme)
        );
    }

    #[test]
    fn test_blocked_ranges() {
        let policy = open_policy();
        for raw in [
            "https://172.16.0.1/a.png",
            "https://172.31.255.255/a.png",
            "https://0.0.0.0/a.png",
            "https://127.1/a.png",
            "https://2130706433/a.png",
            "https://[::1]/a.png",
            "https://[::]/a.png",
            "https://[::ffff:10.0.0.1]/a.png",
            "https://localhost/a.png",
            "https://api.localhost/a.png",
            "https://localhost./a.png",
            "https://api.localhost./a.png",
            "https://LOCALHOST/a.png",
        ] {
            assert!(
                matches!(validate_image_url(raw, &policy), Err(UrlViolation::PrivateHost(_))),
                "{raw} should be blocked"
            );
        }

        // Just outside the private 172.16/12 block.
        assert!(validate_image_url("https://172.32.0.1/a.png", &policy).is_ok());
    }

    #[test]
    fn test_host_allow_list() {
        let policy = ImageUrlPolicy {
            allowed_hosts: vec!["images.salon.example".into()],
            ..Default::default()
        };
        assert!(validate_image_url("https://images.salon.example/a.jpg", &policy).is_ok());
        assert_eq!(
            validate_image_url("https://evil.example/a.jpg", &policy),
            Err(UrlViolation::HostNotAllowed("evil.example".into()))
        );
    }

    #[test]
    fn test_allow_list_ignores_trailing_dot_and_brackets() {
        let policy = ImageUrlPolicy {
            allowed_hosts: vec![
                "images.salon.example.".into(),
                "2001:db8::1".into(),
                "[2001:db8::2]".into(),
            ],
            ..Default::default()
        };
        for raw in [
            "https://images.salon.example/a.jpg",
            "https://images.salon.example./a.jpg",
            "https://[2001:db8::1]/a.jpg",
            "https://[2001:db8::2]/a.jpg",
        ] {
            assert!(validate_image_url(raw, &policy).is_ok(), "{raw} should be allowed");
        }
        assert_eq!(
            validate_image_url("https://[2001:db8::3]/a.jpg", &policy),
            Err(UrlViolation::HostNotAllowed("2001:db8::3".into()))
        );
    }

    #[test]
    fn test_extension() {
        let policy = open_policy();
        assert_eq!(
            validate_image_url("https://cdn.example.com/a.svg", &policy),
            Err(UrlViolation::ExtensionNotAllowed("svg".into()))
        );
        assert_eq!(
            validate_image_url("https://cdn.example.com/image", &policy),
            Err(UrlViolation::ExtensionNotAllowed(String::new()))
        );
    }

    #[test]
    fn test_length_limits() {
        let policy = open_policy();
        let long_path = format!("https://cdn.example.com/{}.png", "a".repeat(260));
        assert_eq!(validate_image_url(&long_path, &policy), Err(UrlViolation::PathTooLong));

        let long_query = format!("https://cdn.example.com/a.png?q={}", "b".repeat(600));
        assert_eq!(validate_image_url(&long_query, &policy), Err(UrlViolation::QueryTooLong));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(
            validate_image_url("not a url", &open_policy()),
            Err(UrlViolation::Unparseable)
        );
    }
}
