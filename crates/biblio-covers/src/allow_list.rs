//! Host allow-list for outbound cover downloads. First-match-
//! wins egress filtering over exact and domain-suffix rules, specialised to
//! the one question a cover fetch needs answered: "is this host a known
//! free or paid cover source?"

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedHost {
    /// Exact host match, e.g. `covers.openlibrary.org`.
    Exact(String),
    /// Subdomain wildcard, e.g. `*.paid-books.example.com` matches both the
    /// apex and any subdomain.
    Wildcard(String),
}

impl AllowedHost {
    fn matches(&self, host: &str) -> bool {
        match self {
            AllowedHost::Exact(exact) => host.eq_ignore_ascii_case(exact),
            AllowedHost::Wildcard(suffix) => {
                host.eq_ignore_ascii_case(suffix) || host.to_lowercase().ends_with(&format!(".{}", suffix.to_lowercase()))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostAllowList {
    hosts: Vec<AllowedHost>,
}

impl HostAllowList {
    pub fn new(hosts: Vec<AllowedHost>) -> Self {
        Self { hosts }
    }

    /// Parses `url` and checks its host against the allow-list, first match
    /// wins. A URL with no parseable host, or whose host matches nothing, is
    /// rejected.
    pub fn check(&self, url: &url::Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.hosts.iter().any(|allowed| allowed.matches(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> HostAllowList {
        HostAllowList::new(vec![
            AllowedHost::Exact("covers.openlibrary.org".to_string()),
            AllowedHost::Wildcard("paid-books.example.com".to_string()),
        ])
    }

    #[test]
    fn exact_host_is_allowed() {
        let url = url::Url::parse("https://covers.openlibrary.org/b/id/1.jpg").unwrap();
        assert!(list().check(&url));
    }

    #[test]
    fn wildcard_matches_subdomain_and_apex() {
        let sub = url::Url::parse("https://cdn.paid-books.example.com/1.jpg").unwrap();
        let apex = url::Url::parse("https://paid-books.example.com/1.jpg").unwrap();
        assert!(list().check(&sub));
        assert!(list().check(&apex));
    }

    #[test]
    fn unlisted_host_is_rejected() {
        let url = url::Url::parse("https://evil.example.net/1.jpg").unwrap();
        assert!(!list().check(&url));
    }
}
