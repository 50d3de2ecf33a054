/// Providers whose pages may be framed when no configuration overrides the list
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    // Social media
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
    "linkedin.com",
    "tiktok.com",
    // Video platforms
    "youtube.com",
    "youtube-nocookie.com",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    // Code playgrounds
    "codepen.io",
    "jsfiddle.net",
    "codesandbox.io",
    "stackblitz.com",
    "github.com",
    // Maps
    "google.com",
    "openstreetmap.org",
    // Forms and documents
    "forms.gle",
    "typeform.com",
    "airtable.com",
    // Media
    "spotify.com",
    "soundcloud.com",
    "figma.com",
    "canva.com",
    "slideshare.net",
];

/// Set of domains allowed inside iframes.
///
/// A host is permitted when it equals an entry or ends with `"." + entry`,
/// so `www.youtube.com` matches `youtube.com` but `evil-youtube.com` does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    domains: Vec<String>,
}

impl AllowList {
    /// Build an allow-list, normalising entries to lowercase without
    /// surrounding dots. Empty entries are dropped.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = domains
            .into_iter()
            .map(|domain| normalize_host(domain.as_ref()))
            .filter(|domain| !domain.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();

        Self {
            domains: normalized,
        }
    }

    /// Check whether a hostname is covered by the list
    pub fn permits(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if host.is_empty() {
            return false;
        }

        self.domains.iter().any(|domain| {
            host == *domain
                || (host.len() > domain.len()
                    && host.ends_with(domain.as_str())
                    && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
        })
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_DOMAINS)
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_subdomain_match() {
        let list = AllowList::default();
        assert!(list.permits("youtube.com"));
        assert!(list.permits("www.youtube.com"));
        assert!(list.permits("WWW.YouTube.COM"));
        assert!(list.permits("docs.google.com"));
        assert!(list.permits("gist.github.com"));
    }

    #[test]
    fn test_suffix_without_dot_boundary_is_rejected() {
        let list = AllowList::default();
        assert!(!list.permits("evil-youtube.com"));
        assert!(!list.permits("notx.com"));
        assert!(!list.permits("youtube.com.evil.com"));
        assert!(!list.permits(""));
    }

    #[test]
    fn test_entries_are_normalized() {
        let list = AllowList::new([" .Example.ORG. ", "", "example.org"]);
        assert_eq!(list.domains(), &["example.org".to_string()]);
        assert!(list.permits("cdn.example.org."));
    }
}
