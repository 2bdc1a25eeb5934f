//! Resolves and caches per-origin robots policies, gating fetches.
//!
//! Owned solely by the Coordinator (see concurrency model in
//! `SPEC_FULL.md` §5): the cache is a plain `HashMap`, never behind a
//! lock, because nothing else ever touches it.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use reqwest::Client;
use robots_txt::Robots;
use url::Url;

/// An opaque, parsed robots.txt policy. `None` (at the call site, not
/// represented here) means "treat as allowed".
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    allow: Vec<String>,
    disallow: Vec<String>,
}

impl RobotsPolicy {
    /// A policy that blocks every path, used when the origin's
    /// robots.txt itself failed to serve (5xx).
    fn disallow_all() -> Self {
        Self {
            allow: Vec::new(),
            disallow: vec!["/".to_string()],
        }
    }

    fn parse(body: &str, user_agent: &str) -> Option<Self> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let robots = Robots::from_str_lossy(body);
            let section = robots.choose_section(user_agent);
            let allow = section
                .rules
                .iter()
                .filter(|rule| rule.allow)
                .map(|rule| rule.path.to_string())
                .collect();
            let disallow = section
                .rules
                .iter()
                .filter(|rule| !rule.allow)
                .map(|rule| rule.path.to_string())
                .collect();
            (allow, disallow)
        }));

        match result {
            Ok((allow, disallow)) => Some(Self { allow, disallow }),
            Err(_) => {
                tracing::warn!("panic while parsing robots.txt, treating as allowed");
                None
            }
        }
    }

    /// Longest matching rule wins; Allow wins ties with Disallow,
    /// matching the precedence most robots.txt parsers use.
    pub fn allows(&self, url: &Url) -> bool {
        let path = url.path();

        let mut best_allow: Option<&str> = None;
        for rule in &self.allow {
            if path.starts_with(rule.as_str())
                && best_allow.map_or(true, |best| rule.len() > best.len())
            {
                best_allow = Some(rule);
            }
        }

        let mut best_disallow: Option<&str> = None;
        for rule in &self.disallow {
            if rule == "/" {
                best_disallow = Some(rule);
                continue;
            }
            if path.starts_with(rule.as_str())
                && best_disallow.map_or(true, |best| rule.len() > best.len())
            {
                best_disallow = Some(rule);
            }
        }

        match (best_allow, best_disallow) {
            (Some(a), Some(d)) => a.len() >= d.len(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => true,
        }
    }
}

/// Per-origin cache of parsed robots policies, consulted before every
/// dispatch. Never evicted for the duration of a run.
pub struct RobotsGate {
    cache: HashMap<String, Option<RobotsPolicy>>,
    timeout: Duration,
}

impl RobotsGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cache: HashMap::new(),
            timeout,
        }
    }

    /// Returns the cached or newly-fetched policy for `url`'s origin.
    /// `None` means "allowed" (either no robots.txt, a fetch/parse
    /// failure, or a 4xx response).
    pub async fn check(
        &mut self,
        client: &Client,
        url: &Url,
        user_agent: &str,
    ) -> Option<RobotsPolicy> {
        let Some(robots_url) = robots_url_for(url) else {
            return None;
        };

        if let Some(cached) = self.cache.get(&robots_url) {
            return cached.clone();
        }

        let policy = fetch_and_parse(client, &robots_url, user_agent, self.timeout).await;
        self.cache.insert(robots_url, policy.clone());
        policy
    }
}

fn robots_url_for(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}/robots.txt", url.scheme(), host, port)),
        None => Some(format!("{}://{}/robots.txt", url.scheme(), host)),
    }
}

async fn fetch_and_parse(
    client: &Client,
    robots_url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Option<RobotsPolicy> {
    let response = match client
        .get(robots_url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .timeout(timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(url = %robots_url, error = %err, "failed to fetch robots.txt");
            return None;
        }
    };

    let status = response.status();
    if status.is_client_error() {
        // conventionally treated as "allow all"
        return None;
    }
    if status.is_server_error() {
        // the origin couldn't even serve its robots.txt: treat as
        // "disallow all" rather than fall through to an empty/error
        // body that would otherwise parse as "allow all"
        tracing::warn!(url = %robots_url, status = %status, "robots.txt fetch returned server error, disallowing all");
        return Some(RobotsPolicy::disallow_all());
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(url = %robots_url, error = %err, "failed to read robots.txt body");
            return None;
        }
    };

    RobotsPolicy::parse(&body, user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(allow: &[&str], disallow: &[&str]) -> RobotsPolicy {
        RobotsPolicy {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            disallow: disallow.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn disallows_matching_prefix() {
        let p = policy(&[], &["/private"]);
        assert!(!p.allows(&Url::parse("http://site.test/private/page").unwrap()));
        assert!(p.allows(&Url::parse("http://site.test/public").unwrap()));
    }

    #[test]
    fn longest_rule_wins() {
        let p = policy(&["/a/b"], &["/a"]);
        assert!(p.allows(&Url::parse("http://site.test/a/b/c").unwrap()));
        assert!(!p.allows(&Url::parse("http://site.test/a/x").unwrap()));
    }

    #[test]
    fn disallow_all_blocks_everything() {
        let p = policy(&[], &["/"]);
        assert!(!p.allows(&Url::parse("http://site.test/anything").unwrap()));
    }

    #[test]
    fn disallow_all_constructor_blocks_everything() {
        let p = RobotsPolicy::disallow_all();
        assert!(!p.allows(&Url::parse("http://site.test/anything").unwrap()));
        assert!(!p.allows(&Url::parse("http://site.test/").unwrap()));
    }

    #[test]
    fn empty_policy_allows_everything() {
        let p = policy(&[], &[]);
        assert!(p.allows(&Url::parse("http://site.test/anything").unwrap()));
    }
}
