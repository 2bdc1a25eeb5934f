//! The global seen-set plus per-host FIFO queues with next-visit
//! timestamps. Guarded by a single `parking_lot::Mutex`; no operation
//! ever needs a second lock.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use url::Url;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub normalized: String,
    pub original: String,
    pub referrer: String,
}

#[derive(Debug, Clone)]
struct SeenRecord {
    original: String,
    referrer: String,
}

struct HostQueue {
    urls: VecDeque<String>,
    next_visit: Instant,
}

struct Inner {
    queues: HashMap<String, HostQueue>,
    seen: HashMap<String, SeenRecord>,
}

pub struct Frontier {
    inner: Mutex<Inner>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queues: HashMap::new(),
                seen: HashMap::new(),
            }),
        }
    }

    /// No-op if `normalized` has already been seen. `referrer` of the
    /// first push wins; a later push for the same URL never overwrites
    /// it.
    pub fn push(&self, normalized: &str, original: &str, referrer: &str) {
        let mut inner = self.inner.lock();

        if inner.seen.contains_key(normalized) {
            tracing::debug!(url = %normalized, original = %original, "frontier duplicate, skipping");
            return;
        }

        let host = match host_of(normalized) {
            Some(host) => host,
            None => {
                tracing::warn!(url = %normalized, "frontier bad url, dropping");
                return;
            }
        };

        inner.seen.insert(
            normalized.to_string(),
            SeenRecord {
                original: original.to_string(),
                referrer: referrer.to_string(),
            },
        );

        let queue = inner.queues.entry(host.clone()).or_insert_with(|| HostQueue {
            urls: VecDeque::new(),
            next_visit: Instant::now(),
        });
        queue.urls.push_back(normalized.to_string());
        tracing::debug!(host = %host, url = %normalized, queue_len = queue.urls.len(), "frontier push");
    }

    /// Scans every host queue, dropping any that are empty. Among
    /// queues with work, returns the first whose `next_visit` has
    /// passed; otherwise the smallest remaining wait; otherwise signals
    /// drain with `(None, Duration::ZERO)`.
    pub fn pop(&self, default_delay: Duration) -> (Option<Candidate>, Duration) {
        let mut inner = self.inner.lock();

        if inner.queues.is_empty() {
            return (None, Duration::ZERO);
        }

        let now = Instant::now();
        let mut empty_hosts = Vec::new();
        let mut ready_host: Option<String> = None;
        let mut min_wait: Option<Duration> = None;

        for (host, queue) in inner.queues.iter() {
            if queue.urls.is_empty() {
                empty_hosts.push(host.clone());
                continue;
            }
            if queue.next_visit <= now {
                if ready_host.is_none() {
                    ready_host = Some(host.clone());
                }
            } else {
                let wait = queue.next_visit - now;
                if min_wait.map_or(true, |best| wait < best) {
                    min_wait = Some(wait);
                }
            }
        }

        for host in &empty_hosts {
            inner.queues.remove(host);
        }

        let Some(host) = ready_host else {
            return (None, min_wait.unwrap_or(Duration::ZERO));
        };

        let queue = inner.queues.get_mut(&host).expect("host present, just checked");
        let url = queue.urls.pop_front().expect("non-empty, just checked");
        queue.next_visit = now + default_delay;

        let seen = inner
            .seen
            .get(&url)
            .cloned()
            .expect("every queued url has a seen record");

        tracing::info!(host = %host, url = %url, "next candidate");

        (
            Some(Candidate {
                normalized: url,
                original: seen.original,
                referrer: seen.referrer,
            }),
            Duration::ZERO,
        )
    }

    /// Pending work across all host queues; excludes in-flight candidates.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.queues.values().map(|q| q.urls.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_round_trips() {
        let f = Frontier::new();
        f.push("http://example.com/a", "http://EXAMPLE.com/a", "");
        let (cand, wait) = f.pop(Duration::from_millis(1));
        assert_eq!(wait, Duration::ZERO);
        let cand = cand.unwrap();
        assert_eq!(cand.normalized, "http://example.com/a");
        assert_eq!(cand.original, "http://EXAMPLE.com/a");
    }

    #[test]
    fn duplicate_push_is_silent_noop() {
        let f = Frontier::new();
        f.push("http://example.com/a", "first", "ref-a");
        f.push("http://example.com/a", "second", "ref-b");
        assert_eq!(f.len(), 1);
        let (cand, _) = f.pop(Duration::ZERO);
        // first referrer wins
        assert_eq!(cand.unwrap().referrer, "ref-a");
        assert_eq!(f.len(), 0);
    }

    #[test]
    fn bad_host_is_dropped() {
        let f = Frontier::new();
        f.push("not a url", "not a url", "");
        assert_eq!(f.len(), 0);
    }

    #[test]
    fn host_is_lowercased() {
        let f = Frontier::new();
        f.push("http://EXAMPLE.com/a", "x", "");
        f.push("http://example.com/b", "y", "");
        // both land in the same host queue
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn pop_enforces_politeness_delay() {
        let f = Frontier::new();
        f.push("http://example.com/a", "a", "");
        f.push("http://example.com/b", "b", "");
        let delay = Duration::from_millis(50);

        let (first, wait) = f.pop(delay);
        assert!(first.is_some());
        assert_eq!(wait, Duration::ZERO);

        // immediately popping again must not return a candidate: the
        // host is cooling down.
        let (second, wait2) = f.pop(delay);
        assert!(second.is_none());
        assert!(wait2 > Duration::ZERO);
        assert!(wait2 <= delay);
    }

    #[test]
    fn pop_signals_drain_when_empty() {
        let f = Frontier::new();
        let (cand, wait) = f.pop(Duration::from_secs(1));
        assert!(cand.is_none());
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn empty_host_queue_is_garbage_collected() {
        let f = Frontier::new();
        f.push("http://example.com/a", "a", "");
        let (_cand, _) = f.pop(Duration::ZERO);
        assert_eq!(f.len(), 0);
        // a second pop observes the now-empty queue and removes it;
        // frontier correctly reports drain afterwards.
        let (cand, wait) = f.pop(Duration::ZERO);
        assert!(cand.is_none());
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn bulk_push_and_drain_yields_each_url_once() {
        let f = Frontier::new();
        let hosts = 20;
        let per_host = 50;
        for h in 0..hosts {
            for p in 0..per_host {
                let url = format!("http://host{h}.test/page{p}");
                f.push(&url, &url, "");
            }
        }
        assert_eq!(f.len(), hosts * per_host);

        let mut seen = std::collections::HashSet::new();
        loop {
            let (cand, wait) = f.pop(Duration::ZERO);
            match cand {
                Some(c) => assert!(seen.insert(c.normalized)),
                None if wait == Duration::ZERO => break,
                None => continue,
            }
        }
        assert_eq!(seen.len(), hosts * per_host);
    }
}
