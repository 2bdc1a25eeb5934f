//! Drives the frontier/worker-pool loop: politeness waits, the crawl
//! limit, and shutdown. See `SPEC_FULL.md` §4.6.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::sleep;
use url::Url;

use crate::config::Config;
use crate::fetch::{fetch_and_process, CrawlResult};
use crate::frontier::{Candidate, Frontier};
use crate::robots::RobotsGate;
use crate::stats::CrawlStats;
use store::PageStore;

pub struct Coordinator {
    user_agent: String,
    workers: usize,
    crawl_limit: usize,
    politeness_delay: Duration,
    frontier: Arc<Frontier>,
    store: Arc<dyn PageStore>,
    client: Client,
    robots: RobotsGate,
    stats: CrawlStats,
}

impl Coordinator {
    pub fn new(
        config: &Config,
        frontier: Arc<Frontier>,
        store: Arc<dyn PageStore>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.crawler.user_agent.clone())
            .redirect(reqwest::redirect::Policy::default())
            .build()?;

        Ok(Self {
            user_agent: config.crawler.user_agent.clone(),
            workers: config.crawler.workers,
            crawl_limit: config.crawler.crawl_limit,
            politeness_delay: config.politeness.delay(),
            frontier,
            store,
            client,
            robots: RobotsGate::new(config.politeness.robots_timeout()),
            stats: CrawlStats::start(),
        })
    }

    /// Runs the crawl to completion, or until `shutdown` fires. Spawns
    /// `workers` fetcher tasks up front; they share one job queue via a
    /// mutex-guarded receiver (mirroring multiple goroutines reading a
    /// single Go channel) and each hold their own sender clone for
    /// results.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> CrawlStats {
        let workers = self.workers.max(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Candidate>(workers);
        let (results_tx, mut results_rx) = mpsc::channel::<CrawlResult>(workers);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let mut worker_handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let jobs_rx = jobs_rx.clone();
            let results_tx = results_tx.clone();
            let client = self.client.clone();
            let user_agent = self.user_agent.clone();
            worker_handles.push(tokio::spawn(async move {
                tracing::info!(id, "worker started");
                loop {
                    let job = { jobs_rx.lock().await.recv().await };
                    let Some(candidate) = job else {
                        return;
                    };
                    tracing::debug!(id, url = %candidate.normalized, "worker received job");
                    let result = fetch_and_process(&client, &user_agent, candidate).await;
                    if results_tx.send(result).await.is_err() {
                        return;
                    }
                }
            }));
        }
        drop(results_tx);

        let mut active: usize = 0;

        'outer: loop {
            if self.crawl_limit > 0 && self.stats.pages_processed >= self.crawl_limit {
                while active > 0 {
                    tokio::select! {
                        Some(result) = results_rx.recv() => {
                            active -= 1;
                            self.process_result(result).await;
                        }
                        _ = shutdown.changed() => break 'outer,
                    }
                }
                break;
            }

            let mut candidate: Option<Candidate> = None;

            if self.frontier.len() > 0 {
                let (popped, wait) = self.frontier.pop(self.politeness_delay);
                match popped {
                    Some(cand) => {
                        if self.robots_disallows(&cand).await {
                            continue 'outer;
                        }
                        candidate = Some(cand);
                    }
                    None if wait == Duration::ZERO => {
                        if active == 0 {
                            tracing::info!("frontier empty and no active workers, mission complete");
                            break 'outer;
                        }
                        continue 'outer;
                    }
                    None => {
                        tokio::select! {
                            _ = sleep(wait) => {}
                            _ = shutdown.changed() => break 'outer,
                        }
                        continue 'outer;
                    }
                }
            } else if active == 0 {
                tracing::info!("frontier empty and no active workers, mission complete");
                break 'outer;
            }

            match candidate {
                Some(cand) => {
                    tokio::select! {
                        send_result = jobs_tx.send(cand) => {
                            if send_result.is_ok() {
                                active += 1;
                                tracing::info!(active_workers = active, pending = self.frontier.len(), "job dispatched");
                            }
                        }
                        Some(result) = results_rx.recv() => {
                            active -= 1;
                            self.process_result(result).await;
                        }
                        _ = shutdown.changed() => break 'outer,
                    }
                }
                None => {
                    tokio::select! {
                        Some(result) = results_rx.recv() => {
                            active -= 1;
                            self.process_result(result).await;
                        }
                        _ = shutdown.changed() => break 'outer,
                    }
                }
            }
        }

        drop(jobs_tx);
        for handle in worker_handles {
            let _ = handle.await;
        }

        tracing::info!(
            processed = self.stats.pages_processed,
            errored = self.stats.pages_errored,
            skipped = self.stats.pages_skipped,
            elapsed_secs = self.stats.elapsed().as_secs_f64(),
            pages_per_sec = self.stats.pages_per_second(),
            "crawl complete"
        );

        self.stats
    }

    async fn robots_disallows(&mut self, candidate: &Candidate) -> bool {
        let Ok(url) = Url::parse(&candidate.normalized) else {
            return false;
        };
        match self.robots.check(&self.client, &url, &self.user_agent).await {
            Some(policy) if !policy.allows(&url) => {
                tracing::info!(url = %candidate.normalized, "robots.txt disallowed");
                true
            }
            _ => false,
        }
    }

    async fn process_result(&mut self, result: CrawlResult) {
        if let Some(error) = result.error {
            self.stats.pages_errored += 1;
            tracing::error!(url = %result.url, error = %error, "crawl failed");
            return;
        }

        let Some(page) = result.page else {
            self.stats.pages_skipped += 1;
            return;
        };

        self.stats.pages_processed += 1;
        tracing::info!(
            url = %result.url,
            outlinks = result.outlinks.len(),
            processed = self.stats.pages_processed,
            pages_per_sec = self.stats.pages_per_second(),
            "crawl success"
        );

        if let Err(error) = self.store.save_page(page).await {
            self.stats.pages_errored += 1;
            tracing::error!(url = %result.url, error = %error, "failed to save page");
        }

        for outlink in result.outlinks {
            if self.crawl_limit > 0 && self.stats.pages_processed >= self.crawl_limit {
                tracing::info!(
                    processed = self.stats.pages_processed,
                    queued = self.frontier.len(),
                    limit = self.crawl_limit,
                    "crawl limit reached, stopping outlink push"
                );
                break;
            }
            self.frontier
                .push(&outlink.normalized, &outlink.original, &result.url);
        }
    }
}
