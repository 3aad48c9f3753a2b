use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use spdlog::prelude::*;

use super::{combine, Notifier, NotifyFuture, Payload};

pub const DEFAULT_DUPLICATE_FILTER_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_DUPLICATE_FILTER_MAX_RECORDS: usize = 100;

/// Runs after the wrapped notifier succeeded.
pub type Commit = Box<dyn FnOnce() + Send>;

pub enum Decision {
    Suppress,
    Proceed(Option<Commit>),
}

impl Decision {
    pub fn proceed() -> Self {
        Self::Proceed(None)
    }

    pub fn proceed_then(commit: impl FnOnce() + Send + 'static) -> Self {
        Self::Proceed(Some(Box::new(commit)))
    }
}

/// Decides whether a payload should be delivered.
pub trait Filter: Send + Sync {
    fn decide(&self, payload: &Payload) -> Decision;
}

impl<F: Filter + ?Sized> Filter for Arc<F> {
    fn decide(&self, payload: &Payload) -> Decision {
        (**self).decide(payload)
    }
}

pub struct FilterFn<F>(F);

pub fn filter_fn<F>(f: F) -> FilterFn<F>
where
    F: Fn(&Payload) -> Decision + Send + Sync,
{
    FilterFn(f)
}

impl<F> Filter for FilterFn<F>
where
    F: Fn(&Payload) -> Decision + Send + Sync,
{
    fn decide(&self, payload: &Payload) -> Decision {
        (self.0)(payload)
    }
}

/// Consults a [`Filter`] before every dispatch. A suppressed payload counts as
/// delivered. The filter's commit only runs if the delivery succeeded.
pub struct FilterNotifier {
    filter: Box<dyn Filter>,
    notifier: Box<dyn Notifier>,
}

impl FilterNotifier {
    pub fn new(filter: impl Filter + 'static, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            filter: Box::new(filter),
            notifier: combine(notifiers),
        }
    }

    async fn notify_impl(&self, payload: &Payload) -> anyhow::Result<()> {
        let commit = match self.filter.decide(payload) {
            Decision::Suppress => {
                debug!("notification suppressed by filter: '{payload}'");
                return Ok(());
            }
            Decision::Proceed(commit) => commit,
        };

        self.notifier.notify(payload).await?;

        if let Some(commit) = commit {
            commit();
        }
        Ok(())
    }
}

impl Notifier for FilterNotifier {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        Box::pin(self.notify_impl(payload))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct DuplicateFilterParams {
    /// Within this interval an identical payload is only delivered once.
    #[serde(default, with = "humantime_serde")]
    pub dup_interval: Duration,
    /// Once reached, expired records are dropped.
    #[serde(default)]
    pub max_records: usize,
}

impl DuplicateFilterParams {
    fn or_default(self) -> Self {
        Self {
            dup_interval: if self.dup_interval.is_zero() {
                DEFAULT_DUPLICATE_FILTER_INTERVAL
            } else {
                self.dup_interval
            },
            max_records: if self.max_records == 0 {
                DEFAULT_DUPLICATE_FILTER_MAX_RECORDS
            } else {
                self.max_records
            },
        }
    }
}

type Fingerprint = [u8; 32];

/// Suppresses payloads whose default string form was delivered within the
/// last `dup_interval`.
///
/// Lookup and commit take the lock separately, so two identical payloads
/// racing each other may both be delivered before either one is recorded.
pub struct DuplicateFilter {
    params: DuplicateFilterParams,
    last_sent: Arc<RwLock<HashMap<Fingerprint, Instant>>>,
}

impl DuplicateFilter {
    pub fn new(params: DuplicateFilterParams) -> Self {
        Self {
            params: params.or_default(),
            last_sent: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn params(&self) -> &DuplicateFilterParams {
        &self.params
    }

    pub fn records_len(&self) -> usize {
        self.last_sent.read().len()
    }

    fn fingerprint(payload: &Payload) -> Fingerprint {
        let digest = Sha256::digest(payload.to_string().as_bytes());
        let mut fingerprint = Fingerprint::default();
        fingerprint.copy_from_slice(&digest);
        fingerprint
    }

    fn is_cooling_down(&self, last_sent: Instant, now: Instant) -> bool {
        now.duration_since(last_sent) <= self.params.dup_interval
    }

    fn prune_if_full(&self, now: Instant) {
        if self.last_sent.read().len() < self.params.max_records {
            return;
        }

        let mut last_sent = self.last_sent.write();
        let before = last_sent.len();
        last_sent.retain(|_, sent| self.is_cooling_down(*sent, now));
        trace!(
            "duplicate filter pruned {} expired records, {} left",
            before - last_sent.len(),
            last_sent.len()
        );
    }
}

impl Filter for DuplicateFilter {
    fn decide(&self, payload: &Payload) -> Decision {
        let fingerprint = Self::fingerprint(payload);
        let now = Instant::now();

        let last_sent = self.last_sent.read().get(&fingerprint).copied();
        let duplicated = last_sent.is_some_and(|sent| self.is_cooling_down(sent, now));

        self.prune_if_full(now);

        if duplicated {
            return Decision::Suppress;
        }

        let records = Arc::clone(&self.last_sent);
        Decision::proceed_then(move || {
            records.write().insert(fingerprint, Instant::now());
        })
    }
}

pub fn with_filter(
    filter: impl Filter + 'static,
    notifiers: Vec<Box<dyn Notifier>>,
) -> Box<dyn Notifier> {
    Box::new(FilterNotifier::new(filter, notifiers))
}

pub fn with_duplicate_filter(
    params: DuplicateFilterParams,
    notifiers: Vec<Box<dyn Notifier>>,
) -> Box<dyn Notifier> {
    with_filter(DuplicateFilter::new(params), notifiers)
}
