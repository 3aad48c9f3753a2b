mod filter;
mod payload;
pub mod platform;
mod string;
mod template;

use std::{future::Future, pin::Pin};

use itertools::Itertools;
use spdlog::prelude::*;

pub use filter::*;
pub use payload::Payload;
pub use string::*;
pub use template::*;

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Delivers a payload somewhere.
///
/// Cancellation is done by dropping the returned future. Implementations must
/// be safe to call concurrently from many tasks.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        (**self).notify(payload)
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        (**self).notify(payload)
    }
}

/// The notification failed on at least one of the combined notifiers.
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {}", .errors.iter().map(|err| format!("{err:#}")).join("; "))]
pub struct NotificationFailed {
    errors: Vec<anyhow::Error>,
}

impl NotificationFailed {
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }
}

pub fn is_notification_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<NotificationFailed>())
}

pub struct Noop;

impl Notifier for Noop {
    fn notify<'a>(&'a self, _payload: &'a Payload) -> NotifyFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

pub struct NotifierFn<F>(F);

pub fn notify_fn<F, Fut>(f: F) -> NotifierFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    NotifierFn(f)
}

impl<F, Fut> Notifier for NotifierFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        Box::pin((self.0)(payload.clone()))
    }
}

/// Invokes every child with the same payload, in order, without stopping at
/// the first failure.
pub struct Fanout {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Fanout {
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    async fn notify_impl(&self, payload: &Payload) -> anyhow::Result<()> {
        let mut errors = vec![];
        for (i, notifier) in self.notifiers.iter().enumerate() {
            if let Err(err) = notifier.notify(payload).await {
                warn!("notifier #{i} of {} failed: {err:#}", self.notifiers.len());
                errors.push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotificationFailed { errors }.into())
        }
    }
}

impl Notifier for Fanout {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        Box::pin(self.notify_impl(payload))
    }
}

/// Combines notifiers into one. No notifier gives a no-op, a single notifier
/// is returned as is.
pub fn combine(mut notifiers: Vec<Box<dyn Notifier>>) -> Box<dyn Notifier> {
    if notifiers.len() > 1 {
        return Box::new(Fanout { notifiers });
    }
    match notifiers.pop() {
        Some(notifier) => notifier,
        None => Box::new(Noop),
    }
}

/// Same as [`combine`] but always yields a [`Fanout`], so the failure of even a
/// single child is reported as [`NotificationFailed`].
pub fn fanout(notifiers: Vec<Box<dyn Notifier>>) -> Fanout {
    Fanout { notifiers }
}
