use std::{future::Future, sync::Arc};

use super::{combine, Notifier, NotifyFuture, Payload};

/// A notifier that only understands ready-made text.
pub trait StringNotifier: Send + Sync {
    fn notify<'a>(&'a self, message: &'a str) -> NotifyFuture<'a>;
}

impl<N: StringNotifier + ?Sized> StringNotifier for Box<N> {
    fn notify<'a>(&'a self, message: &'a str) -> NotifyFuture<'a> {
        (**self).notify(message)
    }
}

impl<N: StringNotifier + ?Sized> StringNotifier for Arc<N> {
    fn notify<'a>(&'a self, message: &'a str) -> NotifyFuture<'a> {
        (**self).notify(message)
    }
}

pub struct StringNoop;

impl StringNotifier for StringNoop {
    fn notify<'a>(&'a self, _message: &'a str) -> NotifyFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

pub struct StringNotifierFn<F>(F);

pub fn string_notifier_fn<F, Fut>(f: F) -> StringNotifierFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    StringNotifierFn(f)
}

impl<F, Fut> StringNotifier for StringNotifierFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn notify<'a>(&'a self, message: &'a str) -> NotifyFuture<'a> {
        Box::pin((self.0)(message.to_owned()))
    }
}

/// Renders the payload with its default string form before handing it over.
pub struct StringAdapter<N>(N);

impl<N: StringNotifier> StringAdapter<N> {
    pub fn new(inner: N) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> N {
        self.0
    }
}

impl<N: StringNotifier> Notifier for StringAdapter<N> {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        Box::pin(async move {
            let message = payload.to_string();
            self.0.notify(&message).await
        })
    }
}

pub trait IntoNotifier: StringNotifier + Sized + 'static {
    fn into_notifier(self) -> Box<dyn Notifier> {
        Box::new(StringAdapter(self))
    }
}

impl<N: StringNotifier + 'static> IntoNotifier for N {}

pub fn with_string_notifiers(notifiers: Vec<Box<dyn StringNotifier>>) -> Box<dyn Notifier> {
    combine(
        notifiers
            .into_iter()
            .map(IntoNotifier::into_notifier)
            .collect(),
    )
}
