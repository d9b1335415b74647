use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::{DisposeErrorKind, DisposeFailure};

/// Synchronous disposal capability of a service.
///
/// Implement it for services that need structured teardown (flushing buffers, closing connections)
/// and mark the registration with `.disposable()`.
pub trait Dispose: Send + Sync {
    #[allow(clippy::missing_errors_doc)]
    fn dispose(&self) -> anyhow::Result<()>;
}

/// Asynchronous disposal capability of a service.
///
/// Preferred over [`Dispose`] when a registration carries both.
pub trait AsyncDispose: Send + Sync {
    #[allow(clippy::missing_errors_doc)]
    fn dispose_async(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

pub(crate) type SyncDisposeFn<S> = Arc<dyn Fn(&S) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type AsyncDisposeFn<S> = Arc<dyn Fn(Arc<S>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Disposal hooks of a registration, bound to each created instance.
pub(crate) struct Disposal<S: ?Sized> {
    pub(crate) sync: Option<SyncDisposeFn<S>>,
    pub(crate) r#async: Option<AsyncDisposeFn<S>>,
}

impl<S: ?Sized> Default for Disposal<S> {
    fn default() -> Self {
        Self { sync: None, r#async: None }
    }
}

impl<S> Disposal<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    #[must_use]
    pub(crate) fn bind(&self, service: &'static str, instance: &Arc<S>) -> Option<Disposer> {
        if self.sync.is_none() && self.r#async.is_none() {
            return None;
        }

        let sync = self.sync.clone().map(|dispose| {
            let instance = instance.clone();
            Box::new(move || dispose(&*instance)) as Box<dyn FnOnce() -> anyhow::Result<()> + Send>
        });
        let r#async = self.r#async.clone().map(|dispose| {
            let instance = instance.clone();
            Box::new(move || dispose(instance)) as Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>
        });

        Some(Disposer { service, sync, r#async })
    }
}

/// Disposal of one created instance.
/// Consumed on use, so an instance is disposed at most once.
pub struct Disposer {
    service: &'static str,
    sync: Option<Box<dyn FnOnce() -> anyhow::Result<()> + Send>>,
    r#async: Option<Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>>,
}

impl Disposer {
    /// Creates a disposer from a synchronous hook
    #[must_use]
    pub fn from_fn(service: &'static str, dispose: impl FnOnce() -> anyhow::Result<()> + Send + 'static) -> Self {
        Self {
            service,
            sync: Some(Box::new(dispose)),
            r#async: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Disposes the instance on the current thread.
    /// An asynchronous hook is preferred and driven to completion.
    ///
    /// # Warning
    /// Driving an asynchronous hook blocks the thread, inside an async runtime use [`Self::dispose_async`]
    #[allow(clippy::missing_errors_doc)]
    pub fn dispose(self) -> anyhow::Result<()> {
        match (self.r#async, self.sync) {
            (Some(dispose), _) => futures::executor::block_on(dispose()),
            (None, Some(dispose)) => dispose(),
            (None, None) => Ok(()),
        }
    }

    #[allow(clippy::missing_errors_doc)]
    pub async fn dispose_async(self) -> anyhow::Result<()> {
        match (self.r#async, self.sync) {
            (Some(dispose), _) => dispose().await,
            (None, Some(dispose)) => dispose(),
            (None, None) => Ok(()),
        }
    }
}

/// Disposes every instance in order. Failures don't stop the rest from being disposed.
pub(crate) fn dispose_all(disposers: Vec<Disposer>) -> Result<(), DisposeErrorKind> {
    let mut failures = Vec::new();
    for disposer in disposers {
        let service = disposer.service;
        match disposer.dispose() {
            Ok(()) => debug!(service, "Disposed"),
            Err(err) => {
                error!(service, "Dispose failed: {}", err);
                failures.push(DisposeFailure { service, error: err });
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DisposeErrorKind::Failed { failures })
    }
}

pub(crate) async fn dispose_all_async(disposers: Vec<Disposer>) -> Result<(), DisposeErrorKind> {
    let mut failures = Vec::new();
    for disposer in disposers {
        let service = disposer.service;
        match disposer.dispose_async().await {
            Ok(()) => debug!(service, "Disposed"),
            Err(err) => {
                error!(service, "Dispose failed: {}", err);
                failures.push(DisposeFailure { service, error: err });
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DisposeErrorKind::Failed { failures })
    }
}
