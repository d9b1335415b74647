use std::sync::Arc;

use crate::{
    any::{downcast, downcast_all, AnyInstance, ServiceId},
    container::Container,
    errors::ResolveErrorKind,
    registry::Registry,
    scope::ScopeKey,
    selector::ConstructionPolicy,
    trace::Trace,
};

/// State of one node of a resolution: the requested service, its position in the chain and the inherited options.
///
/// Handed to factories and lifetime managers. Nested resolutions go through [`Self::resolve`],
/// so they see this node as their parent and are counted towards the container's depth limit.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    container: &'a Container,
    service: ServiceId,
    parent: Option<&'a ResolveContext<'a>>,
    depth: usize,
    scope: Option<ScopeKey>,
    policy: ConstructionPolicy,
    trace: Option<&'a Trace>,
}

impl<'a> ResolveContext<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn root(
        container: &'a Container,
        service: ServiceId,
        scope: Option<ScopeKey>,
        policy: ConstructionPolicy,
        trace: Option<&'a Trace>,
    ) -> Self {
        Self {
            container,
            service,
            parent: None,
            depth: 0,
            scope,
            policy,
            trace,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn child(&self, service: ServiceId) -> ResolveContext<'_> {
        ResolveContext {
            container: self.container,
            service,
            parent: Some(self),
            depth: self.depth + 1,
            scope: self.scope,
            policy: self.policy,
            trace: self.trace,
        }
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn parent_service(&self) -> Option<ServiceId> {
        self.parent.map(|parent| parent.service)
    }

    /// 0 for the root resolution
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> Option<ScopeKey> {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> ConstructionPolicy {
        self.policy
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.container.registry()
    }

    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &'a Container {
        self.container
    }

    #[inline]
    #[must_use]
    pub fn trace(&self) -> Option<&'a Trace> {
        self.trace
    }

    /// Requested services from the root down to this node
    #[must_use]
    pub fn chain(&self) -> Vec<&'static str> {
        let mut chain = Vec::with_capacity(self.depth + 1);
        let mut current = Some(self);
        while let Some(context) = current {
            chain.push(context.service.name);
            current = context.parent;
        }
        chain.reverse();
        chain
    }

    /// Resolves a dependency of the current service
    ///
    /// # Errors
    /// Returns the error of the nested resolution. Use `?` to propagate it from a factory.
    pub fn resolve<D>(&self) -> Result<Arc<D>, ResolveErrorKind>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        downcast(&self.resolve_id(ServiceId::of::<D>())?)
    }

    /// Resolves every member of a multi-registered dependency
    ///
    /// # Errors
    /// Returns the error of the nested resolution
    pub fn resolve_all<D>(&self) -> Result<Vec<Arc<D>>, ResolveErrorKind>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        downcast_all(&self.resolve_id(ServiceId::of::<D>())?)
    }

    /// # Errors
    /// Returns the error of the nested resolution
    pub fn resolve_id(&self, service: ServiceId) -> Result<AnyInstance, ResolveErrorKind> {
        self.container.resolve_in(&self.child(service))
    }
}
