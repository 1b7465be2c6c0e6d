//! binder — a small, explicit binding container.
//!
//! Bindings map a requested type (often a trait object such as
//! `dyn UserRepository`) to either a ready value or a provider closure.
//! Providers receive the container and resolve their own dependencies by type.
//!
//! Scopes
//! - value: already constructed when bound.
//! - singleton: constructed on first request, reused for the container's life.
//! - transient: constructed on every request.
//!
//! A singleton binding moves `Unconstructed -> Constructed -> TornDown` and
//! never back; a provider error leaves it `Unconstructed`. There is no global
//! container: callers build one and pass it around. Resolution is
//! single-threaded (`Container` is `!Sync`); the `Arc`s it hands out may be
//! shared across threads when `T` allows it.

use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type ErasedProvider = Box<dyn Fn(&Container) -> Result<Box<dyn Any>, ResolveError>>;

/// Resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no binding for {type_name}")]
    Unbound { type_name: &'static str },
    #[error("{type_name} is already bound")]
    AlreadyBound { type_name: &'static str },
    #[error("dependency cycle while constructing {type_name}")]
    Cycle { type_name: &'static str },
    #[error("container is torn down, cannot resolve {type_name}")]
    TornDown { type_name: &'static str },
    #[error("stored value for {type_name} has the wrong type")]
    TypeMismatch { type_name: &'static str },
    #[error("provider for {type_name} failed: {source}")]
    Provider {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },
}

impl ResolveError {
    /// Wrap a provider error, passing nested resolution errors through as-is.
    fn from_provider(type_name: &'static str, err: BoxError) -> Self {
        match err.downcast::<ResolveError>() {
            Ok(inner) => *inner,
            Err(source) => ResolveError::Provider { type_name, source },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Singleton,
    Transient,
}

/// Observable lifecycle of a binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Unconstructed,
    Constructed,
    TornDown,
}

/// What to do when a type is bound twice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverridePolicy {
    /// Second binding fails with `AlreadyBound`.
    #[default]
    Reject,
    /// Second binding replaces the first.
    LastWins,
}

enum Slot {
    Unconstructed,
    Constructed(Box<dyn Any>),
    TornDown,
}

struct Binding {
    type_name: &'static str,
    scope: Scope,
    provider: Option<ErasedProvider>,
    slot: RefCell<Slot>,
    resolving: Cell<bool>,
}

impl Binding {
    fn state(&self) -> BindingState {
        match &*self.slot.borrow() {
            Slot::Unconstructed => BindingState::Unconstructed,
            Slot::Constructed(_) => BindingState::Constructed,
            Slot::TornDown => BindingState::TornDown,
        }
    }
}

/// Collects bindings, then freezes them into a `Container`.
#[derive(Default)]
pub struct ContainerBuilder {
    bindings: HashMap<TypeId, Binding>,
    policy: OverridePolicy,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn override_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bind a ready value.
    pub fn bind_value<T: Any>(self, value: T) -> Result<Self, ResolveError> {
        self.bind_instance(Arc::new(value))
    }

    /// Bind an existing shared instance; `T` may be unsized.
    pub fn bind_instance<T: ?Sized + 'static>(self, value: Arc<T>) -> Result<Self, ResolveError> {
        self.insert::<T>(Binding {
            type_name: type_name::<T>(),
            scope: Scope::Singleton,
            provider: None,
            slot: RefCell::new(Slot::Constructed(Box::new(value))),
            resolving: Cell::new(false),
        })
    }

    /// Bind a provider called once, on first request.
    pub fn bind_singleton<T, F, E>(self, provider: F) -> Result<Self, ResolveError>
    where
        T: ?Sized + 'static,
        F: Fn(&Container) -> Result<Arc<T>, E> + 'static,
        E: Into<BoxError>,
    {
        self.bind_provider(Scope::Singleton, provider)
    }

    /// Bind a provider called on every request.
    pub fn bind_transient<T, F, E>(self, provider: F) -> Result<Self, ResolveError>
    where
        T: ?Sized + 'static,
        F: Fn(&Container) -> Result<Arc<T>, E> + 'static,
        E: Into<BoxError>,
    {
        self.bind_provider(Scope::Transient, provider)
    }

    fn bind_provider<T, F, E>(self, scope: Scope, provider: F) -> Result<Self, ResolveError>
    where
        T: ?Sized + 'static,
        F: Fn(&Container) -> Result<Arc<T>, E> + 'static,
        E: Into<BoxError>,
    {
        let erased: ErasedProvider = Box::new(move |c| {
            provider(c)
                .map(|v| Box::new(v) as Box<dyn Any>)
                .map_err(|e| ResolveError::from_provider(type_name::<T>(), e.into()))
        });
        self.insert::<T>(Binding {
            type_name: type_name::<T>(),
            scope,
            provider: Some(erased),
            slot: RefCell::new(Slot::Unconstructed),
            resolving: Cell::new(false),
        })
    }

    fn insert<T: ?Sized + 'static>(mut self, binding: Binding) -> Result<Self, ResolveError> {
        let id = TypeId::of::<T>();
        if self.policy == OverridePolicy::Reject && self.bindings.contains_key(&id) {
            return Err(ResolveError::AlreadyBound {
                type_name: binding.type_name,
            });
        }
        debug!(type_name = binding.type_name, scope = ?binding.scope, "binding registered");
        self.bindings.insert(id, binding);
        Ok(self)
    }

    pub fn build(self) -> Container {
        Container {
            bindings: self.bindings,
            torn_down: Cell::new(false),
        }
    }
}

/// Resolves bound types.
pub struct Container {
    bindings: HashMap<TypeId, Binding>,
    torn_down: Cell<bool>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Resolve `T`, constructing it if its binding requires.
    pub fn get<T: ?Sized + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let name = type_name::<T>();
        if self.torn_down.get() {
            return Err(ResolveError::TornDown { type_name: name });
        }
        let binding = self
            .bindings
            .get(&TypeId::of::<T>())
            .ok_or(ResolveError::Unbound { type_name: name })?;

        match &*binding.slot.borrow() {
            Slot::Constructed(value) => return downcast::<T>(&**value),
            Slot::TornDown => return Err(ResolveError::TornDown { type_name: name }),
            Slot::Unconstructed => {}
        }

        let provider = binding
            .provider
            .as_ref()
            .ok_or(ResolveError::TypeMismatch { type_name: name })?;
        if binding.resolving.replace(true) {
            return Err(ResolveError::Cycle { type_name: name });
        }
        let result = provider(self);
        binding.resolving.set(false);
        let value = result?;
        let resolved = downcast::<T>(&*value)?;

        // a provider may have shut the container down
        if self.torn_down.get() {
            return Err(ResolveError::TornDown { type_name: name });
        }
        if binding.scope == Scope::Singleton {
            debug!(type_name = name, "singleton constructed");
            *binding.slot.borrow_mut() = Slot::Constructed(value);
        }
        Ok(resolved)
    }

    pub fn state<T: ?Sized + 'static>(&self) -> BindingState {
        self.bindings
            .get(&TypeId::of::<T>())
            .map_or(BindingState::Unbound, Binding::state)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop every constructed instance held by the container. Idempotent.
    pub fn shutdown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        let mut released = 0usize;
        for binding in self.bindings.values() {
            let previous = binding.slot.replace(Slot::TornDown);
            if matches!(previous, Slot::Constructed(_)) {
                released += 1;
            }
        }
        info!(released, "container shut down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.bindings.values().map(|b| b.type_name).collect();
        names.sort_unstable();
        f.debug_struct("Container")
            .field("bindings", &names)
            .field("torn_down", &self.torn_down.get())
            .finish()
    }
}

fn downcast<T: ?Sized + 'static>(value: &dyn Any) -> Result<Arc<T>, ResolveError> {
    value
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(ResolveError::TypeMismatch {
            type_name: type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter {
        fn greet(&self) -> String;
    }

    struct English {
        name: Arc<String>,
    }

    impl Greeter for English {
        fn greet(&self) -> String {
            format!("hello {}", self.name)
        }
    }

    #[derive(Debug)]
    struct Settings {
        retries: u32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn value_binding_is_constructed_immediately() {
        let c = Container::builder()
            .bind_value(Settings { retries: 3 })
            .unwrap()
            .build();
        assert_eq!(c.state::<Settings>(), BindingState::Constructed);
        assert_eq!(c.get::<Settings>().unwrap().retries, 3);
    }

    #[test]
    fn singleton_is_built_once_and_shared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let c = Container::builder()
            .bind_singleton(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Boom>(Arc::new(Settings { retries: 1 }))
            })
            .unwrap()
            .build();

        assert_eq!(c.state::<Settings>(), BindingState::Unconstructed);
        let a = c.get::<Settings>().unwrap();
        let b = c.get::<Settings>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.state::<Settings>(), BindingState::Constructed);
    }

    #[test]
    fn transient_is_built_per_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let c = Container::builder()
            .bind_transient(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Boom>(Arc::new(Settings { retries: 0 }))
            })
            .unwrap()
            .build();
        let a = c.get::<Settings>().unwrap();
        let b = c.get::<Settings>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(c.state::<Settings>(), BindingState::Unconstructed);
    }

    #[test]
    fn trait_object_resolves_through_dependencies() {
        let c = Container::builder()
            .bind_value(String::from("world"))
            .unwrap()
            .bind_singleton::<dyn Greeter, _, _>(|c| {
                let name = c.get::<String>()?;
                Ok::<_, ResolveError>(Arc::new(English { name }) as Arc<dyn Greeter>)
            })
            .unwrap()
            .build();
        assert_eq!(c.get::<dyn Greeter>().unwrap().greet(), "hello world");
    }

    #[test]
    fn unbound_type_is_an_error() {
        let c = Container::builder().build();
        assert!(c.is_empty());
        let err = c.get::<Settings>().unwrap_err();
        assert!(matches!(err, ResolveError::Unbound { .. }));
        assert_eq!(c.state::<Settings>(), BindingState::Unbound);
    }

    #[test]
    fn missing_nested_binding_propagates_unchanged() {
        let c = Container::builder()
            .bind_singleton::<dyn Greeter, _, _>(|c| {
                let name = c.get::<String>()?;
                Ok::<_, ResolveError>(Arc::new(English { name }) as Arc<dyn Greeter>)
            })
            .unwrap()
            .build();
        match c.get::<dyn Greeter>() {
            Err(ResolveError::Unbound { type_name }) => assert!(type_name.contains("String")),
            other => panic!("expected Unbound, got {:?}", other.err()),
        }
        assert_eq!(c.state::<dyn Greeter>(), BindingState::Unconstructed);
    }

    #[test]
    fn duplicate_binding_is_rejected_by_default() {
        let res = Container::builder()
            .bind_value(1u32)
            .unwrap()
            .bind_value(2u32);
        assert!(matches!(res, Err(ResolveError::AlreadyBound { .. })));
    }

    #[test]
    fn last_wins_policy_replaces() {
        let c = Container::builder()
            .override_policy(OverridePolicy::LastWins)
            .bind_value(1u32)
            .unwrap()
            .bind_value(2u32)
            .unwrap()
            .build();
        assert_eq!(*c.get::<u32>().unwrap(), 2);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn cycle_is_detected() {
        let c = Container::builder()
            .bind_singleton(|c| {
                c.get::<u64>()?;
                Ok::<_, ResolveError>(Arc::new(1u32))
            })
            .unwrap()
            .bind_singleton(|c| {
                c.get::<u32>()?;
                Ok::<_, ResolveError>(Arc::new(1u64))
            })
            .unwrap()
            .build();
        assert!(matches!(c.get::<u32>(), Err(ResolveError::Cycle { .. })));
        // the failed attempt leaves both bindings re-resolvable
        assert_eq!(c.state::<u32>(), BindingState::Unconstructed);
        assert_eq!(c.state::<u64>(), BindingState::Unconstructed);
    }

    #[test]
    fn failed_provider_can_be_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let c = Container::builder()
            .bind_singleton(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Boom)
                } else {
                    Ok(Arc::new(Settings { retries: 9 }))
                }
            })
            .unwrap()
            .build();
        let err = c.get::<Settings>().unwrap_err();
        assert!(matches!(err, ResolveError::Provider { .. }));
        assert_eq!(c.state::<Settings>(), BindingState::Unconstructed);
        assert_eq!(c.get::<Settings>().unwrap().retries, 9);
    }

    #[test]
    fn shutdown_tears_down_every_binding() {
        let c = Container::builder()
            .bind_value(Settings { retries: 1 })
            .unwrap()
            .bind_singleton(|_| Ok::<_, Boom>(Arc::new(5u8)))
            .unwrap()
            .build();
        let held = c.get::<Settings>().unwrap();
        c.shutdown();
        c.shutdown();
        assert!(c.is_torn_down());
        assert_eq!(c.state::<Settings>(), BindingState::TornDown);
        assert_eq!(c.state::<u8>(), BindingState::TornDown);
        assert!(matches!(c.get::<u8>(), Err(ResolveError::TornDown { .. })));
        // handles given out earlier stay valid
        assert_eq!(held.retries, 1);
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[test]
    fn shutdown_during_construction_is_not_cached() {
        let c = Container::builder()
            .bind_singleton(|c| {
                c.shutdown();
                Ok::<_, Boom>(Arc::new(7u8))
            })
            .unwrap()
            .build();
        assert!(matches!(c.get::<u8>(), Err(ResolveError::TornDown { .. })));
        assert!(c.is_torn_down());
        assert_eq!(c.state::<u8>(), BindingState::TornDown);
        assert!(!c.is_empty());
    }
}
