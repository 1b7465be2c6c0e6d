use std::sync::{Mutex, MutexGuard};

use crate::{ensure_unsaved, require_id, CoreError, User, UserRepository};

/// Simple in-memory repository. Data is lost when the value is dropped.
///
/// Ids come from a monotonic counter starting at 1 and are never reused.
/// `all` returns users in insertion order.
pub struct InMemoryUserRepo {
    inner: Mutex<Inner>,
}

struct Inner {
    users: Vec<User>,
    next_id: u64,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                users: Vec::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::backend("mutex poisoned"))
    }

    pub fn len(&self) -> Result<usize, CoreError> {
        Ok(self.lock()?.users.len())
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryUserRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRepository for InMemoryUserRepo {
    fn find_by_name(&self, name: &str) -> Result<Option<User>, CoreError> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.name == name).cloned())
    }

    fn all(&self) -> Result<Vec<User>, CoreError> {
        Ok(self.lock()?.users.clone())
    }

    fn create(&self, user: &User) -> Result<User, CoreError> {
        ensure_unsaved(user)?;
        let mut inner = self.lock()?;
        let id = inner.next_id;
        inner.next_id += 1;
        let created = User::with_id(id, user.name.clone());
        inner.users.push(created.clone());
        Ok(created)
    }

    fn update(&self, user: &User) -> Result<User, CoreError> {
        let id = require_id(user)?;
        let mut inner = self.lock()?;
        match inner.users.iter_mut().find(|u| u.id == Some(id)) {
            Some(stored) => {
                stored.name = user.name.clone();
                Ok(stored.clone())
            }
            None => Err(CoreError::NotFound),
        }
    }
}
