use std::sync::Arc;

use serde::Serialize;

use crate::validate::validate_user_name;
use crate::{CoreError, User, UserRepository};

/// Application service operating on users.
///
/// It depends only on the `UserRepository` port; the concrete backend is
/// chosen by whoever builds the service.
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

/// Snapshot of the reference walkthrough, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Walkthrough {
    pub created: Vec<User>,
    pub before: Vec<User>,
    pub renamed: User,
    pub after: Vec<User>,
    pub found: Option<User>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Repository this service was built with.
    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repo
    }

    /// Create a new user with the given name.
    pub fn register(&self, name: &str) -> Result<User, CoreError> {
        validate_user_name(name)?;
        self.repo.create(&User::new(name))
    }

    /// List every stored user, in the backend's order.
    pub fn list(&self) -> Result<Vec<User>, CoreError> {
        self.repo.all()
    }

    pub fn find(&self, name: &str) -> Result<Option<User>, CoreError> {
        self.repo.find_by_name(name)
    }

    /// Rename an existing user and return the stored record.
    pub fn rename(&self, user: &User, new_name: &str) -> Result<User, CoreError> {
        validate_user_name(new_name)?;
        let mut renamed = user.clone();
        renamed.rename(new_name);
        self.repo.update(&renamed)
    }

    /// Create two users, rename the second, then look it up by its new name.
    pub fn walkthrough(&self) -> Result<Walkthrough, CoreError> {
        let first = self.register("sample1")?;
        let second = self.register("sample2")?;
        let before = self.list()?;
        let renamed = self.rename(&second, "sample_sample2")?;
        let after = self.list()?;
        let found = self.find(&renamed.name)?;
        Ok(Walkthrough {
            created: vec![first, second],
            before,
            renamed,
            after,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repo::InMemoryUserRepo;

    fn service() -> UserService {
        UserService::new(Arc::new(InMemoryUserRepo::new()))
    }

    #[test]
    fn register_assigns_id() {
        let svc = service();
        let u = svc.register("alice").unwrap();
        assert!(u.is_saved());
        assert_eq!(svc.find("alice").unwrap(), Some(u));
    }

    #[test]
    fn register_rejects_blank_name() {
        let svc = service();
        let err = svc.register("  ").unwrap_err();
        assert!(matches!(err, CoreError::InvalidName(_)));
        assert!(svc.list().unwrap().is_empty());
    }

    #[test]
    fn rename_unknown_user_is_not_found() {
        let svc = service();
        let err = svc.rename(&User::with_id(42, "ghost"), "still-ghost").unwrap_err();
        assert_eq!(err, CoreError::NotFound);
    }

    #[test]
    fn rename_does_not_touch_callers_copy() {
        let svc = service();
        let u = svc.register("bob").unwrap();
        let renamed = svc.rename(&u, "robert").unwrap();
        assert_eq!(u.name, "bob");
        assert_eq!(renamed.id, u.id);
        assert_eq!(renamed.name, "robert");
    }

    #[test]
    fn walkthrough_renames_second_user() {
        let report = service().walkthrough().unwrap();
        assert_eq!(report.before.len(), 2);
        assert_eq!(report.after.len(), 2);
        let second_id = report.created[1].id;
        let found = report.found.expect("renamed user is found");
        assert_eq!(found.id, second_id);
        assert_eq!(found.name, "sample_sample2");
        assert!(report.after.contains(&User::with_id(1, "sample1")));
    }
}
