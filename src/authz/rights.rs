//! Global rights aggregator
//!
//! Summarises, per identity, the least and greatest access any rule grants,
//! overall and per repository. Built once while loading so that path-less
//! and recursive questions are answered without walking the rules again.

use crate::authz::model::Acl;
use crate::authz::types::{AccessLevel, RepoScope, Rights};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Aggregated rights of one identity
#[derive(Debug, Clone)]
pub(crate) struct GlobalRights {
    /// Every rule, whatever its scope
    all_repos: Option<Rights>,
    /// Rules that apply to any repository
    any_repo: Option<Rights>,
    /// Rules scoped to one repository
    per_repo: HashMap<Arc<str>, Rights>,
}

impl GlobalRights {
    fn new() -> Self {
        Self {
            all_repos: None,
            any_repo: None,
            per_repo: HashMap::new(),
        }
    }

    fn update(&mut self, scope: &RepoScope, access: AccessLevel) {
        self.all_repos.get_or_insert_with(Rights::unset).fold(access);
        let bucket = match scope {
            RepoScope::Any => self.any_repo.get_or_insert_with(Rights::unset),
            RepoScope::Named(repo) => self
                .per_repo
                .entry(Arc::clone(repo))
                .or_insert_with(Rights::unset),
        };
        bucket.fold(access);
    }

    /// Rights in `repo` (`None` for every repository) and whether the
    /// identity had rules of its own there
    fn resolve(&self, repo: Option<&str>) -> (Rights, bool) {
        let Some(repo) = repo else {
            return self.all_repos.map_or((Rights::NONE, false), |rights| (rights, true));
        };

        let (mut rights, found) = match self.per_repo.get(repo) {
            Some(rights) => (*rights, true),
            None => (Rights::NONE, false),
        };
        if let Some(any) = &self.any_repo {
            rights.combine(any);
        }
        (rights, found)
    }
}

/// Global rights of every identity the rules mention
#[derive(Debug, Default)]
pub(crate) struct RightsTable {
    anonymous: Option<GlobalRights>,
    /// The authenticated entries alone
    authenticated: Option<GlobalRights>,
    /// An authenticated user the rules never name
    unnamed: Option<GlobalRights>,
    /// One bucket per named user, empty when no rule applies to them
    users: HashMap<Arc<str>, GlobalRights>,
}

impl RightsTable {
    pub fn build(acls: &[Acl], users: &HashSet<Arc<str>>) -> Self {
        let mut table = Self {
            users: users
                .iter()
                .map(|user| (Arc::clone(user), GlobalRights::new()))
                .collect(),
            ..Self::default()
        };

        for acl in acls {
            let scope = acl.repos();
            if let Some(access) = acl.anon_access() {
                update(&mut table.anonymous, scope, access);
            }
            if let Some(access) = acl.authn_access() {
                update(&mut table.authenticated, scope, access);
            }
            if let Some(access) = acl.unnamed_user_access() {
                update(&mut table.unnamed, scope, access);
            }
            for user in users {
                if let Some(access) = acl.access_for(Some(user))
                    && let Some(global) = table.users.get_mut(user)
                {
                    global.update(scope, access);
                }
            }
        }

        table
    }

    /// Look up the aggregated rights of `identity` (`None` is anonymous).
    ///
    /// The flag is true when rules for the identity itself exist in `repo`.
    pub fn lookup(&self, identity: Option<&str>, repo: Option<&str>) -> (Rights, bool) {
        let Some(user) = identity else {
            return resolve(self.anonymous.as_ref(), repo);
        };

        let Some(own) = self.users.get(user) else {
            return resolve(self.unnamed.as_ref(), repo);
        };

        let (mut rights, mut found) = own.resolve(repo);
        if let Some(authenticated) = &self.authenticated {
            let (authn, authn_found) = authenticated.resolve(repo);
            rights.combine(&authn);
            found |= authn_found;
        }
        (rights, found)
    }
}

fn update(slot: &mut Option<GlobalRights>, scope: &RepoScope, access: AccessLevel) {
    slot.get_or_insert_with(GlobalRights::new)
        .update(scope, access);
}

fn resolve(rights: Option<&GlobalRights>, repo: Option<&str>) -> (Rights, bool) {
    rights.map_or((Rights::NONE, false), |r| r.resolve(repo))
}
