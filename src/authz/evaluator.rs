//! Access evaluator
//!
//! Pure queries over an [`AuthzModel`]. Nothing here can fail: a loaded
//! model answers every question, and an identity or path the rules do not
//! mention simply gets no access.

use crate::authz::model::{Acl, AuthzModel};
use crate::authz::types::{AccessLevel, Rights};
use tracing::{debug, trace};

impl AuthzModel {
    /// Check whether `identity` (`None` is anonymous) holds `required` on
    /// `path` in `repo`.
    ///
    /// An empty `repo` means no repository was given; only rules that apply
    /// to every repository are considered. With `recursive` the access must
    /// also hold for everything below `path`.
    pub fn check(
        &self,
        repo: &str,
        path: &str,
        identity: Option<&str>,
        required: AccessLevel,
        recursive: bool,
    ) -> bool {
        let granted = self.effective_access(repo, path, identity, recursive);
        let allowed = granted.satisfies(required);
        debug!(
            repo,
            path,
            identity = identity.unwrap_or("$anonymous"),
            required = %required,
            granted = %granted,
            recursive,
            allowed,
            "Access check"
        );
        allowed
    }

    /// Access `identity` holds on `path`, narrowed to the guaranteed floor
    /// of the repository when `recursive` is set
    pub fn effective_access(
        &self,
        repo: &str,
        path: &str,
        identity: Option<&str>,
        recursive: bool,
    ) -> AccessLevel {
        let access = self.path_access(repo, path, identity);
        if !recursive {
            return access;
        }
        let (floor, _) = self.lookup_global_rights(identity, repo_arg(repo));
        access & floor.min_access
    }

    /// Check whether `identity` holds `required` on at least one path of
    /// `repo` (any repository when empty)
    pub fn check_anywhere(&self, repo: &str, identity: Option<&str>, required: AccessLevel) -> bool {
        let (rights, _) = self.lookup_global_rights(identity, repo_arg(repo));
        rights.max_access.satisfies(required)
    }

    /// Aggregated floor and ceiling of `identity` in `repo`, or across
    /// every repository when `repo` is `None`
    pub fn global_rights(&self, identity: Option<&str>, repo: Option<&str>) -> Rights {
        self.lookup_global_rights(identity, repo).0
    }

    /// Like [`global_rights`](Self::global_rights), also reporting whether
    /// the identity has rules of its own in `repo`
    pub fn lookup_global_rights(&self, identity: Option<&str>, repo: Option<&str>) -> (Rights, bool) {
        self.rights.lookup(identity, repo)
    }

    /// Access granted on exactly `path`, inherited from the nearest ancestor
    /// that has an applicable rule
    fn path_access(&self, repo: &str, path: &str, identity: Option<&str>) -> AccessLevel {
        let components = canonical_components(path);

        for depth in (0..=components.len()).rev() {
            let prefix = &components[..depth];
            if let Some((acl, access)) = self.deciding_rule(repo, prefix, identity) {
                trace!(
                    section = acl.section(),
                    sequence = acl.sequence_number(),
                    depth,
                    access = %access,
                    "Deciding rule"
                );
                return access;
            }
        }
        AccessLevel::NONE
    }

    /// The most specific rule for `components` that mentions `identity`.
    ///
    /// Repository-scoped rules beat rules for any repository; among equals
    /// the one defined last wins.
    fn deciding_rule(
        &self,
        repo: &str,
        components: &[&str],
        identity: Option<&str>,
    ) -> Option<(&Acl, AccessLevel)> {
        self.acls
            .iter()
            .filter(|acl| acl.repos().applies_to(repo) && acl.rule().matches(components))
            .filter_map(|acl| acl.access_for(identity).map(|access| (acl, access)))
            .max_by_key(|(acl, _)| (acl.repos().is_specific(), acl.sequence_number()))
    }
}

fn repo_arg(repo: &str) -> Option<&str> {
    (!repo.is_empty()).then_some(repo)
}

/// Split a query path into components, resolving `.` and `..`
fn canonical_components(path: &str) -> Vec<&str> {
    let mut components = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            c => components.push(c),
        }
    }
    components
}
