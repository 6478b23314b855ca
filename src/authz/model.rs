//! The compiled authorization model
//!
//! An [`AuthzModel`] is produced once by [`AuthzModel::load`] and never
//! mutated afterwards, so any number of threads can query it without
//! locking. Reloading means building a new model and swapping it in (see
//! [`crate::authz::SharedAuthz`]).

use crate::authz::groups;
use crate::authz::interner::StringArena;
use crate::authz::parse::RuleCompiler;
use crate::authz::patterns::PathPattern;
use crate::authz::rights::RightsTable;
use crate::authz::types::{AccessLevel, RepoScope};
use crate::error::AuthzResult;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Fully expanded members of one group
pub type MemberSet = Arc<HashSet<Arc<str>>>;

/// One access-control entry of a rule
#[derive(Debug, Clone)]
pub struct Ace {
    pub(crate) name: Arc<str>,
    pub(crate) inverted: bool,
    pub(crate) access: AccessLevel,
    /// Set for group entries
    pub(crate) members: Option<MemberSet>,
}

impl Ace {
    /// User or group name, without the `@`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub fn is_group(&self) -> bool {
        self.members.is_some()
    }

    /// Whether this entry applies to `user`, honouring inversion
    pub fn matches(&self, user: &str) -> bool {
        let named = match &self.members {
            Some(members) => members.contains(user),
            None => self.name.as_ref() == user,
        };
        named != self.inverted
    }
}

/// One compiled rule section
#[derive(Debug, Clone)]
pub struct Acl {
    pub(crate) sequence_number: usize,
    pub(crate) section: Arc<str>,
    pub(crate) repos: RepoScope,
    pub(crate) rule: PathPattern,
    pub(crate) anon_access: Option<AccessLevel>,
    pub(crate) authn_access: Option<AccessLevel>,
    pub(crate) user_access: Vec<Ace>,
}

impl Acl {
    /// Position of the section in the rules file
    pub fn sequence_number(&self) -> usize {
        self.sequence_number
    }

    /// Section header as written
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn repos(&self) -> &RepoScope {
        &self.repos
    }

    pub fn rule(&self) -> &PathPattern {
        &self.rule
    }

    pub fn is_glob(&self) -> bool {
        self.rule.is_glob()
    }

    pub fn anon_access(&self) -> Option<AccessLevel> {
        self.anon_access
    }

    pub fn authn_access(&self) -> Option<AccessLevel> {
        self.authn_access
    }

    pub fn has_anon_access(&self) -> bool {
        self.anon_access.is_some()
    }

    pub fn has_authn_access(&self) -> bool {
        self.authn_access.is_some()
    }

    pub fn user_access(&self) -> &[Ace] {
        &self.user_access
    }

    /// Access this rule grants `identity` (`None` is anonymous).
    ///
    /// Returns `None` when no entry of the rule applies to the identity, in
    /// which case the rule takes no part in decisions for it. Anonymous
    /// users are only covered by anonymous entries.
    pub fn access_for(&self, identity: Option<&str>) -> Option<AccessLevel> {
        let Some(user) = identity else {
            return self.anon_access;
        };

        let mut applies = self.authn_access.is_some();
        let mut access = self.authn_access.unwrap_or_default();
        for ace in self.user_access.iter().filter(|ace| ace.matches(user)) {
            access |= ace.access;
            applies = true;
        }
        applies.then_some(access)
    }

    /// Access granted to an authenticated user named nowhere in the rules.
    ///
    /// Such a user is matched by the authenticated entry and by every
    /// inverted entry, and by nothing else.
    pub(crate) fn unnamed_user_access(&self) -> Option<AccessLevel> {
        let mut applies = self.authn_access.is_some();
        let mut access = self.authn_access.unwrap_or_default();
        for ace in self.user_access.iter().filter(|ace| ace.inverted) {
            access |= ace.access;
            applies = true;
        }
        applies.then_some(access)
    }
}

/// Flattened group membership
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: HashMap<Arc<str>, MemberSet>,
}

impl GroupTable {
    pub(crate) fn new(groups: HashMap<Arc<str>, MemberSet>) -> Self {
        Self { groups }
    }

    /// Members of `group`, if it is defined
    pub fn members(&self, group: &str) -> Option<&HashSet<Arc<str>>> {
        self.groups.get(group).map(|members| members.as_ref())
    }

    pub fn is_member(&self, group: &str, user: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(user))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Immutable authorization model
#[derive(Debug)]
pub struct AuthzModel {
    pub(crate) strings: StringArena,
    pub(crate) acls: Vec<Acl>,
    pub(crate) groups: GroupTable,
    pub(crate) rights: RightsTable,
}

impl AuthzModel {
    /// Compile a rules file and an optional global groups file.
    ///
    /// Any error aborts the whole load; no partial model is ever produced.
    pub fn load(rules: &str, global_groups: Option<&str>) -> AuthzResult<Self> {
        let mut compiler = RuleCompiler::new();
        if let Some(text) = global_groups {
            compiler.compile_global_groups(text)?;
        }
        compiler.compile_rules(rules)?;
        let (parsed, interner) = compiler.finish();

        let resolved = groups::resolve(&parsed)?;
        let rights = RightsTable::build(&resolved.acls, &resolved.users);

        let model = Self {
            strings: interner.finish(),
            acls: resolved.acls,
            groups: resolved.groups,
            rights,
        };

        info!(
            rules = model.acls.len(),
            groups = model.groups.len(),
            users = resolved.users.len(),
            strings = model.strings.len(),
            "Loaded authorization rules"
        );

        Ok(model)
    }

    /// Rules in file order
    pub fn acls(&self) -> &[Acl] {
        &self.acls
    }

    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    /// Whether `name` occurs anywhere in the rules (user, group, alias or repository)
    pub fn knows_name(&self, name: &str) -> bool {
        self.strings.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ace(name: &str, inverted: bool, members: Option<&[&str]>) -> Ace {
        Ace {
            name: Arc::from(name),
            inverted,
            access: AccessLevel::READ,
            members: members.map(|m| Arc::new(m.iter().map(|s| Arc::from(*s)).collect())),
        }
    }

    #[test]
    fn test_ace_matching() {
        assert!(ace("harry", false, None).matches("harry"));
        assert!(!ace("harry", false, None).matches("sally"));
        assert!(!ace("harry", true, None).matches("harry"));
        assert!(ace("harry", true, None).matches("sally"));

        let team = ace("team", false, Some(&["harry", "sally"]));
        assert!(team.is_group());
        assert!(team.matches("sally"));
        assert!(!team.matches("team"));

        let not_team = ace("team", true, Some(&["harry"]));
        assert!(not_team.matches("sally"));
        assert!(!not_team.matches("harry"));
    }

    #[test]
    fn test_access_for_identity() {
        let acl = AuthzModel::load("[/]\n$authenticated = r\nharry = w\n~sally = w\n", None)
            .unwrap()
            .acls
            .remove(0);

        assert_eq!(acl.access_for(None), None);
        assert_eq!(acl.access_for(Some("harry")), Some(AccessLevel::READ_WRITE));
        assert_eq!(acl.access_for(Some("sally")), Some(AccessLevel::READ));
        assert_eq!(acl.access_for(Some("joe")), Some(AccessLevel::READ_WRITE));
        assert_eq!(acl.unnamed_user_access(), Some(AccessLevel::READ_WRITE));
    }

    #[test]
    fn test_rule_without_matching_entry_does_not_apply() {
        let acl = AuthzModel::load("[/]\nharry = rw\n", None)
            .unwrap()
            .acls
            .remove(0);
        assert_eq!(acl.access_for(Some("sally")), None);
        assert_eq!(acl.access_for(None), None);
        assert_eq!(acl.unnamed_user_access(), None);
    }

    #[test]
    fn test_explicit_deny_applies() {
        let acl = AuthzModel::load("[/]\n* =\n", None).unwrap().acls.remove(0);
        assert!(acl.has_anon_access());
        assert!(acl.has_authn_access());
        assert_eq!(acl.access_for(None), Some(AccessLevel::NONE));
        assert_eq!(acl.access_for(Some("harry")), Some(AccessLevel::NONE));
    }

    #[test]
    fn test_model_introspection() {
        let model = AuthzModel::load(
            "[groups]\nteam = harry, sally\n[greek:/A]\n@team = rw\n[:glob:/**/tmp]\n* = r\n",
            None,
        )
        .unwrap();

        assert_eq!(model.acls().len(), 2);
        assert!(!model.acls()[0].is_glob());
        assert!(model.acls()[1].is_glob());
        assert_eq!(model.acls()[0].repos().to_string(), "greek");
        assert!(model.groups().is_member("team", "sally"));
        assert!(!model.groups().is_member("team", "joe"));
        assert_eq!(model.groups().members("team").map(|m| m.len()), Some(2));
        assert!(model.knows_name("greek"));
        assert!(!model.knows_name("roman"));
    }
}
