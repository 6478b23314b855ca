//! Group and alias resolver (pass 2)
//!
//! Flattens group definitions into plain member sets and rewrites every raw
//! rule entry into its final form: aliases are replaced by the user they
//! stand for and group entries are bound to their expanded member set.

use crate::authz::model::{Ace, Acl, GroupTable, MemberSet};
use crate::authz::parse::{ParsedRules, RawAcl, RawGroups};
use crate::authz::types::EntryKind;
use crate::error::{AuthzError, AuthzResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type Aliases = HashMap<Arc<str>, Arc<str>>;

/// Output of pass 2
#[derive(Debug)]
pub(crate) struct Resolved {
    pub acls: Vec<Acl>,
    pub groups: GroupTable,
    /// Every concrete user name mentioned by the rules
    pub users: HashSet<Arc<str>>,
}

/// Resolve groups, aliases and rule entries
pub(crate) fn resolve(parsed: &ParsedRules) -> AuthzResult<Resolved> {
    let expanded = expand_groups(&parsed.groups, &parsed.aliases)?;

    let acls = parsed
        .acls
        .iter()
        .map(|raw| resolve_acl(raw, &expanded, &parsed.aliases))
        .collect::<AuthzResult<Vec<_>>>()?;

    let mut users: HashSet<Arc<str>> = parsed.aliases.values().cloned().collect();
    for members in expanded.values() {
        users.extend(members.iter().cloned());
    }
    for acl in &acls {
        users.extend(
            acl.user_access
                .iter()
                .filter(|ace| !ace.is_group())
                .map(|ace| Arc::clone(&ace.name)),
        );
    }

    Ok(Resolved {
        acls,
        groups: GroupTable::new(expanded),
        users,
    })
}

/// Expand every group in definition order
fn expand_groups(raw: &RawGroups, aliases: &Aliases) -> AuthzResult<HashMap<Arc<str>, MemberSet>> {
    let mut expander = GroupExpander {
        raw,
        aliases,
        done: HashMap::with_capacity(raw.order.len()),
        stack: Vec::new(),
    };
    for group in &raw.order {
        expander.expand(group, None)?;
    }
    Ok(expander.done)
}

struct GroupExpander<'a> {
    raw: &'a RawGroups,
    aliases: &'a Aliases,
    done: HashMap<Arc<str>, MemberSet>,
    /// Groups on the current recursion path
    stack: Vec<Arc<str>>,
}

impl GroupExpander<'_> {
    fn expand(&mut self, group: &str, referrer: Option<&str>) -> AuthzResult<MemberSet> {
        if let Some(members) = self.done.get(group) {
            return Ok(Arc::clone(members));
        }
        if self.stack.iter().any(|g| g.as_ref() == group) {
            return Err(AuthzError::RecursiveGroupDefinition {
                group: group.to_string(),
            });
        }
        let (raw, aliases) = (self.raw, self.aliases);
        let Some((name, raw_members)) = raw.members.get_key_value(group) else {
            return Err(AuthzError::UndefinedGroup {
                group: group.to_string(),
                context: referrer.map_or_else(String::new, |g| format!("group '{g}'")),
            });
        };

        self.stack.push(Arc::clone(name));
        let mut members = HashSet::new();
        for member in raw_members {
            if let Some(alias) = member.strip_prefix('&') {
                let user = aliases.get(alias).ok_or_else(|| AuthzError::UndefinedAlias {
                    alias: alias.to_string(),
                    context: format!("group '{name}'"),
                })?;
                members.insert(Arc::clone(user));
            } else if let Some(nested) = member.strip_prefix('@') {
                let nested = self.expand(nested, Some(name))?;
                members.extend(nested.iter().cloned());
            } else {
                members.insert(Arc::clone(member));
            }
        }
        self.stack.pop();

        let members: MemberSet = Arc::new(members);
        self.done.insert(Arc::clone(name), Arc::clone(&members));
        Ok(members)
    }
}

fn resolve_acl(
    raw: &RawAcl,
    groups: &HashMap<Arc<str>, MemberSet>,
    aliases: &Aliases,
) -> AuthzResult<Acl> {
    let context = || format!("section [{}]", raw.section);

    // Users first, with alias entries folded onto the user they name
    let mut user_access: Vec<Ace> = Vec::with_capacity(raw.entries.len());
    for entry in &raw.entries {
        let user = match &entry.kind {
            EntryKind::User(user) => Arc::clone(user),
            EntryKind::Alias(alias) => {
                let user = aliases.get(alias).ok_or_else(|| AuthzError::UndefinedAlias {
                    alias: alias.to_string(),
                    context: context(),
                })?;
                Arc::clone(user)
            }
            _ => continue,
        };

        match user_access
            .iter_mut()
            .find(|ace| ace.name == user && ace.inverted == entry.inverted)
        {
            Some(existing) => existing.access |= entry.access,
            None => user_access.push(Ace {
                name: user,
                inverted: entry.inverted,
                access: entry.access,
                members: None,
            }),
        }
    }

    for entry in &raw.entries {
        let EntryKind::Group(group) = &entry.kind else {
            continue;
        };
        let members = groups.get(group).ok_or_else(|| AuthzError::UndefinedGroup {
            group: group.to_string(),
            context: context(),
        })?;
        user_access.push(Ace {
            name: Arc::clone(group),
            inverted: entry.inverted,
            access: entry.access,
            members: Some(Arc::clone(members)),
        });
    }

    Ok(Acl {
        sequence_number: raw.sequence_number,
        section: Arc::clone(&raw.section),
        repos: raw.repos.clone(),
        rule: raw.rule.clone(),
        anon_access: raw.anon_access,
        authn_access: raw.authn_access,
        user_access,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::parse::RuleCompiler;
    use crate::authz::types::AccessLevel;

    fn resolve_text(text: &str) -> AuthzResult<Resolved> {
        let mut compiler = RuleCompiler::new();
        compiler.compile_rules(text)?;
        resolve(&compiler.finish().0)
    }

    fn sorted(members: &HashSet<Arc<str>>) -> Vec<String> {
        let mut names: Vec<_> = members.iter().map(|m| m.to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_nested_groups_are_flattened() {
        let resolved = resolve_text(
            "[groups]\nall = @greeks, @romans, zeus\ngreeks = plato, &phil\nromans = cicero\n[aliases]\nphil = aristotle\n",
        )
        .unwrap();
        let all = resolved.groups.members("all").unwrap();
        assert_eq!(sorted(all), vec!["aristotle", "cicero", "plato", "zeus"]);
        assert!(resolved.groups.is_member("greeks", "aristotle"));
    }

    #[test]
    fn test_recursive_groups_are_rejected() {
        let err = resolve_text(
            "[groups]\nslaves = cooks, scribes, @gladiators\ngladiators = equites, thraces, @slaves\n",
        )
        .unwrap_err();
        assert_eq!(
            err,
            AuthzError::RecursiveGroupDefinition {
                group: "slaves".into()
            }
        );
    }

    #[test]
    fn test_self_reference_is_recursive() {
        let err = resolve_text("[groups]\nloop = a, @loop\n").unwrap_err();
        assert!(matches!(err, AuthzError::RecursiveGroupDefinition { group } if group == "loop"));
    }

    #[test]
    fn test_shared_subgroup_is_not_a_cycle() {
        let resolved = resolve_text("[groups]\na = @c\nb = @c\nc = x\n").unwrap();
        assert!(resolved.groups.is_member("a", "x"));
        assert!(resolved.groups.is_member("b", "x"));
    }

    #[test]
    fn test_undefined_references_in_groups() {
        let err = resolve_text("[groups]\na = @missing\n").unwrap_err();
        assert!(
            matches!(err, AuthzError::UndefinedGroup { group, context } if group == "missing" && context == "group 'a'")
        );

        let err = resolve_text("[groups]\na = &nobody\n").unwrap_err();
        assert!(matches!(err, AuthzError::UndefinedAlias { alias, .. } if alias == "nobody"));
    }

    #[test]
    fn test_undefined_references_in_rules() {
        let err = resolve_text("[/]\n@senate = r\n").unwrap_err();
        assert_eq!(
            err,
            AuthzError::UndefinedGroup {
                group: "senate".into(),
                context: "section [/]".into()
            }
        );

        let err = resolve_text("[/]\n&caesar = r\n").unwrap_err();
        assert!(matches!(err, AuthzError::UndefinedAlias { alias, .. } if alias == "caesar"));
    }

    #[test]
    fn test_alias_entries_merge_into_user_entries() {
        let resolved =
            resolve_text("[aliases]\nboss = harry\n[/A]\nharry = r\n&boss = w\n~&boss = r\n").unwrap();
        let aces = resolved.acls[0].user_access();
        assert_eq!(aces.len(), 2);
        assert_eq!(aces[0].name(), "harry");
        assert!(!aces[0].is_inverted());
        assert_eq!(aces[0].access(), AccessLevel::READ_WRITE);
        assert!(aces[1].is_inverted());
        assert_eq!(aces[1].access(), AccessLevel::READ);
    }

    #[test]
    fn test_group_entries_bind_member_sets() {
        let resolved = resolve_text("[groups]\nteam = harry, sally\n[/]\n~@team = r\n").unwrap();
        let ace = &resolved.acls[0].user_access()[0];
        assert!(ace.is_group());
        assert!(ace.is_inverted());
        assert!(!ace.matches("sally"));
        assert!(ace.matches("joe"));
    }

    #[test]
    fn test_users_collected_from_every_source() {
        let resolved = resolve_text(
            "[groups]\nteam = sally\n[aliases]\nboss = harry\nspare = joe\n[/]\nplato = r\n@team = r\n",
        )
        .unwrap();
        assert_eq!(sorted(&resolved.users), vec!["harry", "joe", "plato", "sally"]);
    }
}
