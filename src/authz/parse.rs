//! Rule compiler (pass 1)
//!
//! Consumes section/option events and builds the raw tables: one unresolved
//! ACL per rule section, raw group member lists and raw alias definitions.
//! All syntactic validation happens here; references between groups, aliases
//! and rules are checked by [`crate::authz::groups`].

use crate::authz::interner::InternerBuilder;
use crate::authz::patterns::PathPattern;
use crate::authz::source::{SectionHandler, parse_source};
use crate::authz::types::{AccessLevel, EntryKind, RepoScope};
use crate::error::{AuthzError, AuthzResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

const GROUPS_SECTION: &str = "groups";
const ALIASES_SECTION: &str = "aliases";
const GLOB_TOKEN: &str = "glob";
const ANONYMOUS_TOKEN: &str = "$anonymous";
const AUTHENTICATED_TOKEN: &str = "$authenticated";

/// Characters a user, group or alias name may not start with
const RESERVED_START: [char; 5] = ['@', '$', '&', '*', '~'];

/// One rule section before group and alias resolution
#[derive(Debug)]
pub(crate) struct RawAcl {
    pub sequence_number: usize,
    pub section: Arc<str>,
    pub repos: RepoScope,
    pub rule: PathPattern,
    pub anon_access: Option<AccessLevel>,
    pub authn_access: Option<AccessLevel>,
    pub entries: Vec<RawAce>,
}

/// A user, group or alias entry of a rule section
#[derive(Debug)]
pub(crate) struct RawAce {
    pub kind: EntryKind,
    pub inverted: bool,
    pub access: AccessLevel,
}

/// Group definitions in file order, members still unexpanded
#[derive(Debug, Default)]
pub(crate) struct RawGroups {
    pub order: Vec<Arc<str>>,
    pub members: HashMap<Arc<str>, Vec<Arc<str>>>,
}

/// Output of pass 1
#[derive(Debug, Default)]
pub(crate) struct ParsedRules {
    pub acls: Vec<RawAcl>,
    pub groups: RawGroups,
    pub aliases: HashMap<Arc<str>, Arc<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Rules,
    GlobalGroups,
}

#[derive(Debug, Clone, Copy)]
enum CurrentSection {
    Groups,
    Aliases,
    Rule(usize),
}

/// Pass 1 state, fed one file at a time
pub(crate) struct RuleCompiler {
    interner: InternerBuilder,
    mode: Mode,
    has_global_groups: bool,
    seen_sections: HashSet<String>,
    current: Option<CurrentSection>,
    parsed: ParsedRules,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self {
            interner: InternerBuilder::new(),
            mode: Mode::Rules,
            has_global_groups: false,
            seen_sections: HashSet::new(),
            current: None,
            parsed: ParsedRules::default(),
        }
    }

    /// Compile a global groups file; it may only contain `[groups]`
    pub fn compile_global_groups(&mut self, text: &str) -> AuthzResult<()> {
        self.begin_file(Mode::GlobalGroups);
        parse_source(text, self)?;
        self.has_global_groups = true;
        Ok(())
    }

    /// Compile the primary rules file
    pub fn compile_rules(&mut self, text: &str) -> AuthzResult<()> {
        self.begin_file(Mode::Rules);
        parse_source(text, self)
    }

    pub fn finish(self) -> (ParsedRules, InternerBuilder) {
        (self.parsed, self.interner)
    }

    fn begin_file(&mut self, mode: Mode) {
        self.mode = mode;
        self.seen_sections.clear();
        self.current = None;
    }

    fn open_rule(&mut self, section: &str) -> AuthzResult<usize> {
        let header = parse_rule_header(section)?;
        let repos = match header.repo {
            Some(repo) => RepoScope::Named(self.interner.intern(repo)),
            None => RepoScope::Any,
        };
        let rule = PathPattern::compile(header.path, header.glob, section)?;

        let index = self.parsed.acls.len();
        trace!(section, sequence = index, glob = header.glob, "Compiled rule section");
        self.parsed.acls.push(RawAcl {
            sequence_number: index,
            section: self.interner.intern(section),
            repos,
            rule,
            anon_access: None,
            authn_access: None,
            entries: Vec::new(),
        });
        Ok(index)
    }

    fn add_rule_entry(
        &mut self,
        index: usize,
        section: &str,
        option: &str,
        value: &str,
    ) -> AuthzResult<()> {
        let access =
            AccessLevel::parse_rights(value).map_err(|found| AuthzError::UnknownAccessChar {
                section: section.to_string(),
                option: option.to_string(),
                value: value.to_string(),
                found,
            })?;

        if option == "*" {
            let acl = &mut self.parsed.acls[index];
            merge_access(&mut acl.anon_access, access);
            merge_access(&mut acl.authn_access, access);
            return Ok(());
        }

        let (kind, inverted) = self.parse_entry_name(section, option)?;
        let acl = &mut self.parsed.acls[index];
        match kind {
            EntryKind::Anonymous => merge_access(&mut acl.anon_access, access),
            EntryKind::Authenticated => merge_access(&mut acl.authn_access, access),
            kind => {
                match acl
                    .entries
                    .iter_mut()
                    .find(|e| e.kind == kind && e.inverted == inverted)
                {
                    Some(existing) => existing.access |= access,
                    None => acl.entries.push(RawAce {
                        kind,
                        inverted,
                        access,
                    }),
                }
            }
        }
        Ok(())
    }

    /// Decide the entry kind of a rule option.
    ///
    /// The returned flag is the inversion of user, group and alias entries;
    /// inversion of the pseudo-users is folded into the kind.
    fn parse_entry_name(&mut self, section: &str, option: &str) -> AuthzResult<(EntryKind, bool)> {
        let (inverted, name) = match option.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, option),
        };

        let Some(first) = name.chars().next() else {
            return Err(AuthzError::reserved(section, option));
        };

        let kind = match first {
            '$' => {
                let kind = match (name, inverted) {
                    (ANONYMOUS_TOKEN, false) | (AUTHENTICATED_TOKEN, true) => EntryKind::Anonymous,
                    (AUTHENTICATED_TOKEN, false) | (ANONYMOUS_TOKEN, true) => {
                        EntryKind::Authenticated
                    }
                    _ => return Err(AuthzError::reserved(section, option)),
                };
                return Ok((kind, false));
            }
            '@' => {
                let group = plain_name(&name[1..]).ok_or_else(|| AuthzError::reserved(section, option))?;
                EntryKind::Group(self.interner.intern(group))
            }
            '&' => {
                let alias = plain_name(&name[1..]).ok_or_else(|| AuthzError::reserved(section, option))?;
                EntryKind::Alias(self.interner.intern(alias))
            }
            c if RESERVED_START.contains(&c) => return Err(AuthzError::reserved(section, option)),
            _ => EntryKind::User(self.interner.intern(name)),
        };

        Ok((kind, inverted))
    }

    fn add_group(&mut self, section: &str, option: &str, value: &str) -> AuthzResult<()> {
        let group = plain_name(option).ok_or_else(|| AuthzError::reserved(section, option))?;
        let group = self.interner.intern(group);
        if self.parsed.groups.members.contains_key(&group) {
            return Err(AuthzError::DuplicateGroup {
                group: group.to_string(),
            });
        }

        let members = value
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| self.interner.intern(m))
            .collect();

        self.parsed.groups.order.push(Arc::clone(&group));
        self.parsed.groups.members.insert(group, members);
        Ok(())
    }

    fn add_alias(&mut self, section: &str, option: &str, value: &str) -> AuthzResult<()> {
        let alias = plain_name(option).ok_or_else(|| AuthzError::reserved(section, option))?;
        let alias = self.interner.intern(alias);
        if self.parsed.aliases.contains_key(&alias) {
            return Err(AuthzError::DuplicateAlias {
                alias: alias.to_string(),
            });
        }
        let user = self.interner.intern(value.trim());
        self.parsed.aliases.insert(alias, user);
        Ok(())
    }
}

impl SectionHandler for RuleCompiler {
    fn open_section(&mut self, section: &str) -> AuthzResult<()> {
        if !self.seen_sections.insert(section.to_string()) {
            return Err(AuthzError::DuplicateSection {
                section: section.to_string(),
            });
        }

        let current = match (self.mode, section) {
            (Mode::GlobalGroups, GROUPS_SECTION) => CurrentSection::Groups,
            (Mode::GlobalGroups, _) => {
                return Err(AuthzError::InvalidSection {
                    section: section.to_string(),
                });
            }
            (Mode::Rules, GROUPS_SECTION) if self.has_global_groups => {
                return Err(AuthzError::GroupsNotAllowedHere);
            }
            (Mode::Rules, GROUPS_SECTION) => CurrentSection::Groups,
            (Mode::Rules, ALIASES_SECTION) => CurrentSection::Aliases,
            (Mode::Rules, _) => CurrentSection::Rule(self.open_rule(section)?),
        };

        self.current = Some(current);
        Ok(())
    }

    fn add_value(&mut self, section: &str, option: &str, value: &str) -> AuthzResult<()> {
        match self.current {
            Some(CurrentSection::Groups) => self.add_group(section, option, value),
            Some(CurrentSection::Aliases) => self.add_alias(section, option, value),
            Some(CurrentSection::Rule(index)) => self.add_rule_entry(index, section, option, value),
            None => Err(AuthzError::InvalidSection {
                section: section.to_string(),
            }),
        }
    }

    fn close_section(&mut self, _section: &str) -> AuthzResult<()> {
        self.current = None;
        Ok(())
    }
}

fn merge_access(slot: &mut Option<AccessLevel>, access: AccessLevel) {
    *slot = Some(slot.unwrap_or_default() | access);
}

/// A group, alias or user name without any reserved leading character
fn plain_name(name: &str) -> Option<&str> {
    match name.chars().next() {
        Some(c) if !RESERVED_START.contains(&c) => Some(name),
        _ => None,
    }
}

/// Parsed `[glob:repo:/path]` header
#[derive(Debug, PartialEq, Eq)]
struct RuleHeader<'a> {
    glob: bool,
    repo: Option<&'a str>,
    path: &'a str,
}

fn parse_rule_header(section: &str) -> AuthzResult<RuleHeader<'_>> {
    let (scope, path) = if section.starts_with('/') {
        (None, section)
    } else if let Some(split) = section.find(":/") {
        (Some(&section[..split]), &section[split + 1..])
    } else if let Some(split) = section.rfind(':') {
        (Some(&section[..split]), &section[split + 1..])
    } else {
        return Err(AuthzError::InvalidSection {
            section: section.to_string(),
        });
    };

    let (glob, repo) = match scope {
        Some(scope) => split_scope(section, scope)?,
        None => (false, None),
    };

    if let Some(repo) = repo {
        if repo.is_empty() {
            return Err(AuthzError::EmptyRepoName {
                section: section.to_string(),
            });
        }
        if repo.contains('/') {
            return Err(AuthzError::InvalidRepoName {
                section: section.to_string(),
                repo: repo.to_string(),
            });
        }
    }

    if !is_canonical(path) {
        return Err(AuthzError::NonCanonicalPath {
            section: section.to_string(),
            path: path.to_string(),
        });
    }

    Ok(RuleHeader { glob, repo, path })
}

/// Split the part before the path into the glob marker and repository name
fn split_scope<'a>(section: &str, scope: &'a str) -> AuthzResult<(bool, Option<&'a str>)> {
    let (token, repo) = if let Some(rest) = scope.strip_prefix(':') {
        match rest.split_once(':') {
            Some((token, repo)) => (token, Some(repo)),
            None => (rest, None),
        }
    } else if let Some((token, repo)) = scope.split_once(':') {
        (token, Some(repo))
    } else {
        return Ok((false, Some(scope)));
    };

    if token != GLOB_TOKEN {
        return Err(AuthzError::InvalidGlobToken {
            section: section.to_string(),
            token: token.to_string(),
        });
    }
    Ok((true, repo))
}

fn is_canonical(path: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    if path == "/" {
        return true;
    }
    !path.ends_with('/')
        && !path.contains("//")
        && !path.split('/').any(|c| c == "." || c == "..")
}
