//! Path-based authorization
//!
//! Compiles rule files into an immutable [`AuthzModel`] and answers access
//! questions against it.
//!
//! ## Rule Model
//!
//! ```text
//! rules text ─► pass 1 (parse) ─► pass 2 (groups) ─► global rights ─► AuthzModel
//! ```
//!
//! A rule section names a path, optionally scoped to one repository. The
//! access an identity holds on a path comes from the most specific rule
//! that mentions the identity, searched from the path up to the root:
//!
//! 1. **Repository rule** - `[repo:/path]` beats a rule for any repository
//! 2. **Later rule** - among equally scoped rules, the one defined last wins
//! 3. **Ancestor** - a path without a rule inherits from its nearest ruled ancestor
//! 4. **Nothing** - no rule anywhere up to the root grants no access
//!
//! Within the deciding rule every entry that applies is combined.
//!
//! ## Example Rules
//!
//! ```text
//! [groups]
//! team = harry, sally, &boss
//!
//! [aliases]
//! boss = CN=Boss,OU=Staff
//!
//! [/]
//! * = r                       # everyone may read everywhere
//!
//! [greek:/trunk]
//! @team = rw
//! ~@team = r                  # everybody outside the team reads only
//!
//! [:glob:greek:/**/secret]
//! * =                         # no access to any 'secret' directory
//! ```

mod evaluator;
mod groups;
mod interner;
pub mod model;
mod parse;
pub mod patterns;
mod rights;
pub mod shared;
pub mod source;
pub mod types;

pub use model::{Ace, Acl, AuthzModel, GroupTable};
pub use patterns::{PathPattern, Segment};
pub use shared::SharedAuthz;
pub use source::{SectionHandler, parse_source};
pub use types::{AccessLevel, EntryKind, RepoScope, Rights};

use crate::error::AuthzResult;

/// Compile rule text, plus an optional global groups file, into a model
pub fn load(rules: &str, global_groups: Option<&str>) -> AuthzResult<AuthzModel> {
    AuthzModel::load(rules, global_groups)
}

/// See [`AuthzModel::check`]
pub fn check(
    model: &AuthzModel,
    repo: &str,
    path: &str,
    identity: Option<&str>,
    required: AccessLevel,
    recursive: bool,
) -> bool {
    model.check(repo, path, identity, required, recursive)
}

/// See [`AuthzModel::global_rights`]
pub fn global_rights(model: &AuthzModel, identity: Option<&str>, repo: Option<&str>) -> Rights {
    model.global_rights(identity, repo)
}
