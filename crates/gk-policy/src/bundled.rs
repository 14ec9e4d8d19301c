// bundled.rs — Default-tier rules compiled into the crate.
//
// The files under `policies/` are embedded at build time, so an installed
// binary carries its defaults with it. A host that points
// `PolicyPaths::default_dir` at a directory replaces this set entirely.

use std::path::PathBuf;

use crate::loader::{load_rule_content, LoadedRules};
use crate::rule::{ApprovalMode, TrustTier};

/// Path prefix recorded as the source of embedded rules.
pub const BUNDLED_ORIGIN: &str = "<bundled>";

/// Embedded rule files, in file-name order.
pub const BUNDLED_POLICIES: [(&str, &str); 3] = [
    ("autonomous.toml", include_str!("../policies/autonomous.toml")),
    ("read-only.toml", include_str!("../policies/read-only.toml")),
    ("write.toml", include_str!("../policies/write.toml")),
];

/// Load the embedded default-tier rules for `mode` into `loaded`.
pub fn load_bundled(mode: &ApprovalMode, loaded: &mut LoadedRules) {
    for (name, content) in BUNDLED_POLICIES {
        let path = PathBuf::from(BUNDLED_ORIGIN).join(name);
        load_rule_content(content, path, TrustTier::Default, mode, loaded);
    }
}
