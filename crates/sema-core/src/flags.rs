//! Statement-flag bitsets.
//!
//! Two independent bitsets, kept as plain `u8`-backed newtypes rather
//! than pulling in a flags crate, matching the reference workspace
//! (which hand-rolls its bit-level `StackValue`/discriminant work
//! rather than reaching for `bitflags`).
//!
//! `StmtFlags` answers "is `break`/`continue`/`fallthrough` legal
//! here"; `StmtStateFlags` is the `bounds_check`/`no_bounds_check`
//! context override that `check_stmt` saves and restores around every
//! statement.

use std::ops::{BitAnd, BitOr, Not};

/// Which branch statements are legal at the current point in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StmtFlags(u8);

impl StmtFlags {
    pub const NONE: StmtFlags = StmtFlags(0);
    pub const BREAK_ALLOWED: StmtFlags = StmtFlags(1 << 0);
    pub const CONTINUE_ALLOWED: StmtFlags = StmtFlags(1 << 1);
    pub const FALLTHROUGH_ALLOWED: StmtFlags = StmtFlags(1 << 2);

    pub fn contains(self, other: StmtFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for StmtFlags {
    type Output = StmtFlags;
    fn bitor(self, rhs: StmtFlags) -> StmtFlags {
        StmtFlags(self.0 | rhs.0)
    }
}

impl BitAnd for StmtFlags {
    type Output = StmtFlags;
    fn bitand(self, rhs: StmtFlags) -> StmtFlags {
        StmtFlags(self.0 & rhs.0)
    }
}

impl Not for StmtFlags {
    type Output = StmtFlags;
    fn not(self) -> StmtFlags {
        StmtFlags(!self.0)
    }
}

/// The `bounds_check` / `no_bounds_check` context override.
///
/// The two bits are mutually exclusive: setting one always clears the
/// other, matching `check_stmt`'s `out |= X; out &= ~Y;` dance in the
/// reference checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StmtStateFlags(u8);

impl StmtStateFlags {
    pub const NONE: StmtStateFlags = StmtStateFlags(0);
    pub const BOUNDS_CHECK: StmtStateFlags = StmtStateFlags(1 << 0);
    pub const NO_BOUNDS_CHECK: StmtStateFlags = StmtStateFlags(1 << 1);

    pub fn contains(self, other: StmtStateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Apply a node-local override, honoring mutual exclusion. Mirrors
    /// `check_stmt`'s handling of `node->stmt_state_flags`.
    pub fn apply_override(self, node_flags: StmtStateFlags) -> StmtStateFlags {
        let mut out = self;
        if node_flags.contains(StmtStateFlags::BOUNDS_CHECK) {
            out.0 |= StmtStateFlags::BOUNDS_CHECK.0;
            out.0 &= !StmtStateFlags::NO_BOUNDS_CHECK.0;
        } else if node_flags.contains(StmtStateFlags::NO_BOUNDS_CHECK) {
            out.0 |= StmtStateFlags::NO_BOUNDS_CHECK.0;
            out.0 &= !StmtStateFlags::BOUNDS_CHECK.0;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallthrough_masked_by_not() {
        let flags = StmtFlags::FALLTHROUGH_ALLOWED | StmtFlags::BREAK_ALLOWED;
        let masked = flags & !StmtFlags::FALLTHROUGH_ALLOWED;
        assert!(!masked.contains(StmtFlags::FALLTHROUGH_ALLOWED));
        assert!(masked.contains(StmtFlags::BREAK_ALLOWED));
    }

    #[test]
    fn bounds_check_override_is_mutually_exclusive() {
        let base = StmtStateFlags::NO_BOUNDS_CHECK;
        let out = base.apply_override(StmtStateFlags::BOUNDS_CHECK);
        assert!(out.contains(StmtStateFlags::BOUNDS_CHECK));
        assert!(!out.contains(StmtStateFlags::NO_BOUNDS_CHECK));
    }

    #[test]
    fn no_override_leaves_flags_untouched() {
        let base = StmtStateFlags::BOUNDS_CHECK;
        let out = base.apply_override(StmtStateFlags::NONE);
        assert_eq!(out, base);
    }
}
