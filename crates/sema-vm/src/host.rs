//! The host-callback table external procedure calls are resolved
//! through.
//!
//! The reference VM panics on any call to a procedure with no SSA
//! body ("TODO(bill): external procedure calls"). This crate's
//! redesign notes call for a practical replacement: callers register
//! host functions by name (`__bounds_check_error`,
//! `__slice_expr_error`, `__substring_expr_error`, and any
//! application-defined external procedure) before running the
//! machine.

use std::collections::HashMap;

use crate::value::VmValue;

type HostFn = Box<dyn Fn(&[VmValue]) -> VmValue>;

#[derive(Default)]
pub struct HostTable {
    fns: HashMap<String, HostFn>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: impl Fn(&[VmValue]) -> VmValue + 'static) {
        self.fns.insert(name.into(), Box::new(f));
    }

    pub fn call(&self, name: &str, args: &[VmValue]) -> VmValue {
        match self.fns.get(name) {
            Some(f) => f(args),
            None => panic!("no host procedure registered for `{name}`"),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }
}

impl std::fmt::Debug for HostTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostTable")
            .field("registered", &self.fns.keys().collect::<Vec<_>>())
            .finish()
    }
}
