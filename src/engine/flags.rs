//! Option retrieval surface the engine configures itself through.
//!
//! The engine never reads `argv` directly. It registers every option it
//! understands on a [`FlagSet`], gets back a [`Flag`] handle per option, and
//! calls [`FlagSet::parse`] once. After parsing, each handle holds either the
//! parsed value or the default it was registered with.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("invalid arguments: {0}")]
    Invalid(String),

    #[error("flag registered twice: {0}")]
    Duplicate(String),
}

/// Shared, late-filled option value.
///
/// Cloning a `Flag` yields another handle to the same slot, which is how a
/// caller-owned variable gets bound through the `*_var` methods.
#[derive(Debug, Clone, Default)]
pub struct Flag<T> {
    slot: Arc<RwLock<T>>,
}

impl<T: Clone> Flag<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.slot.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.slot.write() = value;
    }
}

/// CLI-style option source.
///
/// Each typed method registers an option with a default and a description.
/// The `*_var` variants store into a [`Flag`] the caller already owns instead
/// of allocating a new one; the default is written into it at registration.
pub trait FlagSet {
    fn bool(&mut self, name: &str, default: bool, usage: &str) -> Flag<bool>;
    fn int(&mut self, name: &str, default: i64, usage: &str) -> Flag<i64>;
    fn float(&mut self, name: &str, default: f64, usage: &str) -> Flag<f64>;
    fn string(&mut self, name: &str, default: &str, usage: &str) -> Flag<String>;
    fn string_list(&mut self, name: &str, default: &[&str], usage: &str) -> Flag<Vec<String>>;

    fn bool_var(&mut self, var: &Flag<bool>, name: &str, default: bool, usage: &str);
    fn int_var(&mut self, var: &Flag<i64>, name: &str, default: i64, usage: &str);
    fn float_var(&mut self, var: &Flag<f64>, name: &str, default: f64, usage: &str);
    fn string_var(&mut self, var: &Flag<String>, name: &str, default: &str, usage: &str);

    /// Parse the argument source, fill every registered flag, and return the
    /// positional arguments. `usage` is called when no positional argument is
    /// left after parsing.
    fn parse(&mut self, usage: &mut dyn FnMut()) -> Result<Vec<String>, FlagError>;

    /// Append a line to the supplementary usage text.
    fn add_extra_usage(&mut self, text: &str);

    fn extra_usage(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_slot() {
        let a = Flag::new(1_i64);
        let b = a.clone();
        b.set(7);
        assert_eq!(a.get(), 7);
    }

    #[test]
    fn default_flag_holds_type_default() {
        let f: Flag<Vec<String>> = Flag::default();
        assert!(f.get().is_empty());
    }
}
