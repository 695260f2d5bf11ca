//! Engine configuration built from a fixed argument list.
//!
//! The engine asks for its options the way a command-line tool would. Here
//! every registration becomes a `clap` argument, and `parse` runs `clap`
//! over an argument vector chosen by the server rather than the process
//! `argv`.

use std::path::Path;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::engine::{Flag, FlagError, FlagSet};

const POSITIONAL: &str = "profile";

enum Binding {
    Bool(Flag<bool>),
    Int(Flag<i64>),
    Float(Flag<f64>),
    Str(Flag<String>),
    List(Flag<Vec<String>>),
}

pub struct FixedFlagSet {
    args: Vec<String>,
    command: Command,
    bindings: Vec<(String, Binding)>,
    extra_usage: Vec<String>,
    duplicate: Option<String>,
}

impl FixedFlagSet {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = Command::new("pprof")
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .arg(
                Arg::new(POSITIONAL)
                    .action(ArgAction::Append)
                    .num_args(0..),
            );
        Self {
            args: args.into_iter().map(Into::into).collect(),
            command,
            bindings: Vec::new(),
            extra_usage: Vec::new(),
            duplicate: None,
        }
    }

    /// Options for one render: serve a web UI on an ephemeral local port,
    /// never launch a browser, analyze `profile`.
    pub fn for_profile(profile: &Path) -> Self {
        Self::new([
            "--http=localhost:0".to_string(),
            "--no_browser".to_string(),
            profile.to_string_lossy().into_owned(),
        ])
    }

    fn register(&mut self, name: &str, arg: Arg, binding: Binding) {
        if name == POSITIONAL || self.bindings.iter().any(|(n, _)| n == name) {
            self.duplicate.get_or_insert_with(|| name.to_string());
            return;
        }
        let command = std::mem::take(&mut self.command);
        self.command = command.arg(arg.long(name.to_string()));
        self.bindings.push((name.to_string(), binding));
    }

    fn apply(&self, matches: &ArgMatches) {
        for (name, binding) in &self.bindings {
            let name = name.as_str();
            match binding {
                Binding::Bool(f) => {
                    if let Some(v) = matches.get_one::<bool>(name) {
                        f.set(*v);
                    }
                }
                Binding::Int(f) => {
                    if let Some(v) = matches.get_one::<i64>(name) {
                        f.set(*v);
                    }
                }
                Binding::Float(f) => {
                    if let Some(v) = matches.get_one::<f64>(name) {
                        f.set(*v);
                    }
                }
                Binding::Str(f) => {
                    if let Some(v) = matches.get_one::<String>(name) {
                        f.set(v.clone());
                    }
                }
                Binding::List(f) => {
                    if let Some(v) = matches.get_many::<String>(name) {
                        f.set(v.cloned().collect());
                    }
                }
            }
        }
    }
}

fn described(name: &str, usage: &str) -> Arg {
    Arg::new(name.to_string()).help(usage.to_string())
}

fn bool_arg(name: &str, default: bool, usage: &str) -> Arg {
    described(name, usage)
        .action(ArgAction::Set)
        .num_args(0..=1)
        .require_equals(true)
        .default_missing_value("true")
        .default_value(if default { "true" } else { "false" })
        .value_parser(value_parser!(bool))
}

fn value_arg(name: &str, default: String, usage: &str) -> Arg {
    described(name, usage)
        .action(ArgAction::Set)
        .allow_hyphen_values(true)
        .default_value(default)
}

impl FlagSet for FixedFlagSet {
    fn bool(&mut self, name: &str, default: bool, usage: &str) -> Flag<bool> {
        let flag = Flag::new(default);
        self.bool_var(&flag, name, default, usage);
        flag
    }

    fn int(&mut self, name: &str, default: i64, usage: &str) -> Flag<i64> {
        let flag = Flag::new(default);
        self.int_var(&flag, name, default, usage);
        flag
    }

    fn float(&mut self, name: &str, default: f64, usage: &str) -> Flag<f64> {
        let flag = Flag::new(default);
        self.float_var(&flag, name, default, usage);
        flag
    }

    fn string(&mut self, name: &str, default: &str, usage: &str) -> Flag<String> {
        let flag = Flag::new(default.to_string());
        self.string_var(&flag, name, default, usage);
        flag
    }

    fn string_list(&mut self, name: &str, default: &[&str], usage: &str) -> Flag<Vec<String>> {
        let flag = Flag::new(default.iter().map(|s| s.to_string()).collect());
        let arg = described(name, usage)
            .action(ArgAction::Append)
            .allow_hyphen_values(true)
            .value_parser(value_parser!(String));
        self.register(name, arg, Binding::List(flag.clone()));
        flag
    }

    fn bool_var(&mut self, var: &Flag<bool>, name: &str, default: bool, usage: &str) {
        var.set(default);
        self.register(name, bool_arg(name, default, usage), Binding::Bool(var.clone()));
    }

    fn int_var(&mut self, var: &Flag<i64>, name: &str, default: i64, usage: &str) {
        var.set(default);
        let arg = value_arg(name, default.to_string(), usage).value_parser(value_parser!(i64));
        self.register(name, arg, Binding::Int(var.clone()));
    }

    fn float_var(&mut self, var: &Flag<f64>, name: &str, default: f64, usage: &str) {
        var.set(default);
        let arg = value_arg(name, default.to_string(), usage).value_parser(value_parser!(f64));
        self.register(name, arg, Binding::Float(var.clone()));
    }

    fn string_var(&mut self, var: &Flag<String>, name: &str, default: &str, usage: &str) {
        var.set(default.to_string());
        let arg = value_arg(name, default.to_string(), usage).value_parser(value_parser!(String));
        self.register(name, arg, Binding::Str(var.clone()));
    }

    fn parse(&mut self, usage: &mut dyn FnMut()) -> Result<Vec<String>, FlagError> {
        if let Some(name) = self.duplicate.take() {
            return Err(FlagError::Duplicate(name));
        }
        let matches = self
            .command
            .try_get_matches_from_mut(self.args.iter())
            .map_err(|e| FlagError::Invalid(e.to_string().trim().to_string()))?;
        self.apply(&matches);

        let positional: Vec<String> = matches
            .get_many::<String>(POSITIONAL)
            .map(|v| v.cloned().collect())
            .unwrap_or_default();
        if positional.is_empty() {
            usage();
        }
        Ok(positional)
    }

    fn add_extra_usage(&mut self, text: &str) {
        self.extra_usage.push(text.to_string());
    }

    fn extra_usage(&self) -> String {
        self.extra_usage.join("\n")
    }
}
