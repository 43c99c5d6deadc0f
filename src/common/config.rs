use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, bail};
use bitflags::bitflags;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use super::collections::{BTreeMap, HashSet};
use crate::commands::Command;
use crate::layout_engine::Layout;

const DEFAULT_CONFIG: &str = include_str!("../../quay.default.toml");

pub fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quay").join("config.toml"))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("empty trigger")]
    EmptyTrigger,
    #[error("unknown modifier `{modifier}` in trigger `{trigger}`")]
    UnknownModifier { trigger: String, modifier: String },
    #[error("trigger `{0}` has no key")]
    MissingKey(String),
    #[error("binding `{trigger}` rejected: {reason}")]
    RejectedBinding { trigger: String, reason: String },
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    assign: Vec<AssignRule>,
    #[serde(default)]
    keys: BTreeMap<String, toml::Value>,
    #[serde(default)]
    buttons: BTreeMap<String, toml::Value>,
    #[serde(default)]
    outputs: BTreeMap<String, VirtualOutput>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Layout given to new workspaces and containers.
    #[serde(default)]
    pub default_layout: Layout,
}

/// Selects a workspace by number (`workspace = 2`) or by name
/// (`workspace = "code"`).
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Eq)]
#[serde(untagged)]
pub enum WorkspaceSelector {
    Number(u64),
    Name(String),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct AssignRule {
    /// Exact app id.
    pub app_id: Option<String>,
    /// Regular expression matched against the app id.
    pub app_id_regex: Option<String>,
    pub workspace: WorkspaceSelector,
}

impl AssignRule {
    pub fn validate(&self, index: usize) -> Vec<String> {
        let mut issues = Vec::new();
        let app_id = self.app_id.as_deref().map(str::trim);
        let regex = self.app_id_regex.as_deref();
        if app_id.is_none_or(str::is_empty) && regex.is_none_or(|r| r.trim().is_empty()) {
            issues.push(format!("assign[{index}] has no app_id or app_id_regex"));
        }
        if let Some(pattern) = regex
            && let Err(e) = Regex::new(pattern)
        {
            issues.push(format!("assign[{index}] has an invalid app_id_regex: {e}"));
        }
        if let WorkspaceSelector::Name(name) = &self.workspace
            && name.trim().is_empty()
        {
            issues.push(format!("assign[{index}] names an empty workspace"));
        }
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct VirtualOutput {
    #[serde(default = "default_output_width")]
    pub width: i32,
    #[serde(default = "default_output_height")]
    pub height: i32,
    #[serde(default = "default_output_scale")]
    pub scale: i32,
}

impl Default for VirtualOutput {
    fn default() -> Self {
        VirtualOutput {
            width: default_output_width(),
            height: default_output_height(),
            scale: default_output_scale(),
        }
    }
}

impl VirtualOutput {
    pub fn validate(&self, name: &str) -> Vec<String> {
        let mut issues = Vec::new();
        if self.width <= 0 || self.height <= 0 {
            issues.push(format!(
                "output `{name}` has a non-positive size {}x{}",
                self.width, self.height
            ));
        }
        if self.scale <= 0 {
            issues.push(format!("output `{name}` has a non-positive scale {}", self.scale));
        }
        issues
    }
}

fn default_output_width() -> i32 { 1024 }

fn default_output_height() -> i32 { 768 }

fn default_output_scale() -> i32 { 1 }

bitflags! {
    #[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const ALT = 1 << 1;
        const SUPER = 1 << 2;
        const SHIFT = 1 << 3;
    }
}

impl Modifiers {
    fn from_token(token: &str) -> Option<Modifiers> {
        match token.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifiers::CTRL),
            "alt" | "mod1" => Some(Modifiers::ALT),
            "super" | "logo" | "mod4" => Some(Modifiers::SUPER),
            "shift" => Some(Modifiers::SHIFT),
            _ => None,
        }
    }
}

/// A key or button with the modifiers held, e.g. `Super + Shift + q`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigger {
    pub modifiers: Modifiers,
    /// Lowercased key or button name.
    pub key: String,
}

impl FromStr for Trigger {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConfigError::EmptyTrigger);
        }
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = match parts.pop() {
            Some(key) if !key.is_empty() => key.to_ascii_lowercase(),
            _ => return Err(ConfigError::MissingKey(s.to_owned())),
        };
        let mut modifiers = Modifiers::empty();
        for part in parts {
            let Some(modifier) = Modifiers::from_token(part) else {
                return Err(ConfigError::UnknownModifier {
                    trigger: s.to_owned(),
                    modifier: part.to_owned(),
                });
            };
            modifiers |= modifier;
        }
        Ok(Trigger { modifiers, key })
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, _) in self.modifiers.iter_names() {
            write!(f, "{}+", name.to_ascii_lowercase())?;
        }
        f.write_str(&self.key)
    }
}

/// Program to spawn, either as a shell-like line or an argument vector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ExecSpec {
    Line(String),
    Argv(Vec<String>),
}

impl ExecSpec {
    pub fn argv(&self) -> Vec<String> {
        match self {
            ExecSpec::Line(line) => line.split_whitespace().map(str::to_owned).collect(),
            ExecSpec::Argv(argv) => argv.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Action {
    Command(Command),
    Exec { exec: ExecSpec },
}

impl Action {
    /// Parses a binding value. Command strings are parsed here so that a
    /// malformed command reports its own parse error.
    fn from_value(value: toml::Value) -> Result<Action, String> {
        match value {
            toml::Value::String(text) => {
                text.parse().map(Action::Command).map_err(|e| format!("`{text}`: {e}"))
            }
            value => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Exec {
                    exec: ExecSpec,
                }
                let Exec { exec } = value.try_into().map_err(|e: toml::de::Error| e.message().to_owned())?;
                if exec.argv().is_empty() {
                    return Err("empty exec".to_owned());
                }
                Ok(Action::Exec { exec })
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub trigger: Trigger,
    pub action: Action,
}

/// Parses a binding table, rejecting malformed entries one by one.
fn compile_bindings(
    section: &str,
    table: BTreeMap<String, toml::Value>,
    rejected: &mut Vec<ConfigError>,
) -> Vec<Binding> {
    let mut bindings = Vec::with_capacity(table.len());
    for (trigger, value) in table {
        let result = trigger
            .parse::<Trigger>()
            .map_err(|e| e.to_string())
            .and_then(|t| Action::from_value(value).map(|action| Binding { trigger: t, action }));
        match result {
            Ok(binding) => bindings.push(binding),
            Err(reason) => {
                warn!(section, %trigger, %reason, "rejecting binding");
                rejected.push(ConfigError::RejectedBinding { trigger, reason });
            }
        }
    }
    bindings
}

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Regex(Regex),
    Both(String, Regex),
}

impl Matcher {
    fn matches(&self, app_id: &str) -> bool {
        match self {
            Matcher::Exact(id) => id == app_id,
            Matcher::Regex(re) => re.is_match(app_id),
            Matcher::Both(id, re) => id == app_id && re.is_match(app_id),
        }
    }
}

/// Compiled `[[assign]]` rules. The first matching rule wins.
#[derive(Debug, Default)]
pub struct Assignments {
    rules: Vec<(Matcher, WorkspaceSelector)>,
}

impl Assignments {
    /// Rules that fail to compile are skipped; [`Config::validate`] reports
    /// them.
    pub fn new(rules: &[AssignRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                let regex = match rule.app_id_regex.as_deref().map(Regex::new) {
                    Some(Ok(re)) => Some(re),
                    Some(Err(_)) => return None,
                    None => None,
                };
                let matcher = match (rule.app_id.clone(), regex) {
                    (Some(id), Some(re)) => Matcher::Both(id, re),
                    (Some(id), None) => Matcher::Exact(id),
                    (None, Some(re)) => Matcher::Regex(re),
                    (None, None) => return None,
                };
                Some((matcher, rule.workspace.clone()))
            })
            .collect();
        Assignments { rules }
    }

    pub fn workspace_for(&self, app_id: &str) -> Option<&WorkspaceSelector> {
        self.rules.iter().find(|(m, _)| m.matches(app_id)).map(|(_, ws)| ws)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub assign: Vec<AssignRule>,
    pub keys: Vec<Binding>,
    pub buttons: Vec<Binding>,
    pub outputs: BTreeMap<String, VirtualOutput>,
    /// Bindings dropped while loading.
    pub rejected: Vec<ConfigError>,
}

impl Default for Config {
    fn default() -> Self {
        Self::parse(DEFAULT_CONFIG).unwrap_or_else(|e| {
            error!("embedded default config does not load: {e:#}");
            Self::from_file(ConfigFile::default())
        })
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&buf).with_context(|| format!("loading config file {}", path.display()))
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<ConfigFile>(buf) {
            Ok(file) => Ok(Self::from_file(file)),
            Err(e) => bail!("{}", e.to_string().trim_end()),
        }
    }

    fn from_file(file: ConfigFile) -> Config {
        let mut rejected = Vec::new();
        let keys = compile_bindings("keys", file.keys, &mut rejected);
        let buttons = compile_bindings("buttons", file.buttons, &mut rejected);
        Config {
            settings: file.settings,
            assign: file.assign,
            keys,
            buttons,
            outputs: file.outputs,
            rejected,
        }
    }

    pub fn assignments(&self) -> Assignments { Assignments::new(&self.assign) }

    pub fn key(&self, trigger: &Trigger) -> Option<&Action> {
        self.keys.iter().find(|b| b.trigger == *trigger).map(|b| &b.action)
    }

    pub fn button(&self, trigger: &Trigger) -> Option<&Action> {
        self.buttons.iter().find(|b| b.trigger == *trigger).map(|b| &b.action)
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues: Vec<String> = self.rejected.iter().map(ToString::to_string).collect();
        for (index, rule) in self.assign.iter().enumerate() {
            issues.extend(rule.validate(index));
        }
        for (section, bindings) in [("keys", &self.keys), ("buttons", &self.buttons)] {
            let mut seen = HashSet::default();
            for binding in bindings {
                if !seen.insert(&binding.trigger) {
                    issues.push(format!("[{section}] binds `{}` more than once", binding.trigger));
                }
            }
        }
        for (name, output) in &self.outputs {
            issues.extend(output.validate(name));
        }
        issues
    }
}
