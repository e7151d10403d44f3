//! Capability descriptor: the commands and conditions a runtime exposes.
//!
//! The parser never reaches for a global robot object. Whatever executes
//! the program hands over a `Capabilities` value describing which bare
//! identifiers are zero-argument actions and which are zero-argument
//! predicates, and identifiers are bound against it at parse time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lexer::{is_ident_continue, is_ident_start, keyword_kind};

/// Actions understood by the standard Karel robot.
pub const KAREL_COMMANDS: &[&str] = &["move", "turnleft", "pickbeeper", "putbeeper", "turnoff"];

/// Predicates understood by the standard Karel robot.
pub const KAREL_CONDITIONS: &[&str] = &[
    "front_is_clear",
    "front_is_blocked",
    "left_is_clear",
    "left_is_blocked",
    "right_is_clear",
    "right_is_blocked",
    "next_to_a_beeper",
    "not_next_to_a_beeper",
    "any_beepers_in_beeper_bag",
    "no_beepers_in_beeper_bag",
    "facing_north",
    "not_facing_north",
    "facing_south",
    "not_facing_south",
    "facing_east",
    "not_facing_east",
    "facing_west",
    "not_facing_west",
];

/// Two disjoint sets of identifiers supplied by the execution environment.
///
/// The descriptor is immutable once built, so a single value can be shared
/// by reference across any number of parsers, on any number of threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCapabilities")]
pub struct Capabilities {
    commands: BTreeSet<String>,
    conditions: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawCapabilities {
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    conditions: Vec<String>,
}

impl TryFrom<RawCapabilities> for Capabilities {
    type Error = CoreError;

    fn try_from(raw: RawCapabilities) -> Result<Self, Self::Error> {
        Capabilities::new(raw.commands, raw.conditions)
    }
}

impl Capabilities {
    /// Build a descriptor, rejecting names that are not identifiers, that
    /// collide with a keyword, or that appear in both sets.
    pub fn new<C, P>(commands: C, conditions: P) -> Result<Self, CoreError>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let commands = collect_names(commands)?;
        let conditions = collect_names(conditions)?;
        if let Some(shared) = commands.intersection(&conditions).next() {
            return Err(CoreError::CapabilityConflict(shared.clone()));
        }
        Ok(Self {
            commands,
            conditions,
        })
    }

    /// The vocabulary of the standard Karel robot.
    pub fn karel() -> Self {
        Self {
            commands: KAREL_COMMANDS.iter().map(|name| name.to_string()).collect(),
            conditions: KAREL_CONDITIONS.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    pub fn is_condition(&self, name: &str) -> bool {
        self.conditions.contains(name)
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(String::as_str)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::karel()
    }
}

fn collect_names<I>(names: I) -> Result<BTreeSet<String>, CoreError>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut set = BTreeSet::new();
    for name in names {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(CoreError::InvalidCapability(name));
        }
        set.insert(name);
    }
    Ok(set)
}

fn is_valid_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    let starts_ok = bytes.next().is_some_and(is_ident_start);
    starts_ok && bytes.all(is_ident_continue) && keyword_kind(name).is_none()
}
