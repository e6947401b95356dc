//! Attribute state tracking.
//!
//! The writer funnels every renderer-state directive through an
//! [`AttributeState`] that remembers what the runtime currently believes.
//! Re-emitting an unchanged value is suppressed, and before each payload the
//! tracker emits the reset directives for every setter group the payload no
//! longer uses.

use std::collections::HashMap;

use crate::attribute::{AttrValue, Attribute};

/// Directives with no idempotent runtime state; suppressing a repeat would
/// change behavior (a wheel delta is relative).
const ALWAYS_REEMIT: &[&str] = &["ATTR_manip_wheel"];

/// Families of mutually-exclusive setter directives, each with the one
/// directive that restores the runtime default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetterGroup {
    LightLevel,
    Cockpit,
    Manipulator,
    DrawDisable,
    PolyOffset,
    NoCull,
    Hard,
    NoDepth,
    NoBlend,
}

impl SetterGroup {
    pub const ALL: [Self; 9] = [
        Self::LightLevel,
        Self::Cockpit,
        Self::Manipulator,
        Self::DrawDisable,
        Self::PolyOffset,
        Self::NoCull,
        Self::Hard,
        Self::NoDepth,
        Self::NoBlend,
    ];

    /// Does `name` belong to this group's setter family?
    pub fn matches(self, name: &str) -> bool {
        match self {
            Self::LightLevel => name == "ATTR_light_level",
            Self::Cockpit => {
                matches!(name, "ATTR_cockpit" | "ATTR_cockpit_region" | "ATTR_cockpit_device")
            }
            Self::Manipulator => name.starts_with("ATTR_manip_") && name != "ATTR_manip_none",
            Self::DrawDisable => name == "ATTR_draw_disable",
            Self::PolyOffset => name == "ATTR_poly_os",
            Self::NoCull => name == "ATTR_no_cull",
            Self::Hard => matches!(name, "ATTR_hard" | "ATTR_hard_deck"),
            Self::NoDepth => name == "ATTR_no_depth",
            Self::NoBlend => matches!(name, "ATTR_no_blend" | "ATTR_shadow_blend"),
        }
    }

    /// The full directive line that resets this group.
    pub fn resetter(self) -> &'static str {
        match self {
            Self::LightLevel => "ATTR_light_level_reset",
            Self::Cockpit => "ATTR_no_cockpit",
            Self::Manipulator => "ATTR_manip_none",
            Self::DrawDisable => "ATTR_draw_enable",
            Self::PolyOffset => "ATTR_poly_os 0",
            Self::NoCull => "ATTR_cull",
            Self::Hard => "ATTR_no_hard",
            Self::NoDepth => "ATTR_depth",
            Self::NoBlend => "ATTR_blend",
        }
    }
}

/// What the runtime currently believes, keyed by directive name.
#[derive(Debug, Default)]
pub struct AttributeState {
    written: HashMap<String, String>,
}

impl AttributeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; used at the start of an export pass.
    pub fn clear(&mut self) {
        self.written.clear();
    }

    /// Would writing `name` with `value` change runtime state?
    pub fn can_emit(&self, name: &str, value: &str) -> bool {
        if ALWAYS_REEMIT.contains(&name) {
            return true;
        }
        match self.written.get(name) {
            None => true,
            Some(current) => current != value,
        }
    }

    /// Emit `attr` (one line per value), suppressing lines the runtime
    /// already holds. Returns the directive text with `indent` prefixed to
    /// each line, or an empty string when nothing needs writing.
    pub fn emit(&mut self, attr: &Attribute, indent: &str) -> String {
        let mut out = String::new();
        for value in &attr.values {
            let rendered = value.to_string();
            if !self.can_emit(&attr.name, &rendered) {
                continue;
            }
            out.push_str(indent);
            out.push_str(&attr.name);
            if !matches!(value, AttrValue::Flag) {
                out.push('\t');
                out.push_str(&rendered);
            }
            out.push('\n');
            self.written.insert(attr.name.clone(), rendered);
            self.purge_superseded(&attr.name);
        }
        out
    }

    /// Emit the reset directive of every group that has a written entry but
    /// nothing in `relevant` about to re-set it.
    pub fn write_resetters<'a, I>(&mut self, relevant: I, indent: &str) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let relevant: Vec<&str> = relevant.into_iter().collect();
        let mut out = String::new();
        for group in SetterGroup::ALL {
            let matched_written: Vec<String> = self
                .written
                .keys()
                .filter(|name| group.matches(name))
                .cloned()
                .collect();
            if matched_written.is_empty() {
                continue;
            }
            if relevant.iter().any(|name| group.matches(name)) {
                continue;
            }
            out.push_str(indent);
            out.push_str(group.resetter());
            out.push('\n');
            self.written.insert(group.resetter().to_string(), String::new());
            for name in matched_written {
                self.written.remove(&name);
            }
        }
        out
    }

    /// After writing `name`, entries superseded by it go away: every other
    /// written setter of the same group, and the group's written resetter.
    fn purge_superseded(&mut self, name: &str) {
        for group in SetterGroup::ALL {
            if !group.matches(name) {
                continue;
            }
            let stale: Vec<String> = self
                .written
                .keys()
                .filter(|key| key.as_str() != name && group.matches(key))
                .cloned()
                .collect();
            for key in stale {
                self.written.remove(&key);
            }
            self.written.remove(group.resetter());
        }
    }
}
