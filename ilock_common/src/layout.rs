//! Lever and lock rule layout of one interlocking frame.
//!
//! A layout names every lever, binds it to a device slot on the bus, and
//! lists which levers lock which others. It can be written as TOML tables
//! or in the JSON format used by the SD-card loader of the lever frames:
//!
//! ```json
//! {
//!   "Levers": [{ "Name": "1", "Device": 5, "Slot": 0 }],
//!   "Interlocking": [{
//!     "Acting": "1",
//!     "Affecting": ["2", "3"],
//!     "Locking": { "StateOn": "Unlocked", "StateOff": "LockedAny" }
//!   }]
//! }
//! ```

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::{ConfigError, read_config_file};
use crate::consts::{DEVICE_SLOT_STRIDE, MAX_LOCKING_ID, MAX_MODULE_ADDR};
use crate::types::{DeviceId, DeviceSlot, LockingRule, SlotId};

/// One lever of the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeverEntry {
    /// Unique lever name.
    pub name: String,
    /// Bus address of the lever module carrying this lever.
    pub device: DeviceId,
    /// Slot on that module.
    pub slot: SlotId,
}

impl LeverEntry {
    /// Device slot this lever is wired to.
    #[inline]
    pub const fn device_slot(&self) -> DeviceSlot {
        DeviceSlot::new(self.device, self.slot)
    }
}

/// One acting lever and the levers it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockingEntry {
    /// Lever imposing the rules.
    pub acting: String,
    /// Levers the rules are imposed on.
    pub affecting: Vec<String>,
    /// Rule imposed while the acting lever is On.
    #[serde(default, deserialize_with = "rule_by_name")]
    pub state_on: LockingRule,
    /// Rule imposed while the acting lever is Off.
    #[serde(default, deserialize_with = "rule_by_name")]
    pub state_off: LockingRule,
}

/// A single `(acting, affected, ruleOn, ruleOff)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRuleSpec<'a> {
    /// Lever imposing the rule.
    pub acting: &'a str,
    /// Lever the rule is imposed on.
    pub affected: &'a str,
    /// Rule while the acting lever is On.
    pub rule_on: LockingRule,
    /// Rule while the acting lever is Off.
    pub rule_off: LockingRule,
}

fn rule_by_name<'de, D>(deserializer: D) -> Result<LockingRule, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(LockingRule::from_name(&name))
}

/// Complete frame layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterlockingLayout {
    /// Levers in declaration order.
    #[serde(default)]
    pub levers: Vec<LeverEntry>,
    /// Lock rule groups.
    #[serde(default)]
    pub locking: Vec<LockingEntry>,
}

impl InterlockingLayout {
    /// Load a layout file. Files ending in `.json` use the legacy JSON
    /// format, everything else is parsed as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        debug!(path = %path.display(), is_json, "loading lever layout");
        if is_json {
            Self::from_json_str(&content)
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
    }

    /// Parse the legacy JSON layout.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let doc: LegacyDocument =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let levers = doc
            .levers
            .into_iter()
            .map(|l| LeverEntry {
                name: l.name,
                device: l.device,
                slot: l.slot,
            })
            .collect();

        let locking = doc
            .interlocking
            .into_iter()
            .map(|g| LockingEntry {
                acting: g.acting,
                affecting: g.affecting,
                state_on: LockingRule::from_name(&g.locking.state_on),
                state_off: LockingRule::from_name(&g.locking.state_off),
            })
            .collect();

        Ok(Self { levers, locking })
    }

    /// Flatten lock rule groups into one tuple per affected lever.
    pub fn rules(&self) -> impl Iterator<Item = LockRuleSpec<'_>> {
        self.locking.iter().flat_map(|group| {
            group.affecting.iter().map(move |affected| LockRuleSpec {
                acting: &group.acting,
                affected,
                rule_on: group.state_on,
                rule_off: group.state_off,
            })
        })
    }

    /// Validate lever names and device slots.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - a lever name is empty or duplicated
    /// - a device address exceeds the 7-bit module range
    /// - a slot index collides with the next device in the flattened key space
    /// - two levers share a device slot
    /// - there are more levers than allocatable locking ids
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levers.len() > MAX_LOCKING_ID as usize {
            return Err(ConfigError::ValidationError(format!(
                "{} levers exceed the {MAX_LOCKING_ID} available locking ids",
                self.levers.len()
            )));
        }

        let mut names = HashSet::new();
        let mut slots = BTreeSet::new();
        for lever in &self.levers {
            if lever.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "lever name cannot be empty".to_string(),
                ));
            }
            if !names.insert(lever.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate lever name '{}'",
                    lever.name
                )));
            }
            if lever.device > MAX_MODULE_ADDR {
                return Err(ConfigError::ValidationError(format!(
                    "lever '{}': device {} exceeds maximum address {MAX_MODULE_ADDR}",
                    lever.name, lever.device
                )));
            }
            if u32::from(lever.slot) >= DEVICE_SLOT_STRIDE {
                return Err(ConfigError::ValidationError(format!(
                    "lever '{}': slot {} must be below {DEVICE_SLOT_STRIDE}",
                    lever.name, lever.slot
                )));
            }
            if !slots.insert(lever.device_slot()) {
                return Err(ConfigError::ValidationError(format!(
                    "lever '{}': device slot {} already in use",
                    lever.name,
                    lever.device_slot()
                )));
            }
        }
        Ok(())
    }
}

// ─── Legacy JSON shape ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyDocument {
    #[serde(default)]
    levers: Vec<LegacyLever>,
    #[serde(default)]
    interlocking: Vec<LegacyLocking>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyLever {
    name: String,
    device: DeviceId,
    slot: SlotId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyLocking {
    acting: String,
    #[serde(default)]
    affecting: Vec<String>,
    locking: LegacyRules,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyRules {
    #[serde(default)]
    state_on: String,
    #[serde(default)]
    state_off: String,
}
