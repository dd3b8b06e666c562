//! Upgrade data registry.
//!
//! Migration rules are pure data: version-keyed tables of plain records,
//! one table per rule category. The registry is assembled once at process
//! start, is immutable afterwards, and holds no I/O or mutable state, so
//! it can be shared across concurrent runs without synchronization.
//!
//! An absent version key means the category does not apply to that
//! version at all; an explicit empty list is a legal no-op entry. The two
//! are distinct states and the runner treats them as such.

mod data;

use crate::error::{Result, UpliftError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A target-version identifier (`v2`, `v18`).
///
/// Ordered numerically so multi-version runs apply rules oldest-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetVersion {
    label: String,
    number: u32,
}

impl TargetVersion {
    /// Parse a `v<number>` identifier.
    pub fn new(label: &str) -> Result<Self> {
        let digits = label.strip_prefix('v').ok_or_else(|| UpliftError::Version {
            value: label.to_string(),
        })?;
        let number: u32 = digits.parse().map_err(|_| UpliftError::Version {
            value: label.to_string(),
        })?;
        Ok(TargetVersion {
            label: label.to_string(),
            number,
        })
    }

    /// The numeric component (`18` for `v18`).
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The original identifier string.
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl PartialOrd for TargetVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TargetVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.number
            .cmp(&other.number)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl TryFrom<String> for TargetVersion {
    type Error = UpliftError;

    fn try_from(value: String) -> Result<Self> {
        TargetVersion::new(&value)
    }
}

impl From<TargetVersion> for String {
    fn from(version: TargetVersion) -> String {
        version.label
    }
}

/// Version-keyed record set for one rule category.
#[derive(Debug, Clone)]
pub struct UpgradeData<T> {
    entries: BTreeMap<TargetVersion, Vec<T>>,
}

impl<T> Default for UpgradeData<T> {
    fn default() -> Self {
        UpgradeData {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> UpgradeData<T> {
    /// Create an empty data set (no versions at all).
    pub fn new() -> Self {
        UpgradeData {
            entries: BTreeMap::new(),
        }
    }

    /// Register records for a version. An empty `records` list is a legal
    /// explicit no-op entry, distinct from never calling `insert`.
    pub fn insert(&mut self, version: TargetVersion, records: Vec<T>) {
        self.entries.insert(version, records);
    }

    /// Records for `version`: `None` when the category does not apply to
    /// that version, `Some(&[])` for an explicit no-op entry.
    pub fn for_version(&self, version: &TargetVersion) -> Option<&[T]> {
        self.entries.get(version).map(|records| records.as_slice())
    }

    /// All versions this category has entries for.
    pub fn versions(&self) -> impl Iterator<Item = &TargetVersion> {
        self.entries.keys()
    }
}

/// A class renamed between versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRename {
    /// Module specifier the class is imported from.
    pub module: String,
    /// Class name before the upgrade.
    pub old_name: String,
    /// Class name after the upgrade.
    pub new_name: String,
}

/// One forbidden argument count for a method call check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidArgCount {
    /// The argument count that is no longer accepted.
    pub count: usize,
    /// Message reported when a call site matches.
    pub message: String,
}

/// A check-only rule flagging method calls with removed signatures.
///
/// Check rules never produce text replacements; violations are reported
/// for manual migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCallCheck {
    /// Class declaring the method.
    pub class_name: String,
    /// Method name.
    pub method: String,
    /// Argument counts that became invalid in this version.
    pub invalid_arg_counts: Vec<InvalidArgCount>,
}

/// A property renamed on a class between versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRename {
    /// Class declaring the property.
    pub class_name: String,
    /// Property name before the upgrade.
    pub old_property: String,
    /// Property name after the upgrade.
    pub new_property: String,
}

/// An import module specifier renamed between versions.
///
/// Matches the exact specifier and any subpath beneath it, so renaming
/// `@lib/legacy` also rewrites `@lib/legacy/button`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPathRename {
    /// Specifier prefix before the upgrade.
    pub old_path: String,
    /// Specifier prefix after the upgrade.
    pub new_path: String,
}

/// A stylesheet selector renamed between versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRename {
    /// Selector before the upgrade (`.qz-dialog`).
    pub old_selector: String,
    /// Selector after the upgrade (`.qz-modal`).
    pub new_selector: String,
}

/// A template attribute renamed between versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRename {
    /// Attribute name before the upgrade.
    pub old_attribute: String,
    /// Attribute name after the upgrade.
    pub new_attribute: String,
}

/// Rule categories, used for scheduling, counters, and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Class renames in source files.
    ClassRename,
    /// Check-only method call signature checks.
    MethodCallCheck,
    /// Property renames in source files.
    PropertyRename,
    /// Import specifier renames in source and config files.
    ImportPathRename,
    /// Selector renames in stylesheets.
    SelectorRename,
    /// Attribute renames in templates.
    AttributeRename,
}

impl RuleKind {
    /// Stable identifier for reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ClassRename => "classRename",
            RuleKind::MethodCallCheck => "methodCallCheck",
            RuleKind::PropertyRename => "propertyRename",
            RuleKind::ImportPathRename => "importPathRename",
            RuleKind::SelectorRename => "selectorRename",
            RuleKind::AttributeRename => "attributeRename",
        }
    }
}

/// Immutable registry of every rule category, keyed by target version.
#[derive(Debug, Clone, Default)]
pub struct UpgradeRegistry {
    /// Import prefix identifying the upgraded library. Semantic matching
    /// in the source walker only trusts bindings imported from here.
    pub library_prefix: String,
    /// Class rename tables.
    pub class_renames: UpgradeData<ClassRename>,
    /// Method call check tables.
    pub method_call_checks: UpgradeData<MethodCallCheck>,
    /// Property rename tables.
    pub property_renames: UpgradeData<PropertyRename>,
    /// Import path rename tables.
    pub import_path_renames: UpgradeData<ImportPathRename>,
    /// Selector rename tables.
    pub selector_renames: UpgradeData<SelectorRename>,
    /// Attribute rename tables.
    pub attribute_renames: UpgradeData<AttributeRename>,
}

impl UpgradeRegistry {
    /// The compiled-in rule tables for the supported library.
    pub fn builtin() -> Self {
        data::builtin_registry()
    }

    /// Every version any category has an entry for, ascending.
    pub fn versions(&self) -> Vec<TargetVersion> {
        let mut versions: BTreeSet<TargetVersion> = BTreeSet::new();
        versions.extend(self.class_renames.versions().cloned());
        versions.extend(self.method_call_checks.versions().cloned());
        versions.extend(self.property_renames.versions().cloned());
        versions.extend(self.import_path_renames.versions().cloned());
        versions.extend(self.selector_renames.versions().cloned());
        versions.extend(self.attribute_renames.versions().cloned());
        versions.into_iter().collect()
    }

    /// Versions to apply when migrating from `from` to `to`: every
    /// registered version in the half-open range `(from, to]`, ascending.
    pub fn versions_between(&self, from: &TargetVersion, to: &TargetVersion) -> Vec<TargetVersion> {
        self.versions()
            .into_iter()
            .filter(|v| v > from && v <= to)
            .collect()
    }
}
