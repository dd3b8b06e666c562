//! Builtin upgrade tables for the Quartz UI library.
//!
//! Plain data, assembled once. Each table maps a target version to the
//! records introduced by that version's breaking changes. Versions later
//! than the ones listed here simply do not appear; the runner skips
//! categories with no entry for a version.

use super::{
    AttributeRename, ClassRename, ImportPathRename, InvalidArgCount, MethodCallCheck,
    PropertyRename, SelectorRename, TargetVersion, UpgradeData, UpgradeRegistry,
};

fn v(label: &str) -> TargetVersion {
    TargetVersion::new(label).expect("builtin version labels are well-formed")
}

/// Assemble the compiled-in registry.
pub fn builtin_registry() -> UpgradeRegistry {
    let mut class_renames = UpgradeData::new();
    class_renames.insert(
        v("v2"),
        vec![
            ClassRename {
                module: "@quartz/ui".to_string(),
                old_name: "QzDialog".to_string(),
                new_name: "QzModal".to_string(),
            },
            ClassRename {
                module: "@quartz/ui".to_string(),
                old_name: "QzSidenav".to_string(),
                new_name: "QzDrawer".to_string(),
            },
        ],
    );
    class_renames.insert(
        v("v3"),
        vec![ClassRename {
            module: "@quartz/ui".to_string(),
            old_name: "QzChipList".to_string(),
            new_name: "QzChipSet".to_string(),
        }],
    );

    let mut method_call_checks = UpgradeData::new();
    method_call_checks.insert(
        v("v2"),
        vec![MethodCallCheck {
            class_name: "QzSnackbar".to_string(),
            method: "open".to_string(),
            invalid_arg_counts: vec![InvalidArgCount {
                count: 3,
                message: "open() no longer accepts a duration as third argument; \
                          pass it in the config object"
                    .to_string(),
            }],
        }],
    );
    // v3 ships no new signature checks; the entry stays an explicit no-op
    // so the category is still scheduled for that version.
    method_call_checks.insert(v("v3"), Vec::new());

    let mut property_renames = UpgradeData::new();
    property_renames.insert(
        v("v2"),
        vec![PropertyRename {
            class_name: "QzTable".to_string(),
            old_property: "rowData".to_string(),
            new_property: "rows".to_string(),
        }],
    );
    property_renames.insert(
        v("v3"),
        vec![PropertyRename {
            class_name: "QzModal".to_string(),
            old_property: "backdropClass".to_string(),
            new_property: "overlayClass".to_string(),
        }],
    );

    let mut import_path_renames = UpgradeData::new();
    import_path_renames.insert(
        v("v2"),
        vec![ImportPathRename {
            old_path: "@quartz/ui/legacy".to_string(),
            new_path: "@quartz/ui".to_string(),
        }],
    );

    let mut selector_renames = UpgradeData::new();
    selector_renames.insert(
        v("v2"),
        vec![
            SelectorRename {
                old_selector: ".qz-dialog".to_string(),
                new_selector: ".qz-modal".to_string(),
            },
            SelectorRename {
                old_selector: ".qz-sidenav".to_string(),
                new_selector: ".qz-drawer".to_string(),
            },
        ],
    );
    selector_renames.insert(
        v("v3"),
        vec![SelectorRename {
            old_selector: ".qz-chip-list".to_string(),
            new_selector: ".qz-chip-set".to_string(),
        }],
    );

    let mut attribute_renames = UpgradeData::new();
    attribute_renames.insert(
        v("v2"),
        vec![
            AttributeRename {
                old_attribute: "qz-tooltip".to_string(),
                new_attribute: "qzTooltip".to_string(),
            },
            AttributeRename {
                old_attribute: "qz-ripple".to_string(),
                new_attribute: "qzRipple".to_string(),
            },
        ],
    );

    UpgradeRegistry {
        library_prefix: "@quartz/".to_string(),
        class_renames,
        method_call_checks,
        property_renames,
        import_path_renames,
        selector_renames,
        attribute_renames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_category_for_v2() {
        let registry = builtin_registry();
        let v2 = v("v2");

        assert!(!registry.class_renames.for_version(&v2).unwrap().is_empty());
        assert!(!registry
            .method_call_checks
            .for_version(&v2)
            .unwrap()
            .is_empty());
        assert!(!registry
            .property_renames
            .for_version(&v2)
            .unwrap()
            .is_empty());
        assert!(!registry
            .import_path_renames
            .for_version(&v2)
            .unwrap()
            .is_empty());
        assert!(!registry
            .selector_renames
            .for_version(&v2)
            .unwrap()
            .is_empty());
        assert!(!registry
            .attribute_renames
            .for_version(&v2)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_v3_method_checks_are_an_explicit_noop() {
        let registry = builtin_registry();
        assert_eq!(registry.method_call_checks.for_version(&v("v3")), Some(&[][..]));
    }

    #[test]
    fn test_builtin_versions_ascending() {
        let registry = builtin_registry();
        assert_eq!(registry.versions(), vec![v("v2"), v("v3")]);
    }
}
