//! The `;!mtl-debug` side channel. Annotation lines ride along in the
//! generated output as comments the engine ignores; the debugger
//! reconstructs symbol information from them. Multi-line records continue
//! with `;!mtl-debug-next`.

use mtl_core::{
    Location, ScopeAllocations, TriggerDefinition, TypeCategory, TypeDefinition, Variable,
};

pub const DEBUG_PREFIX: &str = ";!mtl-debug";
pub const DEBUG_CONTINUATION: &str = ";!mtl-debug-next";

pub fn version_header() -> String {
    format!("{DEBUG_PREFIX} VERSION_HEADER {}", env!("CARGO_PKG_VERSION"))
}

/// Inline location comment, appended directly after the construct it
/// describes.
pub fn location(location: &Location) -> String {
    format!("{DEBUG_PREFIX} LOCATION {location}")
}

/// Categories that carry no information the debugger cannot reconstruct
/// from its own copy of the builtin tables.
pub fn skip_type(category: TypeCategory) -> bool {
    matches!(
        category,
        TypeCategory::Builtin
            | TypeCategory::BuiltinDeny
            | TypeCategory::StringEnum
            | TypeCategory::StringFlag
    )
}

pub fn type_definition(ty: &TypeDefinition) -> Vec<String> {
    let mut lines = vec![format!(
        "{DEBUG_PREFIX} TYPE_DEFINITION {} {} {} {}",
        ty.name,
        ty.category,
        ty.size,
        ty.location
    )];
    for member in &ty.members {
        lines.push(format!("{DEBUG_CONTINUATION} {member}"));
    }
    lines
}

pub fn trigger_definition(trigger: &TriggerDefinition) -> Vec<String> {
    let mut lines = vec![format!(
        "{DEBUG_PREFIX} TRIGGER_DEFINITION {} {} {}",
        trigger.name, trigger.return_type.name, trigger.location
    )];
    for param in &trigger.params {
        lines.push(format!("{DEBUG_CONTINUATION} {} {}", param.name, param.ty.name));
    }
    lines
}

pub fn variable_table(allocations: &ScopeAllocations) -> Vec<String> {
    let mut lines = Vec::new();
    for (label, table) in [("int", &allocations.ints), ("float", &allocations.floats)] {
        lines.push(format!(
            "{DEBUG_PREFIX} VARIABLE_TABLE {} {label} {}",
            allocations.scope, table.slot_count
        ));
        for (slot, ranges) in &table.used {
            let spans: Vec<String> = ranges
                .iter()
                .map(|(offset, size)| format!("{offset}+{size}"))
                .collect();
            lines.push(format!("{DEBUG_CONTINUATION} {slot} {}", spans.join(",")));
        }
    }
    lines
}

/// One continuation line per allocated region; `masks` carries the read form
/// of each region in the same order (structure variables have one per leaf).
pub fn variable_allocation(variable: &Variable, masks: &[String]) -> Vec<String> {
    let mut lines = vec![format!(
        "{DEBUG_PREFIX} VARIABLE_ALLOCATION {} {} {}",
        variable.name, variable.ty.name, variable.location
    )];
    for ((slot, offset), mask) in variable.allocations.iter().zip(masks) {
        lines.push(format!("{DEBUG_CONTINUATION} {slot} {offset} {mask}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtl_core::{StateScope, TypeCategory};

    #[test]
    fn type_records_continue_member_lines() {
        let ty = TypeDefinition {
            name: "Phase".to_string(),
            category: TypeCategory::Enum,
            size: 32,
            members: vec!["Startup".to_string(), "Active".to_string()],
            location: Location::new("chars/kfm.mtl", 4),
        };
        let lines = type_definition(&ty);
        assert_eq!(
            lines[0],
            ";!mtl-debug TYPE_DEFINITION Phase ENUM 32 chars/kfm.mtl:4"
        );
        assert_eq!(lines[1], ";!mtl-debug-next Startup");
        assert_eq!(lines[2], ";!mtl-debug-next Active");
    }

    #[test]
    fn builtin_categories_are_skipped() {
        assert!(skip_type(TypeCategory::Builtin));
        assert!(skip_type(TypeCategory::StringEnum));
        assert!(!skip_type(TypeCategory::Enum));
        assert!(!skip_type(TypeCategory::Structure));
    }

    #[test]
    fn variable_tables_list_occupied_slots() {
        let mut allocations = ScopeAllocations::new(StateScope::shared());
        allocations.ints.reserve(0, 0, 8);
        allocations.ints.reserve(0, 8, 1);
        let lines = variable_table(&allocations);
        assert_eq!(lines[0], ";!mtl-debug VARIABLE_TABLE shared int 60");
        assert_eq!(lines[1], ";!mtl-debug-next 0 0+8,8+1");
    }
}
