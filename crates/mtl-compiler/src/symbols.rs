//! JSON symbol bundle export. Mirrors the `;!mtl-debug` side channel as a
//! machine-readable document: user types, user trigger signatures, and the
//! variable tables with their packed allocations.

use serde::Serialize;
use mtl_core::{
    ScopeAllocations, StateScope, TranslationError, TriggerCategory, TriggerDefinition,
    TypeDefinition, Variable,
};

use crate::context::TranslationContext;
use crate::debug_info;

#[derive(Debug, Clone, Serialize)]
pub struct StateDefSymbol {
    pub name: String,
    pub scope: StateScope,
    pub locals: Vec<Variable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolBundle {
    pub version: String,
    pub types: Vec<TypeDefinition>,
    pub triggers: Vec<TriggerDefinition>,
    pub player_slots: ScopeAllocations,
    pub helper_slots: ScopeAllocations,
    pub globals: Vec<Variable>,
    pub statedefs: Vec<StateDefSymbol>,
}

/// Collects the bundle from a finished translation context. The same filters
/// apply as for the debug channel: builtin categories and catalogue entries
/// are left out, the debugger carries its own copy of those.
pub fn symbol_bundle(ctx: &TranslationContext) -> SymbolBundle {
    let internal = mtl_core::Location::internal();
    SymbolBundle {
        version: env!("CARGO_PKG_VERSION").to_string(),
        types: ctx
            .types
            .iter()
            .filter(|t| !debug_info::skip_type(t.category) && t.location != internal)
            .cloned()
            .collect(),
        triggers: ctx
            .triggers
            .iter()
            .filter(|t| t.category == TriggerCategory::User)
            .cloned()
            .collect(),
        player_slots: ctx.player_slots.clone(),
        helper_slots: ctx.helper_slots.clone(),
        globals: ctx.globals.clone(),
        statedefs: ctx
            .statedefs
            .iter()
            .map(|s| StateDefSymbol {
                name: s.name.clone(),
                scope: s.scope,
                locals: s.locals.clone(),
            })
            .collect(),
    }
}

pub fn to_json(bundle: &SymbolBundle) -> Result<String, TranslationError> {
    serde_json::to_string_pretty(bundle).map_err(|e| {
        TranslationError::new(
            "SYMBOLS_SERIALIZE",
            format!("Could not serialize the symbol bundle: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtl_core::{Location, TypeCategory};

    #[test]
    fn bundle_keeps_user_symbols_and_drops_the_catalogue() {
        let mut ctx = TranslationContext::with_builtins();
        ctx.types.push(TypeDefinition {
            name: "Phase".to_string(),
            category: TypeCategory::Enum,
            size: 32,
            members: vec!["Startup".to_string(), "Active".to_string()],
            location: Location::new("chars/kfm.mtl", 4),
        });
        let mut combo = Variable::new(
            "combo",
            ctx.find_type("int").expect("int should exist").clone(),
            StateScope::shared(),
            Location::new("chars/kfm.mtl", 10),
        );
        combo.allocations = vec![(0, 0)];
        ctx.globals.push(combo);

        let bundle = symbol_bundle(&ctx);
        assert_eq!(bundle.types.len(), 1);
        assert_eq!(bundle.types[0].name, "Phase");
        assert!(bundle.triggers.is_empty());
        assert_eq!(bundle.globals.len(), 1);

        let json = to_json(&bundle).expect("should serialize");
        let value: serde_json::Value =
            serde_json::from_str(&json).expect("should parse back");
        assert_eq!(value["globals"][0]["name"], "combo");
        assert_eq!(value["globals"][0]["allocations"][0][0], 0);
    }
}
