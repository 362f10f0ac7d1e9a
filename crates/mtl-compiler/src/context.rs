//! Shared translation state threaded through every pass. All symbol tables
//! live here; passes mutate the context in place and nothing is global.

use mtl_core::{
    Location, ScopeAllocations, StateDefinition, StateScope, TemplateDefinition,
    TranslationError, TriggerDefinition, TypeCategory, TypeDefinition, Variable,
};

use crate::builtins;

#[derive(Debug, Clone)]
pub struct TranslationContext {
    pub types: Vec<TypeDefinition>,
    pub triggers: Vec<TriggerDefinition>,
    pub templates: Vec<TemplateDefinition>,
    pub statedefs: Vec<StateDefinition>,
    pub globals: Vec<Variable>,
    pub player_slots: ScopeAllocations,
    pub helper_slots: ScopeAllocations,
    pub warnings: Vec<String>,
}

impl TranslationContext {
    /// A fresh context seeded with the engine catalogue.
    pub fn with_builtins() -> Self {
        let types = builtins::base_types();
        let triggers = builtins::base_triggers(&types);
        let templates = builtins::base_templates(&types);
        Self {
            types,
            triggers,
            templates,
            statedefs: Vec::new(),
            globals: Vec::new(),
            player_slots: ScopeAllocations::new(StateScope::player()),
            helper_slots: ScopeAllocations::new(StateScope::helper(None)),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.is(name))
    }

    pub fn find_template(&self, name: &str) -> Option<&TemplateDefinition> {
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn trigger_overloads(&self, name: &str) -> Vec<&TriggerDefinition> {
        self.triggers
            .iter()
            .filter(|t| t.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Follows alias chains down to a concrete type. The chain length is
    /// bounded by the size of the type table, which doubles as cycle
    /// detection.
    pub fn resolve_alias(&self, ty: &TypeDefinition) -> Result<TypeDefinition, TranslationError> {
        let mut current = ty.clone();
        for _ in 0..=self.types.len() {
            if current.category != TypeCategory::Alias {
                return Ok(current);
            }
            let source = current.members.first().cloned().unwrap_or_default();
            current = self
                .find_type(&source)
                .cloned()
                .ok_or_else(|| {
                    TranslationError::new(
                        "UNKNOWN_TYPE",
                        format!("Alias {} points at unknown type {}.", current.name, source),
                    )
                    .at(current.location.clone())
                })?;
        }
        Err(TranslationError::new(
            "CYCLIC_ALIAS",
            format!("Alias chain through {} never reaches a concrete type.", ty.name),
        )
        .at(ty.location.clone()))
    }

    /// Whether a value of type `from` may be used where `to` is expected,
    /// returning the resulting type. Implicit float narrowing warns and is
    /// rejected; widening between the sized integer builtins is silent.
    pub fn type_match(
        &mut self,
        from: &TypeDefinition,
        to: &TypeDefinition,
        location: &Location,
    ) -> Option<TypeDefinition> {
        let from = self.resolve_alias(from).ok()?;
        let to = self.resolve_alias(to).ok()?;
        if from.name.eq_ignore_ascii_case(&to.name) {
            return Some(to);
        }
        if from.is("any") {
            return Some(to);
        }
        if to.is("any") {
            return Some(from);
        }
        if to.category == TypeCategory::Union {
            let members: Vec<TypeDefinition> = to
                .members
                .iter()
                .filter_map(|m| self.find_type(m).cloned())
                .collect();
            for member in members {
                if let Some(matched) = self.type_match(&from, &member, location) {
                    return Some(matched);
                }
            }
            return None;
        }
        if from.category == TypeCategory::Union {
            let members: Vec<TypeDefinition> = from
                .members
                .iter()
                .filter_map(|m| self.find_type(m).cloned())
                .collect();
            if members
                .iter()
                .all(|m| self.type_match(m, &to, location).is_some())
            {
                return Some(to);
            }
            return None;
        }
        if from.is("int") && to.is("float") {
            return Some(to);
        }
        if from.is("float") && to.is("int") {
            self.warn(format!(
                "{}: implicit conversion from float to int loses precision.",
                location
            ));
            return None;
        }
        // Enums and flags lower to integers; string-backed ones lower to
        // preserved strings. Comparisons and stores follow the lowering.
        if matches!(from.category, TypeCategory::Enum | TypeCategory::Flag) && to.is("int") {
            return Some(to);
        }
        if matches!(
            from.category,
            TypeCategory::StringEnum | TypeCategory::StringFlag
        ) && to.is("string")
        {
            return Some(to);
        }
        let integral = |t: &TypeDefinition| {
            t.category == TypeCategory::Builtin
                && (t.is("bool") || t.is("byte") || t.is("char") || t.is("short") || t.is("int"))
        };
        if integral(&from) && integral(&to) && from.size <= to.size {
            return Some(to);
        }
        None
    }

    /// The wider of the two conversion directions; used for interval
    /// endpoints and merging re-assigned globals.
    pub fn widest_match(
        &mut self,
        a: &TypeDefinition,
        b: &TypeDefinition,
        location: &Location,
    ) -> Option<TypeDefinition> {
        let forward = self.type_match(a, b, location);
        let backward = self.type_match(b, a, location);
        match (forward, backward) {
            (Some(f), Some(g)) => Some(if f.size >= g.size { f } else { g }),
            (Some(f), None) => Some(f),
            (None, Some(g)) => Some(g),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtl_core::Location;

    #[test]
    fn builtin_tables_are_seeded() {
        let ctx = TranslationContext::with_builtins();
        assert!(ctx.find_type("int").is_some());
        assert!(ctx.find_template("ChangeState").is_some());
        assert!(!ctx.trigger_overloads("AnimElemTime").is_empty());
    }

    #[test]
    fn alias_resolution_reaches_the_union() {
        let ctx = TranslationContext::with_builtins();
        let sprite = ctx.find_type("sprite").cloned().expect("sprite type");
        let resolved = ctx.resolve_alias(&sprite).expect("alias should resolve");
        assert_eq!(resolved.name, "prefixed_int");
        assert_eq!(resolved.category, TypeCategory::Union);
    }

    #[test]
    fn int_widens_to_float_but_not_back() {
        let mut ctx = TranslationContext::with_builtins();
        let int = ctx.find_type("int").cloned().expect("int");
        let float = ctx.find_type("float").cloned().expect("float");
        let loc = Location::internal();
        assert_eq!(
            ctx.type_match(&int, &float, &loc).map(|t| t.name),
            Some("float".to_string())
        );
        assert!(ctx.type_match(&float, &int, &loc).is_none());
        assert!(!ctx.warnings.is_empty());
    }

    #[test]
    fn short_fits_in_int_and_the_union_accepts_members() {
        let mut ctx = TranslationContext::with_builtins();
        let short = ctx.find_type("short").cloned().expect("short");
        let int = ctx.find_type("int").cloned().expect("int");
        let numeric = ctx.find_type("numeric").cloned().expect("numeric");
        let loc = Location::internal();
        assert!(ctx.type_match(&short, &int, &loc).is_some());
        assert!(ctx.type_match(&int, &short, &loc).is_none());
        assert!(ctx.type_match(&int, &numeric, &loc).is_some());
    }

    #[test]
    fn widest_match_prefers_the_larger_side() {
        let mut ctx = TranslationContext::with_builtins();
        let byte = ctx.find_type("byte").cloned().expect("byte");
        let short = ctx.find_type("short").cloned().expect("short");
        let loc = Location::internal();
        let widest = ctx.widest_match(&byte, &short, &loc).expect("match");
        assert_eq!(widest.name, "short");
    }
}
