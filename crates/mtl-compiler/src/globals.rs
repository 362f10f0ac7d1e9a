//! Implicit-global discovery, the full post-expansion type check, and slot
//! packing.
//!
//! Discovery is deliberately tolerant: an identifier that resolves to
//! nothing only marks presence, and an assignment whose right-hand side
//! cannot be typed yet records nothing. The strict pass over every
//! controller runs afterwards with the completed variable table, so nothing
//! discovery shrugs off goes unreported.

use mtl_core::{
    Location, ScopeKind, StateController, StateDefinition, StateScope, TranslationError,
    TriggerParam, TriggerTree, TypeCategory, TypeDefinition, TypeSpecifier, Variable,
};

use crate::checker::{matches_enum_value, find_trigger, parse_builtin, type_check};
use crate::context::TranslationContext;

/// Controllers whose free-form property keys are variable names rather than
/// template parameters.
pub const VARIABLE_KEY_CONTROLLERS: &[&str] =
    &["VarSet", "VarAdd", "ParentVarSet", "ParentVarAdd"];

/// A global sighted during discovery. The type stays unknown until an
/// assignment fixes it.
#[derive(Debug, Clone)]
pub struct GlobalCandidate {
    pub name: String,
    pub ty: Option<TypeDefinition>,
    pub scope: StateScope,
    pub location: Location,
}

fn is_known_symbol(
    ctx: &mut TranslationContext,
    table: &[TriggerParam],
    text: &str,
    auto_enums: &[TypeDefinition],
    location: &Location,
) -> Result<bool, TranslationError> {
    if parse_builtin(ctx, text).is_some() {
        return Ok(true);
    }
    if table.iter().any(|v| v.name.eq_ignore_ascii_case(text)) {
        return Ok(true);
    }
    if find_trigger(ctx, text, &[]).is_some() {
        return Ok(true);
    }
    if ctx.find_type(text).is_some() {
        return Ok(true);
    }
    for ty in ctx.types.clone() {
        if matches_enum_value(&ty, text, auto_enums, location)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn record(
    found: &mut Vec<GlobalCandidate>,
    name: &str,
    ty: Option<TypeDefinition>,
    scope: StateScope,
    location: &Location,
) {
    if let Some(existing) = found
        .iter_mut()
        .find(|g| g.name.eq_ignore_ascii_case(name))
    {
        if existing.ty.is_none() {
            existing.ty = ty;
        }
        return;
    }
    found.push(GlobalCandidate {
        name: name.to_string(),
        ty,
        scope,
        location: location.clone(),
    });
}

fn scan_tree(
    tree: &TriggerTree,
    table: &[TriggerParam],
    locals: &[TriggerParam],
    auto_enums: &[TypeDefinition],
    scope: StateScope,
    ctx: &mut TranslationContext,
    found: &mut Vec<GlobalCandidate>,
) -> Result<(), TranslationError> {
    match tree {
        TriggerTree::Atom { text, location } => {
            if !is_known_symbol(ctx, table, text, auto_enums, location)?
                && !found.iter().any(|g| g.name.eq_ignore_ascii_case(text))
            {
                record(found, text, None, scope, location);
            }
        }
        TriggerTree::Binary {
            op,
            left,
            right,
            location,
        } if op == ":=" => {
            scan_tree(right, table, locals, auto_enums, scope, ctx, found)?;
            if let TriggerTree::Atom { text, .. } = left.as_ref() {
                // An assignment target is always a variable name; trigger
                // and type names never shadow it. Every assignment records
                // a candidate so later merging can compare types across
                // statedefs.
                let scoped = parse_builtin(ctx, text).is_some()
                    || locals.iter().any(|v| v.name.eq_ignore_ascii_case(text));
                if !scoped {
                    // Type the right-hand side against everything typed so
                    // far; an unresolvable side leaves the global untyped
                    // for a later assignment to fix.
                    let mut extended = table.to_vec();
                    for candidate in found.iter() {
                        if let Some(ty) = &candidate.ty {
                            extended.push(TriggerParam {
                                name: candidate.name.clone(),
                                ty: ty.clone(),
                            });
                        }
                    }
                    let warnings_before = ctx.warnings.len();
                    let rhs = type_check(right, &extended, auto_enums, ctx);
                    let ty = match rhs {
                        Ok(specs) if specs.len() == 1 => Some(specs[0].ty.clone()),
                        Ok(_) => None,
                        Err(error) if error.code == "UNKNOWN_SYMBOL" => {
                            ctx.warnings.truncate(warnings_before);
                            None
                        }
                        Err(error) => return Err(error),
                    };
                    record(found, text, ty, scope, location);
                }
            } else {
                scan_tree(left, table, locals, auto_enums, scope, ctx, found)?;
            }
        }
        TriggerTree::Unary { child, .. } => {
            scan_tree(child, table, locals, auto_enums, scope, ctx, found)?;
        }
        TriggerTree::Binary { left, right, .. } => {
            scan_tree(left, table, locals, auto_enums, scope, ctx, found)?;
            scan_tree(right, table, locals, auto_enums, scope, ctx, found)?;
        }
        TriggerTree::Interval { lower, upper, .. } => {
            scan_tree(lower, table, locals, auto_enums, scope, ctx, found)?;
            scan_tree(upper, table, locals, auto_enums, scope, ctx, found)?;
        }
        TriggerTree::Call { args, .. } => {
            for arg in args {
                scan_tree(arg, table, locals, auto_enums, scope, ctx, found)?;
            }
        }
        TriggerTree::StructAccess { path, location } => {
            if let Some(head) = path.split_whitespace().next() {
                if !is_known_symbol(ctx, table, head, &[], location)?
                    && !found.iter().any(|g| g.name.eq_ignore_ascii_case(head))
                {
                    record(found, head, None, scope, location);
                }
            }
        }
        TriggerTree::MultiValue { children, .. } => {
            for child in children {
                scan_tree(child, table, locals, auto_enums, scope, ctx, found)?;
            }
        }
        TriggerTree::Redirect { target, body, .. } => {
            if let TriggerTree::Call { args, .. } = target.as_ref() {
                for arg in args {
                    scan_tree(arg, table, locals, auto_enums, scope, ctx, found)?;
                }
            }
            scan_tree(body, table, locals, auto_enums, scope, ctx, found)?;
        }
    }
    Ok(())
}

/// The enum and flag types a template parameter injects into its value
/// expression.
fn param_auto_enums(specs: &[TypeSpecifier]) -> Vec<TypeDefinition> {
    specs
        .iter()
        .filter(|s| {
            matches!(
                s.ty.category,
                TypeCategory::Enum
                    | TypeCategory::Flag
                    | TypeCategory::StringEnum
                    | TypeCategory::StringFlag
            )
        })
        .map(|s| s.ty.clone())
        .collect()
}

/// Scans one controller for identifiers that resolve to nothing visible.
/// Used both to forbid globals inside templates and to build the global
/// table for state definitions.
pub fn undefined_globals(
    controller: &StateController,
    visible: &[Variable],
    ctx: &mut TranslationContext,
) -> Result<Vec<GlobalCandidate>, TranslationError> {
    let table: Vec<TriggerParam> = visible
        .iter()
        .map(|v| TriggerParam {
            name: v.name.clone(),
            ty: v.ty.clone(),
        })
        .collect();
    let template = ctx.find_template(&controller.kind).cloned();
    let scope = StateScope::shared();

    let mut found = Vec::new();
    for trees in controller.triggers.values() {
        for tree in trees {
            scan_tree(tree, &table, &table, &[], scope, ctx, &mut found)?;
        }
    }
    for property in &controller.properties {
        let auto_enums = template
            .as_ref()
            .and_then(|t| {
                t.params
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(&property.key))
            })
            .map(|p| param_auto_enums(&p.specs))
            .unwrap_or_default();
        scan_tree(&property.value, &table, &table, &auto_enums, scope, ctx, &mut found)?;
    }
    Ok(found)
}

fn merge_candidate(
    globals: &mut Vec<GlobalCandidate>,
    candidate: GlobalCandidate,
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    let Some(existing) = globals
        .iter_mut()
        .find(|g| g.name.eq_ignore_ascii_case(&candidate.name))
    else {
        globals.push(candidate);
        return Ok(());
    };

    // A global sighted from two different scope kinds must live in the
    // shared region so both tables see the same slots.
    if existing.scope != candidate.scope {
        existing.scope = StateScope::shared();
    }
    match (&existing.ty, candidate.ty) {
        (_, None) => {}
        (None, Some(ty)) => existing.ty = Some(ty),
        (Some(current), Some(incoming)) => {
            let widest = ctx
                .widest_match(current, &incoming, &candidate.location)
                .ok_or_else(|| {
                    TranslationError::new(
                        "INCOMPATIBLE_TYPES",
                        format!(
                            "Global variable {} was assigned type {} at {} but type {} here.",
                            existing.name, current.name, existing.location, incoming.name
                        ),
                    )
                    .at(candidate.location.clone())
                })?;
            existing.ty = Some(widest);
        }
    }
    Ok(())
}

/// Walks every state definition, discovers implicit globals, and fixes their
/// types from assignments. A global never assigned anywhere is fatal.
pub fn collect_globals(ctx: &mut TranslationContext) -> Result<(), TranslationError> {
    let statedefs = std::mem::take(&mut ctx.statedefs);
    let mut candidates: Vec<GlobalCandidate> = Vec::new();

    let result = (|| -> Result<(), TranslationError> {
        for statedef in &statedefs {
            for controller in &statedef.controllers {
                let mut visible = statedef.locals.clone();
                for candidate in &candidates {
                    if let Some(ty) = &candidate.ty {
                        if StateScope::compatible(statedef.scope, candidate.scope) {
                            visible.push(Variable::new(
                                candidate.name.clone(),
                                ty.clone(),
                                candidate.scope,
                                candidate.location.clone(),
                            ));
                        }
                    }
                }
                let mut found = Vec::new();
                let table: Vec<TriggerParam> = visible
                    .iter()
                    .map(|v| TriggerParam {
                        name: v.name.clone(),
                        ty: v.ty.clone(),
                    })
                    .collect();
                // Assignment targets matching a statedef local are scoped;
                // a match against an earlier candidate still re-records so
                // conflicting types meet in the merge below.
                let locals: Vec<TriggerParam> = statedef
                    .locals
                    .iter()
                    .map(|v| TriggerParam {
                        name: v.name.clone(),
                        ty: v.ty.clone(),
                    })
                    .collect();
                let template = ctx.find_template(&controller.kind).cloned();
                for trees in controller.triggers.values() {
                    for tree in trees {
                        scan_tree(tree, &table, &locals, &[], statedef.scope, ctx, &mut found)?;
                    }
                }
                for property in &controller.properties {
                    let auto_enums = template
                        .as_ref()
                        .and_then(|t| {
                            t.params
                                .iter()
                                .find(|p| p.name.eq_ignore_ascii_case(&property.key))
                        })
                        .map(|p| param_auto_enums(&p.specs))
                        .unwrap_or_default();
                    scan_tree(
                        &property.value,
                        &table,
                        &locals,
                        &auto_enums,
                        statedef.scope,
                        ctx,
                        &mut found,
                    )?;
                }
                for candidate in found {
                    merge_candidate(&mut candidates, candidate, ctx)?;
                }
            }
        }
        Ok(())
    })();
    ctx.statedefs = statedefs;
    result?;

    for candidate in candidates {
        let Some(ty) = candidate.ty else {
            return Err(TranslationError::new(
                "UNDEFINED_GLOBAL",
                format!(
                    "Global variable {} is read but never assigned, so its type cannot be determined.",
                    candidate.name
                ),
            )
            .at(candidate.location));
        };
        ctx.globals.push(Variable::new(
            candidate.name,
            ty,
            candidate.scope,
            candidate.location,
        ));
    }
    Ok(())
}

pub fn is_float_backed(ctx: &TranslationContext, ty: &TypeDefinition) -> bool {
    match ctx.resolve_alias(ty) {
        Ok(resolved) => resolved.is("float"),
        Err(_) => ty.is("float"),
    }
}

/// Flattens a type to its scalar leaves. A structure contributes one leaf
/// per (recursively resolved) member, named by the space-joined access path;
/// anything else is a single anonymous leaf.
pub fn flatten_leaves(ctx: &TranslationContext, ty: &TypeDefinition) -> Vec<(String, TypeDefinition)> {
    if !matches!(
        ty.category,
        TypeCategory::Structure | TypeCategory::BuiltinStructure
    ) {
        return vec![(String::new(), ty.clone())];
    }
    let mut leaves = Vec::new();
    for member in &ty.members {
        let Some((field, type_name)) = member.split_once(':') else {
            continue;
        };
        let Some(member_ty) = ctx.find_type(type_name) else {
            continue;
        };
        for (sub_path, leaf) in flatten_leaves(ctx, &member_ty.clone()) {
            let path = if sub_path.is_empty() {
                field.to_string()
            } else {
                format!("{field} {sub_path}")
            };
            leaves.push((path, leaf));
        }
    }
    leaves
}

fn allocate_one(
    ctx: &mut TranslationContext,
    name: &str,
    ty: &TypeDefinition,
    scope: StateScope,
    location: &Location,
) -> Result<Vec<(u32, u32)>, TranslationError> {
    // A structure occupies one region per scalar leaf so each member can
    // be read and written independently of its siblings.
    let mut allocations = Vec::new();
    for (path, leaf) in flatten_leaves(ctx, ty) {
        let leaf_name = if path.is_empty() {
            name.to_string()
        } else {
            format!("{name} {path}")
        };
        allocations.push(allocate_region(ctx, &leaf_name, &leaf, scope, location)?);
    }
    Ok(allocations)
}

fn allocate_region(
    ctx: &mut TranslationContext,
    name: &str,
    ty: &TypeDefinition,
    scope: StateScope,
    location: &Location,
) -> Result<(u32, u32), TranslationError> {
    let float = is_float_backed(ctx, ty);
    let size = ty.size.max(1);
    let fail = || {
        TranslationError::new(
            "ALLOCATION_FAILED",
            format!("Could not fit variable {name} into the {scope} slot tables."),
        )
        .at(location.clone())
    };

    let region = match scope.kind {
        ScopeKind::Player => {
            let table = if float {
                &mut ctx.player_slots.floats
            } else {
                &mut ctx.player_slots.ints
            };
            table.allocate(size).ok_or_else(fail)?
        }
        ScopeKind::Helper => {
            let table = if float {
                &mut ctx.helper_slots.floats
            } else {
                &mut ctx.helper_slots.ints
            };
            table.allocate(size).ok_or_else(fail)?
        }
        ScopeKind::Shared => {
            // Shared variables hold the same region in both tables so either
            // entity kind reads the same slot.
            let (player, helper) = if float {
                (&mut ctx.player_slots.floats, &mut ctx.helper_slots.floats)
            } else {
                (&mut ctx.player_slots.ints, &mut ctx.helper_slots.ints)
            };
            let mut chosen = None;
            'search: for slot in 0..player.slot_count - player.reserved {
                for offset in 0..=(mtl_core::SLOT_WIDTH - size) {
                    if player.region_free(slot, offset, size) && helper.region_free(slot, offset, size)
                    {
                        chosen = Some((slot, offset));
                        break 'search;
                    }
                }
            }
            let (slot, offset) = chosen.ok_or_else(fail)?;
            player.reserve(slot, offset, size);
            helper.reserve(slot, offset, size);
            (slot, offset)
        }
    };
    Ok(region)
}

/// Packs every global and every state-local into the fixed slot tables.
pub fn allocate_variables(ctx: &mut TranslationContext) -> Result<(), TranslationError> {
    let mut globals = std::mem::take(&mut ctx.globals);
    let mut result = Ok(());
    for var in &mut globals {
        match allocate_one(ctx, &var.name.clone(), &var.ty.clone(), var.scope, &var.location.clone()) {
            Ok(allocations) => var.allocations = allocations,
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }
    ctx.globals = globals;
    result?;

    let mut statedefs = std::mem::take(&mut ctx.statedefs);
    let mut result = Ok(());
    'outer: for statedef in &mut statedefs {
        for local in &mut statedef.locals {
            match allocate_one(
                ctx,
                &local.name.clone(),
                &local.ty.clone(),
                statedef.scope,
                &local.location.clone(),
            ) {
                Ok(allocations) => local.allocations = allocations,
                Err(error) => {
                    result = Err(error);
                    break 'outer;
                }
            }
        }
    }
    ctx.statedefs = statedefs;
    result
}

/// The variable table one state definition sees: its locals plus every
/// global whose scope is visible from the statedef's scope.
pub fn visible_table(statedef: &StateDefinition, ctx: &TranslationContext) -> Vec<TriggerParam> {
    let mut table: Vec<TriggerParam> = statedef
        .locals
        .iter()
        .map(|v| TriggerParam {
            name: v.name.clone(),
            ty: v.ty.clone(),
        })
        .collect();
    for global in &ctx.globals {
        if StateScope::compatible(statedef.scope, global.scope) {
            table.push(TriggerParam {
                name: global.name.clone(),
                ty: global.ty.clone(),
            });
        }
    }
    table
}

/// Consumes `result` values against the declared specifier list: optional
/// positions may be skipped, a repeat position absorbs the tail.
fn specs_match(
    result: &[TypeSpecifier],
    expected: &[TypeSpecifier],
    location: &Location,
    ctx: &mut TranslationContext,
) -> bool {
    let mut index = 0;
    for spec in expected {
        if spec.repeat {
            while index < result.len() {
                if ctx.type_match(&result[index].ty, &spec.ty, location).is_none() {
                    return false;
                }
                index += 1;
            }
            continue;
        }
        if index < result.len() && ctx.type_match(&result[index].ty, &spec.ty, location).is_some() {
            index += 1;
        } else if spec.required {
            return false;
        }
    }
    index == result.len()
}

fn check_controller(
    controller: &StateController,
    table: &[TriggerParam],
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    let template = ctx.find_template(&controller.kind).cloned().ok_or_else(|| {
        TranslationError::new(
            "UNKNOWN_TEMPLATE",
            format!("Could not determine which template to use for state controller {}.", controller.kind),
        )
        .at(controller.location.clone())
    })?;
    let bool_ty = ctx.find_type("bool").cloned().ok_or_else(|| {
        TranslationError::new("UNKNOWN_TYPE", "The builtin `bool` type is missing.")
    })?;

    for param in &template.params {
        if param.required
            && !controller
                .properties
                .iter()
                .any(|p| p.key.eq_ignore_ascii_case(&param.name))
        {
            return Err(TranslationError::new(
                "MISSING_REQUIRED_PROPERTY",
                format!(
                    "State controller {} does not define required property {}.",
                    controller.kind, param.name
                ),
            )
            .at(controller.location.clone()));
        }
    }

    for trees in controller.triggers.values() {
        for tree in trees {
            let specs = type_check(tree, table, &[], ctx)?;
            let location = tree.location();
            if specs.len() != 1
                || ctx.type_match(&specs[0].ty, &bool_ty, location).is_none()
            {
                let name = specs
                    .first()
                    .map(|s| s.ty.name.clone())
                    .unwrap_or_else(|| "tuple".to_string());
                return Err(TranslationError::new(
                    "INCOMPATIBLE_TYPES",
                    format!("Trigger expressions must evaluate to bool, got {name}."),
                )
                .at(location.clone()));
            }
        }
    }

    let variable_keys = VARIABLE_KEY_CONTROLLERS
        .iter()
        .any(|n| controller.kind.eq_ignore_ascii_case(n));
    for property in &controller.properties {
        let location = property.value.location();
        let declared = template
            .params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&property.key));
        let expected: Option<Vec<TypeSpecifier>> = match declared {
            Some(param) => Some(param.specs.clone()),
            None => {
                let variable = table
                    .iter()
                    .find(|v| v.name.eq_ignore_ascii_case(&property.key));
                match variable {
                    Some(var) if variable_keys => Some(vec![TypeSpecifier::of(var.ty.clone())]),
                    _ => {
                        ctx.warn(format!(
                            "Property {} was passed to state controller or template named {}, but the template does not declare this property.",
                            property.key, controller.kind
                        ));
                        None
                    }
                }
            }
        };
        let auto_enums = expected
            .as_deref()
            .map(param_auto_enums)
            .unwrap_or_default();
        let result = type_check(&property.value, table, &auto_enums, ctx)?;
        if let Some(expected) = expected {
            if !specs_match(&result, &expected, location, ctx) {
                return Err(TranslationError::new(
                    "INCOMPATIBLE_TYPES",
                    format!(
                        "Could not match types [{}] to expected types [{}] on property {} of state controller {}.",
                        result.iter().map(|s| s.ty.name.as_str()).collect::<Vec<_>>().join(", "),
                        expected.iter().map(|s| s.ty.name.as_str()).collect::<Vec<_>>().join(", "),
                        property.key, controller.kind
                    ),
                )
                .at(location.clone()));
            }
        }
    }
    Ok(())
}

/// The strict pass: every trigger must be bool, every property must match
/// its declared specifier list.
pub fn type_check_statedefs(ctx: &mut TranslationContext) -> Result<(), TranslationError> {
    let statedefs = std::mem::take(&mut ctx.statedefs);
    let mut result = Ok(());
    'outer: for statedef in &statedefs {
        let table = visible_table(statedef, ctx);
        for controller in &statedef.controllers {
            if let Err(error) = check_controller(controller, &table, ctx) {
                result = Err(error);
                break 'outer;
            }
        }
    }
    ctx.statedefs = statedefs;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Loader, MemoryProvider, SearchPaths};
    use crate::translate::{
        append_default_template_params, pre_translate_statedefs, translate_templates,
        translate_triggers, translate_types,
    };
    use std::path::Path;

    fn context_for(main: &str) -> Result<TranslationContext, TranslationError> {
        let provider = MemoryProvider::new([
            ("main.mtl", main),
            (
                crate::loader::STDLIB_INCLUDE,
                "[Define Type]\nname = target\ntype = alias\nsource = int\n",
            ),
        ]);
        let load_ctx = Loader::new(&provider, SearchPaths::default())
            .load(Path::new("main.mtl"))
            .expect("should load");
        let mut ctx = TranslationContext::with_builtins();
        translate_types(&load_ctx, &mut ctx)?;
        translate_triggers(&load_ctx, &mut ctx)?;
        translate_templates(&load_ctx, &mut ctx)?;
        append_default_template_params(&mut ctx);
        pre_translate_statedefs(&load_ctx, &mut ctx, false)?;
        Ok(ctx)
    }

    fn compiled(main: &str) -> Result<TranslationContext, TranslationError> {
        let mut ctx = context_for(main)?;
        collect_globals(&mut ctx)?;
        allocate_variables(&mut ctx)?;
        type_check_statedefs(&mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn assignment_fixes_the_type_of_an_implicit_global() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = (combo := 3) > 0\n\
             [Statedef 101]\ntype = S\n[State ]\ntype = Null\ntrigger1 = combo > 0\n",
        )
        .expect("should compile");
        assert_eq!(ctx.globals.len(), 1);
        assert_eq!(ctx.globals[0].name, "combo");
        assert_eq!(ctx.globals[0].ty.name, "int");
        assert_eq!(ctx.globals[0].allocations.len(), 1);
    }

    #[test]
    fn a_global_read_before_its_assignment_still_resolves() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = combo > 0\n\
             [Statedef 101]\ntype = S\n[State ]\ntype = Null\ntrigger1 = (combo := 3) > 0\n",
        )
        .expect("later assignment should fix the type");
        assert_eq!(ctx.globals[0].ty.name, "int");
    }

    #[test]
    fn a_global_never_assigned_is_fatal() {
        let err = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = combo > 0\n",
        )
        .expect_err("must fail");
        assert_eq!(err.code, "UNDEFINED_GLOBAL");
    }

    #[test]
    fn conflicting_assignment_types_are_fatal() {
        let err = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = (mark := 3) > 0\n\
             [Statedef 101]\ntype = S\n[State ]\ntype = Null\ntrigger1 = (mark := \"x\") != \"\"\n",
        )
        .expect_err("must fail");
        assert_eq!(err.code, "INCOMPATIBLE_TYPES");
        // The diagnostic names both assignment types.
        assert!(err.message.contains("int"));
        assert!(err.message.contains("string"));
    }

    #[test]
    fn assignment_targets_ignore_type_name_collisions() {
        let ctx = compiled(
            "[Define Type]\nname = Phase\ntype = enum\nenum = Idle\nenum = Started\n\
             [Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = (phase := Phase.Started) > 0\n",
        )
        .expect("a variable sharing a type's name should still be a variable");
        assert_eq!(ctx.globals.len(), 1);
        assert_eq!(ctx.globals[0].name, "phase");
        assert_eq!(ctx.globals[0].ty.name, "Phase");
    }

    #[test]
    fn bools_pack_into_a_shared_slot_and_ints_take_fresh_ones() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\n\
             local = a = bool\nlocal = b = bool\nlocal = c = bool\nlocal = d = bool\nlocal = n = int\n\
             [State ]\ntype = Null\ntrigger1 = a\n",
        )
        .expect("should compile");
        let statedef = &ctx.statedefs[0];
        for (index, local) in statedef.locals.iter().take(4).enumerate() {
            assert_eq!(local.allocations, vec![(0, index as u32)]);
        }
        assert_eq!(statedef.locals[4].allocations, vec![(1, 0)]);
    }

    #[test]
    fn shared_scope_reserves_the_same_region_in_both_tables() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\nlocal = counter = int\n[State ]\ntype = Null\ntrigger1 = counter > 0\n",
        )
        .expect("should compile");
        let player = ctx.player_slots.ints.used.get(&0).expect("player slot 0");
        let helper = ctx.helper_slots.ints.used.get(&0).expect("helper slot 0");
        assert_eq!(player, helper);
    }

    #[test]
    fn floats_take_whole_float_slots() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\nlocal = speed = float\nlocal = lift = float\n\
             [State ]\ntype = Null\ntrigger1 = speed > 0.0\n",
        )
        .expect("should compile");
        let locals = &ctx.statedefs[0].locals;
        assert_eq!(locals[0].allocations, vec![(0, 0)]);
        assert_eq!(locals[1].allocations, vec![(1, 0)]);
    }

    #[test]
    fn triggers_that_are_not_bool_convertible_are_fatal() {
        let err = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = 5.5\n",
        )
        .expect_err("must fail");
        assert_eq!(err.code, "INCOMPATIBLE_TYPES");
    }

    #[test]
    fn missing_required_properties_are_fatal() {
        let err = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = ChangeState\ntrigger1 = Time > 5\n",
        )
        .expect_err("must fail");
        assert_eq!(err.code, "MISSING_REQUIRED_PROPERTY");
    }

    #[test]
    fn undeclared_properties_warn_but_do_not_fail() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\n[State ]\ntype = Null\ntrigger1 = Alive\nmystery = 5\n",
        )
        .expect("should compile");
        assert!(ctx
            .warnings
            .iter()
            .any(|w| w.contains("mystery") && w.contains("Null")));
    }

    #[test]
    fn varset_property_keys_resolve_as_variable_names() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\nlocal = hits = int\n\
             [State ]\ntype = VarSet\ntrigger1 = Alive\nhits = 5\n",
        )
        .expect("should compile");
        assert!(ctx.warnings.iter().all(|w| !w.contains("hits")));
    }

    #[test]
    fn enum_properties_accept_bare_constants_through_injection() {
        let ctx = compiled(
            "[Statedef 100]\ntype = S\n\
             [State ]\ntype = Trans\ntrigger1 = Alive\ntrans = add\n",
        );
        ctx.expect("bare enum constant should resolve through the declared type");
    }
}
