//! Static type checking of trigger trees. The checker walks a tree with a
//! table of visible variables and an optional set of "auto enums", the
//! enum/flag types injected by the expected type of the surrounding
//! property or argument so bare constants like `trans = add` resolve.

use mtl_core::{
    Location, TranslationError, TriggerDefinition, TriggerParam, TriggerTree, TypeCategory,
    TypeDefinition, TypeSpecifier,
};

use crate::context::TranslationContext;

/// Engine scope names accepted as a bare redirect target.
pub const TARGET_NAMES: &[&str] = &[
    "parent", "root", "helper", "target", "partner", "enemy", "enemynear",
];

/// Engine scope names accepted as a call-form redirect target.
pub const TARGET_FUNCS: &[&str] = &[
    "helper", "target", "enemy", "enemynear", "playerid", "rescope",
];

/// Classifies a literal token: integer, float, boolean, double-quoted
/// string, single-quoted char, or an `F`/`S` prefixed group number.
pub fn parse_builtin(ctx: &TranslationContext, text: &str) -> Option<TypeDefinition> {
    let lookup = |name: &str| ctx.find_type(name).cloned();
    if text.parse::<i64>().is_ok() {
        return lookup("int");
    }
    if text.parse::<f64>().is_ok() {
        return lookup("float");
    }
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        return lookup("bool");
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return lookup("string");
    }
    if text.len() == 3 && text.starts_with('\'') && text.ends_with('\'') {
        return lookup("char");
    }
    if text.len() > 1
        && (text.starts_with('F') || text.starts_with('S'))
        && text[1..].parse::<i64>().is_ok()
    {
        return lookup("cint");
    }
    None
}

/// Whether `text` names a constant of the enum or flag type `ty`. Unscoped
/// constants only match through the `auto_enums` injection; scoped constants
/// (`StateType.S`) match anywhere. A scope match with a bad member is a hard
/// error rather than a silent miss.
pub fn matches_enum_value(
    ty: &TypeDefinition,
    text: &str,
    auto_enums: &[TypeDefinition],
    location: &Location,
) -> Result<bool, TranslationError> {
    if !matches!(
        ty.category,
        TypeCategory::Enum | TypeCategory::Flag | TypeCategory::StringEnum | TypeCategory::StringFlag
    ) {
        return Ok(false);
    }

    let Some((scope, value)) = text.rsplit_once('.') else {
        if !auto_enums.iter().any(|e| e.name == ty.name) {
            return Ok(false);
        }
        return matches_enum_value(ty, &format!("{}.{}", ty.name, text), &[], location);
    };

    if scope != ty.name {
        return Ok(false);
    }
    if ty.members.iter().any(|m| m.eq_ignore_ascii_case(value)) {
        return Ok(true);
    }
    if matches!(ty.category, TypeCategory::Flag | TypeCategory::StringFlag) {
        for ch in value.chars() {
            let one = ch.to_string();
            if !ty.members.iter().any(|m| m.eq_ignore_ascii_case(&one)) {
                return Err(TranslationError::new(
                    "UNKNOWN_FLAG_CONSTANT",
                    format!("Flag constant {ch} does not exist on enum type {}.", ty.name),
                )
                .at(location.clone()));
            }
        }
        return Ok(true);
    }
    Err(TranslationError::new(
        "UNKNOWN_ENUM_CONSTANT",
        format!("Enumeration constant {value} does not exist on enum type {}.", ty.name),
    )
    .at(location.clone()))
}

/// Resolves a bare constant against the auto-enum set and the scoped form.
fn resolve_enum_constant(
    ctx: &TranslationContext,
    text: &str,
    auto_enums: &[TypeDefinition],
    location: &Location,
) -> Result<Option<TypeDefinition>, TranslationError> {
    for ty in &ctx.types {
        if matches_enum_value(ty, text, auto_enums, location)? {
            return Ok(Some(ty.clone()));
        }
    }
    Ok(None)
}

/// Overload lookup. Candidates must match on arity and every argument must
/// convert to the declared parameter type; when several overloads remain the
/// one with the smallest total parameter bit-width wins, ties going to
/// catalogue order. Probing is silent: conversion warnings belong to the
/// call that finally matched, not to every overload tried.
pub fn find_trigger(
    ctx: &mut TranslationContext,
    name: &str,
    inputs: &[TypeDefinition],
) -> Option<TriggerDefinition> {
    let candidates: Vec<TriggerDefinition> = ctx
        .trigger_overloads(name)
        .into_iter()
        .cloned()
        .collect();
    let mut best: Option<(u32, TriggerDefinition)> = None;
    for candidate in candidates {
        if candidate.params.len() != inputs.len() {
            continue;
        }
        let warnings_before = ctx.warnings.len();
        let all_match = inputs.iter().zip(&candidate.params).all(|(input, param)| {
            ctx.type_match(input, &param.ty, &candidate.location).is_some()
        });
        ctx.warnings.truncate(warnings_before);
        if !all_match {
            continue;
        }
        let width: u32 = candidate.params.iter().map(|p| p.ty.size).sum();
        match &best {
            Some((best_width, _)) if *best_width <= width => {}
            _ => best = Some((width, candidate)),
        }
    }
    best.map(|(_, def)| def)
}

/// Resolves `Vel y`-style space access. The head is a no-argument trigger or
/// a table variable of structure type; further components recurse through
/// nested structures.
pub fn struct_target(
    ctx: &mut TranslationContext,
    table: &[TriggerParam],
    path: &str,
) -> Option<TypeDefinition> {
    let mut components = path.split_whitespace();
    let head = components.next()?;
    let field = components.next()?;

    let head_type = if let Some(trigger) = find_trigger(ctx, head, &[]) {
        trigger.return_type
    } else {
        table
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(head))?
            .ty
            .clone()
    };
    if !matches!(
        head_type.category,
        TypeCategory::Structure | TypeCategory::BuiltinStructure
    ) {
        return None;
    }

    let member = head_type
        .members
        .iter()
        .find(|m| m.split(':').next().is_some_and(|n| n.eq_ignore_ascii_case(field)))?;
    let member_type = ctx.find_type(member.split(':').nth(1)?)?.clone();

    let rest: Vec<&str> = components.collect();
    if !rest.is_empty() {
        if !matches!(
            member_type.category,
            TypeCategory::Structure | TypeCategory::BuiltinStructure
        ) {
            return None;
        }
        let virtual_table = [TriggerParam {
            name: "_target".to_string(),
            ty: member_type,
        }];
        return struct_target(ctx, &virtual_table, &format!("_target {}", rest.join(" ")));
    }
    Some(member_type)
}

fn single(
    specs: Vec<TypeSpecifier>,
    location: &Location,
) -> Result<TypeDefinition, TranslationError> {
    let mut specs = specs.into_iter();
    match (specs.next(), specs.next()) {
        (Some(only), None) => Ok(only.ty),
        _ => Err(TranslationError::new(
            "UNEXPECTED_TUPLE",
            "A tuple-valued expression cannot be used as an operand.",
        )
        .at(location.clone())),
    }
}

/// Type-checks one tree. Returns a specifier list because a root-level
/// multivalue produces a tuple; everywhere else the list has one entry.
pub fn type_check(
    tree: &TriggerTree,
    table: &[TriggerParam],
    auto_enums: &[TypeDefinition],
    ctx: &mut TranslationContext,
) -> Result<Vec<TypeSpecifier>, TranslationError> {
    match tree {
        TriggerTree::Atom { text, location } => {
            if let Some(parsed) = parse_builtin(ctx, text) {
                return Ok(vec![TypeSpecifier::of(parsed)]);
            }
            if let Some(trigger) = find_trigger(ctx, text, &[]) {
                return Ok(vec![TypeSpecifier::of(trigger.return_type)]);
            }
            if let Some(var) = table.iter().find(|v| v.name.eq_ignore_ascii_case(text)) {
                return Ok(vec![TypeSpecifier::of(var.ty.clone())]);
            }
            if let Some(enum_type) = resolve_enum_constant(ctx, text, auto_enums, location)? {
                return Ok(vec![TypeSpecifier::of(enum_type)]);
            }
            if ctx.find_type(text).is_some() {
                let ty = ctx.find_type("type").cloned().ok_or_else(|| {
                    TranslationError::new("UNKNOWN_TYPE", "The builtin `type` type is missing.")
                })?;
                return Ok(vec![TypeSpecifier::of(ty)]);
            }
            Err(TranslationError::new(
                "UNKNOWN_SYMBOL",
                format!("Could not determine the type of subexpression {text}."),
            )
            .at(location.clone()))
        }
        TriggerTree::Unary { op, child, location } => {
            let input = single(type_check(child, table, auto_enums, ctx)?, location)?;
            let name = format!("operator{op}");
            let matched = find_trigger(ctx, &name, std::slice::from_ref(&input)).ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_OVERLOAD",
                    format!(
                        "No matching operator overload was found for operator {op} and child types {}.",
                        input.name
                    ),
                )
                .at(location.clone())
            })?;
            Ok(vec![TypeSpecifier::of(matched.return_type)])
        }
        TriggerTree::Binary { op, left, right, location } => {
            let lhs = single(type_check(left, table, auto_enums, ctx)?, location)?;
            let rhs = single(type_check(right, table, auto_enums, ctx)?, location)?;
            let inputs = [lhs, rhs];
            let name = format!("operator{op}");
            let matched = find_trigger(ctx, &name, &inputs).ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_OVERLOAD",
                    format!(
                        "No matching operator overload was found for operator {op} and child types {}, {}.",
                        inputs[0].name, inputs[1].name
                    ),
                )
                .at(location.clone())
            })?;
            Ok(vec![TypeSpecifier::of(matched.return_type)])
        }
        TriggerTree::Interval { lower, upper, location, .. } => {
            let lo = single(type_check(lower, table, auto_enums, ctx)?, location)?;
            let hi = single(type_check(upper, table, auto_enums, ctx)?, location)?;
            let widest = ctx.widest_match(&lo, &hi, location).ok_or_else(|| {
                TranslationError::new(
                    "INCOMPATIBLE_TYPES",
                    format!(
                        "Input types {} and {} to interval operator could not be resolved to a common type.",
                        lo.name, hi.name
                    ),
                )
                .at(location.clone())
            })?;
            Ok(vec![TypeSpecifier::of(widest)])
        }
        TriggerTree::Call { name, args, location } => {
            // The expected type of each argument position flows back down so
            // bare enum constants resolve (e.g. `GetHitVar(isbound)`).
            let arity = args.len();
            let positional_enums: Vec<Vec<TypeDefinition>> = (0..arity)
                .map(|index| {
                    ctx.trigger_overloads(name)
                        .into_iter()
                        .filter(|t| t.params.len() == arity)
                        .filter_map(|t| t.params.get(index).map(|p| p.ty.clone()))
                        .filter(|t| {
                            matches!(
                                t.category,
                                TypeCategory::Enum
                                    | TypeCategory::Flag
                                    | TypeCategory::StringEnum
                                    | TypeCategory::StringFlag
                            )
                        })
                        .collect()
                })
                .collect();
            let mut inputs = Vec::with_capacity(arity);
            for (arg, enums) in args.iter().zip(&positional_enums) {
                inputs.push(single(type_check(arg, table, enums, ctx)?, location)?);
            }
            let matched = find_trigger(ctx, name, &inputs).ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_OVERLOAD",
                    format!(
                        "No matching trigger overload was found for trigger named {name} and child types {}.",
                        inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                )
                .at(location.clone())
            })?;
            Ok(vec![TypeSpecifier::of(matched.return_type)])
        }
        TriggerTree::StructAccess { path, location } => {
            let ty = struct_target(ctx, table, path).ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_SYMBOL",
                    format!("Could not determine the type of the struct member access given by {path}."),
                )
                .at(location.clone())
            })?;
            Ok(vec![TypeSpecifier::of(ty)])
        }
        TriggerTree::MultiValue { children, location } => {
            let mut specs = Vec::with_capacity(children.len());
            for (index, child) in children.iter().enumerate() {
                // One auto-enum per position; the last repeats for trailing
                // values, matching repeat-type template parameters.
                let child_enums: &[TypeDefinition] = if auto_enums.is_empty() {
                    &[]
                } else if index < auto_enums.len() {
                    std::slice::from_ref(&auto_enums[index])
                } else {
                    std::slice::from_ref(&auto_enums[auto_enums.len() - 1])
                };
                let child_type =
                    single(type_check(child, table, child_enums, ctx)?, location)?;
                specs.push(TypeSpecifier::of(child_type));
            }
            Ok(specs)
        }
        TriggerTree::Redirect { target, body, location } => {
            check_redirect_target(target, table, ctx)?;
            let body_type = single(type_check(body, table, auto_enums, ctx)?, location)?;
            Ok(vec![TypeSpecifier::of(body_type)])
        }
    }
}

fn check_redirect_target(
    target: &TriggerTree,
    table: &[TriggerParam],
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    match target {
        TriggerTree::Atom { text, location } => {
            if TARGET_NAMES.iter().any(|n| text.eq_ignore_ascii_case(n)) {
                Ok(())
            } else {
                Err(TranslationError::new(
                    "INVALID_REDIRECT",
                    format!("{text} is not a redirect scope understood by the engine."),
                )
                .at(location.clone()))
            }
        }
        TriggerTree::Call { name, args, location } => {
            if !TARGET_FUNCS.iter().any(|n| name.eq_ignore_ascii_case(n)) {
                return Err(TranslationError::new(
                    "INVALID_REDIRECT",
                    format!("{name} is not a redirect scope understood by the engine."),
                )
                .at(location.clone()));
            }
            let int = ctx.find_type("int").cloned().ok_or_else(|| {
                TranslationError::new("UNKNOWN_TYPE", "The builtin `int` type is missing.")
            })?;
            for arg in args {
                let ty = single(type_check(arg, table, &[], ctx)?, location)?;
                if ctx.type_match(&ty, &int, location).is_none() {
                    return Err(TranslationError::new(
                        "INCOMPATIBLE_TYPES",
                        format!("Redirect scope {name} expects an integer ID, got {}.", ty.name),
                    )
                    .at(location.clone()));
                }
            }
            Ok(())
        }
        other => Err(TranslationError::new(
            "INVALID_REDIRECT",
            "A redirect target must be a scope name or scope call.",
        )
        .at(other.location().clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtl_parser::parse_trigger;

    fn check(expr: &str) -> Result<Vec<TypeSpecifier>, TranslationError> {
        let mut ctx = TranslationContext::with_builtins();
        let tree = parse_trigger(expr, &Location::new("test.mtl", 1)).expect("should parse");
        type_check(&tree, &[], &[], &mut ctx)
    }

    fn check_type(expr: &str) -> String {
        check(expr).expect("should type check")[0].ty.name.clone()
    }

    #[test]
    fn literals_classify_to_builtin_types() {
        assert_eq!(check_type("5"), "int");
        assert_eq!(check_type("5.25"), "float");
        assert_eq!(check_type("true"), "bool");
        assert_eq!(check_type("\"name\""), "string");
        assert_eq!(check_type("S150"), "cint");
    }

    #[test]
    fn no_argument_triggers_match_as_atoms() {
        assert_eq!(check_type("Time"), "int");
        assert_eq!(check_type("Alive"), "bool");
        assert_eq!(check_type("GameWidth"), "float");
    }

    #[test]
    fn operator_overloads_dispatch_on_operand_types() {
        assert_eq!(check_type("1 + 2"), "int");
        assert_eq!(check_type("1.0 + 2"), "float");
        assert_eq!(check_type("Time = 5"), "bool");
        assert_eq!(check_type("!Alive"), "bool");
    }

    #[test]
    fn unknown_symbols_are_fatal() {
        let err = check("missing_var + 1").expect_err("must fail");
        assert_eq!(err.code, "UNKNOWN_SYMBOL");
    }

    #[test]
    fn struct_access_resolves_vector_fields() {
        assert_eq!(check_type("Vel y"), "float");
        assert_eq!(check_type("Pos x"), "float");
    }

    #[test]
    fn scoped_enum_constants_resolve_without_injection() {
        assert_eq!(check_type("StateType.S"), "StateType");
    }

    #[test]
    fn bad_scoped_enum_member_is_a_hard_error() {
        let err = check("StateType.Q").expect_err("must fail");
        assert_eq!(err.code, "UNKNOWN_ENUM_CONSTANT");
    }

    #[test]
    fn bare_enum_constant_requires_the_expected_type() {
        let mut ctx = TranslationContext::with_builtins();
        let tree =
            parse_trigger("add", &Location::new("test.mtl", 1)).expect("should parse");
        assert!(type_check(&tree, &[], &[], &mut ctx).is_err());
        let trans = ctx.find_type("TransType").cloned().expect("TransType");
        let specs =
            type_check(&tree, &[], &[trans], &mut ctx).expect("should resolve with injection");
        assert_eq!(specs[0].ty.name, "TransType");
    }

    #[test]
    fn enum_argument_positions_resolve_through_the_signature() {
        assert_eq!(check_type("GetHitVar(isbound)"), "float");
    }

    #[test]
    fn redirects_type_to_their_body() {
        assert_eq!(check_type("parent, Time"), "int");
        assert_eq!(check_type("helper(1400), Alive"), "bool");
    }

    #[test]
    fn overload_resolution_prefers_the_narrowest_match() {
        let mut ctx = TranslationContext::with_builtins();
        let byte = ctx.find_type("byte").cloned().expect("byte");
        let matched = find_trigger(&mut ctx, "operator+", &[byte.clone(), byte])
            .expect("overload should match");
        assert_eq!(matched.return_type.name, "int");
    }

    #[test]
    fn variables_resolve_from_the_table() {
        let mut ctx = TranslationContext::with_builtins();
        let int = ctx.find_type("int").cloned().expect("int");
        let table = [TriggerParam {
            name: "counter".to_string(),
            ty: int,
        }];
        let tree = parse_trigger("counter := counter + 1", &Location::new("test.mtl", 1))
            .expect("should parse");
        let specs = type_check(&tree, &table, &[], &mut ctx).expect("should check");
        assert_eq!(specs[0].ty.name, "int");
    }

    #[test]
    fn interval_endpoints_widen_to_a_common_type() {
        assert_eq!(check_type("[1, 2.5]"), "float");
    }
}
