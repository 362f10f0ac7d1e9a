//! Final lowering to CNS text. Every trigger tree becomes a single engine
//! expression string; variable accesses become masked `var`/`fvar` reads and
//! writes against the packed slot tables.

use mtl_core::{
    ConstEvaluator, Expression, Location, StateController, StateDefinition, StateScope,
    TranslationError, TriggerParam, TriggerTree, TypeCategory, TypeDefinition, Variable,
    SLOT_WIDTH, TRIGGER_GROUP_ALL,
};

use crate::checker::{find_trigger, matches_enum_value, parse_builtin, struct_target};
use crate::context::TranslationContext;
use crate::debug_info;
use crate::globals::{flatten_leaves, is_float_backed, VARIABLE_KEY_CONTROLLERS};
use crate::translate::STATEDEF_PARAMS;

/// The bits of one slot covered by `[offset, offset + size)`, as the signed
/// 32-bit constant the engine parser accepts.
fn range_mask(offset: u32, size: u32) -> i32 {
    (((1u64 << (offset + size)) - (1u64 << offset)) as u32) as i32
}

/// The masked read form for a packed variable region. Floats always own a
/// whole slot; integer regions narrower than a slot are masked out and, when
/// not slot-aligned, shifted down by division.
pub fn mask_variable(slot: u32, offset: u32, size: u32, is_float: bool) -> String {
    if is_float {
        return format!("fvar({slot})");
    }
    if offset == 0 && size >= SLOT_WIDTH {
        return format!("var({slot})");
    }
    if size == 1 {
        // One-bit regions read as the raw masked bit; every use site treats
        // nonzero as true, so no shift-down is needed.
        return format!("(var({slot}) & {})", range_mask(offset, 1));
    }
    if offset == 0 {
        return format!("(var({slot}) & {})", range_mask(0, size));
    }
    let unit = (1u32 << offset) as i32;
    format!("((var({slot}) & {}) / {unit})", range_mask(offset, size))
}

/// The read-modify-write form storing `expr` into a packed region without
/// disturbing the neighbouring regions of the same slot.
pub fn mask_write(slot: u32, offset: u32, size: u32, is_float: bool, expr: &str) -> String {
    if is_float || (offset == 0 && size >= SLOT_WIDTH) {
        return expr.to_string();
    }
    let keep = !(((1u64 << (offset + size)) - (1u64 << offset)) as u32) as i32;
    let size_mask = ((1u64 << size) - 1) as u32 as i32;
    let unit = (1u32 << offset) as i32;
    format!("((var({slot}) & {keep}) | ((({expr}) & {size_mask}) * {unit}))")
}

fn raw_variable(slot: u32, is_float: bool) -> String {
    if is_float {
        format!("fvar({slot})")
    } else {
        format!("var({slot})")
    }
}

/// The variable table one state definition emits against: its locals plus
/// every allocated global visible from its scope.
pub fn emit_table(statedef: &StateDefinition, ctx: &TranslationContext) -> Vec<Variable> {
    let mut table = statedef.locals.clone();
    for global in &ctx.globals {
        if StateScope::compatible(statedef.scope, global.scope) {
            table.push(global.clone());
        }
    }
    table
}

fn param_view(table: &[Variable]) -> Vec<TriggerParam> {
    table
        .iter()
        .map(|v| TriggerParam {
            name: v.name.clone(),
            ty: v.ty.clone(),
        })
        .collect()
}

fn literal_text(text: &str, ty: &TypeDefinition) -> String {
    if ty.is("bool") {
        return if text.eq_ignore_ascii_case("true") { "1" } else { "0" }.to_string();
    }
    if ty.is("char") {
        // 'a' lowers to its code point; parse_builtin guaranteed the
        // three-character quoted form.
        if let Some(ch) = text.chars().nth(1) {
            return (ch as u32).to_string();
        }
    }
    text.to_string()
}

/// Resolves `text` as an enum or flag constant and lowers it. Integer-backed
/// enums become the member index, flags the sum of member bits; string-backed
/// constants keep their text with any scope qualifier stripped.
fn emit_enum_constant(
    ctx: &mut TranslationContext,
    text: &str,
    auto_enums: &[TypeDefinition],
    location: &Location,
) -> Result<Option<Expression>, TranslationError> {
    let types = ctx.types.clone();
    for ty in &types {
        if !matches_enum_value(ty, text, auto_enums, location)? {
            continue;
        }
        let value = text.rsplit_once('.').map(|(_, v)| v).unwrap_or(text);
        let member_index = |member: &str| {
            ty.members
                .iter()
                .position(|m| m.eq_ignore_ascii_case(member))
        };
        let lowered = match ty.category {
            TypeCategory::Enum => match member_index(value) {
                Some(index) => index.to_string(),
                None => continue,
            },
            TypeCategory::Flag => {
                let mut bits: u32 = 0;
                if let Some(index) = member_index(value) {
                    bits = 1 << index;
                } else {
                    for ch in value.chars() {
                        match member_index(&ch.to_string()) {
                            Some(index) => bits |= 1 << index,
                            None => continue,
                        }
                    }
                }
                bits.to_string()
            }
            TypeCategory::StringEnum => match ty
                .members
                .iter()
                .find(|m| m.eq_ignore_ascii_case(value))
            {
                Some(member) => member.clone(),
                None => value.to_string(),
            },
            TypeCategory::StringFlag => value.to_string(),
            _ => continue,
        };
        return Ok(Some(Expression::plain(ty.clone(), lowered)));
    }
    Ok(None)
}

fn emit_atom(
    ctx: &mut TranslationContext,
    table: &[Variable],
    text: &str,
    auto_enums: &[TypeDefinition],
    location: &Location,
) -> Result<Expression, TranslationError> {
    if let Some(ty) = parse_builtin(ctx, text) {
        let value = literal_text(text, &ty);
        return Ok(Expression::plain(ty, value));
    }
    if let Some(trigger) = find_trigger(ctx, text, &[]) {
        return Ok(Expression::plain(trigger.return_type, trigger.name));
    }
    if let Some(var) = table.iter().find(|v| v.name.eq_ignore_ascii_case(text)) {
        let (slot, offset) = *var.allocations.first().ok_or_else(|| {
            TranslationError::new(
                "UNSUPPORTED_ACCESS",
                format!("Variable {} has no storage allocation.", var.name),
            )
            .at(location.clone())
        })?;
        if var.allocations.len() > 1 {
            return Err(TranslationError::new(
                "UNSUPPORTED_ACCESS",
                format!(
                    "Structure variable {} cannot be read as a whole; access one member.",
                    var.name
                ),
            )
            .at(location.clone()));
        }
        let float = is_float_backed(ctx, &var.ty);
        let value = mask_variable(slot, offset, var.ty.size, float);
        return Ok(Expression::variable(var.ty.clone(), value, (slot, offset), float));
    }
    if let Some(expr) = emit_enum_constant(ctx, text, auto_enums, location)? {
        return Ok(expr);
    }
    if let Some(named) = ctx.find_type(text).cloned() {
        let ty = ctx.find_type("type").cloned().ok_or_else(|| {
            TranslationError::new("UNKNOWN_TYPE", "The builtin `type` type is missing.")
        })?;
        return Ok(Expression::plain(ty, named.name));
    }
    Err(TranslationError::new(
        "UNKNOWN_SYMBOL",
        format!("Could not determine the type of subexpression {text}."),
    )
    .at(location.clone()))
}

/// Folds a matched trigger's constant evaluator over already-emitted
/// operands.
fn apply_const(
    ctx: &mut TranslationContext,
    eval: &ConstEvaluator,
    ret: TypeDefinition,
    exprs: &[Expression],
    location: &Location,
) -> Result<Expression, TranslationError> {
    let arity_error = || {
        TranslationError::new(
            "CONST_EVAL_ARITY",
            "A constant evaluator received the wrong number of operands.",
        )
        .at(location.clone())
    };
    match eval {
        ConstEvaluator::Cond => {
            let [condition, then_value, else_value] = exprs else {
                return Err(arity_error());
            };
            let ty = ctx
                .widest_match(&then_value.ty, &else_value.ty, location)
                .ok_or_else(|| {
                    TranslationError::new(
                        "INCOMPATIBLE_TYPES",
                        format!(
                            "Conditional branches have incompatible types {} and {}.",
                            then_value.ty.name, else_value.ty.name
                        ),
                    )
                    .at(location.clone())
                })?;
            Ok(Expression::plain(
                ty,
                format!(
                    "cond({}, {}, {})",
                    condition.value, then_value.value, else_value.value
                ),
            ))
        }
        ConstEvaluator::Cast => {
            let [expr, target] = exprs else {
                return Err(arity_error());
            };
            let ty = ctx.find_type(&target.value).cloned().ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_TYPE",
                    format!("Cast target {} is not a known type.", target.value),
                )
                .at(location.clone())
            })?;
            Ok(Expression::plain(ty, expr.value.clone()))
        }
        ConstEvaluator::Not | ConstEvaluator::Negate | ConstEvaluator::BitNot => {
            let [operand] = exprs else {
                return Err(arity_error());
            };
            let symbol = match eval {
                ConstEvaluator::Not => "!",
                ConstEvaluator::Negate => "-",
                _ => "~",
            };
            Ok(Expression::plain(ret, format!("({symbol}{})", operand.value)))
        }
        ConstEvaluator::Infix(op) => {
            let [left, right] = exprs else {
                return Err(arity_error());
            };
            Ok(Expression::plain(
                ret,
                format!("({} {op} {})", left.value, right.value),
            ))
        }
    }
}

fn unknown_overload(name: &str, inputs: &[Expression], location: &Location) -> TranslationError {
    TranslationError::new(
        "UNKNOWN_OVERLOAD",
        format!(
            "No matching trigger overload was found for trigger named {name} and child types {}.",
            inputs
                .iter()
                .map(|e| e.ty.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    )
    .at(location.clone())
}

fn emit_redirect_target(
    ctx: &mut TranslationContext,
    table: &[Variable],
    target: &TriggerTree,
) -> Result<String, TranslationError> {
    match target {
        TriggerTree::Atom { text, .. } => Ok(text.clone()),
        TriggerTree::Call { name, args, .. } => {
            let mut emitted = Vec::with_capacity(args.len());
            for arg in args {
                emitted.push(emit_tree(ctx, table, arg, &[])?.value);
            }
            Ok(format!("{name}({})", emitted.join(", ")))
        }
        other => Err(TranslationError::new(
            "INVALID_REDIRECT",
            "A redirect target must be a scope name or scope call.",
        )
        .at(other.location().clone())),
    }
}

/// Lowers one trigger tree to engine expression text. `auto_enums` carries
/// the types whose bare constants are admissible at this position.
pub fn emit_tree(
    ctx: &mut TranslationContext,
    table: &[Variable],
    tree: &TriggerTree,
    auto_enums: &[TypeDefinition],
) -> Result<Expression, TranslationError> {
    match tree {
        TriggerTree::Atom { text, location } => emit_atom(ctx, table, text, auto_enums, location),
        TriggerTree::Unary { op, child, location } => {
            let operand = emit_tree(ctx, table, child, &[])?;
            let name = format!("operator{op}");
            let inputs = [operand];
            let matched = find_trigger(ctx, &name, &[inputs[0].ty.clone()])
                .ok_or_else(|| unknown_overload(&name, &inputs, location))?;
            let eval = matched.const_eval.unwrap_or_else(|| ConstEvaluator::Infix(op.clone()));
            apply_const(ctx, &eval, matched.return_type, &inputs, location)
        }
        TriggerTree::Binary { op, left, right, location } => {
            let mut lhs = emit_tree(ctx, table, left, &[])?;
            let mut rhs = emit_tree(ctx, table, right, auto_enums)?;
            if op == ":=" {
                // Assignment rewrites the left side to the raw slot and the
                // right side to the region's read-modify-write form.
                let (slot, offset) = lhs.allocation.ok_or_else(|| {
                    TranslationError::new(
                        "INVALID_ASSIGNMENT",
                        "The left side of := must be a variable.",
                    )
                    .at(location.clone())
                })?;
                rhs.value = mask_write(slot, offset, lhs.ty.size, lhs.is_float, &rhs.value);
                lhs.value = raw_variable(slot, lhs.is_float);
            }
            let name = format!("operator{op}");
            let inputs = [lhs, rhs];
            let matched = find_trigger(ctx, &name, &[inputs[0].ty.clone(), inputs[1].ty.clone()])
                .ok_or_else(|| unknown_overload(&name, &inputs, location))?;
            let eval = matched.const_eval.unwrap_or_else(|| ConstEvaluator::Infix(op.clone()));
            apply_const(ctx, &eval, matched.return_type, &inputs, location)
        }
        TriggerTree::Interval { open, close, lower, upper, location } => {
            let lo = emit_tree(ctx, table, lower, auto_enums)?;
            let hi = emit_tree(ctx, table, upper, auto_enums)?;
            let ty = ctx.widest_match(&lo.ty, &hi.ty, location).ok_or_else(|| {
                TranslationError::new(
                    "INCOMPATIBLE_TYPES",
                    format!(
                        "Input types {} and {} to interval operator could not be resolved to a common type.",
                        lo.ty.name, hi.ty.name
                    ),
                )
                .at(location.clone())
            })?;
            Ok(Expression::plain(
                ty,
                format!("{open}{}, {}{close}", lo.value, hi.value),
            ))
        }
        TriggerTree::Call { name, args, location } => {
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
                inputs.push(emit_tree(ctx, table, arg, enums)?);
            }
            let types: Vec<TypeDefinition> = inputs.iter().map(|e| e.ty.clone()).collect();
            let matched = find_trigger(ctx, name, &types)
                .ok_or_else(|| unknown_overload(name, &inputs, location))?;
            if let Some(eval) = matched.const_eval {
                return apply_const(ctx, &eval, matched.return_type, &inputs, location);
            }
            let value = if inputs.is_empty() {
                matched.name
            } else {
                format!(
                    "({}({}))",
                    matched.name,
                    inputs.iter().map(|e| e.value.as_str()).collect::<Vec<_>>().join(", ")
                )
            };
            Ok(Expression::plain(matched.return_type, value))
        }
        TriggerTree::StructAccess { path, location } => {
            let mut components = path.split_whitespace();
            let head = components.next().unwrap_or_default();
            let rest: Vec<&str> = components.collect();
            if let Some(var) = table
                .iter()
                .find(|v| v.name.eq_ignore_ascii_case(head))
                .cloned()
            {
                let wanted = rest.join(" ");
                let leaves = flatten_leaves(ctx, &var.ty);
                let index = leaves
                    .iter()
                    .position(|(leaf_path, _)| leaf_path.eq_ignore_ascii_case(&wanted))
                    .ok_or_else(|| {
                        TranslationError::new(
                            "UNKNOWN_SYMBOL",
                            format!(
                                "Could not determine the type of the struct member access given by {path}."
                            ),
                        )
                        .at(location.clone())
                    })?;
                let (_, leaf_ty) = &leaves[index];
                let (slot, offset) = *var.allocations.get(index).ok_or_else(|| {
                    TranslationError::new(
                        "UNSUPPORTED_ACCESS",
                        format!("Variable {} has no storage allocation.", var.name),
                    )
                    .at(location.clone())
                })?;
                let float = is_float_backed(ctx, leaf_ty);
                let value = mask_variable(slot, offset, leaf_ty.size, float);
                return Ok(Expression::variable(leaf_ty.clone(), value, (slot, offset), float));
            }
            let view = param_view(table);
            let ty = struct_target(ctx, &view, path).ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_SYMBOL",
                    format!("Could not determine the type of the struct member access given by {path}."),
                )
                .at(location.clone())
            })?;
            let mut normalized = vec![head.to_string()];
            normalized.extend(rest.iter().map(|c| c.to_string()));
            Ok(Expression::plain(ty, normalized.join(" ")))
        }
        TriggerTree::MultiValue { children, location: _ } => {
            let mut emitted = Vec::with_capacity(children.len());
            for (index, child) in children.iter().enumerate() {
                let child_enums: &[TypeDefinition] = if auto_enums.is_empty() {
                    &[]
                } else if index < auto_enums.len() {
                    std::slice::from_ref(&auto_enums[index])
                } else {
                    std::slice::from_ref(&auto_enums[auto_enums.len() - 1])
                };
                emitted.push(emit_tree(ctx, table, child, child_enums)?);
            }
            let ty = emitted
                .first()
                .map(|e| e.ty.clone())
                .unwrap_or_else(|| TypeDefinition {
                    name: "any".to_string(),
                    category: TypeCategory::BuiltinDeny,
                    size: SLOT_WIDTH,
                    members: Vec::new(),
                    location: Location::internal(),
                });
            Ok(Expression::plain(
                ty,
                emitted
                    .iter()
                    .map(|e| e.value.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ))
        }
        TriggerTree::Redirect { target, body, .. } => {
            let target_text = emit_redirect_target(ctx, table, target)?;
            let inner = emit_tree(ctx, table, body, auto_enums)?;
            Ok(Expression::plain(
                inner.ty,
                format!("({target_text},{})", inner.value),
            ))
        }
    }
}

/// The masked read form of every region a variable occupies, leaf by leaf.
fn allocation_masks(ctx: &TranslationContext, var: &Variable) -> Vec<String> {
    flatten_leaves(ctx, &var.ty)
        .iter()
        .zip(&var.allocations)
        .map(|((_, leaf), (slot, offset))| {
            mask_variable(*slot, *offset, leaf.size, is_float_backed(ctx, leaf))
        })
        .collect()
}

fn enum_specs(specs: &[mtl_core::TypeSpecifier]) -> Vec<TypeDefinition> {
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

fn write_state_controller(
    ctx: &mut TranslationContext,
    table: &[Variable],
    controller: &StateController,
    lines: &mut Vec<String>,
) -> Result<(), TranslationError> {
    let template = ctx
        .find_template(&controller.kind)
        .cloned()
        .ok_or_else(|| {
            TranslationError::new(
                "UNKNOWN_TEMPLATE",
                format!("No state controller or template is named {}.", controller.kind),
            )
            .at(controller.location.clone())
        })?;

    lines.push(format!(
        "[State ] {}",
        debug_info::location(&controller.location)
    ));
    lines.push(format!("type = {}", template.name));

    for (&group, trees) in &controller.triggers {
        let label = if group == TRIGGER_GROUP_ALL {
            "triggerall".to_string()
        } else {
            format!("trigger{group}")
        };
        for tree in trees {
            let expr = emit_tree(ctx, table, tree, &[])?;
            lines.push(format!(
                "{label} = {} {}",
                expr.value,
                debug_info::location(tree.location())
            ));
        }
    }

    let variable_keys = VARIABLE_KEY_CONTROLLERS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&controller.kind));
    for property in &controller.properties {
        let declared = template
            .params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&property.key));
        if let Some(param) = declared {
            let enums = enum_specs(&param.specs);
            let value = emit_tree(ctx, table, &property.value, &enums)?;
            lines.push(format!("{} = {}", property.key, value.value));
            continue;
        }
        let target = table
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(&property.key))
            .cloned();
        if let (true, Some(var)) = (variable_keys, target) {
            let (slot, offset) = *var.allocations.first().ok_or_else(|| {
                TranslationError::new(
                    "UNSUPPORTED_ACCESS",
                    format!("Variable {} has no storage allocation.", var.name),
                )
                .at(controller.location.clone())
            })?;
            let float = is_float_backed(ctx, &var.ty);
            let value = emit_tree(ctx, table, &property.value, &[])?;
            lines.push(format!(
                "{} = {}",
                raw_variable(slot, float),
                mask_write(slot, offset, var.ty.size, float, &value.value)
            ));
            continue;
        }
        let value = emit_tree(ctx, table, &property.value, &[])?;
        lines.push(format!("{} = {}", property.key, value.value));
    }
    lines.push(String::new());
    Ok(())
}

fn write_statedef(
    ctx: &mut TranslationContext,
    statedef: &StateDefinition,
    lines: &mut Vec<String>,
) -> Result<(), TranslationError> {
    lines.push(format!(
        "[Statedef {}] {}",
        statedef.name,
        debug_info::location(&statedef.location)
    ));
    for local in &statedef.locals {
        let masks = allocation_masks(ctx, local);
        lines.extend(debug_info::variable_allocation(local, &masks));
    }
    for key in STATEDEF_PARAMS {
        if let Some((_, value)) = statedef.params.iter().find(|(k, _)| k == key) {
            lines.push(format!("{key} = {value}"));
        }
    }
    lines.push(String::new());

    let table = emit_table(statedef, ctx);
    for controller in &statedef.controllers {
        write_state_controller(ctx, &table, controller, lines)?;
    }
    Ok(())
}

/// Renders the whole translation context as the final CNS document. Output
/// is deterministic: tables replay in catalogue and declaration order and
/// every construct carries its source location in the debug channel.
pub fn write_output(ctx: &mut TranslationContext) -> Result<String, TranslationError> {
    let mut lines = vec![debug_info::version_header()];

    let internal = Location::internal();
    for ty in ctx.types.clone() {
        if debug_info::skip_type(ty.category) || ty.location == internal {
            continue;
        }
        lines.extend(debug_info::type_definition(&ty));
    }
    for trigger in ctx.triggers.clone() {
        if trigger.category == mtl_core::TriggerCategory::User {
            lines.extend(debug_info::trigger_definition(&trigger));
        }
    }
    lines.extend(debug_info::variable_table(&ctx.player_slots));
    lines.extend(debug_info::variable_table(&ctx.helper_slots));
    for var in ctx.globals.clone() {
        let masks = allocation_masks(ctx, &var);
        lines.extend(debug_info::variable_allocation(&var, &masks));
    }
    lines.push(String::new());

    let statedefs = std::mem::take(&mut ctx.statedefs);
    let mut result = Ok(());
    for statedef in &statedefs {
        if let Err(error) = write_statedef(ctx, statedef, &mut lines) {
            result = Err(error);
            break;
        }
    }
    ctx.statedefs = statedefs;
    result?;

    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    let mut output = lines.join("\n");
    output.push('\n');
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtl_parser::parse_trigger;
    use std::collections::BTreeMap;

    fn loc() -> Location {
        Location::new("test.mtl", 1)
    }

    fn emit(expr: &str) -> String {
        let mut ctx = TranslationContext::with_builtins();
        let tree = parse_trigger(expr, &loc()).expect("should parse");
        emit_tree(&mut ctx, &[], &tree, &[])
            .expect("should emit")
            .value
    }

    fn make_var(
        ctx: &TranslationContext,
        name: &str,
        ty: &str,
        allocations: Vec<(u32, u32)>,
    ) -> Variable {
        let mut var = Variable::new(
            name,
            ctx.find_type(ty).expect("type should exist").clone(),
            StateScope::shared(),
            loc(),
        );
        var.allocations = allocations;
        var
    }

    #[test]
    fn literals_lower_to_engine_constants() {
        assert_eq!(emit("5"), "5");
        assert_eq!(emit("true"), "1");
        assert_eq!(emit("false"), "0");
        assert_eq!(emit("'a'"), "97");
    }

    #[test]
    fn mask_variable_forms() {
        assert_eq!(mask_variable(0, 0, 32, false), "var(0)");
        assert_eq!(mask_variable(2, 0, 32, true), "fvar(2)");
        assert_eq!(mask_variable(0, 3, 1, false), "(var(0) & 8)");
        assert_eq!(mask_variable(0, 0, 8, false), "(var(0) & 255)");
        assert_eq!(mask_variable(1, 8, 4, false), "((var(1) & 3840) / 256)");
    }

    #[test]
    fn mask_write_preserves_neighbouring_regions() {
        assert_eq!(mask_write(0, 0, 32, false, "5"), "5");
        assert_eq!(mask_write(3, 0, 32, true, "1.5"), "1.5");
        assert_eq!(
            mask_write(0, 3, 1, false, "1"),
            "((var(0) & -9) | (((1) & 1) * 8))"
        );
        assert_eq!(
            mask_write(0, 0, 8, false, "200"),
            "((var(0) & -256) | (((200) & 255) * 1))"
        );
    }

    #[test]
    fn operators_fold_through_const_evaluators() {
        assert_eq!(emit("Time > 5"), "(Time > 5)");
        assert_eq!(emit("1 + 2 * 3"), "((1 + 2) * 3)");
        assert_eq!(emit("!Alive"), "(!Alive)");
        assert_eq!(emit("ifelse(Alive, 1, 0)"), "cond(Alive, 1, 0)");
    }

    #[test]
    fn cast_retypes_without_changing_text() {
        let mut ctx = TranslationContext::with_builtins();
        let tree = parse_trigger("cast(5, float)", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &[], &tree, &[]).expect("should emit");
        assert_eq!(expr.value, "5");
        assert_eq!(expr.ty.name, "float");
    }

    #[test]
    fn intervals_keep_their_bracket_kinds() {
        assert_eq!(emit("Time = [1, 5]"), "(Time = [1, 5])");
    }

    #[test]
    fn redirects_prefix_the_scope() {
        assert_eq!(emit("parent, Time"), "(parent,Time)");
        assert_eq!(emit("helper(1400), Time"), "(helper(1400),Time)");
    }

    #[test]
    fn variable_reads_are_masked() {
        let mut ctx = TranslationContext::with_builtins();
        let table = vec![make_var(&ctx, "dashing", "bool", vec![(0, 3)])];
        let tree = parse_trigger("dashing", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &table, &tree, &[]).expect("should emit");
        assert_eq!(expr.value, "(var(0) & 8)");
        assert_eq!(expr.allocation, Some((0, 3)));
    }

    #[test]
    fn assignment_rewrites_to_masked_store() {
        let mut ctx = TranslationContext::with_builtins();
        let table = vec![
            make_var(&ctx, "combo", "int", vec![(0, 0)]),
            make_var(&ctx, "dashing", "bool", vec![(1, 3)]),
        ];
        let plain = parse_trigger("combo := 5", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &table, &plain, &[]).expect("should emit");
        assert_eq!(expr.value, "(var(0) := 5)");

        let packed = parse_trigger("dashing := true", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &table, &packed, &[]).expect("should emit");
        assert_eq!(expr.value, "(var(1) := ((var(1) & -9) | (((1) & 1) * 8)))");
    }

    #[test]
    fn scoped_enum_constants_lower_to_indices() {
        let mut ctx = TranslationContext::with_builtins();
        ctx.types.push(TypeDefinition {
            name: "Phase".to_string(),
            category: TypeCategory::Enum,
            size: 32,
            members: vec!["Startup".to_string(), "Active".to_string()],
            location: loc(),
        });
        ctx.types.push(TypeDefinition {
            name: "Buttons".to_string(),
            category: TypeCategory::Flag,
            size: 32,
            members: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            location: loc(),
        });
        let tree = parse_trigger("Phase.Active", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &[], &tree, &[]).expect("should emit");
        assert_eq!(expr.value, "1");

        let tree = parse_trigger("Buttons.AC", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &[], &tree, &[]).expect("should emit");
        assert_eq!(expr.value, "5");
    }

    #[test]
    fn bare_string_enum_constants_need_an_expected_type() {
        let mut ctx = TranslationContext::with_builtins();
        let trans = ctx.find_type("TransType").expect("should exist").clone();
        let tree = parse_trigger("add1", &loc()).expect("should parse");
        let expr =
            emit_tree(&mut ctx, &[], &tree, std::slice::from_ref(&trans)).expect("should emit");
        assert_eq!(expr.value, "add1");
        assert!(emit_tree(&mut ctx, &[], &tree, &[]).is_err());
    }

    #[test]
    fn structure_members_read_their_own_leaves() {
        let mut ctx = TranslationContext::with_builtins();
        ctx.types.push(TypeDefinition {
            name: "Point".to_string(),
            category: TypeCategory::Structure,
            size: 64,
            members: vec!["x:float".to_string(), "y:float".to_string()],
            location: loc(),
        });
        let table = vec![make_var(&ctx, "p", "Point", vec![(0, 0), (1, 0)])];
        let tree = parse_trigger("p y", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &table, &tree, &[]).expect("should emit");
        assert_eq!(expr.value, "fvar(1)");
        assert_eq!(expr.ty.name, "float");
    }

    #[test]
    fn builtin_structures_pass_through_as_paths() {
        let mut ctx = TranslationContext::with_builtins();
        let tree = parse_trigger("Vel y", &loc()).expect("should parse");
        let expr = emit_tree(&mut ctx, &[], &tree, &[]).expect("should emit");
        assert_eq!(expr.value, "Vel y");
        assert_eq!(expr.ty.name, "float");
    }

    #[test]
    fn statedefs_render_headers_params_and_controllers() {
        let mut ctx = TranslationContext::with_builtins();
        let mut triggers = BTreeMap::new();
        triggers.insert(1, vec![parse_trigger("Time > 4", &Location::new("test.mtl", 3)).expect("should parse")]);
        ctx.statedefs.push(StateDefinition {
            name: "Idle".to_string(),
            params: vec![
                ("type".to_string(), "S".to_string()),
                ("ctrl".to_string(), "1".to_string()),
            ],
            locals: Vec::new(),
            controllers: vec![StateController {
                kind: "null".to_string(),
                triggers,
                properties: Vec::new(),
                location: Location::new("test.mtl", 2),
            }],
            scope: StateScope::shared(),
            is_common: false,
            location: loc(),
        });
        let output = write_output(&mut ctx).expect("should render");
        assert!(output.contains("[Statedef Idle] ;!mtl-debug LOCATION test.mtl:1"));
        assert!(output.contains("type = S\nctrl = 1"));
        assert!(output.contains("[State ] ;!mtl-debug LOCATION test.mtl:2"));
        assert!(output.contains("type = Null"));
        assert!(output.contains("trigger1 = (Time > 4) ;!mtl-debug LOCATION test.mtl:3"));
    }

    #[test]
    fn varset_properties_write_through_the_slot() {
        let mut ctx = TranslationContext::with_builtins();
        ctx.globals.push(make_var(&ctx, "combo", "int", vec![(0, 0)]));
        let mut triggers = BTreeMap::new();
        triggers.insert(1, vec![parse_trigger("1", &loc()).expect("should parse")]);
        ctx.statedefs.push(StateDefinition {
            name: "Hit".to_string(),
            params: Vec::new(),
            locals: Vec::new(),
            controllers: vec![StateController {
                kind: "VarSet".to_string(),
                triggers,
                properties: vec![mtl_core::ControllerProperty {
                    key: "combo".to_string(),
                    value: parse_trigger("combo + 1", &loc()).expect("should parse"),
                }],
                location: loc(),
            }],
            scope: StateScope::shared(),
            is_common: false,
            location: loc(),
        });
        let output = write_output(&mut ctx).expect("should render");
        assert!(output.contains("var(0) = (var(0) + 1)"));
    }
}
