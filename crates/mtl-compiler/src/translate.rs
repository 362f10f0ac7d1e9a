//! Second stage: turns grouped [`LoadContext`] sections into typed symbol
//! tables on the [`TranslationContext`] and pre-translates state definitions
//! into controller lists ready for template expansion.

use mtl_core::{
    ControllerProperty, Location, StateController, StateDefinition, StateScope,
    TemplateCategory, TemplateDefinition, TemplateParameter, TranslationError, TriggerCategory,
    TriggerDefinition, TriggerParam, TriggerTree, TypeCategory, TypeDefinition, TypeSpecifier,
    Variable, TRIGGER_GROUP_ALL,
};
use mtl_parser::parse_trigger;
use regex::Regex;

use crate::checker::{find_trigger, type_check};
use crate::context::TranslationContext;
use crate::globals::undefined_globals;
use crate::loader::{LoadContext, LoadedController};

/// Statedef header keys the compiler forwards to the engine, in emission
/// order.
pub const STATEDEF_PARAMS: &[&str] = &[
    "type",
    "movetype",
    "physics",
    "anim",
    "ctrl",
    "poweradd",
    "juggle",
    "facep2",
    "hitdefpersist",
    "movehitpersist",
    "hitcountpersist",
    "sprpriority",
    "velset",
];

fn qualified(name: &str, namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

/// A definition encountered twice is fatal unless both sightings come from
/// the same file and line, which happens when two files include the same
/// library.
fn is_reinclude(existing: &Location, incoming: &Location) -> bool {
    existing == incoming
}

fn redefinition(kind: &str, name: &str, original: &Location, at: Location) -> TranslationError {
    TranslationError::new(
        "REDEFINITION",
        format!("{kind} with name {name} was redefined: original definition at {original}."),
    )
    .at(at)
}

/// Splits a `t1, t2?, t3...` descriptor into specifiers. Aliases resolve both
/// for the whole descriptor and per component; `?` marks an optional
/// position and `...` a trailing repeat.
pub fn unpack_types(
    ctx: &TranslationContext,
    descriptor: &str,
    location: &Location,
) -> Result<Vec<TypeSpecifier>, TranslationError> {
    let descriptor = match ctx.find_type(descriptor) {
        Some(found) => ctx.resolve_alias(found)?.name,
        None => descriptor.to_string(),
    };
    let mut specs = Vec::new();
    for part in descriptor.split(',') {
        let mut part = part.trim().to_string();
        let required = !part.ends_with('?');
        part = part.replace('?', "");
        let repeat = part.ends_with("...");
        part = part.replace("...", "");
        let ty = ctx.find_type(part.trim()).cloned().ok_or_else(|| {
            TranslationError::new(
                "UNKNOWN_TYPE",
                format!("Type descriptor {descriptor} references unknown type {part}."),
            )
            .at(location.clone())
        })?;
        let ty = ctx.resolve_alias(&ty)?;
        specs.push(TypeSpecifier { ty, required, repeat });
    }
    Ok(specs)
}

/// Parses a `name = type` or `name = type(default)` declaration into a
/// variable. The declaration is itself a trigger expression, so defaults can
/// be arbitrary const expressions.
pub fn parse_local(
    ctx: &TranslationContext,
    decl: &str,
    scope: StateScope,
    location: &Location,
) -> Result<Variable, TranslationError> {
    let form_error = || {
        TranslationError::new(
            "MALFORMED_LOCAL",
            "Local definitions must follow the format <local name> = <local type>(<optional default>).",
        )
        .at(location.clone())
    };
    let tree = parse_trigger(decl, location)?;
    let TriggerTree::Binary { op, left, right, .. } = &tree else {
        return Err(form_error());
    };
    if op != "=" {
        return Err(form_error());
    }
    let TriggerTree::Atom { text: name, .. } = left.as_ref() else {
        return Err(form_error());
    };
    let (type_name, default) = match right.as_ref() {
        TriggerTree::Atom { text, .. } => (text.clone(), None),
        TriggerTree::Call { name, args, .. } if args.len() == 1 => {
            (name.clone(), Some(args[0].clone()))
        }
        _ => return Err(form_error()),
    };
    let ty = ctx.find_type(&type_name).cloned().ok_or_else(|| {
        TranslationError::new(
            "UNKNOWN_TYPE",
            format!("A local was declared with a type of {type_name} but that type does not exist."),
        )
        .at(location.clone())
    })?;
    if !ty.can_instantiate() {
        return Err(TranslationError::new(
            "TYPE_NOT_INSTANTIABLE",
            format!("A local cannot be declared with type {}.", ty.name),
        )
        .at(location.clone()));
    }
    let mut variable = Variable::new(name.trim(), ty, scope, location.clone());
    variable.default = default;
    Ok(variable)
}

/// Builds a [`StateController`] from a loaded section: classifies every
/// property as the controller type, a trigger group, or an ordinary
/// property. `triggerall` is group 0.
pub fn parse_controller(
    state: &LoadedController,
    ctx: &TranslationContext,
) -> Result<StateController, TranslationError> {
    let type_prop = state
        .properties
        .iter()
        .find(|p| p.key.eq_ignore_ascii_case("type"))
        .ok_or_else(|| {
            TranslationError::new(
                "CONTROLLER_MISSING_TYPE",
                "State controllers must declare a type property.",
            )
            .at(state.location.clone())
        })?;
    let kind = match &type_prop.value {
        TriggerTree::Atom { text, .. } => text.clone(),
        TriggerTree::MultiValue { children, .. } if children.len() == 1 => match &children[0] {
            TriggerTree::Atom { text, .. } => text.clone(),
            other => {
                return Err(TranslationError::new(
                    "CONTROLLER_MISSING_TYPE",
                    "The type property on a state controller must be a state controller name.",
                )
                .at(other.location().clone()))
            }
        },
        other => {
            return Err(TranslationError::new(
                "CONTROLLER_MISSING_TYPE",
                "The type property on a state controller must be a state controller name.",
            )
            .at(other.location().clone()))
        }
    };
    if ctx.find_template(&kind).is_none() {
        return Err(TranslationError::new(
            "UNKNOWN_TEMPLATE",
            format!("Could not determine which template to use for state controller {kind}."),
        )
        .at(state.location.clone()));
    }

    let group_pattern = Regex::new(r"^trigger(all|[0-9]+)$").map_err(|e| {
        TranslationError::new("INTERNAL", format!("trigger group pattern failed to build: {e}"))
    })?;
    let mut controller = StateController {
        kind,
        triggers: Default::default(),
        properties: Vec::new(),
        location: state.location.clone(),
    };
    for prop in &state.properties {
        if prop.key.eq_ignore_ascii_case("type") {
            continue;
        }
        if let Some(captures) = group_pattern.captures(&prop.key.to_ascii_lowercase()) {
            let group = match &captures[1] {
                "all" => TRIGGER_GROUP_ALL,
                digits => digits.parse::<u32>().map_err(|_| {
                    TranslationError::new(
                        "MALFORMED_TRIGGER_GROUP",
                        format!("Could not determine the group ID for trigger group named {}.", prop.key),
                    )
                    .at(prop.location.clone())
                })?,
            };
            controller
                .triggers
                .entry(group)
                .or_default()
                .push(prop.value.clone());
        } else {
            if controller
                .properties
                .iter()
                .any(|p| p.key.eq_ignore_ascii_case(&prop.key))
            {
                return Err(TranslationError::new(
                    "DUPLICATE_PROPERTY",
                    format!("Property {} was redefined in state controller.", prop.key),
                )
                .at(prop.location.clone()));
            }
            controller.properties.push(ControllerProperty {
                key: prop.key.clone(),
                value: prop.value.clone(),
            });
        }
    }
    Ok(controller)
}

pub fn translate_types(
    load: &LoadContext,
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    for definition in &load.types {
        let name = qualified(&definition.name, &definition.namespace);
        if let Some(original) = ctx.find_type(&name) {
            if is_reinclude(&original.location, &definition.location) {
                continue;
            }
            return Err(redefinition(
                "Type",
                &name,
                &original.location,
                definition.location.clone(),
            ));
        }

        let kind = definition.kind.to_ascii_lowercase();
        let (category, size, members) = match kind.as_str() {
            "alias" => {
                let source = definition
                    .properties
                    .iter()
                    .find(|p| p.key.eq_ignore_ascii_case("source"))
                    .ok_or_else(|| {
                        TranslationError::new(
                            "ALIAS_MISSING_SOURCE",
                            format!("Alias type {name} must specify an alias source."),
                        )
                        .at(definition.location.clone())
                    })?;
                let at = Location::new(load.file.clone(), source.line);
                let unpacked = unpack_types(ctx, &source.value, &at)?;
                let size = unpacked.iter().map(|s| s.ty.size).sum();
                (TypeCategory::Alias, size, vec![source.value.clone()])
            }
            "union" => {
                let mut members = Vec::new();
                let mut size: Option<u32> = None;
                for prop in definition.properties.iter().filter(|p| p.key == "member") {
                    let at = Location::new(load.file.clone(), prop.line);
                    let target = ctx.find_type(&prop.value).cloned().ok_or_else(|| {
                        TranslationError::new(
                            "UNKNOWN_TYPE",
                            format!(
                                "Union type {name} references source type {}, but that type does not exist.",
                                prop.value
                            ),
                        )
                        .at(at.clone())
                    })?;
                    if target.category == TypeCategory::BuiltinDeny {
                        return Err(TranslationError::new(
                            "TYPE_NOT_PERMITTED",
                            format!(
                                "Union type {name} references source type {}, but user-defined unions are not permitted to use that type.",
                                prop.value
                            ),
                        )
                        .at(at));
                    }
                    match size {
                        None => size = Some(target.size),
                        Some(expected) if expected != target.size => {
                            return Err(TranslationError::new(
                                "UNION_SIZE_MISMATCH",
                                format!(
                                    "Union type {name} has member size {expected} but attempted to include type {} with mismatched size {}.",
                                    target.name, target.size
                                ),
                            )
                            .at(at));
                        }
                        Some(_) => {}
                    }
                    members.push(target.name);
                }
                let size = size.ok_or_else(|| {
                    TranslationError::new(
                        "UNION_EMPTY",
                        format!("Union type {name} must specify at least one member."),
                    )
                    .at(definition.location.clone())
                })?;
                (TypeCategory::Union, size, members)
            }
            "enum" => {
                let members: Vec<String> = definition
                    .properties
                    .iter()
                    .filter(|p| p.key == "enum")
                    .map(|p| p.value.clone())
                    .collect();
                (TypeCategory::Enum, 32, members)
            }
            "flag" => {
                let members: Vec<String> = definition
                    .properties
                    .iter()
                    .filter(|p| p.key == "flag")
                    .map(|p| p.value.clone())
                    .collect();
                if members.len() > 32 {
                    return Err(TranslationError::new(
                        "FLAG_TOO_WIDE",
                        "Flag types may not support more than 32 members.",
                    )
                    .at(definition.location.clone()));
                }
                (TypeCategory::Flag, 32, members)
            }
            other => {
                return Err(TranslationError::new(
                    "UNKNOWN_TYPE_CATEGORY",
                    format!("Unrecognized type category {other} in Define Type section."),
                )
                .at(definition.location.clone()));
            }
        };

        ctx.types.push(TypeDefinition {
            name,
            category,
            size,
            members,
            location: definition.location.clone(),
        });
    }
    Ok(())
}

pub fn translate_structs(
    load: &LoadContext,
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    for definition in &load.structures {
        let name = qualified(&definition.name, &definition.namespace);
        if let Some(original) = ctx.find_type(&name) {
            if is_reinclude(&original.location, &definition.location) {
                continue;
            }
            return Err(redefinition(
                "Type",
                &name,
                &original.location,
                definition.location.clone(),
            ));
        }

        let mut size = 0;
        let mut members = Vec::new();
        for field in &definition.members.properties {
            let at = Location::new(load.file.clone(), field.line);
            let member = ctx.find_type(&field.value).cloned().ok_or_else(|| {
                TranslationError::new(
                    "UNKNOWN_TYPE",
                    format!(
                        "Member {} on structure {name} has type {}, but this type does not exist.",
                        field.key, field.value
                    ),
                )
                .at(at.clone())
            })?;
            if member.category == TypeCategory::BuiltinDeny {
                return Err(TranslationError::new(
                    "TYPE_NOT_PERMITTED",
                    format!(
                        "Member {} on structure {name} has type {}, but user-defined structures are not permitted to use this type.",
                        field.key, field.value
                    ),
                )
                .at(at));
            }
            size += member.size;
            members.push(format!("{}:{}", field.key, member.name));
        }

        ctx.types.push(TypeDefinition {
            name,
            category: TypeCategory::Structure,
            size,
            members,
            location: definition.location.clone(),
        });
    }
    Ok(())
}

pub fn translate_triggers(
    load: &LoadContext,
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    for definition in &load.triggers {
        let name = qualified(&definition.name, &definition.namespace);
        if ctx
            .triggers
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&name) && is_reinclude(&t.location, &definition.location))
        {
            continue;
        }
        if let Some(matching_type) = ctx.find_type(&name) {
            return Err(TranslationError::new(
                "NAME_COLLISION",
                format!(
                    "Trigger with name {name} overlaps type name defined at {}: type names are reserved for type initialization.",
                    matching_type.location
                ),
            )
            .at(definition.location.clone()));
        }

        let mut params = Vec::new();
        if let Some(param_section) = &definition.params {
            for prop in &param_section.properties {
                let at = Location::new(load.file.clone(), prop.line);
                let ty = ctx.find_type(&prop.value).cloned().ok_or_else(|| {
                    TranslationError::new(
                        "UNKNOWN_TYPE",
                        format!(
                            "Trigger parameter {} was declared with a type of {} but that type does not exist.",
                            prop.key, prop.value
                        ),
                    )
                    .at(at.clone())
                })?;
                if ty.category == TypeCategory::BuiltinDeny {
                    return Err(TranslationError::new(
                        "TYPE_NOT_PERMITTED",
                        format!(
                            "Trigger with name {name} has a parameter with type {}, but user-defined triggers are not permitted to use this type.",
                            ty.name
                        ),
                    )
                    .at(at));
                }
                params.push(TriggerParam { name: prop.key.clone(), ty });
            }
        }

        let param_types: Vec<TypeDefinition> = params.iter().map(|p| p.ty.clone()).collect();
        if let Some(matched) = find_trigger(ctx, &name, &param_types) {
            return Err(redefinition(
                "Trigger",
                &name,
                &matched.location,
                definition.location.clone(),
            ));
        }

        let return_type = ctx.find_type(&definition.return_type).cloned().ok_or_else(|| {
            TranslationError::new(
                "UNKNOWN_TYPE",
                format!(
                    "Trigger with name {name} declares a return type of {} but that type is not known.",
                    definition.return_type
                ),
            )
            .at(definition.location.clone())
        })?;
        if return_type.category == TypeCategory::BuiltinDeny {
            return Err(TranslationError::new(
                "TYPE_NOT_PERMITTED",
                format!(
                    "Trigger with name {name} declares a return type of {}, but user-defined triggers are not permitted to use this type.",
                    return_type.name
                ),
            )
            .at(definition.location.clone()));
        }

        let result = type_check(&definition.value, &params, &[], ctx)?;
        if result.len() != 1 {
            return Err(TranslationError::new(
                "UNEXPECTED_TUPLE",
                "Could not determine the result type for trigger expression.",
            )
            .at(definition.location.clone()));
        }
        if ctx
            .type_match(&result[0].ty, &return_type, &definition.location)
            .is_none()
        {
            return Err(TranslationError::new(
                "INCOMPATIBLE_TYPES",
                format!(
                    "Could not match type {} to expected type {} on trigger {name}.",
                    result[0].ty.name, return_type.name
                ),
            )
            .at(definition.location.clone()));
        }

        ctx.triggers.push(TriggerDefinition {
            name,
            return_type,
            const_eval: None,
            params,
            body: Some(definition.value.clone()),
            location: definition.location.clone(),
            category: TriggerCategory::User,
        });
    }
    Ok(())
}

pub fn translate_templates(
    load: &LoadContext,
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    for definition in &load.templates {
        let name = qualified(&definition.name, &definition.namespace);
        if let Some(original) = ctx.find_template(&name) {
            if is_reinclude(&original.location, &definition.location) {
                continue;
            }
            return Err(redefinition(
                "Template",
                &name,
                &original.location.clone(),
                definition.location.clone(),
            ));
        }

        let mut locals = Vec::new();
        for local in &definition.locals {
            let at = Location::new(load.file.clone(), local.line);
            let variable = parse_local(ctx, &local.value, StateScope::shared(), &at)?;
            locals.push(variable);
        }

        let mut params = Vec::new();
        if let Some(param_section) = &definition.params {
            // User templates declare one plain type per parameter; tuple
            // descriptors are a builtin-catalogue privilege.
            for prop in &param_section.properties {
                let at = Location::new(load.file.clone(), prop.line);
                let ty = ctx.find_type(&prop.value).cloned().ok_or_else(|| {
                    TranslationError::new(
                        "UNKNOWN_TYPE",
                        format!(
                            "A template parameter was declared with a type of {} but that type does not exist.",
                            prop.value
                        ),
                    )
                    .at(at.clone())
                })?;
                if ty.category == TypeCategory::BuiltinDeny {
                    return Err(TranslationError::new(
                        "TYPE_NOT_PERMITTED",
                        format!(
                            "Template with name {name} declares a parameter with type {}, but user-defined templates are not permitted to use this type.",
                            ty.name
                        ),
                    )
                    .at(at));
                }
                // Declared parameters have no default value syntax, so every
                // one of them must be provided at the call site.
                params.push(TemplateParameter {
                    name: prop.key.clone(),
                    specs: vec![TypeSpecifier::of(ty)],
                    required: true,
                });
            }
        }

        // Template bodies may reference only parameters and locals; anything
        // unresolved would become an implicit global, which templates are
        // not allowed to create.
        let visible: Vec<Variable> = params
            .iter()
            .filter_map(|p| {
                p.specs.first().map(|s| {
                    Variable::new(p.name.clone(), s.ty.clone(), StateScope::shared(), definition.location.clone())
                })
            })
            .chain(locals.iter().cloned())
            .collect();
        let mut controllers = Vec::new();
        for state in &definition.states {
            let controller = parse_controller(state, ctx)?;
            let undefined = undefined_globals(&controller, &visible, ctx)?;
            if !undefined.is_empty() {
                let names: Vec<String> = undefined.into_iter().map(|g| g.name).collect();
                return Err(TranslationError::new(
                    "TEMPLATE_USES_GLOBALS",
                    format!(
                        "Template uses global variables named {}, but templates cannot define or use globals.",
                        names.join(", ")
                    ),
                )
                .at(state.location.clone()));
            }
            controllers.push(controller);
        }

        ctx.templates.push(TemplateDefinition {
            name,
            params,
            locals,
            controllers,
            location: definition.location.clone(),
            category: TemplateCategory::User,
        });
    }
    Ok(())
}

/// Every template, builtin or user, accepts the engine passthrough
/// parameters.
pub fn append_default_template_params(ctx: &mut TranslationContext) {
    let bool_ty = ctx.find_type("bool").cloned();
    let int_ty = ctx.find_type("int").cloned();
    let (Some(bool_ty), Some(int_ty)) = (bool_ty, int_ty) else {
        return;
    };
    for template in &mut ctx.templates {
        template.params.push(TemplateParameter {
            name: "ignorehitpause".to_string(),
            specs: vec![TypeSpecifier::of(bool_ty.clone())],
            required: false,
        });
        template.params.push(TemplateParameter {
            name: "persistent".to_string(),
            specs: vec![TypeSpecifier::of(int_ty.clone())],
            required: false,
        });
    }
}

fn parse_scope(value: &str, location: &Location) -> Result<StateScope, TranslationError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("player") {
        return Ok(StateScope::player());
    }
    if value.eq_ignore_ascii_case("helper") {
        return Ok(StateScope::helper(None));
    }
    if value.eq_ignore_ascii_case("shared") {
        return Ok(StateScope::shared());
    }
    if let Some(inner) = value
        .strip_prefix("helper(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let id = inner.trim().parse::<i32>().map_err(|_| {
            TranslationError::new(
                "MALFORMED_SCOPE",
                format!("Could not parse helper ID in scope specifier {value}."),
            )
            .at(location.clone())
        })?;
        return Ok(StateScope::helper(Some(id)));
    }
    Err(TranslationError::new(
        "MALFORMED_SCOPE",
        format!("Scope specifier {value} is not player, helper, helper(<id>) or shared."),
    )
    .at(location.clone()))
}

/// First-pass statedef translation: header parameters against the allowlist,
/// local declarations, scope, and raw controllers. No type checking yet.
pub fn pre_translate_statedefs(
    load: &LoadContext,
    ctx: &mut TranslationContext,
    is_common: bool,
) -> Result<(), TranslationError> {
    for statedef in &load.statedefs {
        let mut scope = StateScope::shared();
        for prop in &statedef.properties {
            if prop.key.eq_ignore_ascii_case("scope") {
                scope = parse_scope(&prop.value, &Location::new(load.file.clone(), prop.line))?;
            }
        }

        let mut params = Vec::new();
        let mut locals = Vec::new();
        for prop in &statedef.properties {
            let key = prop.key.to_ascii_lowercase();
            let at = Location::new(load.file.clone(), prop.line);
            if STATEDEF_PARAMS.contains(&key.as_str()) {
                params.push((key, prop.value.clone()));
            } else if key == "local" {
                locals.push(parse_local(ctx, &prop.value, scope, &at)?);
            } else if key != "scope" {
                return Err(TranslationError::new(
                    "UNKNOWN_STATEDEF_PROPERTY",
                    format!(
                        "Property {} is not accepted on a state definition header.",
                        prop.key
                    ),
                )
                .at(at));
            }
        }

        let mut controllers = Vec::new();
        for state in &statedef.states {
            controllers.push(parse_controller(state, ctx)?);
        }

        ctx.statedefs.push(StateDefinition {
            name: statedef.name.clone(),
            params,
            locals,
            controllers,
            scope,
            is_common,
            location: statedef.location.clone(),
        });
    }
    Ok(())
}
