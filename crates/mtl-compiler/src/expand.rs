//! Template expansion: user-template controllers are replaced in place by
//! the template's controller sequence, with locals renamed, parameters
//! substituted, and the caller's trigger groups collapsed onto every
//! inserted controller.

use mtl_core::{
    Location, StateController, TemplateCategory, TemplateDefinition, TranslationError,
    TriggerTree, Variable, TRIGGER_GROUP_ALL,
};

use crate::context::TranslationContext;

/// Fixed-point bound for template-in-template expansion.
pub const EXPANSION_ROUNDS: usize = 20;

/// Engine capacity for controllers in one state definition.
pub const CONTROLLER_LIMIT: usize = 512;

/// Replaces every `ATOM` named `name` with a clone of `replacement`, and
/// rewrites struct-access heads of the same name.
pub fn substitute(tree: &mut TriggerTree, name: &str, replacement: &TriggerTree) {
    match tree {
        TriggerTree::Atom { text, .. } => {
            if text.eq_ignore_ascii_case(name) {
                *tree = replacement.clone();
            }
        }
        TriggerTree::StructAccess { path, .. } => {
            let mut parts = path.split_whitespace();
            if let Some(head) = parts.next() {
                if head.eq_ignore_ascii_case(name) {
                    if let TriggerTree::Atom { text, .. } = replacement {
                        let rest: Vec<&str> = parts.collect();
                        *path = format!("{} {}", text, rest.join(" "));
                    }
                }
            }
        }
        other => {
            for child in other.children_mut() {
                substitute(child, name, replacement);
            }
        }
    }
}

fn and_chain(trees: &[TriggerTree], location: &Location) -> Option<TriggerTree> {
    let mut iter = trees.iter().cloned();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| TriggerTree::Binary {
        op: "&&".to_string(),
        left: Box::new(acc),
        right: Box::new(next),
        location: location.clone(),
    }))
}

/// Collapses the trigger groups of one controller into a single predicate:
/// all of group 0, and at least one numbered group fully true.
pub fn combine_triggers(controller: &StateController) -> Option<TriggerTree> {
    let location = controller.location.clone();
    let all = controller
        .triggers
        .get(&TRIGGER_GROUP_ALL)
        .and_then(|trees| and_chain(trees, &location));

    let mut numbered = None;
    for (group, trees) in &controller.triggers {
        if *group == TRIGGER_GROUP_ALL {
            continue;
        }
        let Some(group_tree) = and_chain(trees, &location) else {
            continue;
        };
        numbered = Some(match numbered {
            None => group_tree,
            Some(acc) => TriggerTree::Binary {
                op: "||".to_string(),
                left: Box::new(acc),
                right: Box::new(group_tree),
                location: location.clone(),
            },
        });
    }

    match (all, numbered) {
        (Some(all), Some(any)) => Some(TriggerTree::Binary {
            op: "&&".to_string(),
            left: Box::new(all),
            right: Box::new(any),
            location,
        }),
        (Some(all), None) => Some(all),
        (None, Some(any)) => Some(any),
        (None, None) => None,
    }
}

fn expand_call(
    caller: &StateController,
    template: &TemplateDefinition,
    prefix: &str,
    statedef_locals: &mut Vec<Variable>,
) -> Result<Vec<StateController>, TranslationError> {
    for param in &template.params {
        if param.required
            && !caller
                .properties
                .iter()
                .any(|p| p.key.eq_ignore_ascii_case(&param.name))
        {
            return Err(TranslationError::new(
                "MISSING_REQUIRED_PROPERTY",
                format!(
                    "State controller {} does not define required property {}.",
                    template.name, param.name
                ),
            )
            .at(caller.location.clone()));
        }
    }

    let mut inserted = template.controllers.clone();

    // Template locals become statedef locals under a unique prefix.
    for local in &template.locals {
        let renamed = format!("{prefix}{}", local.name);
        let replacement = TriggerTree::atom(renamed.clone(), local.location.clone());
        for controller in &mut inserted {
            for trees in controller.triggers.values_mut() {
                for tree in trees {
                    substitute(tree, &local.name, &replacement);
                }
            }
            for property in &mut controller.properties {
                substitute(&mut property.value, &local.name, &replacement);
            }
        }
        let mut variable = local.clone();
        variable.name = renamed;
        statedef_locals.push(variable);
    }

    // Call-site property values substitute for parameter references.
    for param in &template.params {
        let Some(value) = caller
            .properties
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(&param.name))
        else {
            continue;
        };
        for controller in &mut inserted {
            for trees in controller.triggers.values_mut() {
                for tree in trees {
                    substitute(tree, &param.name, &value.value);
                }
            }
            for property in &mut controller.properties {
                substitute(&mut property.value, &param.name, &value.value);
            }
        }
    }

    // The caller's predicate gates every inserted controller.
    if let Some(combined) = combine_triggers(caller) {
        for controller in &mut inserted {
            controller
                .triggers
                .entry(TRIGGER_GROUP_ALL)
                .or_default()
                .push(combined.clone());
        }
    }
    Ok(inserted)
}

/// Expands user templates in every state definition to a fixed point.
pub fn expand_templates(ctx: &mut TranslationContext) -> Result<(), TranslationError> {
    let mut statedefs = std::mem::take(&mut ctx.statedefs);
    let mut counter = 0usize;

    let result = (|| -> Result<(), TranslationError> {
        for round in 0.. {
            let mut changed = false;
            for statedef in &mut statedefs {
                let mut index = 0;
                while index < statedef.controllers.len() {
                    let kind = statedef.controllers[index].kind.clone();
                    let template = ctx
                        .find_template(&kind)
                        .filter(|t| t.category == TemplateCategory::User)
                        .cloned();
                    let Some(template) = template else {
                        index += 1;
                        continue;
                    };
                    let prefix = format!("tpl{counter}_");
                    counter += 1;
                    let inserted = expand_call(
                        &statedef.controllers[index],
                        &template,
                        &prefix,
                        &mut statedef.locals,
                    )?;
                    let count = inserted.len();
                    statedef.controllers.splice(index..=index, inserted);
                    index += count;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            if round + 1 >= EXPANSION_ROUNDS {
                return Err(TranslationError::new(
                    "EXPANSION_LIMIT",
                    format!(
                        "Template expansion did not settle after {EXPANSION_ROUNDS} rounds; templates are likely mutually recursive."
                    ),
                ));
            }
        }
        for statedef in &statedefs {
            if statedef.controllers.len() > CONTROLLER_LIMIT {
                return Err(TranslationError::new(
                    "TOO_MANY_CONTROLLERS",
                    format!(
                        "State definition {} has {} controllers after expansion; the engine supports at most {CONTROLLER_LIMIT}.",
                        statedef.name,
                        statedef.controllers.len()
                    ),
                )
                .at(statedef.location.clone()));
            }
        }
        Ok(())
    })();
    ctx.statedefs = statedefs;
    result
}
