//! User-trigger inlining. Runs after the global table exists and before
//! emission: every call (or bare atom) naming a user trigger is replaced by
//! the trigger's body with parameters bound to the call-site subtrees.
//! Builtins have no body and are never inlined.

use mtl_core::{
    TranslationError, TriggerCategory, TriggerDefinition, TriggerParam, TriggerTree,
};

use crate::checker::type_check;
use crate::context::TranslationContext;
use crate::expand::substitute;
use crate::globals::visible_table;

/// Fixed-point bound for triggers that call other triggers.
pub const INLINE_ROUNDS: usize = 20;

fn user_overloads(ctx: &TranslationContext, name: &str, arity: usize) -> Vec<TriggerDefinition> {
    ctx.triggers
        .iter()
        .filter(|t| {
            t.category == TriggerCategory::User
                && t.name.eq_ignore_ascii_case(name)
                && t.params.len() == arity
        })
        .cloned()
        .collect()
}

fn pick_overload(
    candidates: Vec<TriggerDefinition>,
    args: &[TriggerTree],
    table: &[TriggerParam],
    ctx: &mut TranslationContext,
) -> Result<Option<TriggerDefinition>, TranslationError> {
    if candidates.len() <= 1 {
        return Ok(candidates.into_iter().next());
    }
    // Several user overloads share this name and arity; the argument types
    // decide.
    let mut arg_types = Vec::with_capacity(args.len());
    for arg in args {
        let specs = type_check(arg, table, &[], ctx)?;
        match specs.into_iter().next() {
            Some(spec) => arg_types.push(spec.ty),
            None => return Ok(None),
        }
    }
    for candidate in candidates {
        let matches = arg_types
            .iter()
            .zip(&candidate.params)
            .all(|(arg, param)| ctx.type_match(arg, &param.ty, &candidate.location).is_some());
        if matches {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn inlined_body(trigger: &TriggerDefinition, args: &[TriggerTree]) -> Option<TriggerTree> {
    let mut body = trigger.body.clone()?;
    for (param, arg) in trigger.params.iter().zip(args) {
        substitute(&mut body, &param.name, arg);
    }
    Some(body)
}

fn inline_tree(
    tree: &mut TriggerTree,
    table: &[TriggerParam],
    ctx: &mut TranslationContext,
    changed: &mut bool,
) -> Result<(), TranslationError> {
    for child in tree.children_mut() {
        inline_tree(child, table, ctx, changed)?;
    }
    let replacement = match tree {
        TriggerTree::Atom { text, .. } => {
            let candidates = user_overloads(ctx, text, 0);
            pick_overload(candidates, &[], table, ctx)?
                .and_then(|t| inlined_body(&t, &[]))
        }
        TriggerTree::Call { name, args, .. } => {
            let candidates = user_overloads(ctx, name, args.len());
            let args = args.clone();
            pick_overload(candidates, &args, table, ctx)?
                .and_then(|t| inlined_body(&t, &args))
        }
        _ => None,
    };
    if let Some(replacement) = replacement {
        *tree = replacement;
        *changed = true;
    }
    Ok(())
}

/// Inlines user triggers in every controller expression to a fixed point.
pub fn inline_triggers(ctx: &mut TranslationContext) -> Result<(), TranslationError> {
    let mut statedefs = std::mem::take(&mut ctx.statedefs);
    let result = (|| -> Result<(), TranslationError> {
        for round in 0.. {
            let mut changed = false;
            for statedef in &mut statedefs {
                let table = visible_table(statedef, ctx);
                for controller in &mut statedef.controllers {
                    for trees in controller.triggers.values_mut() {
                        for tree in trees {
                            inline_tree(tree, &table, ctx, &mut changed)?;
                        }
                    }
                    for property in &mut controller.properties {
                        inline_tree(&mut property.value, &table, ctx, &mut changed)?;
                    }
                }
            }
            if !changed {
                break;
            }
            if round + 1 >= INLINE_ROUNDS {
                return Err(TranslationError::new(
                    "INLINE_LIMIT",
                    format!(
                        "Trigger inlining did not settle after {INLINE_ROUNDS} rounds; user triggers are likely recursive."
                    ),
                ));
            }
        }
        Ok(())
    })();
    ctx.statedefs = statedefs;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::{allocate_variables, collect_globals, type_check_statedefs};
    use crate::loader::{Loader, MemoryProvider, SearchPaths};
    use crate::translate::{
        append_default_template_params, pre_translate_statedefs, translate_triggers,
        translate_types,
    };
    use mtl_core::TRIGGER_GROUP_ALL;
    use std::path::Path;

    fn inlined(main: &str) -> Result<TranslationContext, TranslationError> {
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
        append_default_template_params(&mut ctx);
        pre_translate_statedefs(&load_ctx, &mut ctx, false)?;
        collect_globals(&mut ctx)?;
        allocate_variables(&mut ctx)?;
        type_check_statedefs(&mut ctx)?;
        inline_triggers(&mut ctx)?;
        Ok(ctx)
    }

    fn first_trigger(ctx: &TranslationContext) -> &TriggerTree {
        &ctx.statedefs[0].controllers[0].triggers[&1][0]
    }

    #[test]
    fn a_call_is_replaced_by_the_trigger_body_with_bound_arguments() {
        let ctx = inlined(
            "[Define Trigger]\nname = Doubled\ntype = int\nvalue = value * 2\n\
             [Define Parameters]\nvalue = int\n\
             [Statedef 100]\ntype = S\n\
             [State ]\ntype = Null\ntrigger1 = Doubled(Time) > 10\n",
        )
        .expect("should inline");
        let TriggerTree::Binary { left, .. } = first_trigger(&ctx) else {
            panic!("expected comparison");
        };
        let TriggerTree::Binary { op, left, .. } = left.as_ref() else {
            panic!("expected inlined multiplication");
        };
        assert_eq!(op, "*");
        assert!(left.is_atom_named("Time"));
    }

    #[test]
    fn a_bare_atom_matching_a_no_argument_trigger_inlines() {
        let ctx = inlined(
            "[Define Trigger]\nname = Airborne\ntype = bool\nvalue = StateType = StateType.A\n\
             [Statedef 100]\ntype = S\n\
             [State ]\ntype = Null\ntrigger1 = Airborne\n",
        )
        .expect("should inline");
        let TriggerTree::Binary { op, .. } = first_trigger(&ctx) else {
            panic!("expected inlined comparison");
        };
        assert_eq!(op, "=");
    }

    #[test]
    fn triggers_calling_triggers_inline_transitively() {
        let ctx = inlined(
            "[Define Trigger]\nname = Doubled\ntype = int\nvalue = value * 2\n\
             [Define Parameters]\nvalue = int\n\
             [Define Trigger]\nname = Quadrupled\ntype = int\nvalue = Doubled(Doubled(value))\n\
             [Define Parameters]\nvalue = int\n\
             [Statedef 100]\ntype = S\n\
             [State ]\ntype = Null\ntrigger1 = Quadrupled(Time) > 0\n",
        )
        .expect("should inline");
        fn count_muls(tree: &TriggerTree) -> usize {
            let own = matches!(tree, TriggerTree::Binary { op, .. } if op == "*") as usize;
            own + tree.children().iter().map(|c| count_muls(c)).sum::<usize>()
        }
        assert_eq!(count_muls(first_trigger(&ctx)), 2);
    }

    #[test]
    fn builtin_triggers_are_left_as_calls() {
        let ctx = inlined(
            "[Statedef 100]\ntype = S\n\
             [State ]\ntype = Null\ntriggerall = AnimElemTime(3) = 0\n",
        )
        .expect("should pass through");
        let tree = &ctx.statedefs[0].controllers[0].triggers[&TRIGGER_GROUP_ALL][0];
        let TriggerTree::Binary { left, .. } = tree else {
            panic!("expected comparison");
        };
        assert!(matches!(left.as_ref(), TriggerTree::Call { name, .. } if name == "AnimElemTime"));
    }
}
