//! The driving pipeline: manifest to finished CNS text. Each stage runs to
//! completion before the next starts, and the first error aborts the run.

use std::path::Path;

use mtl_core::TranslationError;

use crate::context::TranslationContext;
use crate::emit::write_output;
use crate::expand::expand_templates;
use crate::globals::{allocate_variables, collect_globals, type_check_statedefs};
use crate::inline::inline_triggers;
use crate::loader::{FileProvider, LoadContext, Loader, MemoryProvider, SearchPaths};
use crate::project::{load_manifest, ProjectManifest};
use crate::translate::{
    append_default_template_params, pre_translate_statedefs, translate_structs,
    translate_templates, translate_triggers, translate_types,
};

/// A finished compilation. The context is kept so callers can export the
/// symbol bundle or inspect the packed tables.
#[derive(Debug)]
pub struct Compilation {
    pub manifest: ProjectManifest,
    pub output: String,
    pub warnings: Vec<String>,
    pub context: TranslationContext,
}

fn register_definitions(
    load: &LoadContext,
    ctx: &mut TranslationContext,
) -> Result<(), TranslationError> {
    translate_types(load, ctx)?;
    translate_structs(load, ctx)?;
    translate_triggers(load, ctx)?;
    translate_templates(load, ctx)?;
    ctx.warnings.extend(load.warnings.iter().cloned());
    Ok(())
}

/// Compiles a whole project from its `.def` manifest. The common state file
/// loads first; user state files follow in manifest order, so later files
/// see every earlier definition.
pub fn compile_manifest(
    provider: &dyn FileProvider,
    search: &SearchPaths,
    path: &Path,
) -> Result<Compilation, TranslationError> {
    let manifest = load_manifest(provider, search, path)?;
    let loader = Loader::new(provider, search.clone());

    let mut loads = vec![(loader.load(&manifest.common_file)?, true)];
    for source in &manifest.source_files {
        loads.push((loader.load(source)?, false));
    }

    let mut ctx = TranslationContext::with_builtins();
    for (load, _) in &loads {
        register_definitions(load, &mut ctx)?;
    }
    append_default_template_params(&mut ctx);
    for (load, is_common) in &loads {
        pre_translate_statedefs(load, &mut ctx, *is_common)?;
    }

    expand_templates(&mut ctx)?;
    collect_globals(&mut ctx)?;
    allocate_variables(&mut ctx)?;
    type_check_statedefs(&mut ctx)?;
    inline_triggers(&mut ctx)?;
    let output = write_output(&mut ctx)?;

    let warnings = ctx.warnings.clone();
    Ok(Compilation {
        manifest,
        output,
        warnings,
        context: ctx,
    })
}

/// Compiles from a fixed in-memory source map; the test entry point.
pub fn compile_from_memory_map<const N: usize>(
    entries: [(&str, &str); N],
    manifest_path: &str,
) -> Result<Compilation, TranslationError> {
    let provider = MemoryProvider::new(entries);
    compile_manifest(&provider, &SearchPaths::default(), Path::new(manifest_path))
}
