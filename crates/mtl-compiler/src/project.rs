//! Project manifest (`.def`) handling: the `[Files]` section names every
//! asset of a character; the compiler pulls the state files out of it and
//! validates that the engine-required assets are present.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mtl_core::{Location, TranslationError};
use mtl_parser::parse_ini;

use crate::loader::{FileProvider, SearchPaths};

#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub manifest_path: PathBuf,
    /// Common state file, compiled with `is_common` semantics.
    pub common_file: PathBuf,
    /// User state files in scan order, deduplicated, common excluded.
    pub source_files: Vec<PathBuf>,
    /// Engine assets carried through unchanged.
    pub constants: String,
    pub anim: String,
    pub sprite: String,
    pub sound: String,
    pub ai: Option<String>,
    /// Boolean feature switches from the optional `[Compiler]` section.
    pub flags: BTreeMap<String, bool>,
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Reads and validates a `.def` manifest. State files are resolved through
/// the search paths immediately so a missing file fails here, with the
/// manifest as the blamed location.
pub fn load_manifest(
    provider: &dyn FileProvider,
    search: &SearchPaths,
    path: &Path,
) -> Result<ProjectManifest, TranslationError> {
    let file = path.to_string_lossy().to_string();
    let text = provider.read(path).ok_or_else(|| {
        TranslationError::new(
            "FILE_NOT_FOUND",
            format!("Could not read project definition {file}."),
        )
    })?;
    let sections = parse_ini(&text, &file)?;
    let files = sections
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case("files"))
        .ok_or_else(|| {
            TranslationError::new(
                "MANIFEST_MISSING_FILES",
                "Input definition file must contain a [Files] section.",
            )
        })?;
    let at = |line: usize| Location::new(file.clone(), line);

    let required = |key: &str| -> Result<String, TranslationError> {
        files.get(key).map(str::to_string).ok_or_else(|| {
            TranslationError::new(
                "MANIFEST_MISSING_KEY",
                format!("Input definition file must specify the `{key}` key in [Files]."),
            )
            .at(at(files.line))
        })
    };

    let resolve = |name: &str| -> Result<PathBuf, TranslationError> {
        search.resolve(provider, name, Some(path)).ok_or_else(|| {
            TranslationError::new(
                "FILE_NOT_FOUND",
                format!("Could not find the source file {name} named by the manifest."),
            )
            .at(at(files.line))
        })
    };

    let common_file = resolve(&required("stcommon")?)?;
    let constants = required("cns")?;
    let cmd = required("cmd")?;
    let anim = required("anim")?;
    let sprite = required("sprite")?;
    let sound = required("sound")?;

    let mut loaded = vec![common_file.clone()];
    let mut source_files = Vec::new();
    let push = |target: PathBuf, loaded: &mut Vec<PathBuf>, out: &mut Vec<PathBuf>| {
        if !loaded.contains(&target) {
            loaded.push(target.clone());
            out.push(target);
        }
    };

    if let Some(st) = files.get("st") {
        push(resolve(st)?, &mut loaded, &mut source_files);
    }
    push(resolve(&cmd)?, &mut loaded, &mut source_files);
    for i in 0..1000 {
        if let Some(st_next) = files.get(&format!("st{i}")) {
            push(resolve(st_next)?, &mut loaded, &mut source_files);
        }
    }

    let mut flags = BTreeMap::new();
    if let Some(compiler) = sections
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case("compiler"))
    {
        for prop in &compiler.properties {
            flags.insert(prop.key.clone(), parse_flag(&prop.value));
        }
    }

    Ok(ProjectManifest {
        manifest_path: path.to_path_buf(),
        common_file,
        source_files,
        constants,
        anim,
        sprite,
        sound,
        ai: files.get("ai").map(str::to_string),
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryProvider;

    const MANIFEST: &str = "[Files]\n\
        stcommon = common.cns\n\
        cns = kfm.cns\n\
        cmd = kfm.cmd\n\
        anim = kfm.air\n\
        sprite = kfm.sff\n\
        sound = kfm.snd\n\
        st = kfm.mtl\n\
        st3 = extra.mtl\n";

    fn provider() -> MemoryProvider {
        MemoryProvider::new([
            ("kfm.def", MANIFEST),
            ("common.cns", ""),
            ("kfm.cmd", ""),
            ("kfm.mtl", ""),
            ("extra.mtl", ""),
        ])
    }

    #[test]
    fn manifest_orders_state_files_and_separates_the_common_file() {
        let provider = provider();
        let manifest = load_manifest(&provider, &SearchPaths::default(), Path::new("kfm.def"))
            .expect("manifest should load");
        assert_eq!(manifest.common_file, PathBuf::from("common.cns"));
        let names: Vec<String> = manifest
            .source_files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["kfm.mtl", "kfm.cmd", "extra.mtl"]);
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let text = MANIFEST.replace("cmd = kfm.cmd\n", "");
        let provider = MemoryProvider::new([("kfm.def", text.as_str()), ("common.cns", "")]);
        let err = load_manifest(&provider, &SearchPaths::default(), Path::new("kfm.def"))
            .expect_err("must fail");
        assert_eq!(err.code, "MANIFEST_MISSING_KEY");
        assert!(err.message.contains("cmd"));
    }

    #[test]
    fn duplicate_entries_are_compiled_once() {
        let text = format!("{MANIFEST}st5 = kfm.mtl\n");
        let provider = MemoryProvider::new([
            ("kfm.def", text.as_str()),
            ("common.cns", ""),
            ("kfm.cmd", ""),
            ("kfm.mtl", ""),
            ("extra.mtl", ""),
        ]);
        let manifest = load_manifest(&provider, &SearchPaths::default(), Path::new("kfm.def"))
            .expect("manifest should load");
        assert_eq!(manifest.source_files.len(), 3);
    }

    #[test]
    fn compiler_flags_parse_as_booleans() {
        let text = format!("{MANIFEST}[Compiler]\nstrict-scopes = 1\nfast-math = off\n");
        let provider = MemoryProvider::new([
            ("kfm.def", text.as_str()),
            ("common.cns", ""),
            ("kfm.cmd", ""),
            ("kfm.mtl", ""),
            ("extra.mtl", ""),
        ]);
        let manifest = load_manifest(&provider, &SearchPaths::default(), Path::new("kfm.def"))
            .expect("manifest should load");
        assert_eq!(manifest.flags.get("strict-scopes"), Some(&true));
        assert_eq!(manifest.flags.get("fast-math"), Some(&false));
    }
}
