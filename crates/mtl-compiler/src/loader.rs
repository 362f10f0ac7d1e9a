//! Source loading: INI parsing, section grouping, dialect enforcement and
//! include resolution. The output is a [`LoadContext`] holding raw grouped
//! sections; no type checking happens at this stage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mtl_core::{Location, TranslationError, TriggerTree};
use mtl_parser::{parse_ini, parse_trigger, IniProperty, IniSection};

/// The library prepended as a virtual include of every root compilation.
pub const STDLIB_INCLUDE: &str = "stdlib/libmtl.inc";

/// Abstracts file access so the whole pipeline can run over an in-memory
/// source map in tests. Paths are joined textually before lookup.
pub trait FileProvider {
    fn read(&self, path: &Path) -> Option<String>;

    /// Stable identity used for include-cycle detection.
    fn canonical(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Reads straight from disk, canonicalizing for cycle detection.
pub struct DiskProvider;

impl FileProvider for DiskProvider {
    fn read(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Fixed source map keyed by path text; used by tests and embedders.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    pub files: BTreeMap<String, String>,
}

impl MemoryProvider {
    pub fn new<const N: usize>(entries: [(&str, &str); N]) -> Self {
        Self {
            files: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl FileProvider for MemoryProvider {
    fn read(&self, path: &Path) -> Option<String> {
        self.files.get(&path.to_string_lossy().to_string()).cloned()
    }
}

/// Directories tried, in order, when resolving an include or manifest file.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    pub roots: Vec<PathBuf>,
}

impl SearchPaths {
    /// Candidate paths for `source` included from `includer`: each search
    /// root, then the includer's directory, then the path as given.
    fn candidates(&self, source: &str, includer: Option<&Path>) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = self.roots.iter().map(|r| r.join(source)).collect();
        if let Some(dir) = includer.and_then(Path::parent) {
            out.push(dir.join(source));
        }
        out.push(PathBuf::from(source));
        out
    }

    pub fn resolve(
        &self,
        provider: &dyn FileProvider,
        source: &str,
        includer: Option<&Path>,
    ) -> Option<PathBuf> {
        self.candidates(source, includer)
            .into_iter()
            .find(|c| provider.read(c).is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDialect {
    /// Full language; `.mtl` and `.inc` files.
    Mtl,
    /// Strict legacy dialect; `.cns` files reject `Define*` and `Include`.
    Cns,
}

impl SourceDialect {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mtl") || ext.eq_ignore_ascii_case("inc") => {
                SourceDialect::Mtl
            }
            _ => SourceDialect::Cns,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedProperty {
    pub key: String,
    pub value: TriggerTree,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct LoadedController {
    pub properties: Vec<LoadedProperty>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct LoadedStateDef {
    /// Header text after `Statedef`, usually the state number.
    pub name: String,
    pub properties: Vec<IniProperty>,
    pub states: Vec<LoadedController>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct LoadedTypeDef {
    pub name: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub properties: Vec<IniProperty>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct LoadedStructure {
    pub name: String,
    pub namespace: Option<String>,
    pub members: IniSection,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub name: String,
    pub namespace: Option<String>,
    pub locals: Vec<IniProperty>,
    pub params: Option<IniSection>,
    pub states: Vec<LoadedController>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct LoadedTrigger {
    pub name: String,
    pub return_type: String,
    pub value: TriggerTree,
    pub namespace: Option<String>,
    pub params: Option<IniSection>,
    pub location: Location,
}

/// Grouped sections of one file plus everything its includes contributed.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    pub file: String,
    pub statedefs: Vec<LoadedStateDef>,
    pub types: Vec<LoadedTypeDef>,
    pub structures: Vec<LoadedStructure>,
    pub templates: Vec<LoadedTemplate>,
    pub triggers: Vec<LoadedTrigger>,
    pub warnings: Vec<String>,
    includes: Vec<IniSection>,
}

pub struct Loader<'a> {
    pub provider: &'a dyn FileProvider,
    pub search: SearchPaths,
}

impl<'a> Loader<'a> {
    pub fn new(provider: &'a dyn FileProvider, search: SearchPaths) -> Self {
        Self { provider, search }
    }

    /// Loads `path` and, transitively, everything it includes. The standard
    /// library is prepended as a virtual include of the root file only.
    pub fn load(&self, path: &Path) -> Result<LoadContext, TranslationError> {
        self.load_inner(path, &mut Vec::new())
    }

    fn load_inner(
        &self,
        path: &Path,
        cycle: &mut Vec<PathBuf>,
    ) -> Result<LoadContext, TranslationError> {
        let identity = self.provider.canonical(path);
        if cycle.contains(&identity) {
            let mut chain: Vec<String> = vec![identity.to_string_lossy().to_string()];
            chain.extend(cycle.iter().rev().map(|p| p.to_string_lossy().to_string()));
            return Err(TranslationError::new(
                "INCLUDE_CYCLE",
                format!("Include cycle detected: {}.", chain.join(" -> ")),
            ));
        }

        let file = path.to_string_lossy().to_string();
        let source = self.provider.read(path).ok_or_else(|| {
            TranslationError::new("FILE_NOT_FOUND", format!("Could not read source file {file}."))
        })?;
        let dialect = SourceDialect::for_path(path);
        let sections = parse_ini(&source, &file)?;

        let mut ctx = LoadContext {
            file: file.clone(),
            ..LoadContext::default()
        };
        group_sections(&sections, dialect, &mut ctx)?;

        if cycle.is_empty() {
            ctx.includes.insert(
                0,
                IniSection {
                    name: "Include".to_string(),
                    properties: vec![IniProperty {
                        key: "source".to_string(),
                        value: STDLIB_INCLUDE.to_string(),
                        line: 0,
                    }],
                    line: 0,
                },
            );
        }

        cycle.push(identity);
        let result = self.process_includes(path, &mut ctx, cycle);
        cycle.pop();
        result?;

        Ok(ctx)
    }

    fn process_includes(
        &self,
        path: &Path,
        ctx: &mut LoadContext,
        cycle: &mut Vec<PathBuf>,
    ) -> Result<(), TranslationError> {
        let includes = std::mem::take(&mut ctx.includes);
        for include in includes {
            let at = Location::new(ctx.file.clone(), include.line);
            let source = include.get("source").ok_or_else(|| {
                TranslationError::new(
                    "INCLUDE_MISSING_SOURCE",
                    "Include block must define a `source` property indicating the file to be included.",
                )
                .at(at.clone())
            })?;
            let resolved = self
                .search
                .resolve(self.provider, source, Some(path))
                .ok_or_else(|| {
                    TranslationError::new(
                        "INCLUDE_NOT_FOUND",
                        format!("Could not find the source file specified by {source} for inclusion."),
                    )
                    .at(at.clone())
                })?;

            let mut included = self.load_inner(&resolved, cycle)?;

            if let Some(namespace) = include.get("namespace") {
                for t in &mut included.templates {
                    t.namespace = Some(namespace.to_string());
                }
                for t in &mut included.triggers {
                    t.namespace = Some(namespace.to_string());
                }
                for t in &mut included.types {
                    t.namespace = Some(namespace.to_string());
                }
                for s in &mut included.structures {
                    s.namespace = Some(namespace.to_string());
                }
            }

            let imports: Vec<&IniProperty> = include.get_all("import").collect();
            if !imports.is_empty() {
                for import in &imports {
                    let name = import.value.as_str();
                    let known = included.templates.iter().any(|t| t.name == name)
                        || included.triggers.iter().any(|t| t.name == name)
                        || included.types.iter().any(|t| t.name == name)
                        || included.structures.iter().any(|s| s.name == name);
                    if !known {
                        ctx.warnings.push(format!(
                            "{}:{}: Attempted to import name {} from included file {} but no such name exists.",
                            ctx.file, import.line, name, source
                        ));
                    }
                }
                let wanted: Vec<String> = imports.iter().map(|p| p.value.clone()).collect();
                included.templates.retain(|t| wanted.contains(&t.name));
                included.triggers.retain(|t| wanted.contains(&t.name));
                included.types.retain(|t| wanted.contains(&t.name));
                included.structures.retain(|s| wanted.contains(&s.name));
            }

            // Included definitions land at the head of each list so they are
            // visible to everything downstream in this file.
            prepend(&mut ctx.templates, included.templates);
            prepend(&mut ctx.triggers, included.triggers);
            prepend(&mut ctx.types, included.types);
            prepend(&mut ctx.structures, included.structures);
            ctx.warnings.extend(included.warnings);
        }
        Ok(())
    }
}

fn prepend<T>(dest: &mut Vec<T>, mut head: Vec<T>) {
    std::mem::swap(dest, &mut head);
    dest.extend(head);
}

fn parse_controller(
    section: &IniSection,
    file: &str,
) -> Result<LoadedController, TranslationError> {
    let mut properties = Vec::new();
    for prop in &section.properties {
        let location = Location::new(file, prop.line);
        properties.push(LoadedProperty {
            key: prop.key.clone(),
            value: parse_trigger(&prop.value, &location)?,
            location,
        });
    }
    Ok(LoadedController {
        properties,
        location: Location::new(file, section.line),
    })
}

fn require_dialect(
    dialect: SourceDialect,
    section: &IniSection,
    file: &str,
) -> Result<(), TranslationError> {
    if dialect == SourceDialect::Cns {
        let what = if section.is_kind("include") {
            "Include"
        } else {
            "Define"
        };
        return Err(TranslationError::new(
            "CNS_DIALECT_VIOLATION",
            format!("A CNS file cannot contain {what} sections."),
        )
        .at(Location::new(file, section.line)));
    }
    Ok(())
}

fn named(section: &IniSection, what: &str, file: &str) -> Result<String, TranslationError> {
    section.get("name").map(str::to_string).ok_or_else(|| {
        TranslationError::new(
            "SECTION_MISSING_NAME",
            format!("{what} section must provide a name property."),
        )
        .at(Location::new(file, section.line))
    })
}

fn group_sections(
    sections: &[IniSection],
    dialect: SourceDialect,
    ctx: &mut LoadContext,
) -> Result<(), TranslationError> {
    let file = ctx.file.clone();
    let mut index = 0;
    while index < sections.len() {
        let section = &sections[index];
        let location = Location::new(file.clone(), section.line);
        let header = section.name.to_ascii_lowercase();

        if section.is_kind("statedef") {
            let mut statedef = LoadedStateDef {
                name: section.name_rest().to_string(),
                properties: section.properties.clone(),
                states: Vec::new(),
                location,
            };
            while index + 1 < sections.len() && sections[index + 1].is_kind("state") {
                statedef.states.push(parse_controller(&sections[index + 1], &file)?);
                index += 1;
            }
            ctx.statedefs.push(statedef);
        } else if section.is_kind("include") {
            require_dialect(dialect, section, &file)?;
            ctx.includes.push(section.clone());
        } else if header.starts_with("define type") {
            require_dialect(dialect, section, &file)?;
            let name = named(section, "Define Type", &file)?;
            let kind = section.get("type").map(str::to_string).ok_or_else(|| {
                TranslationError::new(
                    "SECTION_MISSING_TYPE",
                    "Define Type section must provide a type property.",
                )
                .at(location.clone())
            })?;
            ctx.types.push(LoadedTypeDef {
                name,
                kind,
                namespace: None,
                properties: section.properties.clone(),
                location,
            });
        } else if header.starts_with("define template") {
            require_dialect(dialect, section, &file)?;
            let name = named(section, "Define Template", &file)?;
            let mut template = LoadedTemplate {
                name,
                namespace: None,
                locals: section.get_all("local").cloned().collect(),
                params: None,
                states: Vec::new(),
                location,
            };
            while index + 1 < sections.len() {
                let next = &sections[index + 1];
                if next.is_kind("state") {
                    template.states.push(parse_controller(next, &file)?);
                } else if next.name.to_ascii_lowercase().starts_with("define parameters") {
                    if template.params.is_some() {
                        return Err(TranslationError::new(
                            "DUPLICATE_PARAMETERS",
                            "A Define Template section may only contain 1 Define Parameters subsection.",
                        )
                        .at(Location::new(file.clone(), next.line)));
                    }
                    template.params = Some(next.clone());
                } else {
                    break;
                }
                index += 1;
            }
            ctx.templates.push(template);
        } else if header.starts_with("define trigger") {
            require_dialect(dialect, section, &file)?;
            let name = named(section, "Define Trigger", &file)?;
            let return_type = section.get("type").map(str::to_string).ok_or_else(|| {
                TranslationError::new(
                    "SECTION_MISSING_TYPE",
                    "Define Trigger section must provide a type property.",
                )
                .at(location.clone())
            })?;
            let value_prop = section
                .get_all("value")
                .next()
                .ok_or_else(|| {
                    TranslationError::new(
                        "SECTION_MISSING_VALUE",
                        "Define Trigger section must provide a value property.",
                    )
                    .at(location.clone())
                })?;
            let value_location = Location::new(file.clone(), value_prop.line);
            let mut trigger = LoadedTrigger {
                name,
                return_type,
                value: parse_trigger(&value_prop.value, &value_location)?,
                namespace: None,
                params: None,
                location,
            };
            if index + 1 < sections.len()
                && sections[index + 1]
                    .name
                    .to_ascii_lowercase()
                    .starts_with("define parameters")
            {
                trigger.params = Some(sections[index + 1].clone());
                index += 1;
            }
            ctx.triggers.push(trigger);
        } else if header.starts_with("define structure") {
            require_dialect(dialect, section, &file)?;
            let name = named(section, "Define Structure", &file)?;
            let has_members = index + 1 < sections.len()
                && sections[index + 1]
                    .name
                    .to_ascii_lowercase()
                    .starts_with("define members");
            if !has_members {
                return Err(TranslationError::new(
                    "STRUCTURE_MISSING_MEMBERS",
                    "A Define Structure section must be followed immediately by a Define Members section.",
                )
                .at(location));
            }
            ctx.structures.push(LoadedStructure {
                name,
                namespace: None,
                members: sections[index + 1].clone(),
                location,
            });
            index += 1;
        } else if section.is_kind("state") {
            return Err(TranslationError::new(
                "ORPHAN_SECTION",
                "A State section in a source file must be grouped with a parent section such as Statedef.",
            )
            .at(location));
        } else if header.starts_with("define parameters") {
            return Err(TranslationError::new(
                "ORPHAN_SECTION",
                "A Define Parameters section in a source file must be grouped with a parent section such as Define Template.",
            )
            .at(location));
        } else if header.starts_with("define members") {
            return Err(TranslationError::new(
                "ORPHAN_SECTION",
                "A Define Members section in a source file must be grouped with a parent Define Structure section.",
            )
            .at(location));
        } else {
            return Err(TranslationError::new(
                "UNKNOWN_SECTION",
                format!("Section with name {} was not recognized by the parser.", section.name),
            )
            .at(location));
        }
        index += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdlib_stub() -> (&'static str, &'static str) {
        (
            STDLIB_INCLUDE,
            "[Define Type]\nname = target\ntype = alias\nsource = int\n",
        )
    }

    fn load_single(main: &str) -> LoadContext {
        let provider = MemoryProvider::new([("char/main.mtl", main), stdlib_stub()]);
        let loader = Loader::new(&provider, SearchPaths::default());
        loader
            .load(Path::new("char/main.mtl"))
            .expect("file should load")
    }

    #[test]
    fn statedef_groups_following_state_sections() {
        let ctx = load_single(
            "[Statedef 200]\ntype = S\n[State 200, hit]\ntype = Null\ntrigger1 = Time = 0\n",
        );
        assert_eq!(ctx.statedefs.len(), 1);
        assert_eq!(ctx.statedefs[0].name, "200");
        assert_eq!(ctx.statedefs[0].states.len(), 1);
        assert_eq!(ctx.statedefs[0].states[0].properties.len(), 2);
    }

    #[test]
    fn orphan_state_section_is_rejected() {
        let provider = MemoryProvider::new([
            ("main.mtl", "[State 200, stray]\ntype = Null\n"),
            stdlib_stub(),
        ]);
        let loader = Loader::new(&provider, SearchPaths::default());
        let err = loader.load(Path::new("main.mtl")).expect_err("must fail");
        assert_eq!(err.code, "ORPHAN_SECTION");
    }

    #[test]
    fn cns_dialect_rejects_define_sections() {
        let provider = MemoryProvider::new([
            ("main.cns", "[Define Type]\nname = foo\ntype = alias\nsource = int\n"),
            stdlib_stub(),
        ]);
        let loader = Loader::new(&provider, SearchPaths::default());
        let err = loader.load(Path::new("main.cns")).expect_err("must fail");
        assert_eq!(err.code, "CNS_DIALECT_VIOLATION");
    }

    #[test]
    fn stdlib_is_included_for_the_root_file_only() {
        let ctx = load_single("[Statedef 0]\ntype = S\n");
        assert!(ctx.types.iter().any(|t| t.name == "target"));
    }

    #[test]
    fn includes_prepend_definitions_and_apply_namespaces() {
        let provider = MemoryProvider::new([
            (
                "main.mtl",
                "[Include]\nsource = lib.inc\nnamespace = util\n[Define Trigger]\nname = Own\ntype = int\nvalue = 1\n",
            ),
            (
                "lib.inc",
                "[Define Trigger]\nname = Helper\ntype = int\nvalue = 2\n",
            ),
            stdlib_stub(),
        ]);
        let loader = Loader::new(&provider, SearchPaths::default());
        let ctx = loader.load(Path::new("main.mtl")).expect("should load");
        let names: Vec<(&str, Option<&str>)> = ctx
            .triggers
            .iter()
            .map(|t| (t.name.as_str(), t.namespace.as_deref()))
            .collect();
        assert_eq!(names, vec![("Helper", Some("util")), ("Own", None)]);
    }

    #[test]
    fn import_filter_keeps_only_named_symbols_and_warns_on_misses() {
        let provider = MemoryProvider::new([
            (
                "main.mtl",
                "[Include]\nsource = lib.inc\nimport = Keep\nimport = Missing\n",
            ),
            (
                "lib.inc",
                "[Define Trigger]\nname = Keep\ntype = int\nvalue = 2\n[Define Trigger]\nname = Drop\ntype = int\nvalue = 3\n",
            ),
            stdlib_stub(),
        ]);
        let loader = Loader::new(&provider, SearchPaths::default());
        let ctx = loader.load(Path::new("main.mtl")).expect("should load");
        assert_eq!(ctx.triggers.len(), 1);
        assert_eq!(ctx.triggers[0].name, "Keep");
        assert!(ctx.warnings.iter().any(|w| w.contains("Missing")));
    }

    #[test]
    fn include_cycles_report_the_chain() {
        let provider = MemoryProvider::new([
            ("a.mtl", "[Include]\nsource = b.inc\n"),
            ("b.inc", "[Include]\nsource = a.mtl\n"),
            stdlib_stub(),
        ]);
        let loader = Loader::new(&provider, SearchPaths::default());
        let err = loader.load(Path::new("a.mtl")).expect_err("must fail");
        assert_eq!(err.code, "INCLUDE_CYCLE");
        assert!(err.message.contains("a.mtl"));
        assert!(err.message.contains("b.inc"));
    }
}
