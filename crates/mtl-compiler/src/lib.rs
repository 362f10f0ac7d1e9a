pub mod builtins;
pub mod checker;
pub mod context;
pub mod debug_info;
pub mod emit;
pub mod expand;
pub mod globals;
pub mod inline;
pub mod loader;
pub mod pipeline;
pub mod project;
pub mod symbols;
pub mod translate;

pub use context::TranslationContext;
pub use loader::{DiskProvider, FileProvider, Loader, MemoryProvider, SearchPaths};
pub use pipeline::{compile_from_memory_map, compile_manifest, Compilation};
pub use project::{load_manifest, ProjectManifest};
pub use symbols::{symbol_bundle, to_json, SymbolBundle};

#[cfg(test)]
mod tests;
