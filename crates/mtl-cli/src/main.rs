use std::path::{Path, PathBuf};

use clap::Parser;
use mtl_compiler::{compile_manifest, symbol_bundle, to_json, DiskProvider, SearchPaths};
use mtl_core::TranslationError;

#[derive(Debug, Parser)]
#[command(name = "mtlcc")]
#[command(about = "MTL to MUGEN CNS compiler")]
struct Cli {
    /// Project definition (.def) file to compile.
    input: PathBuf,
    /// Where to write the generated CNS. Defaults to `<input>.generated.cns`.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    /// Also write a JSON symbol bundle next to the output.
    #[arg(long = "symbols")]
    symbols: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error.diagnostic());
            1
        }
    };
    std::process::exit(exit_code);
}

fn write_file(path: &Path, contents: &str) -> Result<(), TranslationError> {
    std::fs::write(path, contents).map_err(|e| {
        TranslationError::new(
            "IO_ERROR",
            format!("Could not write {}: {e}", path.display()),
        )
    })
}

fn run(cli: Cli) -> Result<i32, TranslationError> {
    let provider = DiskProvider;
    let mut search = SearchPaths::default();
    if let Some(dir) = cli.input.parent().filter(|d| !d.as_os_str().is_empty()) {
        search.roots.push(dir.to_path_buf());
    }

    let compilation = compile_manifest(&provider, &search, &cli.input)?;
    for warning in &compilation.warnings {
        eprintln!("{warning}");
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("generated.cns"));
    write_file(&output_path, &compilation.output)?;

    if cli.symbols {
        let bundle = symbol_bundle(&compilation.context);
        let json = to_json(&bundle)?;
        write_file(&output_path.with_extension("symbols.json"), &json)?;
    }
    Ok(0)
}
