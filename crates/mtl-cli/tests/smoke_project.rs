use std::fs;
use std::process::Command;

const STDLIB: &str = include_str!("../../../stdlib/libmtl.inc");

#[test]
fn compiling_a_project_on_disk_writes_cns_and_symbols() {
    let bin = env!("CARGO_BIN_EXE_mtlcc");
    let root = std::env::temp_dir().join("mtlcc-smoke-project");
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(root.join("stdlib")).expect("temp project dir");

    fs::write(root.join("stdlib").join("libmtl.inc"), STDLIB).expect("stdlib");
    fs::write(
        root.join("kfm.def"),
        "[Files]\nstcommon = common.cns\ncns = kfm.cns\ncmd = kfm.cmd\n\
         anim = kfm.air\nsprite = kfm.sff\nsound = kfm.snd\nst = kfm.mtl\n",
    )
    .expect("manifest");
    fs::write(
        root.join("common.cns"),
        "[Statedef -2]\n[State ]\ntype = Null\ntrigger1 = Alive\n",
    )
    .expect("common states");
    fs::write(
        root.join("kfm.cmd"),
        "[Statedef -1]\n[State ]\ntype = Null\ntrigger1 = Alive\n",
    )
    .expect("command states");
    fs::write(
        root.join("kfm.mtl"),
        "[Statedef 200]\ntype = S\n[State ]\ntype = Null\ntrigger1 = (combo := 3) > 0\n",
    )
    .expect("main states");

    let output = Command::new(bin)
        .arg(root.join("kfm.def"))
        .arg("--symbols")
        .output()
        .expect("cli should execute");
    if !output.status.success() {
        panic!(
            "compile failed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let cns = fs::read_to_string(root.join("kfm.generated.cns")).expect("generated cns");
    assert!(cns.contains(";!mtl-debug VERSION_HEADER"));
    assert!(cns.contains("[Statedef 200]"));
    assert!(cns.contains("var(0)"));

    let symbols =
        fs::read_to_string(root.join("kfm.generated.symbols.json")).expect("symbol bundle");
    assert!(symbols.contains("\"combo\""));
}

#[test]
fn a_broken_project_exits_nonzero_with_a_diagnostic() {
    let bin = env!("CARGO_BIN_EXE_mtlcc");
    let root = std::env::temp_dir().join("mtlcc-smoke-broken");
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).expect("temp project dir");
    fs::write(root.join("kfm.def"), "[Files]\nstcommon = common.cns\n").expect("manifest");
    fs::write(
        root.join("common.cns"),
        "[Statedef -2]\n[State ]\ntype = Null\ntrigger1 = Alive\n",
    )
    .expect("common states");

    let output = Command::new(bin)
        .arg(root.join("kfm.def"))
        .output()
        .expect("cli should execute");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("kfm.def"));
}
