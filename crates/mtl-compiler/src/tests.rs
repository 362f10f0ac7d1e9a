//! End-to-end compile scenarios over in-memory source maps.

use crate::pipeline::compile_from_memory_map;
use crate::symbols::symbol_bundle;

const STDLIB: &str = include_str!("../../../stdlib/libmtl.inc");

const MANIFEST: &str = "[Files]\n\
    stcommon = common.cns\n\
    cns = kfm.cns\n\
    cmd = kfm.cmd\n\
    anim = kfm.air\n\
    sprite = kfm.sff\n\
    sound = kfm.snd\n\
    st = kfm.mtl\n";

const COMMON: &str = "[Statedef -2]\n\
    [State ]\n\
    type = Null\n\
    trigger1 = Alive\n";

const CMD: &str = "[Statedef -1]\n\
    [State ]\n\
    type = Null\n\
    trigger1 = Alive\n";

const MAIN: &str = "\
[Define Type]
name = ComboState
type = enum
enum = None
enum = Started
enum = Extended

[Define Trigger]
name = NearDeath
type = bool
value = Life < 100

[Define Template]
name = SmallPush
local = pushx = float(0.5)

[Define Parameters]
speed = float

[State ]
type = VelSet
trigger1 = true
x = speed

[Statedef 200]
type = S
movetype = A
physics = S
scope = player
local = strength = int

[State ]
type = SmallPush
trigger1 = NearDeath && Airborne
speed = 1.25

[State ]
type = VarSet
trigger1 = (combostate := ComboState.Started) > 0
combostate = ComboState.Extended
";

fn sources(main: &'static str) -> [(&'static str, &'static str); 5] {
    [
        ("kfm.def", MANIFEST),
        ("common.cns", COMMON),
        ("kfm.cmd", CMD),
        ("kfm.mtl", main),
        ("stdlib/libmtl.inc", STDLIB),
    ]
}

#[test]
fn full_project_compiles_to_expected_cns() {
    let compilation =
        compile_from_memory_map(sources(MAIN), "kfm.def").expect("project should compile");
    let output = &compilation.output;

    // Debug channel carries the user type and trigger tables.
    assert!(output.contains(";!mtl-debug TYPE_DEFINITION ComboState ENUM 32"));
    assert!(output.contains(";!mtl-debug TRIGGER_DEFINITION NearDeath bool"));

    // Statedefs render in load order: common, state files, cmd.
    let pos_common = output.find("[Statedef -2]").expect("common statedef");
    let pos_main = output.find("[Statedef 200]").expect("main statedef");
    let pos_cmd = output.find("[Statedef -1]").expect("cmd statedef");
    assert!(pos_common < pos_main && pos_main < pos_cmd);

    // Statedef params keep their fixed emission order.
    assert!(output.contains("type = S\nmovetype = A\nphysics = S"));

    // The template call expanded to its VelSet body, the caller predicate
    // landed in triggerall, and the parameter substituted into `x`.
    assert!(output.contains("type = VelSet"));
    assert!(output.contains("x = 1.25"));
    assert!(output.contains("triggerall = ((Life < 100) && (StateType = A))"));

    // The implicit global packed into the player table and the VarSet
    // property rewrote to a raw slot write; the enum constant lowered to
    // its member index.
    assert!(output.contains("trigger1 = ((var(0) := 1) > 0)"));
    assert!(output.contains("var(0) = 2"));
}

#[test]
fn output_is_deterministic() {
    let first =
        compile_from_memory_map(sources(MAIN), "kfm.def").expect("project should compile");
    let second =
        compile_from_memory_map(sources(MAIN), "kfm.def").expect("project should compile");
    assert_eq!(first.output, second.output);
}

#[test]
fn symbol_bundle_reflects_the_compiled_project() {
    let compilation =
        compile_from_memory_map(sources(MAIN), "kfm.def").expect("project should compile");
    let bundle = symbol_bundle(&compilation.context);
    assert!(bundle.types.iter().any(|t| t.name == "ComboState"));
    assert!(bundle.triggers.iter().any(|t| t.name == "NearDeath"));
    let combostate = bundle
        .globals
        .iter()
        .find(|v| v.name == "combostate")
        .expect("global should be in the bundle");
    assert_eq!(combostate.allocations, vec![(0, 0)]);
}

#[test]
fn stdlib_triggers_inline_into_state_triggers() {
    let main = "[Statedef 300]\n\
        [State ]\n\
        type = Null\n\
        trigger1 = Grounded\n";
    let compilation =
        compile_from_memory_map(sources(main), "kfm.def").expect("project should compile");
    assert!(compilation
        .output
        .contains("((StateType = S) || (StateType = C))"));
}

#[test]
fn reading_a_never_assigned_global_is_fatal() {
    let main = "[Statedef 300]\n\
        [State ]\n\
        type = Null\n\
        trigger1 = missingvar > 2\n";
    let err = compile_from_memory_map(sources(main), "kfm.def").expect_err("must fail");
    assert_eq!(err.code, "UNDEFINED_GLOBAL");
    assert!(err.message.contains("missingvar"));
}

#[test]
fn non_boolean_triggers_are_rejected() {
    let main = "[Statedef 300]\n\
        [State ]\n\
        type = Null\n\
        trigger1 = Time\n";
    let err = compile_from_memory_map(sources(main), "kfm.def").expect_err("must fail");
    assert_eq!(err.code, "INCOMPATIBLE_TYPES");
    assert!(err.message.contains("bool"));
}

#[test]
fn undeclared_template_properties_warn_but_compile() {
    let main = "[Statedef 300]\n\
        [State ]\n\
        type = Null\n\
        trigger1 = Alive\n\
        bogus = 5\n";
    let compilation =
        compile_from_memory_map(sources(main), "kfm.def").expect("project should compile");
    assert!(compilation.warnings.iter().any(|w| w.contains("bogus")));
    assert!(compilation.output.contains("bogus = 5"));
}

#[test]
fn missing_manifest_key_aborts_before_loading() {
    let manifest = "[Files]\nstcommon = common.cns\n";
    let err = compile_from_memory_map(
        [
            ("kfm.def", manifest),
            ("common.cns", COMMON),
            ("stdlib/libmtl.inc", STDLIB),
        ],
        "kfm.def",
    )
    .expect_err("must fail");
    assert_eq!(err.code, "MANIFEST_MISSING_KEY");
}
