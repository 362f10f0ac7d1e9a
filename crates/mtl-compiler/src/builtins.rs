//! The builtin catalogue: engine-provided types, trigger functions and state
//! controller templates seeded into every translation context before any user
//! definition is read.

use mtl_core::{
    ConstEvaluator, Location, TemplateCategory, TemplateDefinition, TemplateParameter,
    TriggerCategory, TriggerDefinition, TriggerParam, TypeCategory, TypeDefinition, TypeSpecifier,
};

fn bt(name: &str, category: TypeCategory, size: u32, members: &[&str]) -> TypeDefinition {
    TypeDefinition {
        name: name.to_string(),
        category,
        size,
        members: members.iter().map(|m| m.to_string()).collect(),
        location: Location::internal(),
    }
}

/// Engine-provided base types. Order matters only for the debug tables, which
/// replay this list verbatim.
pub fn base_types() -> Vec<TypeDefinition> {
    use TypeCategory::*;
    vec![
        bt("any", BuiltinDeny, 32, &[]),
        bt("int", Builtin, 32, &[]),
        bt("float", Builtin, 32, &[]),
        bt("short", Builtin, 16, &[]),
        bt("byte", Builtin, 8, &[]),
        bt("char", Builtin, 8, &[]),
        bt("bool", Builtin, 1, &[]),
        bt("cint", BuiltinDeny, 32, &[]),
        bt("string", BuiltinDeny, 32, &[]),
        bt("type", Builtin, 32, &[]),
        bt("vector", BuiltinStructure, 32, &["X:float", "Y:float"]),
        bt("StateType", StringEnum, 32, &["S", "C", "A", "L", "U"]),
        bt("MoveType", StringEnum, 32, &["A", "I", "H", "U"]),
        bt("PhysicsType", StringEnum, 32, &["S", "C", "A", "N", "U"]),
        bt("HitType", StringFlag, 32, &["S", "C", "A"]),
        bt("HitAttr", StringFlag, 32, &["N", "S", "H", "A", "T", "P"]),
        bt("TransType", StringEnum, 32, &["add", "add1", "sub", "none"]),
        bt(
            "AssertType",
            StringEnum,
            32,
            &[
                "Intro",
                "Invisible",
                "RoundNotOver",
                "NoBarDisplay",
                "NoBG",
                "NoFG",
                "NoStandGuard",
                "NoCrouchGuard",
                "NoAirGuard",
                "NoAutoTurn",
                "NoJuggleCheck",
                "NoKOSnd",
                "NoKOSlow",
                "NoKO",
                "NoShadow",
                "GlobalNoShadow",
                "NoMusic",
                "NoWalk",
                "TimerFreeze",
                "Unguardable",
            ],
        ),
        bt("BindType", StringEnum, 32, &["Foot", "Mid", "Head"]),
        bt(
            "PosType",
            StringEnum,
            32,
            &["P1", "P2", "Front", "Back", "Left", "Right", "None"],
        ),
        bt("WaveType", StringEnum, 32, &["Sine", "Square", "SineSquare", "Off"]),
        bt("HelperType", StringEnum, 32, &["Normal", "Player", "Proj"]),
        bt("HitFlag", StringFlag, 32, &["H", "L", "A", "M", "F", "D", "+", "-"]),
        bt("GuardFlag", StringFlag, 32, &["H", "L", "A", "M"]),
        bt("TeamType", StringEnum, 32, &["E", "B", "F"]),
        bt(
            "HitAnimType",
            StringEnum,
            32,
            &["Light", "Medium", "Hard", "Back", "Up", "DiagUp"],
        ),
        bt("AttackType", StringEnum, 32, &["High", "Low", "Trip", "None"]),
        bt("PriorityType", StringEnum, 32, &["Hit", "Miss", "Dodge"]),
        bt("HitVarType", StringEnum, 32, &["isbound"]),
        bt("ConstType", StringEnum, 32, &["movement.yaccel"]),
        bt("numeric", Union, 32, &["int", "float"]),
        bt("prefixed_int", Union, 32, &["cint", "int"]),
        bt("sprite", Alias, 32, &["prefixed_int"]),
        bt("sound", Alias, 32, &["prefixed_int"]),
        bt("anim", Alias, 32, &["prefixed_int"]),
    ]
}

/// Looks up catalogue types by name while building trigger and template rows.
struct Catalogue<'a> {
    types: &'a [TypeDefinition],
}

impl Catalogue<'_> {
    fn ty(&self, name: &str) -> TypeDefinition {
        match self.types.iter().find(|t| t.is(name)) {
            Some(t) => t.clone(),
            // Unreachable for catalogue rows; a plain 32-bit stand-in keeps
            // this helper total.
            None => bt(name, TypeCategory::Builtin, 32, &[]),
        }
    }

    fn trig(&self, name: &str, ret: &str, params: &[(&str, &str)]) -> TriggerDefinition {
        self.row(name, ret, None, params, TriggerCategory::Builtin)
    }

    fn trig_eval(
        &self,
        name: &str,
        ret: &str,
        eval: ConstEvaluator,
        params: &[(&str, &str)],
    ) -> TriggerDefinition {
        self.row(name, ret, Some(eval), params, TriggerCategory::Builtin)
    }

    fn op(
        &self,
        name: &str,
        ret: &str,
        eval: ConstEvaluator,
        params: &[(&str, &str)],
    ) -> TriggerDefinition {
        self.row(name, ret, Some(eval), params, TriggerCategory::Operator)
    }

    fn row(
        &self,
        name: &str,
        ret: &str,
        const_eval: Option<ConstEvaluator>,
        params: &[(&str, &str)],
        category: TriggerCategory,
    ) -> TriggerDefinition {
        TriggerDefinition {
            name: name.to_string(),
            return_type: self.ty(ret),
            const_eval,
            params: params
                .iter()
                .map(|(n, t)| TriggerParam {
                    name: n.to_string(),
                    ty: self.ty(t),
                })
                .collect(),
            body: None,
            location: Location::internal(),
            category,
        }
    }

    fn par(&self, name: &str, required: bool, specs: &[(&str, bool, bool)]) -> TemplateParameter {
        TemplateParameter {
            name: name.to_string(),
            specs: specs
                .iter()
                .map(|(t, req, rep)| TypeSpecifier {
                    ty: self.ty(t),
                    required: *req,
                    repeat: *rep,
                })
                .collect(),
            required,
        }
    }

    fn tmpl(&self, name: &str, params: Vec<TemplateParameter>) -> TemplateDefinition {
        TemplateDefinition {
            name: name.to_string(),
            params,
            locals: Vec::new(),
            controllers: Vec::new(),
            location: Location::internal(),
            category: TemplateCategory::Builtin,
        }
    }
}

fn infix(op: &str) -> ConstEvaluator {
    ConstEvaluator::Infix(op.to_string())
}

/// Engine trigger functions plus the operator overload family. Several names
/// appear more than once; overloads are told apart by arity and operand types.
pub fn base_triggers(types: &[TypeDefinition]) -> Vec<TriggerDefinition> {
    let c = Catalogue { types };
    vec![
        c.trig("abs", "numeric", &[("exprn", "numeric")]),
        c.trig("acos", "float", &[("exprn", "numeric")]),
        c.trig("AiLevel", "int", &[]),
        c.trig("Alive", "bool", &[]),
        c.trig("Anim", "int", &[]),
        c.trig("AnimElem", "int", &[]),
        c.trig("AnimElemNo", "int", &[("exprn", "int")]),
        c.trig("AnimElemTime", "int", &[]),
        c.trig("AnimElemTime", "int", &[("exprn", "int")]),
        c.trig("AnimExist", "bool", &[("exprn", "int")]),
        c.trig("AnimTime", "int", &[]),
        c.trig("asin", "float", &[("exprn", "numeric")]),
        c.trig("atan", "float", &[("exprn", "numeric")]),
        c.trig("AuthorName", "string", &[]),
        c.trig("BackEdgeBodyDist", "float", &[]),
        c.trig("BackEdgeDist", "float", &[]),
        c.trig("CanRecover", "bool", &[]),
        c.trig("ceil", "int", &[("exprn", "numeric")]),
        c.trig("Command", "string", &[]),
        c.trig_eval("cond", "any", ConstEvaluator::Cond, &[("condition", "bool"), ("exprn1", "any"), ("exprn2", "any")]),
        c.trig("Const", "numeric", &[("param_name", "ConstType")]),
        c.trig("Const240p", "float", &[("exprn", "numeric")]),
        c.trig("Const480p", "float", &[("exprn", "numeric")]),
        c.trig("Const720p", "float", &[("exprn", "numeric")]),
        c.trig("cos", "float", &[("exprn", "numeric")]),
        c.trig("Ctrl", "bool", &[]),
        c.trig("DrawGame", "bool", &[]),
        c.trig("e", "float", &[]),
        c.trig("exp", "float", &[("exprn", "numeric")]),
        c.trig("Facing", "int", &[]),
        c.trig("floor", "int", &[("exprn", "float")]),
        c.trig("FrontEdgeBodyDist", "float", &[]),
        c.trig("FrontEdgeDist", "float", &[]),
        c.trig("fvar", "float", &[("exprn", "int")]),
        c.trig("GameHeight", "float", &[]),
        c.trig("GameTime", "int", &[]),
        c.trig("GameWidth", "float", &[]),
        c.trig("GetHitVar", "float", &[("param_name", "HitVarType")]),
        c.trig("HitCount", "int", &[]),
        c.trig("HitFall", "bool", &[]),
        c.trig("HitOver", "bool", &[]),
        c.trig("HitPauseTime", "int", &[]),
        c.trig("HitShakeOver", "bool", &[]),
        c.trig("HitVel", "vector", &[]),
        c.trig("ID", "int", &[]),
        c.trig_eval("ifelse", "any", ConstEvaluator::Cond, &[("condition", "bool"), ("exprn1", "any"), ("exprn2", "any")]),
        c.trig("InGuardDist", "bool", &[]),
        c.trig("IsHelper", "bool", &[]),
        c.trig("IsHelper", "bool", &[("exprn", "int")]),
        c.trig("IsHomeTeam", "bool", &[]),
        c.trig("Life", "int", &[]),
        c.trig("LifeMax", "int", &[]),
        c.trig("ln", "float", &[("exprn", "numeric")]),
        c.trig("log", "float", &[("exp1", "numeric")]),
        c.trig("Lose", "bool", &[]),
        c.trig("LoseKO", "bool", &[]),
        c.trig("LoseTime", "bool", &[]),
        c.trig("MatchNo", "int", &[]),
        c.trig("MatchOver", "bool", &[]),
        c.trig("MoveContact", "int", &[]),
        c.trig("MoveGuarded", "int", &[]),
        c.trig("MoveHit", "int", &[]),
        c.trig("MoveReversed", "int", &[]),
        c.trig("MoveType", "MoveType", &[]),
        c.trig("Name", "string", &[]),
        c.trig("NumEnemy", "int", &[]),
        c.trig("NumExplod", "int", &[]),
        c.trig("NumExplod", "int", &[("exprn", "int")]),
        c.trig("NumPartner", "int", &[]),
        c.trig("NumProj", "int", &[]),
        c.trig("NumProjID", "int", &[("exprn", "int")]),
        c.trig("NumTarget", "int", &[]),
        c.trig("NumTarget", "int", &[("exprn", "int")]),
        c.trig("P1Name", "string", &[]),
        c.trig("P2BodyDist", "vector", &[]),
        c.trig("P2Dist", "vector", &[]),
        c.trig("P2Life", "int", &[]),
        c.trig("P2Name", "string", &[]),
        c.trig("P2StateNo", "int", &[]),
        c.trig("P3Name", "string", &[]),
        c.trig("P4Name", "string", &[]),
        c.trig("PalNo", "int", &[]),
        c.trig("ParentDist", "vector", &[]),
        c.trig("Physics", "PhysicsType", &[]),
        c.trig("pi", "float", &[]),
        c.trig("Pos", "vector", &[]),
        c.trig("Power", "int", &[]),
        c.trig("PowerMax", "int", &[]),
        c.trig("PlayerIDExist", "bool", &[("ID_number", "int")]),
        c.trig("PrevStateNo", "int", &[]),
        c.trig("ProjCancelTime", "int", &[]),
        c.trig("ProjCancelTime", "int", &[("exprn", "int")]),
        c.trig("ProjContactTime", "int", &[]),
        c.trig("ProjContactTime", "int", &[("exprn", "int")]),
        c.trig("ProjGuardedTime", "int", &[]),
        c.trig("ProjGuardedTime", "int", &[("exprn", "int")]),
        c.trig("ProjHitTime", "int", &[]),
        c.trig("ProjHitTime", "int", &[("exprn", "int")]),
        c.trig("Random", "int", &[]),
        c.trig("RootDist", "vector", &[]),
        c.trig("RoundNo", "int", &[]),
        c.trig("RoundsExisted", "int", &[]),
        c.trig("RoundState", "int", &[]),
        c.trig("ScreenPos", "vector", &[]),
        c.trig("SelfAnimExist", "bool", &[("exprn", "int")]),
        c.trig("sin", "float", &[("exprn", "numeric")]),
        c.trig("StateNo", "int", &[]),
        c.trig("StateType", "StateType", &[]),
        c.trig("sysfvar", "float", &[("exprn", "int")]),
        c.trig("sysvar", "int", &[("exprn", "int")]),
        c.trig("tan", "float", &[("exprn", "numeric")]),
        c.trig("TeamSide", "int", &[]),
        c.trig("TicksPerSecond", "int", &[]),
        c.trig("Time", "int", &[]),
        c.trig("var", "int", &[("exprn", "int")]),
        c.trig("Vel", "vector", &[]),
        c.trig("Win", "bool", &[]),
        c.trig("WinKO", "bool", &[]),
        c.trig("WinTime", "bool", &[]),
        c.trig("WinPerfect", "bool", &[]),
        c.op("operator!", "bool", ConstEvaluator::Not, &[("expr", "bool")]),
        c.op("operator!", "bool", ConstEvaluator::Not, &[("expr", "int")]),
        c.op("operator!", "bool", ConstEvaluator::Not, &[("expr", "float")]),
        c.op("operator-", "int", ConstEvaluator::Negate, &[("expr", "int")]),
        c.op("operator-", "float", ConstEvaluator::Negate, &[("expr", "float")]),
        c.op("operator~", "int", ConstEvaluator::BitNot, &[("expr", "int")]),
        c.op("operator+", "int", infix("+"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator+", "float", infix("+"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator-", "int", infix("-"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator-", "float", infix("-"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator*", "int", infix("*"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator*", "float", infix("*"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator/", "int", infix("/"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator/", "float", infix("/"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator%", "int", infix("%"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator**", "int", infix("**"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator**", "float", infix("**"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator=", "bool", infix("="), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator=", "bool", infix("="), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator=", "bool", infix("="), &[("expr1", "string"), ("expr2", "string")]),
        c.op("operator!=", "bool", infix("!="), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator!=", "bool", infix("!="), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator!=", "bool", infix("!="), &[("expr1", "string"), ("expr2", "string")]),
        c.op("operator&", "int", infix("&"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator|", "int", infix("|"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator^", "int", infix("^"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator:=", "int", infix(":="), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator:=", "float", infix(":="), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator<", "bool", infix("<"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator<=", "bool", infix("<="), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator>", "bool", infix(">"), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator>=", "bool", infix(">="), &[("expr1", "int"), ("expr2", "int")]),
        c.op("operator<", "bool", infix("<"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator<=", "bool", infix("<="), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator>", "bool", infix(">"), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator>=", "bool", infix(">="), &[("expr1", "float"), ("expr2", "float")]),
        c.op("operator&&", "bool", infix("&&"), &[("expr1", "bool"), ("expr2", "bool")]),
        c.op("operator||", "bool", infix("||"), &[("expr1", "bool"), ("expr2", "bool")]),
        c.op("operator^^", "bool", infix("^^"), &[("expr1", "bool"), ("expr2", "bool")]),
        c.op("cast", "any", ConstEvaluator::Cast, &[("expr", "any"), ("t", "type")]),
    ]
}

/// Engine state controller templates. Parameter rows mirror the engine's
/// documented property lists; multi-specifier rows are tuple-valued
/// properties, `repeat` rows accept a trailing run of the same type.
pub fn base_templates(types: &[TypeDefinition]) -> Vec<TemplateDefinition> {
    let c = Catalogue { types };
    vec![
        c.tmpl(
            "AfterImage",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("length", false, &[("int", true, false)]),
                c.par("palcolor", false, &[("int", true, false)]),
                c.par("palinvertall", false, &[("bool", true, false)]),
                c.par("palbright", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("palcontrast", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("palpostbright", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("paladd", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("palmul", false, &[("float", true, false), ("float", true, false), ("float", true, false)]),
                c.par("timegap", false, &[("int", true, false)]),
                c.par("framegap", false, &[("int", true, false)]),
                c.par("trans", false, &[("TransType", true, false)]),
            ],
        ),
        c.tmpl("AfterImageTime", vec![c.par("time", true, &[("int", true, false)])]),
        c.tmpl("AngleAdd", vec![c.par("value", true, &[("float", true, false)])]),
        c.tmpl(
            "AngleDraw",
            vec![
                c.par("value", false, &[("float", true, false)]),
                c.par("scale", false, &[("float", true, false), ("float", true, false)]),
            ],
        ),
        c.tmpl("AngleMul", vec![c.par("value", true, &[("float", true, false)])]),
        c.tmpl("AngleSet", vec![c.par("value", true, &[("float", true, false)])]),
        c.tmpl(
            "AssertSpecial",
            vec![
                c.par("flag", true, &[("AssertType", true, false)]),
                c.par("flag2", false, &[("AssertType", true, false)]),
                c.par("flag3", false, &[("AssertType", true, false)]),
            ],
        ),
        c.tmpl("AttackDist", vec![c.par("value", true, &[("int", true, false)])]),
        c.tmpl("AttackMulSet", vec![c.par("value", true, &[("float", true, false)])]),
        c.tmpl(
            "BindToParent",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("facing", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
            ],
        ),
        c.tmpl(
            "BindToRoot",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("facing", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
            ],
        ),
        c.tmpl(
            "BindToTarget",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("id", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false), ("BindType", true, false)]),
            ],
        ),
        c.tmpl(
            "ChangeAnim",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("elem", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "ChangeAnim2",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("elem", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "ChangeState",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("ctrl", false, &[("bool", true, false)]),
                c.par("anim", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl("ClearClipboard", vec![]),
        c.tmpl(
            "CtrlSet",
            vec![
                c.par("ctrl", false, &[("bool", true, false)]),
                c.par("value", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl("DefenceMulSet", vec![c.par("value", true, &[("float", true, false)])]),
        c.tmpl("DestroySelf", vec![]),
        c.tmpl(
            "DisplayToClipboard",
            vec![
                c.par("text", true, &[("string", true, false)]),
                c.par("params", false, &[("vector", true, false)]),
            ],
        ),
        c.tmpl(
            "EnvColor",
            vec![
                c.par("value", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("time", false, &[("int", true, false)]),
                c.par("under", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "EnvShake",
            vec![
                c.par("time", true, &[("int", true, false)]),
                c.par("freq", false, &[("float", true, false)]),
                c.par("ampl", false, &[("int", true, false)]),
                c.par("phase", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl(
            "Explod",
            vec![
                c.par("anim", true, &[("anim", true, false)]),
                c.par("id", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
                c.par("postype", false, &[("PosType", true, false)]),
                c.par("facing", false, &[("int", true, false)]),
                c.par("vfacing", false, &[("int", true, false)]),
                c.par("bindtime", false, &[("int", true, false)]),
                c.par("vel", false, &[("float", true, false), ("float", true, false)]),
                c.par("accel", false, &[("float", true, false), ("float", true, false)]),
                c.par("random", false, &[("int", true, false), ("int", true, false)]),
                c.par("removetime", false, &[("int", true, false)]),
                c.par("supermove", false, &[("bool", true, false)]),
                c.par("supermovetime", false, &[("int", true, false)]),
                c.par("pausemovetime", false, &[("int", true, false)]),
                c.par("scale", false, &[("float", true, false), ("float", true, false)]),
                c.par("sprpriority", false, &[("int", true, false)]),
                c.par("ontop", false, &[("bool", true, false)]),
                c.par("shadow", false, &[("bool", true, false)]),
                c.par("ownpal", false, &[("bool", true, false)]),
                c.par("removeongethit", false, &[("bool", true, false)]),
                c.par("ignorehitpause", false, &[("bool", true, false)]),
                c.par("trans", false, &[("TransType", true, false)]),
            ],
        ),
        c.tmpl(
            "ExplodBindTime",
            vec![
                c.par("id", false, &[("int", true, false)]),
                c.par("time", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "ForceFeedback",
            vec![
                c.par("waveform", false, &[("WaveType", true, false)]),
                c.par("time", false, &[("int", true, false)]),
                c.par("freq", false, &[("int", true, false), ("float", true, false), ("float", true, false), ("float", true, false)]),
                c.par("ampl", false, &[("int", true, false), ("float", true, false), ("float", true, false), ("float", true, false)]),
                c.par("self", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl("FallEnvShake", vec![]),
        c.tmpl(
            "GameMakeint",
            vec![
                c.par("value", false, &[("int", true, false)]),
                c.par("under", false, &[("bool", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
                c.par("random", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl("Gravity", vec![]),
        c.tmpl(
            "Helper",
            vec![
                c.par("helpertype", false, &[("HelperType", true, false)]),
                c.par("name", false, &[("string", true, false)]),
                c.par("id", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
                c.par("postype", false, &[("PosType", true, false)]),
                c.par("facing", false, &[("int", true, false)]),
                c.par("stateno", false, &[("int", true, false)]),
                c.par("keyctrl", false, &[("bool", true, false)]),
                c.par("ownpal", false, &[("bool", true, false)]),
                c.par("supermovetime", false, &[("int", true, false)]),
                c.par("pausemovetime", false, &[("int", true, false)]),
                c.par("size.xscale", false, &[("float", true, false)]),
                c.par("size.yscale", false, &[("float", true, false)]),
                c.par("size.ground.back", false, &[("int", true, false)]),
                c.par("size.ground.front", false, &[("int", true, false)]),
                c.par("size.air.back", false, &[("int", true, false)]),
                c.par("size.ait.front", false, &[("int", true, false)]),
                c.par("size.height", false, &[("int", true, false)]),
                c.par("size.proj.doscale", false, &[("int", true, false)]),
                c.par("size.head.pos", false, &[("int", true, false), ("int", true, false)]),
                c.par("size.mid.pos", false, &[("int", true, false), ("int", true, false)]),
                c.par("size.shadowoffset", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl("HitAdd", vec![c.par("value", true, &[("int", true, false)])]),
        c.tmpl(
            "HitBy",
            vec![
                c.par("value", false, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("value2", false, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("time", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "HitDef",
            vec![
                c.par("attr", true, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("hitflag", false, &[("HitFlag", true, false)]),
                c.par("guardflag", false, &[("GuardFlag", true, false)]),
                c.par("affectteam", false, &[("TeamType", true, false)]),
                c.par("animtype", false, &[("HitAnimType", true, false)]),
                c.par("air.animtype", false, &[("HitAnimType", true, false)]),
                c.par("fall.animtype", false, &[("HitAnimType", true, false)]),
                c.par("priority", false, &[("int", true, false), ("PriorityType", false, false)]),
                c.par("damage", false, &[("int", true, false), ("int", false, false)]),
                c.par("pausetime", false, &[("int", true, false), ("int", true, false)]),
                c.par("guard.pausetime", false, &[("int", true, false), ("int", true, false)]),
                c.par("sparkno", false, &[("sprite", true, false)]),
                c.par("guard.sparkno", false, &[("sprite", true, false)]),
                c.par("sparkxy", false, &[("int", true, false), ("int", true, false)]),
                c.par("hitsound", false, &[("sound", true, false), ("int", true, false)]),
                c.par("guardsound", false, &[("sound", true, false), ("int", true, false)]),
                c.par("ground.type", false, &[("AttackType", true, false)]),
                c.par("air.type", false, &[("AttackType", true, false)]),
                c.par("ground.slidetime", false, &[("int", true, false)]),
                c.par("guard.slidetime", false, &[("int", true, false)]),
                c.par("ground.hittime", false, &[("int", true, false)]),
                c.par("guard.hittime", false, &[("int", true, false)]),
                c.par("air.hittime", false, &[("int", true, false)]),
                c.par("guard.ctrltime", false, &[("int", true, false)]),
                c.par("guard.dist", false, &[("int", true, false)]),
                c.par("yaccel", false, &[("float", true, false)]),
                c.par("ground.velocity", false, &[("float", true, false)]),
                c.par("guard.velocity", false, &[("float", true, false)]),
                c.par("air.velocity", false, &[("float", true, false), ("float", true, false)]),
                c.par("airguard.velocity", false, &[("float", true, false), ("float", true, false)]),
                c.par("ground.cornerpush.veloff", false, &[("float", true, false)]),
                c.par("air.cornerpush.veloff", false, &[("float", true, false)]),
                c.par("down.cornerpush.veloff", false, &[("float", true, false)]),
                c.par("guard.cornerpush.veloff", false, &[("float", true, false)]),
                c.par("airguard.cornerpush.veloff", false, &[("float", true, false)]),
                c.par("airguard.ctrltime", false, &[("int", true, false)]),
                c.par("air.juggle", false, &[("int", true, false)]),
                c.par("mindist", false, &[("int", true, false), ("int", true, false)]),
                c.par("maxdist", false, &[("int", true, false), ("int", true, false)]),
                c.par("snap", false, &[("int", true, false), ("int", true, false)]),
                c.par("p1sprpriority", false, &[("int", true, false)]),
                c.par("p2sprpriority", false, &[("int", true, false)]),
                c.par("p1facing", false, &[("int", true, false)]),
                c.par("p1getp2facing", false, &[("int", true, false)]),
                c.par("p2facing", false, &[("int", true, false)]),
                c.par("p1stateno", false, &[("int", true, false)]),
                c.par("p2stateno", false, &[("int", true, false)]),
                c.par("p2getp1state", false, &[("bool", true, false)]),
                c.par("forcestand", false, &[("bool", true, false)]),
                c.par("fall", false, &[("bool", true, false)]),
                c.par("fall.xvelocity", false, &[("float", true, false)]),
                c.par("fall.yvelocity", false, &[("float", true, false)]),
                c.par("fall.recover", false, &[("bool", true, false)]),
                c.par("fall.recovertime", false, &[("int", true, false)]),
                c.par("fall.damage", false, &[("int", true, false)]),
                c.par("air.fall", false, &[("bool", true, false)]),
                c.par("forcenofall", false, &[("bool", true, false)]),
                c.par("down.velocity", false, &[("float", true, false), ("float", true, false)]),
                c.par("down.hittime", false, &[("int", true, false)]),
                c.par("down.bounce", false, &[("bool", true, false)]),
                c.par("id", false, &[("int", true, false)]),
                c.par("chainid", false, &[("int", true, false)]),
                c.par("nochainid", false, &[("int", true, false), ("int", true, false)]),
                c.par("hitonce", false, &[("bool", true, false)]),
                c.par("kill", false, &[("bool", true, false)]),
                c.par("guard.kill", false, &[("bool", true, false)]),
                c.par("fall.kill", false, &[("bool", true, false)]),
                c.par("numhits", false, &[("int", true, false)]),
                c.par("getpower", false, &[("int", true, false), ("int", false, false)]),
                c.par("givepower", false, &[("int", true, false), ("int", false, false)]),
                c.par("palfx.time", false, &[("int", true, false)]),
                c.par("palfx.mul", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("palfx.add", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("envshake.time", false, &[("int", true, false)]),
                c.par("envshake.freq", false, &[("float", true, false)]),
                c.par("envshake.ampl", false, &[("int", true, false)]),
                c.par("envshake.phase", false, &[("float", true, false)]),
                c.par("fall.envshake.time", false, &[("int", true, false)]),
                c.par("fall.envshake.freq", false, &[("float", true, false)]),
                c.par("fall.envshake.ampl", false, &[("int", true, false)]),
                c.par("fall.envshake.phase", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl("HitFallDamage", vec![]),
        c.tmpl(
            "HitFallSet",
            vec![
                c.par("value", false, &[("int", true, false)]),
                c.par("xvel", false, &[("float", true, false)]),
                c.par("yvel", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl("HitFallVel", vec![]),
        c.tmpl(
            "HitOverride",
            vec![
                c.par("attr", true, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("stateno", false, &[("int", true, false)]),
                c.par("slot", false, &[("int", true, false)]),
                c.par("time", false, &[("int", true, false)]),
                c.par("forceair", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "HitVelSet",
            vec![
                c.par("x", false, &[("bool", true, false)]),
                c.par("y", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "LifeAdd",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("kill", false, &[("bool", true, false)]),
                c.par("absolute", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl("LifeSet", vec![c.par("value", true, &[("int", true, false)])]),
        c.tmpl(
            "MakeDust",
            vec![
                c.par("pos", false, &[("int", true, false), ("int", true, false)]),
                c.par("pos2", false, &[("float", true, false), ("float", true, false)]),
                c.par("spacing", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "ModifyExplod",
            vec![
                c.par("id", true, &[("int", true, false)]),
                c.par("int", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
                c.par("postype", false, &[("PosType", true, false)]),
                c.par("facing", false, &[("int", true, false)]),
                c.par("vfacing", false, &[("int", true, false)]),
                c.par("bindtime", false, &[("int", true, false)]),
                c.par("vel", false, &[("float", true, false), ("float", true, false)]),
                c.par("accel", false, &[("float", true, false), ("float", true, false)]),
                c.par("random", false, &[("int", true, false), ("int", true, false)]),
                c.par("removetime", false, &[("int", true, false)]),
                c.par("supermove", false, &[("bool", true, false)]),
                c.par("supermovetime", false, &[("int", true, false)]),
                c.par("pausemovetime", false, &[("int", true, false)]),
                c.par("scale", false, &[("float", true, false), ("float", true, false)]),
                c.par("sprpriority", false, &[("int", true, false)]),
                c.par("ontop", false, &[("bool", true, false)]),
                c.par("shadow", false, &[("bool", true, false)]),
                c.par("ownpal", false, &[("bool", true, false)]),
                c.par("removeongethit", false, &[("bool", true, false)]),
                c.par("ignorehitpause", false, &[("bool", true, false)]),
                c.par("trans", false, &[("TransType", true, false)]),
            ],
        ),
        c.tmpl("MoveHitReset", vec![]),
        c.tmpl(
            "NotHitBy",
            vec![
                c.par("value", false, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("value2", false, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("time", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl("Null", vec![]),
        c.tmpl(
            "Offset",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl(
            "PalFX",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("add", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("mul", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("sinadd", false, &[("int", true, false), ("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("invertall", false, &[("bool", true, false)]),
                c.par("color", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "ParentVarAdd",
            vec![
                c.par("v", false, &[("int", true, false)]),
                c.par("fv", false, &[("int", true, false)]),
                c.par("value", false, &[("numeric", true, false)]),
            ],
        ),
        c.tmpl(
            "ParentVarSet",
            vec![
                c.par("v", false, &[("int", true, false)]),
                c.par("fv", false, &[("int", true, false)]),
                c.par("value", false, &[("numeric", true, false)]),
            ],
        ),
        c.tmpl(
            "Pause",
            vec![
                c.par("time", true, &[("int", true, false)]),
                c.par("endcmdbuftime", false, &[("int", true, false)]),
                c.par("movetime", false, &[("int", true, false)]),
                c.par("pausebg", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl("PlayerPush", vec![c.par("value", true, &[("bool", true, false)])]),
        c.tmpl(
            "PlaySnd",
            vec![
                c.par("value", true, &[("sound", true, false), ("int", true, false)]),
                c.par("volumescale", false, &[("float", true, false)]),
                c.par("channel", false, &[("int", true, false)]),
                c.par("lowpriority", false, &[("bool", true, false)]),
                c.par("freqmul", false, &[("float", true, false)]),
                c.par("loop", false, &[("bool", true, false)]),
                c.par("pan", false, &[("int", true, false)]),
                c.par("abspan", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "PosAdd",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl("PosFreeze", vec![c.par("value", false, &[("bool", true, false)])]),
        c.tmpl(
            "PosSet",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl("PowerAdd", vec![c.par("value", true, &[("int", true, false)])]),
        c.tmpl("PowerSet", vec![c.par("value", true, &[("int", true, false)])]),
        c.tmpl(
            "Projectile",
            vec![
                c.par("projid", false, &[("int", true, false)]),
                c.par("projint", false, &[("int", true, false)]),
                c.par("projhitint", false, &[("int", true, false)]),
                c.par("projremint", false, &[("int", true, false)]),
                c.par("projscale", false, &[("float", true, false), ("float", true, false)]),
                c.par("projremove", false, &[("bool", true, false)]),
                c.par("projremovetime", false, &[("int", true, false)]),
                c.par("velocity", false, &[("float", true, false), ("float", true, false)]),
                c.par("remvelocity", false, &[("float", true, false), ("float", true, false)]),
                c.par("accel", false, &[("float", true, false), ("float", true, false)]),
                c.par("velmul", false, &[("float", true, false), ("float", true, false)]),
                c.par("projhits", false, &[("int", true, false)]),
                c.par("projmisstime", false, &[("int", true, false)]),
                c.par("projpriority", false, &[("int", true, false)]),
                c.par("projsprpriority", false, &[("int", true, false)]),
                c.par("projedgebound", false, &[("int", true, false)]),
                c.par("projstagebound", false, &[("int", true, false)]),
                c.par("projheightbound", false, &[("int", true, false), ("int", true, false)]),
                c.par("offset", false, &[("int", true, false), ("int", true, false)]),
                c.par("postype", false, &[("PosType", true, false)]),
                c.par("projshadow", false, &[("bool", true, false)]),
                c.par("supermovetime", false, &[("int", true, false)]),
                c.par("pausemovetime", false, &[("int", true, false)]),
                c.par("afterimage.time", false, &[("int", true, false)]),
                c.par("afterimage.length", false, &[("int", true, false)]),
                c.par("afterimage.palcolor", false, &[("int", true, false)]),
                c.par("afterimage.palinvertall", false, &[("bool", true, false)]),
                c.par("afterimage.palbright", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("afterimage.palcontrast", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("afterimage.palpostbright", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("afterimage.paladd", false, &[("int", true, false), ("int", true, false), ("int", true, false)]),
                c.par("afterimage.palmul", false, &[("float", true, false), ("float", true, false), ("float", true, false)]),
                c.par("afterimage.timegap", false, &[("int", true, false)]),
                c.par("afterimage.framegap", false, &[("int", true, false)]),
                c.par("afterimage.trans", false, &[("TransType", true, false)]),
            ],
        ),
        c.tmpl(
            "RemapPal",
            vec![
                c.par("source", true, &[("int", true, false), ("int", true, false)]),
                c.par("dest", true, &[("int", true, false), ("int", true, false)]),
            ],
        ),
        c.tmpl("RemoveExplod", vec![c.par("id", false, &[("int", true, false)])]),
        c.tmpl(
            "ReversalDef",
            vec![
                c.par("reversal.attr", true, &[("HitType", true, false), ("HitAttr", false, true)]),
                c.par("pausetime", false, &[("int", true, false), ("int", true, false)]),
                c.par("sparkno", false, &[("int", true, false)]),
                c.par("hitsound", false, &[("int", true, false), ("int", true, false)]),
                c.par("p1stateno", false, &[("int", true, false)]),
                c.par("p2stateno", false, &[("int", true, false)]),
                c.par("p1sprpriority", false, &[("int", true, false)]),
                c.par("p2sprpriority", false, &[("int", true, false)]),
                c.par("sparkxy", false, &[("int", true, false), ("int", true, false)]),
            ],
        ),
        c.tmpl(
            "ScreenBound",
            vec![
                c.par("value", false, &[("bool", true, false)]),
                c.par("movecamera", false, &[("bool", true, false), ("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "SelfState",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("ctrl", false, &[("bool", true, false)]),
                c.par("anim", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl("SprPriority", vec![c.par("value", true, &[("int", true, false)])]),
        c.tmpl(
            "StateTypeSet",
            vec![
                c.par("statetype", false, &[("StateType", true, false)]),
                c.par("movetype", false, &[("MoveType", true, false)]),
                c.par("physics", false, &[("PhysicsType", true, false)]),
            ],
        ),
        c.tmpl(
            "SndPan",
            vec![
                c.par("channel", true, &[("int", true, false)]),
                c.par("pan", true, &[("int", true, false)]),
                c.par("abspan", true, &[("int", true, false)]),
            ],
        ),
        c.tmpl("StopSnd", vec![c.par("channel", true, &[("int", true, false)])]),
        c.tmpl(
            "SuperPause",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("anim", false, &[("int", true, false)]),
                c.par("sound", false, &[("int", true, false), ("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
                c.par("darken", false, &[("bool", true, false)]),
                c.par("p2defmul", false, &[("float", true, false)]),
                c.par("poweradd", false, &[("int", true, false)]),
                c.par("unhittable", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetBind",
            vec![
                c.par("time", false, &[("int", true, false)]),
                c.par("id", false, &[("int", true, false)]),
                c.par("pos", false, &[("float", true, false), ("float", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetDrop",
            vec![
                c.par("excludeid", false, &[("int", true, false)]),
                c.par("keepone", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetFacing",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("id", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetLifeAdd",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("id", false, &[("int", true, false)]),
                c.par("kill", false, &[("bool", true, false)]),
                c.par("absolute", false, &[("bool", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetPowerAdd",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("id", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetState",
            vec![
                c.par("value", true, &[("int", true, false)]),
                c.par("id", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetVelAdd",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
                c.par("id", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "TargetVelSet",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
                c.par("id", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "Trans",
            vec![
                c.par("trans", true, &[("TransType", true, false)]),
                c.par("alpha", false, &[("int", true, false), ("int", true, false)]),
            ],
        ),
        c.tmpl("Turn", vec![]),
        c.tmpl(
            "VarAdd",
            vec![
                c.par("v", false, &[("int", true, false)]),
                c.par("fv", false, &[("int", true, false)]),
                c.par("value", false, &[("numeric", true, false)]),
            ],
        ),
        c.tmpl(
            "VarSet",
            vec![
                c.par("v", false, &[("int", true, false)]),
                c.par("fv", false, &[("int", true, false)]),
                c.par("value", false, &[("numeric", true, false)]),
            ],
        ),
        c.tmpl(
            "VarRandom",
            vec![
                c.par("v", true, &[("int", true, false)]),
                c.par("range", false, &[("int", true, false), ("int", true, false)]),
            ],
        ),
        c.tmpl(
            "VarRangeSet",
            vec![
                c.par("value", false, &[("int", true, false)]),
                c.par("fvalue", false, &[("float", true, false)]),
                c.par("first", false, &[("int", true, false)]),
                c.par("last", false, &[("int", true, false)]),
            ],
        ),
        c.tmpl(
            "VelAdd",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl(
            "VelMul",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl(
            "VelSet",
            vec![
                c.par("x", false, &[("float", true, false)]),
                c.par("y", false, &[("float", true, false)]),
            ],
        ),
        c.tmpl("VictoryQuote", vec![c.par("value", false, &[("int", true, false)])]),
        c.tmpl(
            "Width",
            vec![
                c.par("edge", false, &[("int", true, false), ("int", true, false)]),
                c.par("player", false, &[("int", true, false), ("int", true, false)]),
                c.par("value", false, &[("int", true, false), ("int", true, false)]),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_types_resolve_for_every_trigger_row() {
        let types = base_types();
        for trig in base_triggers(&types) {
            assert!(
                types.iter().any(|t| t.name == trig.return_type.name),
                "return type of {} should come from the base table",
                trig.name
            );
            for param in &trig.params {
                assert!(
                    types.iter().any(|t| t.name == param.ty.name),
                    "parameter type {} of {} should come from the base table",
                    param.ty.name,
                    trig.name
                );
            }
        }
    }

    #[test]
    fn operator_rows_carry_const_evaluators() {
        let types = base_types();
        for trig in base_triggers(&types) {
            if trig.category == TriggerCategory::Operator {
                assert!(
                    trig.const_eval.is_some(),
                    "operator {} should have a const evaluator",
                    trig.name
                );
            }
        }
    }

    #[test]
    fn template_catalogue_covers_the_core_controllers() {
        let types = base_types();
        let templates = base_templates(&types);
        for name in ["ChangeState", "VarSet", "HitDef", "Null", "Helper"] {
            assert!(
                templates.iter().any(|t| t.name == name),
                "catalogue should carry {name}"
            );
        }
        let hitdef = templates
            .iter()
            .find(|t| t.name == "HitDef")
            .expect("HitDef should be present");
        let attr = hitdef
            .params
            .iter()
            .find(|p| p.name == "attr")
            .expect("HitDef should declare attr");
        assert!(attr.required);
        assert!(attr.specs[1].repeat);
    }

    #[test]
    fn anim_elem_time_is_overloaded_on_arity() {
        let types = base_types();
        let triggers = base_triggers(&types);
        let arities: Vec<usize> = triggers
            .iter()
            .filter(|t| t.name == "AnimElemTime")
            .map(|t| t.params.len())
            .collect();
        assert_eq!(arities, vec![0, 1]);
    }
}
