use logos::Logos;
use mtl_core::{Location, TranslationError, TriggerTree};

/// Redirect keywords usable bare, e.g. `parent, time`.
const TARGET_NAMES: &[&str] = &[
    "parent",
    "root",
    "helper",
    "target",
    "partner",
    "enemy",
    "enemynear",
];

/// Redirect keywords usable with an argument, e.g. `helper(1400), time`.
const TARGET_FUNCS: &[&str] = &["helper", "target", "enemy", "enemynear", "playerid", "rescope"];

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
enum Token {
    #[token("**")]
    Pow,
    #[token(":=")]
    Walrus,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    LogAnd,
    #[token("^^")]
    LogXor,
    #[token("||")]
    LogOr,
    #[token("!")]
    Not,
    #[token("~")]
    Tilde,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[token("&")]
    Amp,
    #[token("^")]
    Caret,
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),
    #[regex(r#""[^"]*""#, |lex| lex.slice().to_string())]
    #[regex(r"'[^']*'", |lex| lex.slice().to_string())]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    fn op_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::Pow => "**",
            Token::Walrus => ":=",
            Token::NotEq => "!=",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::LogAnd => "&&",
            Token::LogXor => "^^",
            Token::LogOr => "||",
            Token::Not => "!",
            Token::Tilde => "~",
            Token::Minus => "-",
            Token::Plus => "+",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Eq => "=",
            Token::Amp => "&",
            Token::Caret => "^",
            Token::Pipe => "|",
            _ => return None,
        })
    }
}

/// Binding power per binary operator. The ladder is deliberately unusual:
/// arithmetic binds loosest and logical operators tightest, so
/// `1 + 2 * 3` groups as `(1 + 2) * 3`.
fn binding_power(token: &Token) -> Option<(u8, bool)> {
    let (power, right_assoc) = match token {
        Token::Pow => (2, false),
        Token::Star | Token::Slash | Token::Percent => (3, false),
        Token::Plus | Token::Minus => (4, false),
        Token::Lt | Token::Le | Token::Gt | Token::Ge => (5, false),
        Token::Eq | Token::NotEq => (6, false),
        Token::Walrus => (7, true),
        Token::Amp => (8, false),
        Token::Caret => (9, false),
        Token::Pipe => (10, false),
        Token::LogAnd => (11, false),
        Token::LogXor => (12, false),
        Token::LogOr => (13, false),
        _ => return None,
    };
    Some((power, right_assoc))
}

/// Operand position for binary operators; unary binds looser, so a leading
/// `-` or `!` captures the entire chain to its right.
const OPERAND_POWER: u8 = 2;

struct TriggerParser {
    tokens: Vec<Token>,
    pos: usize,
    location: Location,
}

impl TriggerParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, hint: impl Into<String>) -> TranslationError {
        TranslationError::new(
            "TRIGGER_SYNTAX",
            format!("could not parse trigger expression ({})", hint.into()),
        )
        .at(self.location.clone())
    }

    fn expect(&mut self, expected: Token, hint: &str) -> Result<(), TranslationError> {
        match self.bump() {
            Some(token) if token == expected => Ok(()),
            _ => Err(self.error(hint)),
        }
    }

    fn at_terminator(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token::Comma) | Some(Token::RParen) | Some(Token::RBracket)
        )
    }

    fn parse_expr(&mut self, min_power: u8) -> Result<TriggerTree, TranslationError> {
        let mut lhs = self.parse_operand()?;
        loop {
            let Some(token) = self.peek() else { break };
            let Some((power, right_assoc)) = binding_power(token) else {
                break;
            };
            if power < min_power {
                break;
            }
            let op = token
                .op_text()
                .ok_or_else(|| self.error("unknown operator"))?
                .to_string();
            self.pos += 1;
            let next_power = if right_assoc { power } else { power + 1 };
            let rhs = self.parse_expr(next_power)?;
            // A dangling `+`/`-` after a bare word is an atom suffix, as in
            // the `S+` state-type attribute.
            if rhs.is_atom_named("") {
                match (&lhs, op.as_str()) {
                    (TriggerTree::Atom { text, .. }, "+" | "-") => {
                        lhs = TriggerTree::atom(format!("{text}{op}"), self.location.clone());
                        continue;
                    }
                    _ => return Err(self.error(format!("missing right operand for `{op}`"))),
                }
            }
            lhs = TriggerTree::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
                location: self.location.clone(),
            };
        }
        Ok(lhs)
    }

    fn parse_operand(&mut self) -> Result<TriggerTree, TranslationError> {
        // Comparisons may omit their left operand (`AnimElem = 1, >= 2`);
        // a terminator in operand position is the atom-suffix case.
        if self.at_terminator()
            || matches!(
                self.peek(),
                Some(Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::Eq | Token::NotEq)
            )
        {
            return Ok(TriggerTree::atom("", self.location.clone()));
        }
        match self.bump().ok_or_else(|| self.error("unexpected end of input"))? {
            Token::Not => self.parse_unary("!"),
            Token::Tilde => self.parse_unary("~"),
            Token::Minus => self.parse_unary("-"),
            Token::Number(text) => Ok(TriggerTree::atom(text, self.location.clone())),
            Token::Str(text) => Ok(TriggerTree::atom(text, self.location.clone())),
            Token::LBracket => self.parse_interval('['),
            Token::LParen => {
                let inner = self.parse_expr(OPERAND_POWER)?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    Some(Token::Comma) => {
                        self.pos -= 1;
                        self.finish_interval('(', inner)
                    }
                    _ => Err(self.error("unclosed parenthesis")),
                }
            }
            Token::Ident(first) => self.parse_name(first),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_unary(&mut self, op: &str) -> Result<TriggerTree, TranslationError> {
        let child = self.parse_expr(OPERAND_POWER)?;
        Ok(TriggerTree::Unary {
            op: op.to_string(),
            child: Box::new(child),
            location: self.location.clone(),
        })
    }

    fn parse_interval(&mut self, open: char) -> Result<TriggerTree, TranslationError> {
        let lower = self.parse_expr(OPERAND_POWER)?;
        self.finish_interval(open, lower)
    }

    fn finish_interval(
        &mut self,
        open: char,
        lower: TriggerTree,
    ) -> Result<TriggerTree, TranslationError> {
        self.expect(Token::Comma, "interval is missing a comma")?;
        let upper = self.parse_expr(OPERAND_POWER)?;
        let close = match self.bump() {
            Some(Token::RBracket) => ']',
            Some(Token::RParen) => ')',
            _ => return Err(self.error("interval is missing a closing bracket")),
        };
        Ok(TriggerTree::Interval {
            open,
            close,
            lower: Box::new(lower),
            upper: Box::new(upper),
            location: self.location.clone(),
        })
    }

    /// Adjacent identifiers join with a single space; a joined name denotes
    /// a structure access (`Vel y`).
    fn merged_name(&mut self, first: String) -> String {
        let mut name = first;
        while let Some(Token::Ident(next)) = self.peek() {
            name.push(' ');
            name.push_str(next);
            self.pos += 1;
        }
        name
    }

    fn parse_name(&mut self, first: String) -> Result<TriggerTree, TranslationError> {
        let name = self.merged_name(first);
        let lowered = name.to_ascii_lowercase();
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let args = self.parse_args()?;
            let is_target = TARGET_FUNCS.contains(&lowered.as_str());
            let call = TriggerTree::Call {
                name: if is_target { lowered.clone() } else { name },
                args,
                location: self.location.clone(),
            };
            if is_target && lowered != "rescope" && self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                return self.finish_redirect(call);
            }
            return Ok(call);
        }
        if TARGET_NAMES.contains(&lowered.as_str()) && self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            let target = TriggerTree::atom(lowered, self.location.clone());
            return self.finish_redirect(target);
        }
        if name.contains(' ') {
            return Ok(TriggerTree::StructAccess {
                path: name,
                location: self.location.clone(),
            });
        }
        Ok(TriggerTree::atom(name, self.location.clone()))
    }

    fn finish_redirect(&mut self, target: TriggerTree) -> Result<TriggerTree, TranslationError> {
        let body = self.parse_operand()?;
        if body.is_atom_named("") {
            return Err(self.error("redirect is missing its body expression"));
        }
        Ok(TriggerTree::Redirect {
            target: Box::new(target),
            body: Box::new(body),
            location: self.location.clone(),
        })
    }

    fn parse_args(&mut self) -> Result<Vec<TriggerTree>, TranslationError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(OPERAND_POWER)?);
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error("unclosed argument list")),
            }
        }
    }
}

/// Rewrites the multi-valued `AnimElem` comparison forms into the
/// single-valued `AnimElemTime` call the emitter understands:
/// `AnimElem = 1, 2` becomes `AnimElemTime(1) = 2`, and
/// `AnimElem = 1, >= 2` becomes `AnimElemTime(1) >= 2`.
fn fix_multivalue(tree: &mut TriggerTree) -> Result<(), TranslationError> {
    if let TriggerTree::MultiValue { children, location } = tree {
        if children.len() == 2 {
            if let TriggerTree::Binary { op, left, right, .. } = &children[0] {
                if let TriggerTree::Atom { text, .. } = left.as_ref() {
                    let head = text.to_ascii_lowercase();
                    if head == "animelem" {
                        let elem_call = TriggerTree::Call {
                            name: "AnimElemTime".to_string(),
                            args: vec![right.as_ref().clone()],
                            location: location.clone(),
                        };
                        let rewritten = match &children[1] {
                            TriggerTree::Atom { .. } | TriggerTree::Unary { .. } => {
                                TriggerTree::Binary {
                                    op: op.clone(),
                                    left: Box::new(elem_call),
                                    right: Box::new(children[1].clone()),
                                    location: location.clone(),
                                }
                            }
                            TriggerTree::Binary {
                                op: cmp_op,
                                left: empty,
                                right: bound,
                                ..
                            } if empty.is_atom_named("") => TriggerTree::Binary {
                                op: cmp_op.clone(),
                                left: Box::new(elem_call),
                                right: bound.clone(),
                                location: location.clone(),
                            },
                            _ => return Ok(()),
                        };
                        *tree = rewritten;
                        return fix_multivalue(tree);
                    }
                    if head.starts_with("projhit")
                        || head.starts_with("projguarded")
                        || head.starts_with("projcontact")
                    {
                        return Err(TranslationError::new(
                            "UNSUPPORTED_TRIGGER",
                            "can't yet handle proj-ID triggers, check back later",
                        )
                        .at(location.clone()));
                    }
                }
            }
        }
    }
    for child in tree.children_mut() {
        fix_multivalue(child)?;
    }
    Ok(())
}

/// `rescope(source, target)` arguments come out of redirect detection as a
/// single redirect node; unpack them back into an argument list.
fn fix_rescope(tree: &mut TriggerTree) {
    if let TriggerTree::Call { name, args, .. } = tree {
        if name.eq_ignore_ascii_case("rescope") {
            let mut unpacked = Vec::with_capacity(args.len() + 1);
            for arg in args.drain(..) {
                if let TriggerTree::Redirect { target, body, .. } = arg {
                    unpacked.push(*target);
                    unpacked.push(*body);
                } else {
                    unpacked.push(arg);
                }
            }
            *args = unpacked;
        }
    }
    for child in tree.children_mut() {
        fix_rescope(child);
    }
}

/// Parses one trigger expression line to a tree. A root-level comma produces
/// a multi-value node; single results are returned unwrapped.
pub fn parse_trigger(text: &str, location: &Location) -> Result<TriggerTree, TranslationError> {
    let mut tokens = Vec::new();
    for result in Token::lexer(text) {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(TranslationError::new(
                    "TRIGGER_SYNTAX",
                    format!("unrecognized character in trigger expression: {text}"),
                )
                .at(location.clone()))
            }
        }
    }
    let mut parser = TriggerParser {
        tokens,
        pos: 0,
        location: location.clone(),
    };
    let mut values = vec![parser.parse_expr(OPERAND_POWER)?];
    while parser.peek() == Some(&Token::Comma) {
        parser.pos += 1;
        values.push(parser.parse_expr(OPERAND_POWER)?);
    }
    if parser.peek().is_some() {
        return Err(parser.error("trailing input after expression"));
    }
    let mut tree = if values.len() == 1 {
        values.into_iter().next().ok_or_else(|| {
            TranslationError::new("TRIGGER_SYNTAX", "empty trigger expression")
                .at(location.clone())
        })?
    } else {
        TriggerTree::MultiValue {
            children: values,
            location: location.clone(),
        }
    };
    fix_multivalue(&mut tree)?;
    fix_rescope(&mut tree);
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> TriggerTree {
        parse_trigger(text, &Location::new("test.mtl", 1)).expect("expression should parse")
    }

    fn binary(tree: &TriggerTree) -> (&str, &TriggerTree, &TriggerTree) {
        match tree {
            TriggerTree::Binary { op, left, right, .. } => (op.as_str(), left, right),
            other => panic!("expected binary node, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_binds_looser_than_logic() {
        // The ladder groups addition before multiplication.
        let tree = parse("1 + 2 * 3");
        let (op, left, _) = binary(&tree);
        assert_eq!(op, "*");
        assert_eq!(binary(left).0, "+");
    }

    #[test]
    fn equality_binds_looser_than_logical_or() {
        let tree = parse("a = 1 || b");
        let (op, _, right) = binary(&tree);
        assert_eq!(op, "=");
        assert_eq!(binary(right).0, "||");
    }

    #[test]
    fn unary_captures_the_whole_chain() {
        let tree = parse("!Time = 5");
        let TriggerTree::Unary { op, child, .. } = &tree else {
            panic!("expected unary root, got {tree:?}");
        };
        assert_eq!(op, "!");
        assert_eq!(binary(child).0, "=");
    }

    #[test]
    fn walrus_is_right_associative() {
        let tree = parse("a := b := 1");
        let (op, _, right) = binary(&tree);
        assert_eq!(op, ":=");
        assert_eq!(binary(right).0, ":=");
    }

    #[test]
    fn interval_parses_as_comparison_operand() {
        let tree = parse("Time = [1, 5)");
        let (op, _, right) = binary(&tree);
        assert_eq!(op, "=");
        let TriggerTree::Interval { open, close, .. } = right else {
            panic!("expected interval, got {right:?}");
        };
        assert_eq!((*open, *close), ('[', ')'));
    }

    #[test]
    fn parenthesized_expression_is_grouping_not_interval() {
        let tree = parse("(1 + 2) * 3");
        let (op, left, _) = binary(&tree);
        assert_eq!(op, "*");
        assert_eq!(binary(left).0, "+");
    }

    #[test]
    fn bare_redirect_takes_a_call_body() {
        let tree = parse("parent, var(3)");
        let TriggerTree::Redirect { target, body, .. } = &tree else {
            panic!("expected redirect, got {tree:?}");
        };
        assert!(target.is_atom_named("parent"));
        assert!(matches!(body.as_ref(), TriggerTree::Call { name, .. } if name == "var"));
    }

    #[test]
    fn call_form_redirect_keeps_its_argument() {
        let tree = parse("helper(1400), Time");
        let TriggerTree::Redirect { target, .. } = &tree else {
            panic!("expected redirect, got {tree:?}");
        };
        let TriggerTree::Call { name, args, .. } = target.as_ref() else {
            panic!("expected call target, got {target:?}");
        };
        assert_eq!(name, "helper");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn redirect_body_binds_before_outer_operators() {
        let tree = parse("root, var(5) = 1");
        let (op, left, _) = binary(&tree);
        assert_eq!(op, "=");
        assert!(matches!(left, TriggerTree::Redirect { .. }));
    }

    #[test]
    fn spaced_identifier_is_a_struct_access() {
        let tree = parse("Vel y");
        assert!(matches!(&tree, TriggerTree::StructAccess { path, .. } if path == "Vel y"));
    }

    #[test]
    fn root_comma_builds_a_multivalue() {
        let tree = parse("SCA, NA");
        let TriggerTree::MultiValue { children, .. } = &tree else {
            panic!("expected multivalue, got {tree:?}");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn plus_suffix_merges_into_the_atom() {
        let tree = parse("S+");
        assert!(tree.is_atom_named("S+"));
    }

    #[test]
    fn animelem_with_plain_bound_becomes_animelemtime_equality() {
        let tree = parse("AnimElem = 2, 3");
        let (op, left, right) = binary(&tree);
        assert_eq!(op, "=");
        let TriggerTree::Call { name, args, .. } = left else {
            panic!("expected call, got {left:?}");
        };
        assert_eq!(name, "AnimElemTime");
        assert!(args[0].is_atom_named("2"));
        assert!(right.is_atom_named("3"));
    }

    #[test]
    fn animelem_with_comparison_bound_keeps_the_comparison() {
        let tree = parse("AnimElem = 2, >= 1");
        let (op, left, right) = binary(&tree);
        assert_eq!(op, ">=");
        assert!(matches!(left, TriggerTree::Call { name, .. } if name == "AnimElemTime"));
        assert!(right.is_atom_named("1"));
    }

    #[test]
    fn proj_id_triggers_are_rejected() {
        let err = parse_trigger("ProjHit = 1, 1", &Location::new("t.mtl", 1))
            .expect_err("proj triggers should be rejected");
        assert_eq!(err.code, "UNSUPPORTED_TRIGGER");
    }

    #[test]
    fn rescope_arguments_are_flattened() {
        let tree = parse("rescope(target, root)");
        let TriggerTree::Call { name, args, .. } = &tree else {
            panic!("expected call, got {tree:?}");
        };
        assert_eq!(name, "rescope");
        assert_eq!(args.len(), 2);
        assert!(args[0].is_atom_named("target"));
        assert!(args[1].is_atom_named("root"));
    }

    #[test]
    fn string_atoms_keep_their_quotes() {
        let tree = parse("Command = \"hold fwd\"");
        let (_, _, right) = binary(&tree);
        assert!(matches!(right, TriggerTree::Atom { text, .. } if text == "\"hold fwd\""));
    }

    #[test]
    fn syntax_errors_carry_the_source_location() {
        let err = parse_trigger("1 + (", &Location::new("bad.mtl", 7))
            .expect_err("unclosed paren should fail");
        assert_eq!(err.code, "TRIGGER_SYNTAX");
        assert_eq!(err.location.as_ref().map(|l| l.line), Some(7));
    }
}
