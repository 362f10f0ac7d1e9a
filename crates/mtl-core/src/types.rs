use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A `(file, line)` pair carried by every parsed artifact and preserved
/// through every transformation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location attributed to the compiler itself rather than user source.
    pub fn internal() -> Self {
        Self {
            file: "<compiler>".to_string(),
            line: 0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Parsed form of a trigger expression.
///
/// Trees are immutable after parsing except during the expansion passes,
/// which substitute subtrees in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TriggerTree {
    /// Literal, identifier, or enum constant.
    Atom { text: String, location: Location },
    Unary {
        op: String,
        child: Box<TriggerTree>,
        location: Location,
    },
    Binary {
        op: String,
        left: Box<TriggerTree>,
        right: Box<TriggerTree>,
        location: Location,
    },
    /// Half-open/closed range such as `[a, b)`.
    Interval {
        open: char,
        close: char,
        lower: Box<TriggerTree>,
        upper: Box<TriggerTree>,
        location: Location,
    },
    Call {
        name: String,
        args: Vec<TriggerTree>,
        location: Location,
    },
    /// Space-separated structure access, e.g. `Vel y`.
    StructAccess { path: String, location: Location },
    /// Comma-separated result tuple; only legal at the expression root.
    MultiValue {
        children: Vec<TriggerTree>,
        location: Location,
    },
    /// Engine-scoped indirection, e.g. `parent, var(3)`.
    Redirect {
        target: Box<TriggerTree>,
        body: Box<TriggerTree>,
        location: Location,
    },
}

impl TriggerTree {
    pub fn atom(text: impl Into<String>, location: Location) -> Self {
        TriggerTree::Atom {
            text: text.into(),
            location,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            TriggerTree::Atom { location, .. }
            | TriggerTree::Unary { location, .. }
            | TriggerTree::Binary { location, .. }
            | TriggerTree::Interval { location, .. }
            | TriggerTree::Call { location, .. }
            | TriggerTree::StructAccess { location, .. }
            | TriggerTree::MultiValue { location, .. }
            | TriggerTree::Redirect { location, .. } => location,
        }
    }

    pub fn children(&self) -> Vec<&TriggerTree> {
        match self {
            TriggerTree::Atom { .. } | TriggerTree::StructAccess { .. } => Vec::new(),
            TriggerTree::Unary { child, .. } => vec![child],
            TriggerTree::Binary { left, right, .. } => vec![left, right],
            TriggerTree::Interval { lower, upper, .. } => vec![lower, upper],
            TriggerTree::Call { args, .. } => args.iter().collect(),
            TriggerTree::MultiValue { children, .. } => children.iter().collect(),
            TriggerTree::Redirect { target, body, .. } => vec![target, body],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut TriggerTree> {
        match self {
            TriggerTree::Atom { .. } | TriggerTree::StructAccess { .. } => Vec::new(),
            TriggerTree::Unary { child, .. } => vec![child],
            TriggerTree::Binary { left, right, .. } => vec![left, right],
            TriggerTree::Interval { lower, upper, .. } => vec![lower, upper],
            TriggerTree::Call { args, .. } => args.iter_mut().collect(),
            TriggerTree::MultiValue { children, .. } => children.iter_mut().collect(),
            TriggerTree::Redirect { target, body, .. } => vec![target.as_mut(), body.as_mut()],
        }
    }

    /// True when the tree is a bare identifier equal to `name` (case-insensitive).
    pub fn is_atom_named(&self, name: &str) -> bool {
        matches!(self, TriggerTree::Atom { text, .. } if text.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Builtin,
    /// Exists for checking but cannot instantiate variables.
    BuiltinDeny,
    BuiltinStructure,
    Alias,
    Union,
    Enum,
    Flag,
    StringEnum,
    StringFlag,
    Structure,
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TypeCategory::Builtin => "BUILTIN",
            TypeCategory::BuiltinDeny => "BUILTIN_DENY",
            TypeCategory::BuiltinStructure => "BUILTIN_STRUCTURE",
            TypeCategory::Alias => "ALIAS",
            TypeCategory::Union => "UNION",
            TypeCategory::Enum => "ENUM",
            TypeCategory::Flag => "FLAG",
            TypeCategory::StringEnum => "STRING_ENUM",
            TypeCategory::StringFlag => "STRING_FLAG",
            TypeCategory::Structure => "STRUCTURE",
        };
        f.write_str(text)
    }
}

/// A named type. Members are interpreted per category: the alias target for
/// `Alias`, member type names for `Union`, constant names for enums and
/// flags, `"field:typename"` entries for structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub category: TypeCategory,
    pub size: u32,
    pub members: Vec<String>,
    pub location: Location,
}

impl TypeDefinition {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn can_instantiate(&self) -> bool {
        !matches!(self.category, TypeCategory::BuiltinDeny)
    }
}

/// `(type, required, repeat)` — encodes optional and variadic trailing
/// positions in template parameter lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpecifier {
    pub ty: TypeDefinition,
    pub required: bool,
    pub repeat: bool,
}

impl TypeSpecifier {
    pub fn of(ty: TypeDefinition) -> Self {
        Self {
            ty,
            required: true,
            repeat: false,
        }
    }
}

/// Textual shaping strategy for built-in triggers that do not lower to a
/// plain call, such as the `operator` family and `cond`/`ifelse`/`cast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstEvaluator {
    Cond,
    Cast,
    Not,
    Negate,
    BitNot,
    Infix(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCategory {
    Builtin,
    User,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerParam {
    pub name: String,
    pub ty: TypeDefinition,
}

/// A trigger function: named, typed, overloaded on parameter signature.
/// Built-ins have no body; user triggers carry an expression body that the
/// inliner substitutes at call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub name: String,
    pub return_type: TypeDefinition,
    pub const_eval: Option<ConstEvaluator>,
    pub params: Vec<TriggerParam>,
    pub body: Option<TriggerTree>,
    pub location: Location,
    pub category: TriggerCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Builtin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    pub name: String,
    /// Acceptable positional type alternatives; multi-entry lists encode
    /// tuple-valued properties such as `pos = x, y`.
    pub specs: Vec<TypeSpecifier>,
    pub required: bool,
}

impl TemplateParameter {
    pub fn new(name: impl Into<String>, specs: Vec<TypeSpecifier>, required: bool) -> Self {
        Self {
            name: name.into(),
            specs,
            required,
        }
    }
}

/// A parameterized bundle of state controllers. Built-in templates stand for
/// the engine's native state-controller kinds and have no controller list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub name: String,
    pub params: Vec<TemplateParameter>,
    pub locals: Vec<Variable>,
    pub controllers: Vec<StateController>,
    pub location: Location,
    pub category: TemplateCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Shared,
    Player,
    Helper,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ScopeKind::Shared => "shared",
            ScopeKind::Player => "player",
            ScopeKind::Helper => "helper",
        };
        f.write_str(text)
    }
}

/// Variable scope: which entity kind owns the numeric slot tables a
/// variable is packed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateScope {
    pub kind: ScopeKind,
    /// Helper state number, when the scope is pinned to a specific helper.
    pub target: Option<i32>,
}

impl StateScope {
    pub fn shared() -> Self {
        Self {
            kind: ScopeKind::Shared,
            target: None,
        }
    }

    pub fn player() -> Self {
        Self {
            kind: ScopeKind::Player,
            target: None,
        }
    }

    pub fn helper(target: Option<i32>) -> Self {
        Self {
            kind: ScopeKind::Helper,
            target,
        }
    }

    /// A variable defined in `definition` is visible from `use_site` when the
    /// scopes match, or when the definition is shared.
    pub fn compatible(use_site: StateScope, definition: StateScope) -> bool {
        if use_site == definition {
            return true;
        }
        matches!(use_site.kind, ScopeKind::Player | ScopeKind::Helper)
            && definition.kind == ScopeKind::Shared
    }
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{}({})", self.kind, target),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A typed variable (state local, template local, or discovered global)
/// together with the slot regions the packer assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: TypeDefinition,
    pub scope: StateScope,
    pub location: Location,
    pub default: Option<TriggerTree>,
    /// `(slot_index, bit_offset)` pairs; one entry after packing.
    pub allocations: Vec<(u32, u32)>,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        ty: TypeDefinition,
        scope: StateScope,
        location: Location,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            scope,
            location,
            default: None,
            allocations: Vec::new(),
        }
    }
}

/// Key of the `triggerall` group; numbered groups start at 1.
pub const TRIGGER_GROUP_ALL: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerProperty {
    pub key: String,
    pub value: TriggerTree,
}

/// An instance of a template inside a state definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateController {
    /// Template name (`type =` property).
    pub kind: String,
    /// Trigger groups keyed by id; 0 is `triggerall`.
    pub triggers: BTreeMap<u32, Vec<TriggerTree>>,
    /// Ordered non-trigger properties.
    pub properties: Vec<ControllerProperty>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub name: String,
    /// Allowlisted statedef header properties, raw values, insertion order.
    pub params: Vec<(String, String)>,
    pub locals: Vec<Variable>,
    pub controllers: Vec<StateController>,
    pub scope: StateScope,
    pub is_common: bool,
    pub location: Location,
}

/// Emitter output for one trigger tree: a concrete type plus value text.
/// Variable accesses additionally carry their allocation so that walrus
/// assignment can switch to write-mask form.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub ty: TypeDefinition,
    pub value: String,
    pub allocation: Option<(u32, u32)>,
    pub is_float: bool,
}

impl Expression {
    pub fn plain(ty: TypeDefinition, value: impl Into<String>) -> Self {
        Self {
            ty,
            value: value.into(),
            allocation: None,
            is_float: false,
        }
    }

    pub fn variable(ty: TypeDefinition, value: impl Into<String>, allocation: (u32, u32), is_float: bool) -> Self {
        Self {
            ty,
            value: value.into(),
            allocation: Some(allocation),
            is_float,
        }
    }
}

pub const INT_SLOT_COUNT: u32 = 60;
pub const FLOAT_SLOT_COUNT: u32 = 40;
/// Top slots of each table left to the engine.
pub const SYSTEM_RESERVED_SLOTS: u32 = 5;
pub const SLOT_WIDTH: u32 = 32;

/// Bit-range bookkeeping for one numeric slot array of one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationTable {
    pub slot_count: u32,
    pub reserved: u32,
    /// Occupied `(offset, size)` ranges per slot, kept sorted by offset.
    pub used: BTreeMap<u32, Vec<(u32, u32)>>,
}

impl AllocationTable {
    pub fn ints() -> Self {
        Self {
            slot_count: INT_SLOT_COUNT,
            reserved: SYSTEM_RESERVED_SLOTS,
            used: BTreeMap::new(),
        }
    }

    pub fn floats() -> Self {
        Self {
            slot_count: FLOAT_SLOT_COUNT,
            reserved: SYSTEM_RESERVED_SLOTS,
            used: BTreeMap::new(),
        }
    }

    fn usable_slots(&self) -> u32 {
        self.slot_count - self.reserved
    }

    fn fit_in_slot(&self, slot: u32, size: u32) -> Option<u32> {
        let ranges = self.used.get(&slot).map(Vec::as_slice).unwrap_or(&[]);
        let mut offset = 0u32;
        for (start, len) in ranges {
            if offset + size <= *start {
                return Some(offset);
            }
            offset = start + len;
        }
        if offset + size <= SLOT_WIDTH {
            Some(offset)
        } else {
            None
        }
    }

    /// Whether a specific `(slot, offset, size)` region is unoccupied.
    pub fn region_free(&self, slot: u32, offset: u32, size: u32) -> bool {
        if slot >= self.usable_slots() || offset + size > SLOT_WIDTH {
            return false;
        }
        let ranges = self.used.get(&slot).map(Vec::as_slice).unwrap_or(&[]);
        ranges
            .iter()
            .all(|(start, len)| offset + size <= *start || start + len <= offset)
    }

    /// Marks a specific region occupied. Used to mirror shared-scope
    /// variables into both scope tables at identical positions.
    pub fn reserve(&mut self, slot: u32, offset: u32, size: u32) {
        self.occupy(slot, offset, size);
    }

    fn occupy(&mut self, slot: u32, offset: u32, size: u32) {
        let ranges = self.used.entry(slot).or_default();
        ranges.push((offset, size));
        ranges.sort_unstable();
    }

    /// Greedy first-fit: partially used slots are preferred over fresh ones,
    /// and a value is never split across slots.
    pub fn allocate(&mut self, size: u32) -> Option<(u32, u32)> {
        debug_assert!(size >= 1 && size <= SLOT_WIDTH);
        if size < SLOT_WIDTH {
            for slot in 0..self.usable_slots() {
                if !self.used.contains_key(&slot) {
                    continue;
                }
                if let Some(offset) = self.fit_in_slot(slot, size) {
                    self.occupy(slot, offset, size);
                    return Some((slot, offset));
                }
            }
        }
        for slot in 0..self.usable_slots() {
            if self.used.contains_key(&slot) && size == SLOT_WIDTH {
                continue;
            }
            if let Some(offset) = self.fit_in_slot(slot, size) {
                self.occupy(slot, offset, size);
                return Some((slot, offset));
            }
        }
        None
    }
}

/// Both slot arrays of one scope kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeAllocations {
    pub scope: StateScope,
    pub ints: AllocationTable,
    pub floats: AllocationTable,
}

impl ScopeAllocations {
    pub fn new(scope: StateScope) -> Self {
        Self {
            scope,
            ints: AllocationTable::ints(),
            floats: AllocationTable::floats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_type() -> TypeDefinition {
        TypeDefinition {
            name: "int".to_string(),
            category: TypeCategory::Builtin,
            size: 32,
            members: Vec::new(),
            location: Location::internal(),
        }
    }

    #[test]
    fn location_formats_as_path_and_line() {
        let location = Location::new("chars/kfm.mtl", 42);
        assert_eq!(location.to_string(), "chars/kfm.mtl:42");
    }

    #[test]
    fn allocation_packs_bools_into_one_slot_and_int_into_a_fresh_one() {
        let mut table = AllocationTable::ints();
        for expected_offset in 0..4 {
            let (slot, offset) = table.allocate(1).expect("bool should fit");
            assert_eq!((slot, offset), (0, expected_offset));
        }
        let (slot, offset) = table.allocate(32).expect("int should fit");
        assert_eq!((slot, offset), (1, 0));
    }

    #[test]
    fn allocation_prefers_partially_used_slots() {
        let mut table = AllocationTable::ints();
        table.allocate(8).expect("first byte");
        table.allocate(32).expect("whole slot");
        let (slot, offset) = table.allocate(8).expect("second byte");
        assert_eq!((slot, offset), (0, 8));
    }

    #[test]
    fn allocation_never_splits_across_slots() {
        let mut table = AllocationTable::ints();
        table.allocate(24).expect("first region");
        let (slot, offset) = table.allocate(16).expect("second region");
        assert_eq!((slot, offset), (1, 0));
    }

    #[test]
    fn allocation_respects_reserved_slots() {
        let mut table = AllocationTable::ints();
        for _ in 0..(INT_SLOT_COUNT - SYSTEM_RESERVED_SLOTS) {
            table.allocate(32).expect("usable slot");
        }
        assert!(table.allocate(32).is_none());
        assert!(table.allocate(1).is_none());
    }

    #[test]
    fn scope_compatibility_allows_shared_definitions_only_downward() {
        let shared = StateScope::shared();
        let player = StateScope::player();
        let helper = StateScope::helper(Some(44));
        assert!(StateScope::compatible(player, shared));
        assert!(StateScope::compatible(helper, shared));
        assert!(!StateScope::compatible(shared, player));
        assert!(!StateScope::compatible(player, helper));
    }

    #[test]
    fn trigger_tree_reports_children_for_each_shape() {
        let location = Location::internal();
        let tree = TriggerTree::Binary {
            op: "+".to_string(),
            left: Box::new(TriggerTree::atom("1", location.clone())),
            right: Box::new(TriggerTree::atom("2", location.clone())),
            location: location.clone(),
        };
        assert_eq!(tree.children().len(), 2);
        assert!(TriggerTree::atom("time", location).children().is_empty());
    }

    #[test]
    fn expression_serializes_variable_metadata_via_type() {
        let expr = Expression::variable(int_type(), "(var(3) & 255)", (3, 0), false);
        assert_eq!(expr.allocation, Some((3, 0)));
        assert!(!expr.is_float);
    }
}
