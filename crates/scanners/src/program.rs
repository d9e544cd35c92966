//! Parsed contract model consumed by the analysis core.
//!
//! ## Why a closed variant hierarchy?
//!
//! The analyzer never parses Solidity itself - an external front end hands it
//! a `Program` in exactly this shape. Modeling statements and expressions as
//! closed enums (rather than a generic node-with-attributes tree) means every
//! analysis pass is an exhaustive `match`: a node shape the pass does not
//! understand is an explicit arm, not a silent lookup failure.
//!
//! The model is read-only for the core with one exception: the constructor
//! state pass annotates `StateVariable::initializer` on the per-analysis copy
//! produced by inheritance resolution. The `Program` handed in by the front
//! end is never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Member names through which control can transfer to untrusted code.
pub const INTERACTION_MEMBERS: &[&str] = &["call", "send", "transfer", "delegatecall"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub contracts: BTreeMap<String, Contract>,
    pub imports: Vec<Import>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contract(mut self, contract: Contract) -> Self {
        self.contracts.insert(contract.name.clone(), contract);
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    /// Path of the compilation unit that defines `contract`, if it is one of
    /// the imported units rather than the current file.
    pub fn source_file_of(&self, contract: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|import| import.unit.contracts.contains_key(contract))
            .map(|import| import.path.as_str())
    }
}

/// An import edge: a compilation unit plus the aliases under which its
/// top-level contracts are visible in the importing file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    /// Defined contract name -> alias in the importing file. Empty when the
    /// import carries no symbol aliases.
    pub aliases: BTreeMap<String, String>,
    pub unit: CompilationUnit,
}

impl Import {
    pub fn new(path: impl Into<String>, unit: CompilationUnit) -> Self {
        Self {
            path: path.into(),
            aliases: BTreeMap::new(),
            unit,
        }
    }

    pub fn with_alias(mut self, defined: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.insert(defined.into(), alias.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub contracts: BTreeMap<String, Contract>,
}

impl CompilationUnit {
    pub fn with_contract(mut self, contract: Contract) -> Self {
        self.contracts.insert(contract.name.clone(), contract);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    /// Base contract names in declaration order. Order is load-bearing: on a
    /// member-name collision between bases, the first declared base wins.
    pub bases: Vec<String>,
    pub state_vars: BTreeMap<String, StateVariable>,
    pub functions: BTreeMap<String, Function>,
    pub modifiers: BTreeMap<String, Modifier>,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            state_vars: BTreeMap::new(),
            functions: BTreeMap::new(),
            modifiers: BTreeMap::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn with_state_var(mut self, var: StateVariable) -> Self {
        self.state_vars.insert(var.name.clone(), var);
        self
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.insert(function.name.clone(), function);
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.insert(modifier.name.clone(), modifier);
        self
    }
}

/// Declared type classification of a state variable. The analyzer only needs
/// enough type information to pick language-default initial values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    Bool,
    Integer,
    Address,
    Mapping,
    Array,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    pub kind: VarKind,
    /// Known initializer, either declared inline or recovered from the
    /// constructor by the constructor-state pass. `None` means the variable
    /// starts at its language default (bool false, integer zero) or is
    /// simply unknown.
    pub initializer: Option<Expression>,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            initializer: None,
        }
    }

    pub fn with_initializer(mut self, expr: Expression) -> Self {
        self.initializer = Some(expr);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub visibility: Visibility,
    pub is_constructor: bool,
    pub modifiers: Vec<ModifierInvocation>,
    pub body: Vec<Statement>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            visibility: Visibility::default(),
            is_constructor: false,
            modifiers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn constructor(name: impl Into<String>) -> Self {
        let mut function = Self::new(name);
        function.is_constructor = true;
        function
    }

    pub fn with_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modifier(mut self, invocation: ModifierInvocation) -> Self {
        self.modifiers.push(invocation);
        self
    }

    pub fn with_body(mut self, body: Vec<Statement>) -> Self {
        self.body = body;
        self
    }

    /// Cheap pre-filter: does any expression in the body reach one of the
    /// interaction members? A function without any such access cannot open
    /// an interaction window and is skipped by default.
    pub fn has_interaction(&self) -> bool {
        self.body.iter().any(Statement::contains_interaction)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierInvocation {
    pub name: String,
    pub arguments: Vec<Expression>,
}

impl ModifierInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

impl Modifier {
    pub fn new(name: impl Into<String>, body: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            body,
        }
    }
}

/// One variable bound by a declaration statement. `is_storage` marks the
/// explicit `storage` location qualifier: mutating such a local is mutating
/// the aliased state variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredVariable {
    pub name: String,
    pub is_storage: bool,
}

impl DeclaredVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_storage: false,
        }
    }

    pub fn storage(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_storage: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    VariableDeclaration {
        variables: Vec<DeclaredVariable>,
        initializer: Option<Expression>,
    },
    Expression(Expression),
    If {
        condition: Expression,
        true_branch: Option<Box<Statement>>,
        false_branch: Option<Box<Statement>>,
    },
    Revert,
    Emit(Expression),
    /// The `_;` marker inside a modifier body where the wrapped function runs.
    Placeholder,
    Return(Option<Expression>),
    Block(Vec<Statement>),
}

impl Statement {
    pub fn expr(expression: Expression) -> Self {
        Self::Expression(expression)
    }

    pub fn declare(variable: DeclaredVariable, initializer: Option<Expression>) -> Self {
        Self::VariableDeclaration {
            variables: vec![variable],
            initializer,
        }
    }

    pub fn if_then(condition: Expression, true_branch: Statement) -> Self {
        Self::If {
            condition,
            true_branch: Some(Box::new(true_branch)),
            false_branch: None,
        }
    }

    pub fn if_else(condition: Expression, true_branch: Statement, false_branch: Statement) -> Self {
        Self::If {
            condition,
            true_branch: Some(Box::new(true_branch)),
            false_branch: Some(Box::new(false_branch)),
        }
    }

    pub fn contains_interaction(&self) -> bool {
        match self {
            Self::VariableDeclaration { initializer, .. } => initializer
                .as_ref()
                .map(Expression::contains_interaction)
                .unwrap_or(false),
            Self::Expression(e) | Self::Emit(e) => e.contains_interaction(),
            Self::If {
                condition,
                true_branch,
                false_branch,
            } => {
                condition.contains_interaction()
                    || true_branch
                        .as_deref()
                        .map(Statement::contains_interaction)
                        .unwrap_or(false)
                    || false_branch
                        .as_deref()
                        .map(Statement::contains_interaction)
                        .unwrap_or(false)
            }
            Self::Return(e) => e
                .as_ref()
                .map(Expression::contains_interaction)
                .unwrap_or(false),
            Self::Block(stmts) => stmts.iter().any(Statement::contains_interaction),
            Self::Revert | Self::Placeholder => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Assign,
    AddAssign,
    SubAssign,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Other,
}

impl BinaryOperator {
    pub fn is_assignment(self) -> bool {
        matches!(self, Self::Assign | Self::AddAssign | Self::SubAssign)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Increment,
    Decrement,
    Negate,
    Other,
}

impl UnaryOperator {
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Increment | Self::Decrement)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Bool(bool),
    Number(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Identifier(String),
    MemberAccess {
        base: Box<Expression>,
        member: String,
    },
    IndexAccess {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    FunctionCall {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
        prefix: bool,
    },
    Literal(Literal),
    Tuple(Vec<Expression>),
}

impl Expression {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn member(base: Expression, member: impl Into<String>) -> Self {
        Self::MemberAccess {
            base: Box::new(base),
            member: member.into(),
        }
    }

    pub fn index(base: Expression, index: Expression) -> Self {
        Self::IndexAccess {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Self {
        Self::FunctionCall {
            callee: Box::new(callee),
            arguments,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression, prefix: bool) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
            prefix,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Bool(value))
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Number(value.into()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Str(value.into()))
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Name mutated by an lvalue: a bare identifier, or the base identifier
    /// of an index access (`balances[k]` mutates `balances`). Anything else
    /// (member lvalues, nested index bases) is not tracked.
    pub fn mutation_target(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            Self::IndexAccess { base, .. } => base.as_identifier(),
            _ => None,
        }
    }

    /// Does this expression, used as a call target, reach an interaction
    /// member? Unwraps chained member/call/index layers so both
    /// `target.call(..)` and the legacy `target.call.value(x)(..)` resolve.
    pub fn is_interaction_callee(&self) -> bool {
        match self {
            Self::MemberAccess { base, member } => {
                INTERACTION_MEMBERS.contains(&member.as_str()) || base.is_interaction_callee()
            }
            Self::FunctionCall { callee, .. } => callee.is_interaction_callee(),
            Self::IndexAccess { base, .. } => base.is_interaction_callee(),
            _ => false,
        }
    }

    /// A function call whose target is an interaction member.
    pub fn is_interaction_call(&self) -> bool {
        match self {
            Self::FunctionCall { callee, .. } => callee.is_interaction_callee(),
            _ => false,
        }
    }

    pub fn contains_interaction(&self) -> bool {
        match self {
            Self::MemberAccess { base, member } => {
                INTERACTION_MEMBERS.contains(&member.as_str()) || base.contains_interaction()
            }
            Self::IndexAccess { base, index } => {
                base.contains_interaction() || index.contains_interaction()
            }
            Self::FunctionCall { callee, arguments } => {
                callee.contains_interaction()
                    || arguments.iter().any(Expression::contains_interaction)
            }
            Self::Binary { left, right, .. } => {
                left.contains_interaction() || right.contains_interaction()
            }
            Self::Unary { operand, .. } => operand.contains_interaction(),
            Self::Tuple(components) => components.iter().any(Expression::contains_interaction),
            Self::Identifier(_) | Self::Literal(_) => false,
        }
    }
}
