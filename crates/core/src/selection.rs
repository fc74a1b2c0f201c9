//! Selection descriptors
//!
//! Static description of the fields, arguments, type conditions, inclusion
//! conditions and defer labels an operation or fragment selects. Descriptors
//! are produced ahead of time (by a compiler) and are immutable; every read
//! and write is driven by one.
//!
//! # Example
//!
//! ```
//! use graphcache_core::selection::{Field, InputValue, Operation, OutputType, SelectionSet};
//! use serde_json::json;
//!
//! let hero = SelectionSet::new("Character")
//!     .field(Field::new("__typename", OutputType::scalar("String").non_null()))
//!     .field(Field::new("name", OutputType::scalar("String").non_null()));
//!
//! let query = SelectionSet::new("Query").field(
//!     Field::new("hero", OutputType::object(hero))
//!         .argument("episode", InputValue::variable("episode")),
//! );
//!
//! let operation = Operation::query("HeroName", query).variable("episode", json!("JEDI"));
//! assert_eq!(operation.root_key().as_str(), "QUERY_ROOT");
//! ```

use crate::key::RecordKey;
use crate::value::Scalar;
use indexmap::IndexMap;
use std::sync::Arc;

/// Variables bound for one operation execution
pub type Variables = IndexMap<String, Scalar>;

/// Argument value as written in the operation
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Inline constant
    Literal(Scalar),
    /// Reference to an operation variable
    Variable(String),
    /// List of input values
    List(Vec<InputValue>),
    /// Input object
    Object(IndexMap<String, InputValue>),
}

impl InputValue {
    /// Inline constant
    pub fn literal(value: impl Into<Scalar>) -> Self {
        InputValue::Literal(value.into())
    }

    /// Reference to a variable
    pub fn variable(name: impl Into<String>) -> Self {
        InputValue::Variable(name.into())
    }

    /// Resolve against bound variables; unbound variables resolve to null
    pub fn resolve(&self, variables: &Variables) -> Scalar {
        match self {
            InputValue::Literal(value) => value.clone(),
            InputValue::Variable(name) => variables.get(name).cloned().unwrap_or(Scalar::Null),
            InputValue::List(items) => {
                Scalar::Array(items.iter().map(|item| item.resolve(variables)).collect())
            }
            InputValue::Object(fields) => Scalar::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve(variables)))
                    .collect(),
            ),
        }
    }
}

/// One argument of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Argument name
    pub name: String,
    /// Argument value
    pub value: InputValue,
}

/// `@include(if: $var)` / `@skip(if: $var)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionCondition {
    /// Selected only when the variable is true
    Include(String),
    /// Selected only when the variable is false
    Skip(String),
}

impl InclusionCondition {
    /// Evaluate against bound variables
    ///
    /// Returns `Err(variable_name)` when the variable is not a boolean.
    pub fn evaluate(&self, variables: &Variables) -> Result<bool, String> {
        let (name, include_when) = match self {
            InclusionCondition::Include(name) => (name, true),
            InclusionCondition::Skip(name) => (name, false),
        };
        match variables.get(name).and_then(Scalar::as_bool) {
            Some(value) => Ok(value == include_when),
            None => Err(name.clone()),
        }
    }
}

/// Evaluate every condition; all must hold
pub fn conditions_met(conditions: &[InclusionCondition], variables: &Variables) -> Result<bool, String> {
    for condition in conditions {
        if !condition.evaluate(variables)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Declared type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum OutputType {
    /// Leaf type (scalar or enum) by name
    Scalar(String),
    /// Composite type with its sub-selection
    Object(Box<SelectionSet>),
    /// List of the inner type
    List(Box<OutputType>),
    /// Non-nullable wrapper
    NonNull(Box<OutputType>),
}

impl OutputType {
    /// Nullable leaf type
    pub fn scalar(name: impl Into<String>) -> Self {
        OutputType::Scalar(name.into())
    }

    /// Nullable composite type
    pub fn object(selection_set: SelectionSet) -> Self {
        OutputType::Object(Box::new(selection_set))
    }

    /// Wrap in a nullable list
    pub fn list(self) -> Self {
        OutputType::List(Box::new(self))
    }

    /// Wrap in non-null
    pub fn non_null(self) -> Self {
        match self {
            already @ OutputType::NonNull(_) => already,
            other => OutputType::NonNull(Box::new(other)),
        }
    }

    /// Check whether null is an acceptable value
    pub fn is_nullable(&self) -> bool {
        !matches!(self, OutputType::NonNull(_))
    }

    /// Strip a non-null wrapper, if any
    pub fn nullable_inner(&self) -> &OutputType {
        match self {
            OutputType::NonNull(inner) => inner,
            other => other,
        }
    }

    /// Check whether the named type is a composite (at any list depth)
    pub fn is_composite(&self) -> bool {
        match self {
            OutputType::Scalar(_) => false,
            OutputType::Object(_) => true,
            OutputType::List(inner) | OutputType::NonNull(inner) => inner.is_composite(),
        }
    }

    /// Check whether the type is a list (ignoring non-null)
    pub fn is_list(&self) -> bool {
        matches!(self.nullable_inner(), OutputType::List(_))
    }
}

/// One selected field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Schema field name
    pub name: String,
    /// Response alias
    pub alias: Option<String>,
    /// Arguments in declaration order
    pub arguments: Vec<Argument>,
    /// Declared type
    pub output_type: OutputType,
    /// Inclusion conditions
    pub conditions: Vec<InclusionCondition>,
    /// Field policy: ordered dotted paths into the argument bag
    pub key_args: Option<Vec<String>>,
}

impl Field {
    /// Create a field selection
    pub fn new(name: impl Into<String>, output_type: OutputType) -> Self {
        Field {
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            output_type,
            conditions: Vec::new(),
            key_args: None,
        }
    }

    /// Set the response alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an argument
    pub fn argument(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            value,
        });
        self
    }

    /// Add `@include(if: $variable)`
    pub fn include_if(mut self, variable: impl Into<String>) -> Self {
        self.conditions.push(InclusionCondition::Include(variable.into()));
        self
    }

    /// Add `@skip(if: $variable)`
    pub fn skip_if(mut self, variable: impl Into<String>) -> Self {
        self.conditions.push(InclusionCondition::Skip(variable.into()));
        self
    }

    /// Declare field-policy key argument paths (order is significant)
    pub fn key_args<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_args = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Key of this field in the response object
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Type a fragment applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCondition {
    /// Named type of the condition
    pub name: String,
    /// Concrete types implementing it (empty for object types)
    pub possible_types: Vec<String>,
}

impl TypeCondition {
    /// Condition on a concrete object type
    pub fn new(name: impl Into<String>) -> Self {
        TypeCondition {
            name: name.into(),
            possible_types: Vec::new(),
        }
    }

    /// Condition on an abstract type implemented by `possible_types`
    pub fn with_possible_types<I, S>(name: impl Into<String>, possible_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeCondition {
            name: name.into(),
            possible_types: possible_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether an object of concrete type `typename` satisfies the condition
    pub fn matches(&self, typename: &str) -> bool {
        self.name == typename || self.possible_types.iter().any(|t| t == typename)
    }
}

/// `... on Type { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    /// Type condition (none means the parent type)
    pub type_condition: Option<TypeCondition>,
    /// Fields selected by the fragment
    pub selection_set: SelectionSet,
    /// Inclusion conditions
    pub conditions: Vec<InclusionCondition>,
    /// `@defer(label:)`
    pub defer_label: Option<String>,
}

impl InlineFragment {
    /// Fragment without a type condition
    pub fn new(selection_set: SelectionSet) -> Self {
        InlineFragment {
            type_condition: None,
            selection_set,
            conditions: Vec::new(),
            defer_label: None,
        }
    }

    /// Fragment on a type
    pub fn on(type_condition: TypeCondition, selection_set: SelectionSet) -> Self {
        InlineFragment {
            type_condition: Some(type_condition),
            ..InlineFragment::new(selection_set)
        }
    }

    /// Mark as deferred with `label`
    pub fn deferred(mut self, label: impl Into<String>) -> Self {
        self.defer_label = Some(label.into());
        self
    }

    /// Add `@include(if: $variable)`
    pub fn include_if(mut self, variable: impl Into<String>) -> Self {
        self.conditions.push(InclusionCondition::Include(variable.into()));
        self
    }

    /// Add `@skip(if: $variable)`
    pub fn skip_if(mut self, variable: impl Into<String>) -> Self {
        self.conditions.push(InclusionCondition::Skip(variable.into()));
        self
    }
}

/// `fragment Name on Type { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    /// Fragment name
    pub name: String,
    /// Type condition
    pub type_condition: TypeCondition,
    /// Fields selected by the fragment
    pub selection_set: SelectionSet,
}

impl FragmentDefinition {
    /// Create a shareable fragment definition
    pub fn new(
        name: impl Into<String>,
        type_condition: TypeCondition,
        selection_set: SelectionSet,
    ) -> Arc<Self> {
        Arc::new(FragmentDefinition {
            name: name.into(),
            type_condition,
            selection_set,
        })
    }
}

/// `...Name`
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    /// Spread fragment
    pub fragment: Arc<FragmentDefinition>,
    /// Inclusion conditions
    pub conditions: Vec<InclusionCondition>,
    /// `@defer(label:)`
    pub defer_label: Option<String>,
}

impl FragmentSpread {
    /// Spread a fragment
    pub fn new(fragment: Arc<FragmentDefinition>) -> Self {
        FragmentSpread {
            fragment,
            conditions: Vec::new(),
            defer_label: None,
        }
    }

    /// Mark as deferred with `label`
    pub fn deferred(mut self, label: impl Into<String>) -> Self {
        self.defer_label = Some(label.into());
        self
    }
}

/// One entry of a selection set
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Field selection
    Field(Field),
    /// Inline fragment
    InlineFragment(InlineFragment),
    /// Named fragment spread
    FragmentSpread(FragmentSpread),
}

/// Selections made on one composite type
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet {
    /// Static type the selections are made on
    pub parent_type: String,
    /// Selections in document order
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    /// Empty selection set on `parent_type`
    pub fn new(parent_type: impl Into<String>) -> Self {
        SelectionSet {
            parent_type: parent_type.into(),
            selections: Vec::new(),
        }
    }

    /// Add a field
    pub fn field(mut self, field: Field) -> Self {
        self.selections.push(Selection::Field(field));
        self
    }

    /// Add an inline fragment
    pub fn inline_fragment(mut self, fragment: InlineFragment) -> Self {
        self.selections.push(Selection::InlineFragment(fragment));
        self
    }

    /// Add a fragment spread
    pub fn fragment_spread(mut self, spread: FragmentSpread) -> Self {
        self.selections.push(Selection::FragmentSpread(spread));
        self
    }

    /// Concrete type to assume when an object carries no `__typename`
    pub fn default_typename(&self) -> &str {
        &self.parent_type
    }
}

/// Kind of a GraphQL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Query
    Query,
    /// Mutation
    Mutation,
    /// Subscription
    Subscription,
}

impl OperationKind {
    /// Root record the operation reads from and writes to
    pub fn root_key(self) -> RecordKey {
        match self {
            OperationKind::Query => RecordKey::query_root(),
            OperationKind::Mutation => RecordKey::mutation_root(),
            OperationKind::Subscription => RecordKey::subscription_root(),
        }
    }
}

/// An executable operation: selection descriptor plus bound variables
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operation name
    pub name: String,
    /// Operation kind
    pub kind: OperationKind,
    /// Root selection set
    pub selection_set: Arc<SelectionSet>,
    /// Bound variables
    pub variables: Variables,
}

impl Operation {
    /// Create an operation
    pub fn new(name: impl Into<String>, kind: OperationKind, selection_set: SelectionSet) -> Self {
        Operation {
            name: name.into(),
            kind,
            selection_set: Arc::new(selection_set),
            variables: Variables::new(),
        }
    }

    /// Create a query
    pub fn query(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationKind::Query, selection_set)
    }

    /// Create a mutation
    pub fn mutation(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationKind::Mutation, selection_set)
    }

    /// Bind a variable
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Root record key for this operation
    pub fn root_key(&self) -> RecordKey {
        self.kind.root_key()
    }
}
