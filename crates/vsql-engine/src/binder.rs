//! Binder: turns a parsed SELECT into an executable [`BoundQuery`].
//!
//! Binding runs once, before the cursor opens:
//!
//! 1. register every FROM source under its alias (the table name unless an
//!    alias is given); duplicate aliases are rejected,
//! 2. create and open one read-only provider per source,
//! 3. number the `?` parameters left to right across the whole statement,
//! 4. turn each SELECT attribute into a [`Field`], resolving the column
//!    references and function calls inside computed expressions,
//! 5. resolve the WHERE expression the same way.
//!
//! Any failure drops the sources opened so far, which closes them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};
use vsql_ast::{
    ExprOp, FallbackPolicy, NodeId, NodeKind, NodeType, ParseTree, Visitor, accept, walk_children,
};
use vsql_error::{Result, VsqlError};
use vsql_types::{DataType, Identifier, ObjectName};

use crate::config::EngineConfig;
use crate::field::Field;
use crate::functions::{FunctionRegistry, ScalarFunction};
use crate::object::DbObject;
use crate::provider::ProviderFactory;

/// A statement bound to live sources: the plan a cursor executes.
///
/// Owns the parse tree it was bound from; every `NodeId` it holds indexes
/// into that tree.
pub struct BoundQuery {
    tree: ParseTree,
    objects: Vec<DbObject>,
    aliases: BTreeMap<Identifier, usize>,
    fields: Vec<Field>,
    id_fields: HashMap<NodeId, Field>,
    params: HashMap<NodeId, usize>,
    functions: HashMap<NodeId, Arc<dyn ScalarFunction>>,
    where_node: Option<NodeId>,
}

impl BoundQuery {
    #[must_use]
    pub const fn tree(&self) -> &ParseTree {
        &self.tree
    }

    /// Sources in FROM order.
    #[must_use]
    pub fn objects(&self) -> &[DbObject] {
        &self.objects
    }

    pub(crate) fn objects_mut(&mut self) -> &mut [DbObject] {
        &mut self.objects
    }

    /// Source registered under `alias` (case-insensitive).
    #[must_use]
    pub fn source(&self, alias: &str) -> Option<&DbObject> {
        self.aliases
            .get(&alias_key(alias))
            .and_then(|&i| self.objects.get(i))
    }

    /// Output fields in SELECT order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field an identifier group inside an expression resolved to.
    #[must_use]
    pub fn id_field(&self, node: NodeId) -> Option<&Field> {
        self.id_fields.get(&node)
    }

    /// 1-based ordinal of a `?` node.
    #[must_use]
    pub fn param_ordinal(&self, node: NodeId) -> Option<usize> {
        self.params.get(&node).copied()
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn function(&self, node: NodeId) -> Option<&Arc<dyn ScalarFunction>> {
        self.functions.get(&node)
    }

    /// Root of the WHERE expression, if the statement has one.
    #[must_use]
    pub const fn where_node(&self) -> Option<NodeId> {
        self.where_node
    }

    /// Close every source. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for object in &mut self.objects {
            if let Err(err) = object.close() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for BoundQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let functions: BTreeMap<_, _> = self
            .functions
            .iter()
            .map(|(node, func)| (node.index(), func.name().to_owned()))
            .collect();
        f.debug_struct("BoundQuery")
            .field("objects", &self.objects)
            .field("fields", &self.fields)
            .field("params", &self.params)
            .field("functions", &functions)
            .field("where_node", &self.where_node)
            .finish_non_exhaustive()
    }
}

/// Bind `tree` against sources created by `factory`.
pub fn bind(
    tree: ParseTree,
    factory: &dyn ProviderFactory,
    registry: &FunctionRegistry,
    config: &EngineConfig,
) -> Result<BoundQuery> {
    let select = tree
        .select()
        .ok_or_else(|| VsqlError::internal("parse tree has no SELECT"))?;

    let mut collector = SourceCollector::default();
    let from = tree
        .child_of_type(select, NodeType::From)
        .ok_or_else(|| VsqlError::internal("SELECT without FROM"))?;
    accept(&mut collector, &tree, from)?;

    let mut objects = Vec::with_capacity(collector.sources.len());
    for (alias, name) in collector.sources {
        let provider = factory.create_provider(&name)?;
        let mut object = DbObject::new(alias, name, provider);
        object.open()?;
        objects.push(object);
    }

    let params = number_params(&tree, select);

    let scope = Scope {
        objects: &objects,
        aliases: &collector.aliases,
    };
    let mut resolution = Resolution::default();
    let mut attrs = AttrBinder {
        scope: &scope,
        registry,
        config,
        params: &params,
        resolution: &mut resolution,
        fields: Vec::new(),
        pending_alias: None,
    };
    let attr_list = tree
        .child_of_type(select, NodeType::AttrList)
        .ok_or_else(|| VsqlError::internal("SELECT without attribute list"))?;
    accept(&mut attrs, &tree, attr_list)?;
    let fields = attrs.fields;

    let where_node = tree
        .child_of_type(select, NodeType::Where)
        .and_then(|w| tree.children(w).last().copied());
    if let Some(predicate) = where_node {
        resolve_expr(&tree, predicate, &scope, registry, config, &mut resolution)?;
        let datatype = infer(&tree, predicate, &params, &resolution)?;
        if !matches!(datatype, DataType::Null | DataType::Boolean) {
            return Err(VsqlError::type_mismatch("BOOLEAN predicate", datatype.name()));
        }
    }

    debug!(
        sources = objects.len(),
        fields = fields.len(),
        params = params.len(),
        has_where = where_node.is_some(),
        "query bound"
    );
    Ok(BoundQuery {
        tree,
        objects,
        aliases: collector.aliases,
        fields,
        id_fields: resolution.id_fields,
        params,
        functions: resolution.functions,
        where_node,
    })
}

/// Alias lookups ignore ASCII case.
fn alias_key(alias: &str) -> Identifier {
    Identifier::new(alias.to_ascii_lowercase())
}

fn qualifier_matches(wanted: Option<&String>, have: Option<&String>) -> bool {
    match (wanted, have) {
        (None, _) => true,
        (Some(w), Some(h)) => w.eq_ignore_ascii_case(h),
        (Some(_), None) => false,
    }
}

// ---------------------------------------------------------------------------
// FROM sources
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SourceCollector {
    sources: Vec<(Identifier, ObjectName)>,
    aliases: BTreeMap<Identifier, usize>,
}

impl SourceCollector {
    fn register(&mut self, tree: &ParseTree, group: NodeId, alias: Option<&str>) -> Result<()> {
        let parts = tree.name_parts(group);
        let name = ObjectName::from_parts(&parts)
            .ok_or_else(|| VsqlError::internal(format!("bad source name {}", parts.join("."))))?;
        let alias = Identifier::new(alias.unwrap_or(&name.table));
        let key = alias_key(alias.as_str());
        if self.aliases.contains_key(&key) {
            return Err(VsqlError::DuplicateAlias {
                alias: alias.to_string(),
            });
        }
        self.aliases.insert(key, self.sources.len());
        debug!(alias = %alias, table = %name, "source registered");
        self.sources.push((alias, name));
        Ok(())
    }
}

impl Visitor for SourceCollector {
    fn name(&self) -> &'static str {
        "SourceCollector"
    }

    fn visit_from(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        for &source in tree.children(id) {
            if !matches!(tree.kind(source), NodeKind::Token(_)) {
                accept(self, tree, source)?;
            }
        }
        Ok(())
    }

    fn visit_id_group(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.register(tree, id, None)
    }

    fn visit_alias(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let (inner, alias) = alias_parts(tree, id)?;
        self.register(tree, inner, Some(alias))
    }
}

/// `(inner, alias text)` of an `Alias` node.
fn alias_parts(tree: &ParseTree, id: NodeId) -> Result<(NodeId, &str)> {
    let children = tree.children(id);
    match (children.first(), children.last()) {
        (Some(&inner), Some(&name)) if inner != name => tree
            .token_text(name)
            .map(|alias| (inner, alias))
            .ok_or_else(|| VsqlError::internal("alias without a name")),
        _ => Err(VsqlError::internal("malformed alias node")),
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Assign ordinals to `?` nodes in text order, first occurrence winning.
///
/// Walks with an explicit stack: this runs before any depth guard, so
/// expression nesting must not reach the call stack.
fn number_params(tree: &ParseTree, select: NodeId) -> HashMap<NodeId, usize> {
    let mut params = HashMap::new();
    let mut pending = vec![select];
    while let Some(id) = pending.pop() {
        if matches!(tree.kind(id), NodeKind::Param(_)) {
            let ordinal = *params
                .entry(id)
                .or_insert_with(|| tree.next_param_ordinal());
            trace!(ordinal, offset = tree.info(id).offset, "parameter numbered");
        }
        pending.extend(tree.children(id).iter().rev());
    }
    params
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

struct Scope<'a> {
    objects: &'a [DbObject],
    aliases: &'a BTreeMap<Identifier, usize>,
}

impl Scope<'_> {
    /// Source named by a qualifier: an alias, or a `[catalog.]schema.table`
    /// matched against each source's table name.
    fn find_source(&self, qualifier: &[&str]) -> Result<usize> {
        let unknown = || VsqlError::NoSuchSource {
            alias: qualifier.join("."),
        };
        if let [alias] = qualifier {
            return self.aliases.get(&alias_key(alias)).copied().ok_or_else(unknown);
        }
        let wanted = ObjectName::from_parts(qualifier).ok_or_else(unknown)?;
        self.objects
            .iter()
            .position(|o| {
                let have = o.name();
                have.table.eq_ignore_ascii_case(&wanted.table)
                    && qualifier_matches(wanted.schema.as_ref(), have.schema.as_ref())
                    && qualifier_matches(wanted.catalog.as_ref(), have.catalog.as_ref())
            })
            .ok_or_else(unknown)
    }

    /// Resolve an identifier group to a data field.
    fn resolve_column(&self, tree: &ParseTree, group: NodeId) -> Result<Field> {
        let parts = tree.name_parts(group);
        let shown = parts.join(".");
        let no_such_column = || VsqlError::NoSuchColumn {
            name: shown.clone(),
        };
        let Some((&column, qualifier)) = parts.split_last() else {
            return Err(VsqlError::internal("empty identifier group"));
        };
        let index = if qualifier.is_empty() {
            let mut hits = self
                .objects
                .iter()
                .enumerate()
                .filter(|(_, o)| o.column_id(column).is_some())
                .map(|(i, _)| i);
            match (hits.next(), hits.next()) {
                (Some(i), None) => i,
                (None, _) => return Err(no_such_column()),
                (Some(_), Some(_)) => {
                    return Err(VsqlError::AmbiguousColumn { name: shown });
                }
            }
        } else if qualifier.len() > 3 {
            return Err(no_such_column());
        } else {
            self.find_source(qualifier)?
        };
        let object = &self.objects[index];
        let position = object.column_id(column).ok_or_else(no_such_column)?;
        let desc = object.describe_column(position)?;
        trace!(column = %shown, source = %object.alias(), position, "column resolved");
        Ok(Field::new_data(desc, index, position))
    }

    /// One data field per column of source `index`, in provider order.
    fn expand(&self, index: usize, fields: &mut Vec<Field>) -> Result<()> {
        let object = &self.objects[index];
        for position in 0..object.column_count() {
            fields.push(Field::new_data(object.describe_column(position)?, index, position));
        }
        Ok(())
    }
}

/// Column and function bindings collected from expressions.
#[derive(Default)]
struct Resolution {
    id_fields: HashMap<NodeId, Field>,
    functions: HashMap<NodeId, Arc<dyn ScalarFunction>>,
}

fn resolve_expr(
    tree: &ParseTree,
    node: NodeId,
    scope: &Scope<'_>,
    registry: &FunctionRegistry,
    config: &EngineConfig,
    resolution: &mut Resolution,
) -> Result<()> {
    let mut resolver = ExprResolver {
        scope,
        registry,
        resolution,
        depth: 0,
        max_depth: config.max_expr_depth,
    };
    accept(&mut resolver, tree, node)
}

/// Walks an expression, binding identifier groups and function calls.
struct ExprResolver<'s, 'a> {
    scope: &'s Scope<'a>,
    registry: &'s FunctionRegistry,
    resolution: &'s mut Resolution,
    depth: usize,
    max_depth: usize,
}

impl ExprResolver<'_, '_> {
    fn nested(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(VsqlError::ExpressionTooDeep {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        let result = walk_children(self, tree, id);
        self.depth -= 1;
        result
    }
}

impl Visitor for ExprResolver<'_, '_> {
    fn name(&self) -> &'static str {
        "ExprResolver"
    }

    fn policy(&self) -> FallbackPolicy {
        FallbackPolicy::Recurse
    }

    fn visit_id_group(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let field = self.scope.resolve_column(tree, id)?;
        self.resolution.id_fields.insert(id, field);
        Ok(())
    }

    fn visit_func_call(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let children = tree.children(id);
        let name = children
            .first()
            .and_then(|&n| tree.token_text(n))
            .ok_or_else(|| VsqlError::internal("function call without a name"))?;
        let args = children.len() - 1;
        let function = i32::try_from(args)
            .ok()
            .and_then(|arity| self.registry.find_scalar(name, arity))
            .ok_or_else(|| VsqlError::NoSuchFunction {
                name: name.to_owned(),
                args,
            })?;
        self.resolution.functions.insert(id, function);
        self.nested(tree, id)
    }

    fn visit_expr(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.nested(tree, id)
    }
}

// ---------------------------------------------------------------------------
// Static type inference
// ---------------------------------------------------------------------------

/// Result type of an already-resolved expression. `DataType::Null` means
/// unknown until run time; operand pairs whose types are both known and
/// incompatible are rejected here.
fn infer(
    tree: &ParseTree,
    node: NodeId,
    params: &HashMap<NodeId, usize>,
    resolution: &Resolution,
) -> Result<DataType> {
    let operand = |id: NodeId| infer(tree, id, params, resolution);
    match tree.kind(node) {
        NodeKind::Literal(_) | NodeKind::Number(_) | NodeKind::Null(_) => Ok(tree
            .constant_value(node)?
            .map_or(DataType::Null, |v| v.datatype())),
        NodeKind::Param(_) => Ok(DataType::Null),
        NodeKind::IdGroup => Ok(resolution
            .id_fields
            .get(&node)
            .map_or(DataType::Null, Field::datatype)),
        NodeKind::FuncCall => {
            let args = tree
                .children(node)
                .iter()
                .skip(1)
                .map(|&a| operand(a))
                .collect::<Result<Vec<_>>>()?;
            Ok(resolution
                .functions
                .get(&node)
                .map_or(DataType::Null, |f| f.return_type(&args)))
        }
        NodeKind::Expr(op) => {
            let types = tree
                .children(node)
                .iter()
                .map(|&c| operand(c))
                .collect::<Result<Vec<_>>>()?;
            infer_op(op, &types)
        }
        other => Err(VsqlError::internal(format!(
            "{} inside an expression",
            other.nodetype()
        ))),
    }
}

fn infer_op(op: ExprOp, types: &[DataType]) -> Result<DataType> {
    let known = |t: DataType| t != DataType::Null;
    let mismatch = |expected: &str, actual: DataType| {
        Err(VsqlError::type_mismatch(
            format!("{expected} operand to {op}"),
            actual.name(),
        ))
    };
    match (op, types) {
        (ExprOp::IsNull | ExprOp::IsNotNull, _) => Ok(DataType::Boolean),
        (ExprOp::Neg | ExprOp::Pos, &[t]) => {
            if known(t) && !t.is_numeric() {
                return mismatch("numeric", t);
            }
            Ok(t)
        }
        (ExprOp::Not, &[t]) | (ExprOp::And | ExprOp::Or | ExprOp::Xor, &[t, _] | &[_, t])
            if known(t) && t != DataType::Boolean =>
        {
            mismatch("boolean", t)
        }
        (ExprOp::Not | ExprOp::And | ExprOp::Or | ExprOp::Xor, _) => Ok(DataType::Boolean),
        (ExprOp::Concat, &[l, r]) => {
            for t in [l, r] {
                if known(t) && !t.is_string_like() {
                    return mismatch("text", t);
                }
            }
            Ok(DataType::Text)
        }
        (op, &[l, r]) if op.is_comparison() => {
            if known(l) && known(r) && DataType::comparison_domain(l, r).is_none() {
                return mismatch(l.name(), r);
            }
            Ok(DataType::Boolean)
        }
        (op, &[l, r]) if op.is_arithmetic() => match DataType::arithmetic_result(l, r) {
            Some(t) => Ok(t),
            None if known(l) && known(r) => {
                mismatch("numeric", if l.is_numeric() { r } else { l })
            }
            None => {
                let other = if known(l) { l } else { r };
                if other.is_numeric() {
                    Ok(other)
                } else {
                    mismatch("numeric", other)
                }
            }
        },
        _ => Err(VsqlError::internal(format!(
            "operator {op} with {} operands",
            types.len()
        ))),
    }
}

// ---------------------------------------------------------------------------
// SELECT attributes
// ---------------------------------------------------------------------------

struct AttrBinder<'b, 'a> {
    scope: &'b Scope<'a>,
    registry: &'b FunctionRegistry,
    config: &'b EngineConfig,
    params: &'b HashMap<NodeId, usize>,
    resolution: &'b mut Resolution,
    fields: Vec<Field>,
    /// Name from an enclosing `AS alias`, consumed by the next field.
    pending_alias: Option<String>,
}

impl AttrBinder<'_, '_> {
    /// Name for a non-column field: its alias, else a generated one.
    fn take_name(&mut self, tree: &ParseTree) -> String {
        self.pending_alias
            .take()
            .unwrap_or_else(|| self.config.anonymous_alias(tree.next_alias()))
    }

    fn push(&mut self, field: Field) {
        trace!(name = field.name(), kind = ?field.kind(), datatype = %field.datatype(), "field bound");
        self.fields.push(field);
    }

    fn bind_static(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let value = tree.constant_value(id)?.unwrap_or_default();
        let name = self.take_name(tree);
        self.push(Field::new_static(name, value));
        Ok(())
    }

    fn bind_computed(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        resolve_expr(tree, id, self.scope, self.registry, self.config, self.resolution)?;
        let datatype = infer(tree, id, self.params, self.resolution)?;
        let name = self.take_name(tree);
        self.push(Field::new_computed(name, datatype, id));
        Ok(())
    }
}

impl Visitor for AttrBinder<'_, '_> {
    fn name(&self) -> &'static str {
        "AttrBinder"
    }

    fn visit_attr_list(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        walk_children(self, tree, id)
    }

    fn visit_all_attr(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        if let Some(group) = tree.child_of_type(id, NodeType::IdGroup) {
            let index = self.scope.find_source(&tree.name_parts(group))?;
            return self.scope.expand(index, &mut self.fields);
        }
        for index in 0..self.scope.objects.len() {
            self.scope.expand(index, &mut self.fields)?;
        }
        Ok(())
    }

    fn visit_alias(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let (inner, alias) = alias_parts(tree, id)?;
        self.pending_alias = Some(alias.to_owned());
        let result = accept(self, tree, inner);
        self.pending_alias = None;
        result
    }

    fn visit_literal(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.bind_static(tree, id)
    }

    fn visit_number(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.bind_static(tree, id)
    }

    fn visit_null(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.bind_static(tree, id)
    }

    fn visit_id_group(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let mut field = self.scope.resolve_column(tree, id)?;
        if let Some(alias) = self.pending_alias.take() {
            field.rename(alias);
        }
        self.push(field);
        Ok(())
    }

    fn visit_param(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        let ordinal = self
            .params
            .get(&id)
            .copied()
            .ok_or_else(|| VsqlError::internal("parameter without an ordinal"))?;
        let name = self.take_name(tree);
        self.push(Field::new_param(name, ordinal));
        Ok(())
    }

    fn visit_expr(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.bind_computed(tree, id)
    }

    fn visit_func_call(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.bind_computed(tree, id)
    }
}
