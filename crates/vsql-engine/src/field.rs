//! Bound output fields.
//!
//! The binder turns every attribute of the SELECT list into a [`Field`]; the
//! cursor asks fields for their value on the row it is positioned on.

use std::cell::RefCell;

use vsql_ast::NodeId;
use vsql_error::{Result, VsqlError};
use vsql_types::{ColumnDesc, DataType, ParamMap, Variant};

use crate::binder::BoundQuery;
use crate::config::EngineConfig;
use crate::eval;

/// Where a field's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A literal, identical on every row.
    Static(Variant),
    /// The value bound to a 1-based statement parameter.
    Param(usize),
    /// Column `column` of source `object` (FROM order).
    Data { object: usize, column: usize },
    /// An expression evaluated per row.
    Computed(NodeId),
}

/// One output column of a bound query.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    datatype: DataType,
    kind: FieldKind,
    desc: ColumnDesc,
    /// Last computed value, tagged with the row generation it belongs to.
    cache: RefCell<Option<(u64, Variant)>>,
}

/// Everything a field needs to produce the value of the current row.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub plan: &'a BoundQuery,
    pub params: &'a ParamMap,
    pub config: &'a EngineConfig,
    /// Bumped by the cursor whenever it lands on a new row or new
    /// parameters are bound.
    pub generation: u64,
}

impl Field {
    fn with_kind(name: String, datatype: DataType, kind: FieldKind, desc: ColumnDesc) -> Self {
        Self {
            name,
            datatype,
            kind,
            desc,
            cache: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn new_static(name: impl Into<String>, value: Variant) -> Self {
        let name = name.into();
        let datatype = value.datatype();
        let desc = ColumnDesc::new(name.clone(), datatype).with_nullable(value.is_null());
        Self::with_kind(name, datatype, FieldKind::Static(value), desc)
    }

    /// Parameter types are unknown until execution, so these report
    /// `DataType::Null`.
    #[must_use]
    pub fn new_param(name: impl Into<String>, ordinal: usize) -> Self {
        let name = name.into();
        let desc = ColumnDesc::new(name.clone(), DataType::Null);
        Self::with_kind(name, DataType::Null, FieldKind::Param(ordinal), desc)
    }

    /// A provider column. Name and type come from the provider's descriptor.
    #[must_use]
    pub fn new_data(desc: ColumnDesc, object: usize, column: usize) -> Self {
        Self::with_kind(
            desc.name.clone(),
            desc.data_type,
            FieldKind::Data { object, column },
            desc,
        )
    }

    #[must_use]
    pub fn new_computed(name: impl Into<String>, datatype: DataType, node: NodeId) -> Self {
        let name = name.into();
        let desc = ColumnDesc::new(name.clone(), datatype);
        Self::with_kind(name, datatype, FieldKind::Computed(node), desc)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn datatype(&self) -> DataType {
        self.datatype
    }

    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    #[must_use]
    pub const fn describe(&self) -> &ColumnDesc {
        &self.desc
    }

    /// Give the field (and its descriptor) a new name.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.desc.name.clone_from(&self.name);
    }

    /// Value of this field on the row described by `ctx`.
    pub fn value(&self, ctx: &RowContext<'_>) -> Result<Variant> {
        match &self.kind {
            FieldKind::Static(v) => Ok(v.clone()),
            FieldKind::Param(ordinal) => Ok(ctx.params.value(*ordinal)),
            FieldKind::Data { object, column } => ctx
                .plan
                .objects()
                .get(*object)
                .ok_or_else(|| VsqlError::internal(format!("field bound to missing source {object}")))?
                .column(*column),
            FieldKind::Computed(node) => {
                if let Some((generation, value)) = self.cache.borrow().as_ref() {
                    if *generation == ctx.generation {
                        return Ok(value.clone());
                    }
                }
                let value = eval::evaluate(ctx, *node)?;
                *self.cache.borrow_mut() = Some((ctx.generation, value.clone()));
                Ok(value)
            }
        }
    }
}
