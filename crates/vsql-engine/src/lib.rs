//! Query execution for vsql: binding a parsed SELECT to data providers,
//! evaluating expressions, and iterating the result with [`SqlCursor`].
//!
//! Data comes from hosts through the [`DataProvider`] trait; the
//! [`MemoryCatalog`] provider serves in-process tables.

pub mod binder;
pub mod config;
pub mod cursor;
pub mod eval;
pub mod field;
pub mod functions;
pub mod memory;
pub mod object;
pub mod provider;

pub use binder::{BoundQuery, bind};
pub use config::{DEFAULT_MAX_EXPR_DEPTH, EngineConfig, NullArithmetic};
pub use cursor::{CursorState, SqlCursor};
pub use eval::{apply_binary, apply_unary, evaluate};
pub use field::{Field, FieldKind, RowContext};
pub use functions::{FunctionKey, FunctionRegistry, ScalarFunction, register_builtins};
pub use memory::{MemoryCatalog, MemoryProvider, MemoryTable};
pub use object::DbObject;
pub use provider::{DataProvider, OpenMode, ProviderFactory};
