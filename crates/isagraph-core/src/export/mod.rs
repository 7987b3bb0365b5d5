//! # Reverse Mapper
//!
//! Re-renders a sub-graph for one target file:
//! - `wrapper`: role-aware, scoped decorators with ordered column groups
//! - `table`: path enumeration and layer alignment into rows
//! - `dialect`: the serializer contract toward archive dialects

pub mod dialect;
pub mod table;
pub mod wrapper;

pub use dialect::{DialectSerializer, TabDialect};
pub use table::{ExportTable, TableBuilder};
pub use wrapper::{
    ColumnGroup, ExportVertex, FileContext, TermCells, UnitCells, WrapperFactory, WrapperRole,
};
