/// Data layer: core types, loading, schema inference, filtering and export.
///
/// Architecture:
/// ```text
///  .csv / .txt / .json / .xlsx / .xls / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse bytes → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  classify columns → ColumnDescriptor (kind tag)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterClause list → narrowed Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Dataset → CSV bytes
///   └──────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;
