use anyhow::{bail, Result};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const TABLE_NAME: &str = "vectors";
pub const ROW_COLUMN: &str = "row";
pub const VECTOR_COLUMN: &str = "vector";

pub fn build_vector_schema(dim: usize) -> Result<Arc<Schema>> {
    if dim == 0 || dim > i32::MAX as usize {
        bail!("unsupported vector dimension {dim}");
    }
    Ok(Arc::new(Schema::new(vec![
        Field::new(ROW_COLUMN, DataType::UInt64, false),
        Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
    ])))
}

/// Vector width recorded in an existing table schema.
pub fn vector_dim(schema: &Schema) -> Result<usize> {
    let field = schema.field_with_name(VECTOR_COLUMN)?;
    match field.data_type() {
        DataType::FixedSizeList(_, dim) if *dim > 0 => Ok(*dim as usize),
        other => bail!("column '{VECTOR_COLUMN}' has unexpected type {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_survives_schema_round_trip() {
        let schema = build_vector_schema(384).unwrap();
        assert_eq!(vector_dim(&schema).unwrap(), 384);
        assert!(build_vector_schema(0).is_err());
    }
}
