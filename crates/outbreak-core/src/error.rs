/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building or validating core records.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A textual identifier could not be parsed.
    #[error("invalid identifier: \"{0}\"")]
    InvalidId(String),

    /// An item record violates `0 <= in_stock <= total`.
    #[error("item \"{id}\" has {in_stock} in stock but only {total} total")]
    StockOverflow {
        /// The item id.
        id: String,
        /// The offending stock count.
        in_stock: u32,
        /// The item's total.
        total: u32,
    },

    /// An item id is empty or contains whitespace.
    #[error("invalid item id: \"{0}\"")]
    InvalidItemId(String),
}
