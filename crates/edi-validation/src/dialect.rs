//! Properties of the document being validated that are only known at runtime

/// Source of the transaction version and number formatting of a document.
///
/// The version is usually read from a header element; it is empty until that
/// element has been seen.
pub trait Dialect {
    /// Version of the current transaction, empty when not yet known
    fn transaction_version(&self) -> &str;

    /// Character separating the whole and fractional part of decimals
    fn decimal_mark(&self) -> char {
        '.'
    }
}

/// A [`Dialect`] whose version is set by the driver once it is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDialect {
    version: String,
    decimal_mark: char,
}

impl TransactionDialect {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            decimal_mark: '.',
        }
    }

    #[must_use]
    pub fn with_decimal_mark(mut self, decimal_mark: char) -> Self {
        self.decimal_mark = decimal_mark;
        self
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Forget the version, e.g. at the start of the next transaction
    pub fn clear_version(&mut self) {
        self.version.clear();
    }
}

impl Default for TransactionDialect {
    fn default() -> Self {
        Self::new("")
    }
}

impl Dialect for TransactionDialect {
    fn transaction_version(&self) -> &str {
        &self.version
    }

    fn decimal_mark(&self) -> char {
        self.decimal_mark
    }
}
