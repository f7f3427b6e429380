use thiserror::Error;

use super::enums::{CartErrorKind, CartOperation};

pub const MSG_STOCK_UNAVAILABLE: &str = "Quantidade solicitada fora de estoque";
pub const MSG_ADD_FAILED: &str = "Erro na adição do produto";
pub const MSG_REMOVE_FAILED: &str = "Erro na remoção do produto";
pub const MSG_UPDATE_FAILED: &str = "Erro na alteração de quantidade do produto";

/// Cart-level errors returned by every mutating operation
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Requested quantity unavailable: product_id={product_id}, requested={requested}, available={available}")]
    StockUnavailable {
        product_id: u64,
        requested: u32,
        available: u32,
    },

    #[error("Product not in cart: {product_id}")]
    NotFound { product_id: u64 },

    #[error("Catalog error: {source}")]
    Catalog {
        #[from]
        source: CatalogError,
    },

    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },
}

/// Errors raised while talking to the stock/product API
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Request failed: {message}")]
    Request { message: String },

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {message}")]
    Decode { message: String },

    #[error("Timeout occurred during catalog request")]
    Timeout,
}

/// Errors raised by the durable key-value store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt store: {message}")]
    CorruptStore { message: String },
}

impl CartError {
    pub fn kind(&self) -> CartErrorKind {
        match self {
            CartError::StockUnavailable { .. } => CartErrorKind::StockUnavailable,
            CartError::NotFound { .. } => CartErrorKind::NotFound,
            CartError::Catalog { .. } | CartError::Storage { .. } => {
                CartErrorKind::TransientFailure
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == CartErrorKind::TransientFailure
    }

    /// User-facing message for this error raised by `operation`
    pub fn notification(&self, operation: CartOperation) -> &'static str {
        if let CartError::StockUnavailable { .. } = self {
            return MSG_STOCK_UNAVAILABLE;
        }

        match operation {
            CartOperation::AddProduct => MSG_ADD_FAILED,
            CartOperation::RemoveProduct => MSG_REMOVE_FAILED,
            CartOperation::UpdateProductAmount => MSG_UPDATE_FAILED,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else if err.is_decode() {
            CatalogError::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            CatalogError::Status {
                status: status.as_u16(),
                url: err
                    .url()
                    .map(|url| url.to_string())
                    .unwrap_or_default(),
            }
        } else {
            CatalogError::Request {
                message: err.to_string(),
            }
        }
    }
}

/// Result type alias for cart operations
pub type CartResult<T> = Result<T, CartError>;

/// Result type alias for catalog lookups
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
