#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[cfg(feature = "redb")]
    #[error("redb error: {0}")]
    RedB(#[from] Box<redb::Error>),
    #[error("{0}")]
    Custom(String),
}

#[cfg(feature = "redb")]
impl From<redb::DatabaseError> for StoreError {
    fn from(value: redb::DatabaseError) -> Self {
        StoreError::RedB(Box::new(value.into()))
    }
}

#[cfg(feature = "redb")]
impl From<redb::TransactionError> for StoreError {
    fn from(value: redb::TransactionError) -> Self {
        StoreError::RedB(Box::new(value.into()))
    }
}

#[cfg(feature = "redb")]
impl From<redb::TableError> for StoreError {
    fn from(value: redb::TableError) -> Self {
        StoreError::RedB(Box::new(value.into()))
    }
}

#[cfg(feature = "redb")]
impl From<redb::StorageError> for StoreError {
    fn from(value: redb::StorageError) -> Self {
        StoreError::RedB(Box::new(value.into()))
    }
}

#[cfg(feature = "redb")]
impl From<redb::CommitError> for StoreError {
    fn from(value: redb::CommitError) -> Self {
        StoreError::RedB(Box::new(value.into()))
    }
}
