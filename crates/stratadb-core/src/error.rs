use stratadb_query::Scope;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification. Raised
/// only for invariant violations and corruption inside the engine itself;
/// callers are expected to abort the enclosing query or transaction rather
/// than retry, because the index state must be presumed inconsistent.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a transaction-origin invariant violation.
    pub(crate) fn transaction_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Transaction,
            message.into(),
        )
    }

    /// Construct an index-origin invariant violation.
    pub(crate) fn index_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Index,
            message.into(),
        )
    }

    /// Construct a sort-origin invariant violation.
    pub(crate) fn sort_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Sort,
            message.into(),
        )
    }

    /// Construct a serialize-origin internal error.
    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Internal,
            ErrorOrigin::Serialize,
            message.into(),
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvariantViolation,
    Corruption,
    Internal,
    Unsupported,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvariantViolation => "invariant_violation",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{s}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Transaction,
    Index,
    Query,
    Sort,
    Serialize,
}

impl std::fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transaction => "transaction",
            Self::Index => "index",
            Self::Query => "query",
            Self::Sort => "sort",
            Self::Serialize => "serialize",
        };
        write!(f, "{s}")
    }
}

///
/// QueryError
///
/// Caller-correctable problems with the shape of a query. Each variant
/// identifies the offending constraint so the caller can fix and resubmit.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("entity type '{entity_type}' is not present in the catalog")]
    EntityTypeNotFound { entity_type: String },

    #[error("reference '{reference_name}' is not defined on entity type '{entity_type}'")]
    ReferenceNotFound {
        reference_name: String,
        entity_type: String,
    },

    #[error(
        "reference '{reference_name}' on entity type '{entity_type}' is not indexed in scope {scope:?}; enable filtering/sorting for it in that scope"
    )]
    ReferenceNotIndexed {
        reference_name: String,
        entity_type: String,
        scope: Scope,
    },

    #[error(
        "attribute '{attribute_name}' on '{target}' is not filterable; only filterable attributes can appear in filter constraints"
    )]
    AttributeNotFilterable {
        attribute_name: String,
        target: String,
    },

    #[error(
        "attribute '{attribute_name}' on '{target}' is not sortable; only sortable attributes can appear in order constraints"
    )]
    AttributeNotSortable {
        attribute_name: String,
        target: String,
    },

    #[error(
        "reference '{reference_name}' targets externally managed entity type '{referenced_type}'; entityHaving requires an internally managed target"
    )]
    UnmanagedReferencedType {
        reference_name: String,
        referenced_type: String,
    },

    #[error("entityHaving is only valid inside a referenceHaving constraint")]
    EntityHavingOutsideReference,

    #[error("scopeIn is only valid at the top level of filterBy")]
    ScopeInNotTopLevel,

    #[error("referenceHaving cannot be nested inside another reference context")]
    NestedReferenceContext,
}

///
/// Error
///
/// Two-variant split between caller-correctable usage problems and fatal
/// internal invariant violations.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// True when the caller can correct the request and retry; internal
    /// errors are never recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}
