//! Error types for chainorm operations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The primary error type for all chainorm operations.
#[derive(Debug, Clone)]
pub enum Error {
    /// Bad or ambiguous relationship/source declaration
    Configuration(ConfigurationError),
    /// Inconsistent or unresolvable join/alias request during compilation
    Compilation(CompilationError),
    /// A column was requested that is not part of the compiled projection
    MissingColumn(MissingColumnError),
    /// Failure reported by the storage collaborator
    Storage(StorageError),
    /// Type conversion errors
    Type(TypeError),
    /// Structured payload raised by an exception hook, preserved unchanged
    Payload(ErrorPayload),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct ConfigurationError {
    pub kind: ConfigurationErrorKind,
    pub message: String,
    /// Source the declaration was made on (if known)
    pub source_name: Option<String>,
    /// Relationship being declared (if any)
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationErrorKind {
    /// Zero or multiple primary key columns where exactly one is needed
    AmbiguousPrimaryKey,
    /// A guessed or named column does not exist on its source
    UnknownColumn,
    /// A moniker does not name a registered source
    UnknownSource,
    /// A relationship name is already taken on the source
    DuplicateRelationship,
    /// A source moniker is registered twice
    DuplicateSource,
    /// A join condition mixes qualified and unqualified names
    MalformedCondition,
    /// `+select` and `+as` lists differ in length after a merge
    SelectAsMismatch,
    /// Name is not a valid identifier
    InvalidIdentifier,
    /// Configuration document could not be parsed
    Invalid,
}

#[derive(Debug, Clone)]
pub struct CompilationError {
    pub kind: CompilationErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationErrorKind {
    /// A join spec names a relationship that does not exist on its parent
    UnknownRelationship,
    /// Procedural condition used where a declarative mapping is required
    ProceduralCondition,
    /// The statement shape cannot be produced (e.g. delete without a key)
    Unsupported,
    /// `rows`/`page` produce an OFFSET that does not fit in a u64
    InvalidWindow,
}

#[derive(Debug, Clone)]
pub struct MissingColumnError {
    /// The column that was requested
    pub column: String,
    /// Columns that are available in the projection
    pub available: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StorageError {
    pub message: String,
    pub sql: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

/// Opaque structured error value.
///
/// Hooks may raise arbitrary values; they travel through the error path
/// without being stringified and can be recovered with [`ErrorPayload::downcast_ref`].
#[derive(Clone)]
pub struct ErrorPayload(Arc<dyn Any + Send + Sync>);

impl ErrorPayload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the payload as `T` if that is its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorPayload(..)")
    }
}

/// What an exception hook decided to do with an error.
#[derive(Debug, Clone)]
pub enum HookAction {
    /// Raise this error to the caller (the original or a wrapped one).
    Raise(Error),
    /// Swallow the error; the operation returns its degraded default.
    Suppress,
}

/// Caller-installed error handling strategy.
///
/// Every error raised by schema and result set operations passes through
/// the hook (when one is configured) before reaching the caller.
pub type ErrorHook = Arc<dyn Fn(Error) -> HookAction + Send + Sync>;

impl Error {
    /// Build a configuration error without source/relationship context.
    pub fn config(kind: ConfigurationErrorKind, message: impl Into<String>) -> Self {
        Error::Configuration(ConfigurationError {
            kind,
            message: message.into(),
            source_name: None,
            relationship: None,
        })
    }

    pub fn compilation(kind: CompilationErrorKind, message: impl Into<String>) -> Self {
        Error::Compilation(CompilationError {
            kind,
            message: message.into(),
        })
    }

    pub fn missing_column(column: impl Into<String>, available: Vec<String>) -> Self {
        Error::MissingColumn(MissingColumnError {
            column: column.into(),
            available,
        })
    }

    pub fn payload<T: Any + Send + Sync>(value: T) -> Self {
        Error::Payload(ErrorPayload::new(value))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_compilation(&self) -> bool {
        matches!(self, Error::Compilation(_))
    }

    pub fn is_missing_column(&self) -> bool {
        matches!(self, Error::MissingColumn(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Storage(s) => s.sql.as_deref(),
            _ => None,
        }
    }

    /// Route this error through an optional hook.
    ///
    /// Returns `None` when the hook suppressed it.
    pub fn through_hook(self, hook: Option<&ErrorHook>) -> Option<Error> {
        let Some(hook) = hook else {
            return Some(self);
        };
        match hook(self) {
            HookAction::Raise(err) => Some(err),
            HookAction::Suppress => {
                tracing::warn!("error suppressed by exception hook");
                None
            }
        }
    }
}

impl ConfigurationError {
    /// Attach the declaring source name.
    pub fn on_source(mut self, source: impl Into<String>) -> Self {
        self.source_name = Some(source.into());
        self
    }

    /// Attach the relationship being declared.
    pub fn on_relationship(mut self, rel: impl Into<String>) -> Self {
        self.relationship = Some(rel.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "Configuration error: {}", e),
            Error::Compilation(e) => write!(f, "Compilation error: {}", e.message),
            Error::MissingColumn(e) => write!(f, "Missing column: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Payload(_) => write!(f, "Structured error payload"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source_name, &self.relationship) {
            (Some(src), Some(rel)) => write!(f, "{} (relationship '{}' on '{}')", self.message, rel, src),
            (Some(src), None) => write!(f, "{} (source '{}')", self.message, src),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for MissingColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' is not part of the selected columns ({})",
            self.column,
            self.available.join(", ")
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Error::Configuration(err)
    }
}

impl From<CompilationError> for Error {
    fn from(err: CompilationError) -> Self {
        Error::Compilation(err)
    }
}

impl From<MissingColumnError> for Error {
    fn from(err: MissingColumnError) -> Self {
        Error::MissingColumn(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for chainorm operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct AppFailure {
        code: u32,
    }

    #[test]
    fn configuration_message_names_relationship_and_source() {
        let err = ConfigurationError {
            kind: ConfigurationErrorKind::AmbiguousPrimaryKey,
            message: "ambiguous primary key, explicit condition required".to_string(),
            source_name: None,
            relationship: None,
        }
        .on_source("Book")
        .on_relationship("owner");

        let text = Error::from(err).to_string();
        assert!(text.contains("ambiguous primary key"));
        assert!(text.contains("'owner'"));
        assert!(text.contains("'Book'"));
    }

    #[test]
    fn missing_column_lists_available() {
        let err = Error::missing_column("missing", vec!["id".to_string(), "cnt".to_string()]);
        assert!(err.is_missing_column());
        assert_eq!(
            err.to_string(),
            "Missing column: column 'missing' is not part of the selected columns (id, cnt)"
        );
    }

    #[test]
    fn payload_survives_hook_unchanged() {
        let hook: ErrorHook =
            Arc::new(|_err| HookAction::Raise(Error::payload(AppFailure { code: 42 })));
        let raised = Error::Custom("boom".to_string())
            .through_hook(Some(&hook))
            .expect("hook raises");
        match raised {
            Error::Payload(p) => assert_eq!(p.downcast_ref::<AppFailure>(), Some(&AppFailure { code: 42 })),
            other => panic!("expected payload, got {other:?}"),
        }
    }

    #[test]
    fn suppressing_hook_swallows() {
        let hook: ErrorHook = Arc::new(|_err| HookAction::Suppress);
        assert!(Error::Custom("x".into()).through_hook(Some(&hook)).is_none());
        assert!(Error::Custom("x".into()).through_hook(None).is_some());
    }
}
