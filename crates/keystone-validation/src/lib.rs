//! Keystone Validation
//!
//! A composable validation engine: leaf validators over JSON-shaped
//! subjects, AND/OR composites that mirror their structure in the result
//! tree, explicit per-field rule registration for objects, and a
//! self-validation capability trait.

pub mod composite;
pub mod object;
pub mod results;
pub mod validators;

// Re-export commonly used types
pub use composite::{AndCompositeValidator, OrCompositeValidator};
pub use object::{validate_each, validate_subject, ObjectValidator, SelfValidatable};
pub use results::{ValidationFault, ValidationResult, ValidationResults};
pub use validators::{
    ContainsCharacters, ContainsCharactersValidator, DomainValidator, NotNullValidator,
    RangeValidator, RegexValidator, RelativeDateTimeValidator, StringLengthValidator, Validator,
    ValidatorError,
};
