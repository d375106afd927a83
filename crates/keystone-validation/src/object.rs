use crate::results::{ValidationResult, ValidationResults};
use crate::validators::Validator;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Per-field validation rules for object-shaped subjects.
///
/// Rules are registered explicitly through the builder, field by field,
/// and evaluated in registration order. A missing field is validated as
/// null, so a `NotNullValidator` on it expresses "required".
pub struct ObjectValidator {
    fields: Vec<FieldRules>,
    tag: Option<String>,
}

struct FieldRules {
    field: String,
    validators: Vec<Box<dyn Validator>>,
}

impl ObjectValidator {
    pub fn builder() -> ObjectValidatorBuilder {
        ObjectValidatorBuilder {
            fields: Vec::new(),
            tag: None,
        }
    }

    /// Names of the registered fields, in evaluation order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|rules| rules.field.as_str()).collect()
    }
}

pub struct ObjectValidatorBuilder {
    fields: Vec<FieldRules>,
    tag: Option<String>,
}

impl ObjectValidatorBuilder {
    /// Register the ordered rule list for one field.
    pub fn field(mut self, name: impl Into<String>, validators: Vec<Box<dyn Validator>>) -> Self {
        self.fields.push(FieldRules {
            field: name.into(),
            validators,
        });
        self
    }

    /// Tag applied to the structural failure raised for non-object
    /// subjects.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn build(self) -> ObjectValidator {
        ObjectValidator {
            fields: self.fields,
            tag: self.tag,
        }
    }
}

impl Validator for ObjectValidator {
    fn name(&self) -> &'static str {
        "ObjectValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let Value::Object(map) = subject else {
            let mut result =
                ValidationResult::new("subject is not an object", self.name())
                    .with_target(subject.clone());
            if let Some(key) = key {
                result = result.with_key(key);
            }
            if let Some(ref tag) = self.tag {
                result = result.with_tag(tag.clone());
            }
            results.add(result);
            return;
        };

        for rules in &self.fields {
            let field_value = map.get(&rules.field).unwrap_or(&Value::Null);
            for validator in &rules.validators {
                validator.validate_value(field_value, Some(&rules.field), results);
            }
        }
    }
}

/// Capability interface for subjects that carry their own validation
/// routine, invoked explicitly after the structural rules.
pub trait SelfValidatable {
    fn self_validate(&self, results: &mut ValidationResults);
}

/// Validate a typed subject: structural rules first, then the subject's
/// own routine, with the structural results ordered first.
pub fn validate_subject<T>(validator: &ObjectValidator, subject: &T) -> ValidationResults
where
    T: Serialize + SelfValidatable,
{
    let mut results = match serde_json::to_value(subject) {
        Ok(value) => validator.validate(&value),
        Err(e) => {
            warn!(error = %e, "subject could not be serialized for validation");
            let mut results = ValidationResults::new();
            results.add(ValidationResult::new(
                format!("subject could not be inspected: {}", e),
                validator.name(),
            ));
            results
        }
    };
    subject.self_validate(&mut results);
    results
}

/// Validate each element of a collection, keying failures by index.
pub fn validate_each(validator: &dyn Validator, subjects: &[Value]) -> ValidationResults {
    let mut results = ValidationResults::new();
    for (index, subject) in subjects.iter().enumerate() {
        validator.validate_value(subject, Some(&index.to_string()), &mut results);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::OrCompositeValidator;
    use crate::validators::{
        NotNullValidator, RangeValidator, RegexValidator, StringLengthValidator,
    };
    use serde_json::json;

    fn product_rules() -> ObjectValidator {
        ObjectValidator::builder()
            .field(
                "id",
                vec![
                    Box::new(NotNullValidator::new().with_message("product id is required")),
                    Box::new(
                        RegexValidator::new("^[A-Z]{2}[0-9]{4}$")
                            .unwrap()
                            .with_message("product id must be 2 capital letters and 4 numbers"),
                    ),
                ],
            )
            .field(
                "name",
                vec![Box::new(
                    StringLengthValidator::new(3, 50)
                        .with_message("name must be between {min} and {max} characters"),
                )],
            )
            .field(
                "in_stock",
                vec![Box::new(
                    RangeValidator::at_least(0.0)
                        .with_message("quantity in stock cannot be negative"),
                )],
            )
            .field(
                "description",
                vec![Box::new(OrCompositeValidator::new(vec![
                    Box::new(NotNullValidator::negated()),
                    Box::new(StringLengthValidator::new(5, 100)),
                ])
                .with_message("description can be null or 5 to 100 characters"))],
            )
            .build()
    }

    #[test]
    fn test_valid_object_passes() {
        let subject = json!({
            "id": "AA1234",
            "name": "A Valid Product",
            "in_stock": 3,
            "description": null,
        });
        assert!(product_rules().validate(&subject).is_valid());
    }

    #[test]
    fn test_failures_keyed_by_field_in_registration_order() {
        let subject = json!({
            "id": "42",
            "name": "-",
            "in_stock": -3,
            "description": null,
        });
        let results = product_rules().validate(&subject);
        assert_eq!(results.len(), 3);

        let keys: Vec<&str> = results
            .iter()
            .filter_map(|result| result.key.as_deref())
            .collect();
        assert_eq!(keys, vec!["id", "name", "in_stock"]);
    }

    #[test]
    fn test_missing_field_validated_as_null() {
        let results = product_rules().validate(&json!({"name": "A Valid Product"}));
        let id_failures: Vec<_> = results
            .iter()
            .filter(|result| result.key.as_deref() == Some("id"))
            .collect();
        // NotNull and the regex both reject a missing id
        assert_eq!(id_failures.len(), 2);
        assert_eq!(id_failures[0].message, "product id is required");
    }

    #[test]
    fn test_non_object_subject_is_a_structural_failure() {
        let results = product_rules().validate(&json!("not an object"));
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.iter().next().unwrap().message,
            "subject is not an object"
        );
    }

    #[derive(Serialize)]
    struct Product {
        id: String,
        name: String,
        in_stock: i32,
        on_order: i32,
        description: Option<String>,
        date_due: Option<String>,
    }

    impl SelfValidatable for Product {
        fn self_validate(&self, results: &mut ValidationResults) {
            match self.date_due {
                None => {
                    if self.on_order > 0 {
                        results.add(ValidationResult::new(
                            "must provide a delivery due date for stock on back order",
                            "ProductSelfValidation",
                        ));
                    }
                }
                Some(_) => {
                    if self.on_order == 0 {
                        results.add(ValidationResult::new(
                            "can specify a delivery due date only when stock is on back order",
                            "ProductSelfValidation",
                        ));
                    }
                }
            }
            if self.in_stock + self.on_order > 100 {
                results.add(ValidationResult::new(
                    "total inventory (in stock and on order) cannot exceed 100 items",
                    "ProductSelfValidation",
                ));
            }
        }
    }

    #[test]
    fn test_self_validation_appends_after_structural_results() {
        let product = Product {
            id: "42".to_string(),
            name: "An Invalid Product".to_string(),
            in_stock: 60,
            on_order: 50,
            description: None,
            date_due: None,
        };
        let results = validate_subject(&product_rules(), &product);

        let validators: Vec<&str> = results.iter().map(|r| r.validator.as_str()).collect();
        // Structural failures come first, self-validation afterwards
        assert_eq!(
            validators,
            vec![
                "RegexValidator",
                "ProductSelfValidation",
                "ProductSelfValidation"
            ]
        );
    }

    #[test]
    fn test_self_validation_runs_on_structurally_valid_subject() {
        let product = Product {
            id: "AA1234".to_string(),
            name: "A Valid Product".to_string(),
            in_stock: 3,
            on_order: 0,
            description: Some("Something to keep the grandchildren quiet".to_string()),
            date_due: Some("2026-10-07T00:00:00Z".to_string()),
        };
        let results = validate_subject(&product_rules(), &product);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.iter().next().unwrap().validator,
            "ProductSelfValidation"
        );
    }

    #[test]
    fn test_validate_each_keys_by_index() {
        let validator = RangeValidator::new(0.0, 10.0);
        let subjects = vec![json!(5), json!(42), json!(7), json!(-1)];
        let results = validate_each(&validator, &subjects);
        assert_eq!(results.len(), 2);

        let keys: Vec<&str> = results
            .iter()
            .filter_map(|result| result.key.as_deref())
            .collect();
        assert_eq!(keys, vec!["1", "3"]);
    }

    #[test]
    fn test_validate_subject_is_idempotent() {
        let product = Product {
            id: "42".to_string(),
            name: "An Invalid Product".to_string(),
            in_stock: 60,
            on_order: 50,
            description: None,
            date_due: None,
        };
        let rules = product_rules();
        assert_eq!(
            validate_subject(&rules, &product),
            validate_subject(&rules, &product)
        );
    }
}
