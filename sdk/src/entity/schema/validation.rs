//! Validation of registered schemas

use super::registry::SchemaRegistry;
use super::types::{Property, PropertyDescriptor, PropertyType, Schema};
use anyhow::Result;

/// Validator for entity schemas
pub struct SchemaValidator {
    /// Validation errors collected during validation
    errors: Vec<String>,
    /// Validation warnings collected during validation
    warnings: Vec<String>,
}

impl SchemaValidator {
    /// Create a new schema validator
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Validate every schema in the registry, including cross-type references
    pub fn validate(&mut self, registry: &SchemaRegistry) -> Result<ValidationResult> {
        self.errors.clear();
        self.warnings.clear();

        for schema in registry.schemas() {
            self.validate_entity(schema, registry);
        }

        Ok(ValidationResult {
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        })
    }

    /// Validate a single entity
    fn validate_entity(&mut self, schema: &Schema, registry: &SchemaRegistry) {
        if schema.name.is_empty() {
            self.errors.push("Entity name cannot be empty".to_string());
            return;
        }

        if !schema.name.chars().next().unwrap_or('a').is_ascii_uppercase() {
            self.warnings.push(format!(
                "Entity name '{}' should start with an uppercase letter",
                schema.name
            ));
        }

        self.validate_properties(&schema.name, "", &schema.properties, registry);
    }

    fn validate_properties(
        &mut self,
        entity: &str,
        prefix: &str,
        properties: &[Property],
        registry: &SchemaRegistry,
    ) {
        for property in properties {
            if property.name.is_empty() {
                self.errors.push(format!(
                    "Property name cannot be empty in entity '{}'",
                    entity
                ));
                continue;
            }
            if property.name.contains('.') {
                self.errors.push(format!(
                    "Property name '{}' in entity '{}' must not contain '.'",
                    property.name, entity
                ));
                continue;
            }
            let path = if prefix.is_empty() {
                property.name.clone()
            } else {
                format!("{}.{}", prefix, property.name)
            };
            self.validate_descriptor(entity, &path, &property.descriptor, registry);
        }
    }

    fn validate_descriptor(
        &mut self,
        entity: &str,
        path: &str,
        descriptor: &PropertyDescriptor,
        registry: &SchemaRegistry,
    ) {
        if !descriptor.embed.is_empty() && descriptor.kind.reference_target().is_none() {
            self.warnings.push(format!(
                "Embed fields on '{}' in entity '{}' are ignored: '{}' is not a reference",
                path,
                entity,
                descriptor.kind.type_name()
            ));
        }

        match &descriptor.kind {
            PropertyType::Reference(target) => match registry.get(target) {
                Some(target_schema) => {
                    for field in &descriptor.embed {
                        if field != crate::entity::types::ID_KEY && !target_schema.has_property(field) {
                            self.errors.push(format!(
                                "Embed field '{}' at '{}' in entity '{}' is not a property of '{}'",
                                field, path, entity, target
                            ));
                        }
                    }
                }
                None => {
                    self.errors.push(format!(
                        "Expected type of '{}' in entity '{}' to be one of base types or model, got '{}'",
                        path, entity, target
                    ));
                }
            },
            PropertyType::Array(item) => self.validate_descriptor(entity, path, item, registry),
            PropertyType::Object(properties) => {
                self.validate_properties(entity, path, properties, registry)
            }
            PropertyType::Primitive(_) => {}
        }
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of schema validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Validation errors that must be fixed
    pub errors: Vec<String>,
    /// Validation warnings (suggestions for improvement)
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get total number of issues (errors + warnings)
    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(schemas: Vec<Schema>) -> ValidationResult {
        let mut registry = SchemaRegistry::new();
        for schema in schemas {
            registry.register(schema).unwrap();
        }
        SchemaValidator::new().validate(&registry).unwrap()
    }

    #[test]
    fn test_validate_valid_schema() {
        let result = validate(vec![
            Schema::new("User").with_property("name", PropertyDescriptor::string().required()),
            Schema::new("Post")
                .with_property("author", PropertyDescriptor::reference("User").embed(["name"])),
        ]);
        assert!(result.is_valid());
        assert_eq!(result.issue_count(), 0);
    }

    #[test]
    fn test_unknown_reference_target() {
        let result = validate(vec![Schema::new("Post").with_property(
            "tags",
            PropertyDescriptor::array_of(PropertyDescriptor::of("Tag")),
        )]);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("'tags'"));
        assert!(result.errors[0].contains("'Tag'"));
    }

    #[test]
    fn test_embed_field_must_exist_on_target() {
        let result = validate(vec![
            Schema::new("User").with_property("name", PropertyDescriptor::string()),
            Schema::new("Post")
                .with_property("author", PropertyDescriptor::reference("User").embed(["email"])),
        ]);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("email"));
    }

    #[test]
    fn test_warnings() {
        let result = validate(vec![
            Schema::new("user").with_property("name", PropertyDescriptor::string().embed(["x"])),
        ]);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_dotted_property_name() {
        let result = validate(vec![
            Schema::new("User").with_property(
                "address",
                PropertyDescriptor::object().with_property("zip.code", PropertyDescriptor::string()),
            ),
        ]);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("zip.code"));
    }

    #[test]
    fn test_empty_property_name() {
        let result = validate(vec![
            Schema::new("User").with_property("", PropertyDescriptor::string()),
        ]);
        assert!(!result.is_valid());
    }
}
