//! Entity schema model, registration and validation

pub mod registry;
pub mod types;
pub mod validation;

pub use registry::SchemaRegistry;
pub use types::{
    Dependency, Primitive, Property, PropertyDescriptor, PropertyDescriptorBuilder,
    PropertyDescriptorBuilderError, PropertyType, Schema,
};
pub use validation::{SchemaValidator, ValidationResult};
