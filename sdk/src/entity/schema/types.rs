//! Resolved schema model for entity types

use crate::entity::types::{EntityError, Value};
use derive_builder::Builder;
use regex_lite::Regex;

/// Base types with a fixed get/set contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Date,
    /// Untyped; any non-null value passes through
    Mixed,
    ObjectId,
}

impl Primitive {
    /// Resolve a primitive type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(Primitive::String),
            "Number" => Some(Primitive::Number),
            "Boolean" => Some(Primitive::Boolean),
            "Date" => Some(Primitive::Date),
            "Mixed" => Some(Primitive::Mixed),
            "ObjectId" | "ObjectID" => Some(Primitive::ObjectId),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Number => "Number",
            Primitive::Boolean => "Boolean",
            Primitive::Date => "Date",
            Primitive::Mixed => "Mixed",
            Primitive::ObjectId => "ObjectId",
        }
    }
}

/// Declared type of a property, resolved once when the schema is built
#[derive(Debug, Clone)]
pub enum PropertyType {
    Primitive(Primitive),
    /// Structured object; no declared properties means an opaque mapping
    Object(Vec<Property>),
    /// Sequence of items described by the inner descriptor
    Array(Box<PropertyDescriptor>),
    /// Reference to another registered entity type
    Reference(String),
}

impl PropertyType {
    /// Resolve a type name. Names that are not base types become references.
    pub fn parse(name: &str) -> Self {
        if let Some(primitive) = Primitive::from_name(name) {
            return PropertyType::Primitive(primitive);
        }
        match name {
            "Object" => PropertyType::Object(Vec::new()),
            "Array" => PropertyType::Array(Box::new(PropertyDescriptor::mixed())),
            _ => PropertyType::Reference(name.to_string()),
        }
    }

    /// Human-readable name used in error messages
    pub fn type_name(&self) -> String {
        match self {
            PropertyType::Primitive(p) => p.name().to_string(),
            PropertyType::Object(_) => "Object".to_string(),
            PropertyType::Array(_) => "Array".to_string(),
            PropertyType::Reference(target) => target.clone(),
        }
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, PropertyType::Primitive(Primitive::Mixed))
    }

    pub fn reference_target(&self) -> Option<&str> {
        match self {
            PropertyType::Reference(target) => Some(target),
            _ => None,
        }
    }
}

/// A property type plus its constraints
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PropertyDescriptor {
    pub kind: PropertyType,
    /// Missing value fails at read time unless a default exists
    #[builder(default)]
    pub required: bool,
    /// Surfaced in the computed view when the raw value is absent
    #[builder(default, setter(into, strip_option, name = "default_value"))]
    pub default: Option<Value>,
    /// Minimum value for numbers, minimum length for strings and arrays
    #[builder(default, setter(into, strip_option))]
    pub min: Option<f64>,
    /// Maximum value for numbers, maximum length for strings and arrays
    #[builder(default, setter(into, strip_option))]
    pub max: Option<f64>,
    /// Exact length for strings and arrays
    #[builder(default, setter(into, strip_option))]
    pub length: Option<usize>,
    #[builder(default, setter(into, strip_option))]
    pub pattern: Option<Regex>,
    #[builder(default, setter(into, strip_option))]
    pub one_of: Option<Vec<Value>>,
    /// Fields of the referenced entity to denormalize at this path
    #[builder(default)]
    pub embed: Vec<String>,
}

impl PropertyDescriptor {
    pub fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            min: None,
            max: None,
            length: None,
            pattern: None,
            one_of: None,
            embed: Vec::new(),
        }
    }

    pub fn builder() -> PropertyDescriptorBuilder {
        PropertyDescriptorBuilder::default()
    }

    pub fn string() -> Self {
        Self::new(PropertyType::Primitive(Primitive::String))
    }

    pub fn number() -> Self {
        Self::new(PropertyType::Primitive(Primitive::Number))
    }

    pub fn boolean() -> Self {
        Self::new(PropertyType::Primitive(Primitive::Boolean))
    }

    pub fn date() -> Self {
        Self::new(PropertyType::Primitive(Primitive::Date))
    }

    pub fn mixed() -> Self {
        Self::new(PropertyType::Primitive(Primitive::Mixed))
    }

    pub fn object_id() -> Self {
        Self::new(PropertyType::Primitive(Primitive::ObjectId))
    }

    /// Opaque object until properties are added with `with_property`
    pub fn object() -> Self {
        Self::new(PropertyType::Object(Vec::new()))
    }

    /// Array of untyped items
    pub fn array() -> Self {
        Self::array_of(Self::mixed())
    }

    pub fn array_of(item: PropertyDescriptor) -> Self {
        Self::new(PropertyType::Array(Box::new(item)))
    }

    pub fn reference<S: Into<String>>(target: S) -> Self {
        Self::new(PropertyType::Reference(target.into()))
    }

    /// Descriptor for a type given by name
    pub fn of(type_name: &str) -> Self {
        Self::new(PropertyType::parse(type_name))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default<V: Into<Value>>(mut self, value: V) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.one_of = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn embed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.embed = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a nested property on an object descriptor.
    ///
    /// Has no effect on non-object descriptors.
    pub fn with_property<S: Into<String>>(mut self, name: S, descriptor: PropertyDescriptor) -> Self {
        if let PropertyType::Object(properties) = &mut self.kind {
            properties.push(Property::new(name, descriptor));
        }
        self
    }

    /// Nested property lookup for object descriptors
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        match &self.kind {
            PropertyType::Object(properties) => properties
                .iter()
                .find(|p| p.name == name)
                .map(|p| &p.descriptor),
            _ => None,
        }
    }
}

impl From<PropertyDescriptorBuilderError> for EntityError {
    fn from(err: PropertyDescriptorBuilderError) -> Self {
        EntityError::schema("<descriptor>", err.to_string())
    }
}

/// Named property in declaration order
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub descriptor: PropertyDescriptor,
}

impl Property {
    pub fn new<S: Into<String>>(name: S, descriptor: PropertyDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// A location holding, or array-holding, a reference to another entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Dot path, with array levels omitted
    pub path: String,
    /// Referenced entity type
    pub target: String,
    /// Fields denormalized into stubs at this path
    pub embed: Vec<String>,
    /// `path` split on dots
    pub segments: Vec<String>,
}

impl Dependency {
    pub fn new(path: String, target: String, embed: Vec<String>) -> Self {
        let segments = path.split('.').map(str::to_string).collect();
        Self {
            path,
            target,
            embed,
            segments,
        }
    }
}

/// Compiled definition of one entity type
#[derive(Debug, Clone)]
pub struct Schema {
    /// Entity type name
    pub name: String,
    /// Declared properties, in declaration order
    pub properties: Vec<Property>,
    /// Reference paths within this entity; filled in at registration
    pub dependencies: Vec<Dependency>,
}

impl Schema {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Add a property; a later declaration with the same name replaces the earlier one
    pub fn with_property<S: Into<String>>(mut self, name: S, descriptor: PropertyDescriptor) -> Self {
        self.add_property(name, descriptor);
        self
    }

    pub fn add_property<S: Into<String>>(&mut self, name: S, descriptor: PropertyDescriptor) {
        let name = name.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.descriptor = descriptor,
            None => self.properties.push(Property::new(name, descriptor)),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.descriptor)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    pub fn dependency(&self, path: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.path == path)
    }

    pub fn dependency_paths(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.path.clone()).collect()
    }

    /// Compute the flat list of reference paths declared by this schema.
    ///
    /// Only this schema's own properties are walked, so cyclic references
    /// between entity types cannot recurse.
    pub fn collect_dependencies(&self) -> Vec<Dependency> {
        let mut out = Vec::new();
        for property in &self.properties {
            collect_from_descriptor(&property.name, &property.descriptor, &mut out);
        }
        out
    }
}

fn collect_from_descriptor(path: &str, descriptor: &PropertyDescriptor, out: &mut Vec<Dependency>) {
    match &descriptor.kind {
        PropertyType::Reference(target) => out.push(Dependency::new(
            path.to_string(),
            target.clone(),
            descriptor.embed.clone(),
        )),
        PropertyType::Array(item) => collect_from_descriptor(path, item, out),
        PropertyType::Object(properties) => {
            for property in properties {
                let nested = format!("{}.{}", path, property.name);
                collect_from_descriptor(&nested, &property.descriptor, out);
            }
        }
        PropertyType::Primitive(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_type_names() {
        assert!(matches!(
            PropertyType::parse("ObjectID"),
            PropertyType::Primitive(Primitive::ObjectId)
        ));
        assert!(matches!(PropertyType::parse("Object"), PropertyType::Object(ref p) if p.is_empty()));
        assert!(matches!(PropertyType::parse("Array"), PropertyType::Array(ref item) if item.kind.is_mixed()));
        assert_eq!(PropertyType::parse("User").reference_target(), Some("User"));
    }

    #[test]
    fn dependencies_cover_nested_and_array_references() {
        let schema = Schema::new("Post")
            .with_property("title", PropertyDescriptor::string())
            .with_property("author", PropertyDescriptor::reference("User").embed(["name"]))
            .with_property(
                "comments",
                PropertyDescriptor::array_of(PropertyDescriptor::reference("Comment")),
            )
            .with_property(
                "meta",
                PropertyDescriptor::object().with_property(
                    "editors",
                    PropertyDescriptor::array_of(
                        PropertyDescriptor::object()
                            .with_property("who", PropertyDescriptor::reference("User")),
                    ),
                ),
            );

        let deps = schema.collect_dependencies();
        let paths: Vec<_> = deps.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["author", "comments", "meta.editors.who"]);
        assert_eq!(deps[0].embed, vec!["name".to_string()]);
        assert_eq!(deps[2].segments, vec!["meta", "editors", "who"]);
        assert_eq!(deps[2].target, "User");
    }

    #[test]
    fn builder_requires_kind() {
        let err = PropertyDescriptor::builder().required(true).build().unwrap_err();
        let err: EntityError = err.into();
        assert_eq!(err.kind(), "schema");

        let desc = PropertyDescriptor::builder()
            .kind(PropertyType::Primitive(Primitive::Number))
            .min(1.0)
            .build()
            .unwrap();
        assert_eq!(desc.min, Some(1.0));
        assert!(!desc.required);
    }

    #[test]
    fn redeclaring_a_property_replaces_it() {
        let schema = Schema::new("User")
            .with_property("age", PropertyDescriptor::string())
            .with_property("age", PropertyDescriptor::number());
        assert_eq!(schema.properties.len(), 1);
        assert!(matches!(
            schema.property("age").unwrap().kind,
            PropertyType::Primitive(Primitive::Number)
        ));
    }
}
