//! In-memory form of the supported XML Schema subset.

use super::XSD_NAMESPACE;
use crate::errors::{CoreError, Result};
use regex::Regex;
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum BuiltIn {
    AnyType,
    AnySimpleType,
    String,
    Boolean,
    Int,
    Integer,
    Long,
    Decimal,
    Double,
    Date,
    DateTime,
}

impl BuiltIn {
    fn from_local_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "anyType" => Self::AnyType,
            "anySimpleType" => Self::AnySimpleType,
            "string" | "normalizedString" | "token" => Self::String,
            "boolean" => Self::Boolean,
            "int" => Self::Int,
            "integer" => Self::Integer,
            "long" => Self::Long,
            "decimal" => Self::Decimal,
            "double" | "float" => Self::Double,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            _ => return None,
        };
        Some(builtin)
    }

    pub(crate) fn xsd_name(&self) -> &'static str {
        match self {
            Self::AnyType => "anyType",
            Self::AnySimpleType => "anySimpleType",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Decimal => "decimal",
            Self::Double => "double",
            Self::Date => "date",
            Self::DateTime => "dateTime",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TypeRef {
    BuiltIn(BuiltIn),
    Named(String),
    Simple(Box<SimpleType>),
    Complex(Box<ComplexType>),
}

#[derive(Debug, Clone)]
pub(crate) struct SimpleType {
    pub base: TypeRef,
    pub facets: Facets,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Facets {
    pub enumeration: Vec<String>,
    pub patterns: Vec<Regex>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ComplexType {
    pub content: Content,
    pub attributes: Vec<AttributeDecl>,
    pub any_attribute: bool,
    pub mixed: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Content {
    Empty,
    Elements(Group),
    Simple(TypeRef),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Compositor {
    Sequence,
    Choice,
    All,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Occurs {
    pub min: u32,
    /// `None` is `unbounded`.
    pub max: Option<u32>,
}

impl Occurs {
    pub(crate) fn allows_more(&self, count: u32) -> bool {
        self.max.map_or(true, |max| count < max)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Group {
    pub compositor: Compositor,
    pub particles: Vec<Particle>,
    pub occurs: Occurs,
}

#[derive(Debug, Clone)]
pub(crate) enum Particle {
    Element { decl: ElementDecl, occurs: Occurs },
    Any { occurs: Occurs },
    Group(Group),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementDecl {
    pub name: String,
    /// `None` for `ref="..."` particles, which take the global declaration's type.
    pub type_ref: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeDecl {
    pub name: String,
    pub type_ref: TypeRef,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum NamedType {
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug, Clone)]
pub(crate) struct SchemaModel {
    pub target_namespace: Option<String>,
    pub qualified: bool,
    pub elements: BTreeMap<String, ElementDecl>,
    pub types: HashMap<String, NamedType>,
}

pub(crate) fn parse_schema(text: &str) -> Result<SchemaModel> {
    let doc = Document::parse(text)
        .map_err(|err| CoreError::schema(format!("schema is not well-formed XML: {err}")))?;
    let root = doc.root_element();
    if xsd_element_name(root)? != "schema" {
        return Err(CoreError::schema("root element must be xs:schema"));
    }

    let mut model = SchemaModel {
        target_namespace: root.attribute("targetNamespace").map(str::to_string),
        qualified: root.attribute("elementFormDefault") == Some("qualified"),
        elements: BTreeMap::new(),
        types: HashMap::new(),
    };
    let mut parser = Parser::default();

    for child in root.children().filter(Node::is_element) {
        match xsd_element_name(child)? {
            "element" => {
                let decl = parser.element(child)?;
                if decl.type_ref.is_none() {
                    return Err(CoreError::schema("top-level elements cannot use ref"));
                }
                if model.elements.contains_key(&decl.name) {
                    return Err(CoreError::schema(format!(
                        "element '{}' is declared twice",
                        decl.name
                    )));
                }
                model.elements.insert(decl.name.clone(), decl);
            }
            "complexType" => {
                let name = required_attribute(child, "name")?;
                let complex = parser.complex_type(child)?;
                model.insert_type(name, NamedType::Complex(complex))?;
            }
            "simpleType" => {
                let name = required_attribute(child, "name")?;
                let simple = parser.simple_type(child)?;
                model.insert_type(name, NamedType::Simple(simple))?;
            }
            "annotation" => {}
            other => return Err(unsupported(other)),
        }
    }

    parser.check_references(&model)?;
    Ok(model)
}

impl SchemaModel {
    fn insert_type(&mut self, name: &str, ty: NamedType) -> Result<()> {
        if self.types.insert(name.to_string(), ty).is_some() {
            return Err(CoreError::schema(format!("type '{name}' is declared twice")));
        }
        Ok(())
    }
}

/// Names that must resolve once the whole schema has been read.
#[derive(Default)]
struct Parser {
    type_refs: Vec<String>,
    simple_type_refs: Vec<String>,
    element_refs: Vec<String>,
}

impl Parser {
    fn element(&mut self, node: Node<'_, '_>) -> Result<ElementDecl> {
        if let Some(reference) = node.attribute("ref") {
            let name = local_part(reference).to_string();
            self.element_refs.push(name.clone());
            return Ok(ElementDecl { name, type_ref: None });
        }

        let name = required_attribute(node, "name")?.to_string();
        let type_ref = match node.attribute("type") {
            Some(qname) => self.type_ref(node, qname, false)?,
            None => match xsd_children(node)?.into_iter().next() {
                Some((child, "complexType")) => {
                    TypeRef::Complex(Box::new(self.complex_type(child)?))
                }
                Some((child, "simpleType")) => TypeRef::Simple(Box::new(self.simple_type(child)?)),
                Some((_, other)) => return Err(unsupported(other)),
                None => TypeRef::BuiltIn(BuiltIn::AnyType),
            },
        };
        Ok(ElementDecl {
            name,
            type_ref: Some(type_ref),
        })
    }

    fn complex_type(&mut self, node: Node<'_, '_>) -> Result<ComplexType> {
        let mut complex = ComplexType {
            content: Content::Empty,
            attributes: Vec::new(),
            any_attribute: false,
            mixed: node.attribute("mixed") == Some("true"),
        };
        for (child, name) in xsd_children(node)? {
            match name {
                "sequence" | "choice" | "all" => {
                    complex.content = Content::Elements(self.group(child)?)
                }
                "attribute" => self.push_attribute(&mut complex, child)?,
                "anyAttribute" => complex.any_attribute = true,
                "simpleContent" => self.simple_content(&mut complex, child)?,
                other => return Err(unsupported(other)),
            }
        }
        Ok(complex)
    }

    fn simple_content(&mut self, complex: &mut ComplexType, node: Node<'_, '_>) -> Result<()> {
        let Some((extension, "extension")) = xsd_children(node)?.into_iter().next() else {
            return Err(CoreError::schema("xs:simpleContent must contain xs:extension"));
        };
        let base = required_attribute(extension, "base")?;
        complex.content = Content::Simple(self.type_ref(extension, base, true)?);
        for (child, name) in xsd_children(extension)? {
            match name {
                "attribute" => self.push_attribute(complex, child)?,
                "anyAttribute" => complex.any_attribute = true,
                other => return Err(unsupported(other)),
            }
        }
        Ok(())
    }

    fn push_attribute(&mut self, complex: &mut ComplexType, node: Node<'_, '_>) -> Result<()> {
        let name = required_attribute(node, "name")?.to_string();
        let type_ref = match node.attribute("type") {
            Some(qname) => self.type_ref(node, qname, true)?,
            None => match xsd_children(node)?.into_iter().next() {
                Some((child, "simpleType")) => TypeRef::Simple(Box::new(self.simple_type(child)?)),
                Some((_, other)) => return Err(unsupported(other)),
                None => TypeRef::BuiltIn(BuiltIn::AnySimpleType),
            },
        };
        match node.attribute("use").unwrap_or("optional") {
            "prohibited" => {}
            usage @ ("optional" | "required") => complex.attributes.push(AttributeDecl {
                name,
                type_ref,
                required: usage == "required",
            }),
            other => return Err(CoreError::schema(format!("invalid attribute use '{other}'"))),
        }
        Ok(())
    }

    fn group(&mut self, node: Node<'_, '_>) -> Result<Group> {
        let compositor = match node.tag_name().name() {
            "sequence" => Compositor::Sequence,
            "choice" => Compositor::Choice,
            "all" => Compositor::All,
            other => return Err(unsupported(other)),
        };
        let mut particles = Vec::new();
        for (child, name) in xsd_children(node)? {
            let particle = match name {
                "element" => Particle::Element {
                    decl: self.element(child)?,
                    occurs: occurs(child)?,
                },
                "any" => Particle::Any { occurs: occurs(child)? },
                "sequence" | "choice" if compositor != Compositor::All => {
                    Particle::Group(self.group(child)?)
                }
                other => return Err(unsupported(other)),
            };
            particles.push(particle);
        }
        Ok(Group {
            compositor,
            particles,
            occurs: occurs(node)?,
        })
    }

    fn simple_type(&mut self, node: Node<'_, '_>) -> Result<SimpleType> {
        let Some((restriction, "restriction")) = xsd_children(node)?.into_iter().next() else {
            return Err(CoreError::schema("only xs:restriction simple types are supported"));
        };
        let base = required_attribute(restriction, "base")?;
        let base = self.type_ref(restriction, base, true)?;

        let mut facets = Facets::default();
        for (facet, name) in xsd_children(restriction)? {
            let value = required_attribute(facet, "value")?;
            match name {
                "enumeration" => facets.enumeration.push(value.to_string()),
                "pattern" => {
                    let regex = Regex::new(&format!("^(?:{value})$")).map_err(|err| {
                        CoreError::schema(format!("unsupported pattern '{value}': {err}"))
                    })?;
                    facets.patterns.push(regex);
                }
                "length" => {
                    let length = parse_facet::<usize>(name, value)?;
                    facets.min_length = Some(length);
                    facets.max_length = Some(length);
                }
                "minLength" => facets.min_length = Some(parse_facet(name, value)?),
                "maxLength" => facets.max_length = Some(parse_facet(name, value)?),
                "minInclusive" => facets.min_inclusive = Some(parse_facet(name, value)?),
                "maxInclusive" => facets.max_inclusive = Some(parse_facet(name, value)?),
                other => return Err(unsupported(other)),
            }
        }
        Ok(SimpleType { base, facets })
    }

    fn type_ref(&mut self, node: Node<'_, '_>, qname: &str, simple_only: bool) -> Result<TypeRef> {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qname),
        };
        if node.lookup_namespace_uri(prefix) == Some(XSD_NAMESPACE) {
            let builtin = BuiltIn::from_local_name(local)
                .ok_or_else(|| CoreError::schema(format!("unsupported built-in type '{qname}'")))?;
            if simple_only && builtin == BuiltIn::AnyType {
                return Err(CoreError::schema("xs:anyType is not a simple type"));
            }
            return Ok(TypeRef::BuiltIn(builtin));
        }
        if simple_only {
            self.simple_type_refs.push(local.to_string());
        } else {
            self.type_refs.push(local.to_string());
        }
        Ok(TypeRef::Named(local.to_string()))
    }

    fn check_references(&self, model: &SchemaModel) -> Result<()> {
        for name in &self.type_refs {
            if !model.types.contains_key(name) {
                return Err(CoreError::schema(format!("unknown type '{name}'")));
            }
        }
        for name in &self.simple_type_refs {
            match model.types.get(name) {
                Some(NamedType::Simple(_)) => {}
                Some(NamedType::Complex(_)) => {
                    return Err(CoreError::schema(format!("type '{name}' is not a simple type")))
                }
                None => return Err(CoreError::schema(format!("unknown type '{name}'"))),
            }
        }
        for name in &self.element_refs {
            if !model.elements.contains_key(name) {
                return Err(CoreError::schema(format!("unknown element '{name}'")));
            }
        }
        Ok(())
    }
}

fn occurs(node: Node<'_, '_>) -> Result<Occurs> {
    let min = match node.attribute("minOccurs") {
        Some(value) => parse_facet::<u32>("minOccurs", value)?,
        None => 1,
    };
    let max = match node.attribute("maxOccurs") {
        Some("unbounded") => None,
        Some(value) => Some(parse_facet::<u32>("maxOccurs", value)?),
        None => Some(1),
    };
    if max.is_some_and(|max| max < min) {
        return Err(CoreError::schema(format!(
            "maxOccurs is smaller than minOccurs on '{}'",
            node.attribute("name")
                .or_else(|| node.attribute("ref"))
                .unwrap_or(node.tag_name().name())
        )));
    }
    Ok(Occurs { min, max })
}

fn parse_facet<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::schema(format!("invalid value '{value}' for {name}")))
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        CoreError::schema(format!(
            "xs:{} is missing the '{name}' attribute",
            node.tag_name().name()
        ))
    })
}

fn xsd_element_name<'a>(node: Node<'a, '_>) -> Result<&'a str> {
    if node.tag_name().namespace() != Some(XSD_NAMESPACE) {
        return Err(CoreError::schema(format!(
            "<{}> is not in the XML Schema namespace",
            node.tag_name().name()
        )));
    }
    Ok(node.tag_name().name())
}

/// Element children in the XSD namespace, skipping annotations.
fn xsd_children<'a, 'input>(node: Node<'a, 'input>) -> Result<Vec<(Node<'a, 'input>, &'a str)>> {
    let mut children = Vec::new();
    for child in node.children().filter(Node::is_element) {
        let name = xsd_element_name(child)?;
        if name != "annotation" {
            children.push((child, name));
        }
    }
    Ok(children)
}

fn local_part(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

fn unsupported(construct: &str) -> CoreError {
    CoreError::schema(format!("unsupported schema construct xs:{construct}"))
}
