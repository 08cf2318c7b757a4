//! Checks a parsed document against a [`SchemaModel`].
//!
//! Content models are matched greedily, which is exact for schemas that
//! follow the unique particle attribution rule.

use super::model::{
    AttributeDecl, BuiltIn, ComplexType, Compositor, Content, ElementDecl, Facets, Group, NamedType,
    Particle, SchemaModel, SimpleType, TypeRef,
};
use super::{Deviation, ValidationMode, XSI_NAMESPACE};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use roxmltree::{Document, Node};
use std::collections::HashSet;

const MAX_DERIVATION_DEPTH: usize = 32;

pub(crate) fn validate(model: &SchemaModel, text: &str, mode: ValidationMode) -> Vec<Deviation> {
    let doc = match Document::parse(text) {
        Ok(doc) => doc,
        Err(err) => {
            let pos = err.pos();
            return vec![Deviation::new(
                pos.row,
                pos.col,
                format!("document is not well-formed: {err}"),
            )];
        }
    };

    let mut validator = Validator {
        model,
        doc: &doc,
        mode,
        deviations: Vec::new(),
    };
    validator.root(doc.root_element());

    let mut deviations = validator.deviations;
    deviations.sort_by_key(|deviation| (deviation.line, deviation.column));
    deviations
}

enum Resolved<'m> {
    Any,
    Simple(&'m TypeRef),
    Complex(&'m ComplexType),
}

struct Validator<'m, 'd, 'input> {
    model: &'m SchemaModel,
    doc: &'d Document<'input>,
    mode: ValidationMode,
    deviations: Vec<Deviation>,
}

impl<'m> Validator<'m, '_, '_> {
    fn stopped(&self) -> bool {
        self.mode == ValidationMode::FailFast && !self.deviations.is_empty()
    }

    fn report(&mut self, node: Node<'_, '_>, message: String) {
        if self.stopped() {
            return;
        }
        let pos = self.doc.text_pos_at(node.range().start);
        tracing::trace!(line = pos.row, column = pos.col, %message, "schema deviation");
        self.deviations.push(Deviation::new(pos.row, pos.col, message));
    }

    fn root(&mut self, node: Node<'_, '_>) {
        let name = node.tag_name().name();
        let Some(decl) = self.model.elements.get(name) else {
            self.report(node, format!("element <{name}> is not declared as a root element"));
            return;
        };
        self.check_namespace(node, self.model.target_namespace.as_deref());
        self.element(node, decl);
    }

    fn child_element(&mut self, node: Node<'_, '_>, decl: &'m ElementDecl) {
        let expected = if decl.type_ref.is_none() || self.model.qualified {
            self.model.target_namespace.as_deref()
        } else {
            None
        };
        self.check_namespace(node, expected);
        self.element(node, decl);
    }

    fn check_namespace(&mut self, node: Node<'_, '_>, expected: Option<&str>) {
        let actual = node.tag_name().namespace();
        if actual != expected {
            self.report(
                node,
                format!(
                    "element <{}> is in namespace '{}' but '{}' was expected",
                    node.tag_name().name(),
                    actual.unwrap_or("(none)"),
                    expected.unwrap_or("(none)")
                ),
            );
        }
    }

    fn element(&mut self, node: Node<'_, '_>, decl: &'m ElementDecl) {
        if self.stopped() {
            return;
        }
        let type_ref = match &decl.type_ref {
            Some(type_ref) => Some(type_ref),
            None => self
                .model
                .elements
                .get(&decl.name)
                .and_then(|global| global.type_ref.as_ref()),
        };
        let resolved = match type_ref {
            Some(type_ref) => self.resolve(type_ref),
            None => Resolved::Any,
        };

        match resolved {
            Resolved::Any => {}
            Resolved::Simple(type_ref) => {
                self.check_attributes(node, &[], false);
                self.simple_content(node, type_ref);
            }
            Resolved::Complex(complex) => self.complex(node, complex),
        }
    }

    fn resolve(&self, type_ref: &'m TypeRef) -> Resolved<'m> {
        match type_ref {
            TypeRef::BuiltIn(BuiltIn::AnyType) => Resolved::Any,
            TypeRef::BuiltIn(_) | TypeRef::Simple(_) => Resolved::Simple(type_ref),
            TypeRef::Complex(complex) => Resolved::Complex(complex),
            TypeRef::Named(name) => match self.model.types.get(name) {
                Some(NamedType::Simple(_)) => Resolved::Simple(type_ref),
                Some(NamedType::Complex(complex)) => Resolved::Complex(complex),
                None => Resolved::Any,
            },
        }
    }

    fn complex(&mut self, node: Node<'_, '_>, complex: &'m ComplexType) {
        self.check_attributes(node, &complex.attributes, complex.any_attribute);
        let name = node.tag_name().name();
        match &complex.content {
            Content::Empty => {
                if let Some(child) = node.children().find(Node::is_element) {
                    self.report(child, format!("element <{name}> must be empty"));
                } else if !complex.mixed {
                    self.reject_text(node);
                }
            }
            Content::Simple(type_ref) => self.simple_content(node, type_ref),
            Content::Elements(group) => {
                if !complex.mixed {
                    self.reject_text(node);
                }
                let children: Vec<Node<'_, '_>> =
                    node.children().filter(Node::is_element).collect();
                let mut pos = 0;
                self.match_group(node, group, &children, &mut pos);
                for extra in &children[pos..] {
                    self.report(
                        *extra,
                        format!("unexpected element <{}> in <{name}>", extra.tag_name().name()),
                    );
                }
            }
        }
    }

    fn reject_text(&mut self, node: Node<'_, '_>) {
        let text = node
            .children()
            .find(|child| child.is_text() && child.text().is_some_and(|t| !t.trim().is_empty()));
        if let Some(text) = text {
            self.report(
                text,
                format!("text is not allowed in element <{}>", node.tag_name().name()),
            );
        }
    }

    fn simple_content(&mut self, node: Node<'_, '_>, type_ref: &'m TypeRef) {
        let name = node.tag_name().name();
        if let Some(child) = node.children().find(Node::is_element) {
            self.report(child, format!("element <{name}> must not contain child elements"));
            return;
        }
        let value: String = node
            .children()
            .filter(Node::is_text)
            .filter_map(|child| child.text())
            .collect();
        if let Err(message) = self.check_simple(type_ref, &value, 0) {
            self.report(node, format!("element <{name}>: {message}"));
        }
    }

    fn check_attributes(
        &mut self,
        node: Node<'_, '_>,
        decls: &'m [AttributeDecl],
        any_attribute: bool,
    ) {
        let element = node.tag_name().name();
        for attribute in node.attributes() {
            if attribute.namespace() == Some(XSI_NAMESPACE) {
                continue;
            }
            let name = attribute.name();
            match decls.iter().find(|decl| decl.name == name) {
                Some(decl) => {
                    if let Err(message) = self.check_simple(&decl.type_ref, attribute.value(), 0) {
                        self.report(node, format!("attribute '{name}' of <{element}>: {message}"));
                    }
                }
                None if !any_attribute => {
                    self.report(node, format!("attribute '{name}' is not allowed on <{element}>"));
                }
                None => {}
            }
        }
        for decl in decls.iter().filter(|decl| decl.required) {
            if node.attribute(decl.name.as_str()).is_none() {
                self.report(
                    node,
                    format!("element <{element}> is missing required attribute '{}'", decl.name),
                );
            }
        }
    }

    fn match_group(
        &mut self,
        parent: Node<'_, '_>,
        group: &'m Group,
        children: &[Node<'_, '_>],
        pos: &mut usize,
    ) {
        let mut count = 0;
        while group.occurs.allows_more(count) && !self.stopped() {
            if count >= group.occurs.min && !starts_group(group, children.get(*pos)) {
                break;
            }
            let before = *pos;
            match group.compositor {
                Compositor::Sequence => {
                    for particle in &group.particles {
                        self.match_particle(parent, particle, children, pos);
                    }
                }
                Compositor::Choice => self.match_choice(parent, group, children, pos),
                Compositor::All => self.match_all(parent, group, children, pos),
            }
            count += 1;
            if *pos == before {
                break;
            }
        }
    }

    fn match_particle(
        &mut self,
        parent: Node<'_, '_>,
        particle: &'m Particle,
        children: &[Node<'_, '_>],
        pos: &mut usize,
    ) {
        match particle {
            Particle::Element { decl, occurs } => {
                let mut count = 0;
                while occurs.allows_more(count) {
                    match children.get(*pos) {
                        Some(child) if child.tag_name().name() == decl.name => {
                            self.child_element(*child, decl);
                            *pos += 1;
                            count += 1;
                        }
                        _ => break,
                    }
                }
                if count < occurs.min {
                    self.missing(parent, children.get(*pos).copied(), &format!("<{}>", decl.name));
                }
            }
            Particle::Any { occurs } => {
                let mut count = 0;
                while occurs.allows_more(count) && *pos < children.len() {
                    *pos += 1;
                    count += 1;
                }
                if count < occurs.min {
                    self.missing(parent, None, "any element");
                }
            }
            Particle::Group(group) => self.match_group(parent, group, children, pos),
        }
    }

    fn match_choice(
        &mut self,
        parent: Node<'_, '_>,
        group: &'m Group,
        children: &[Node<'_, '_>],
        pos: &mut usize,
    ) {
        let next = children.get(*pos).copied();
        let chosen = next.and_then(|child| {
            let name = child.tag_name().name();
            group.particles.iter().find(|particle| particle_starts_with(particle, name))
        });
        match chosen {
            Some(particle) => self.match_particle(parent, particle, children, pos),
            None if group.particles.iter().any(particle_is_optional) => {}
            None => {
                let expected = group
                    .particles
                    .iter()
                    .map(describe_particle)
                    .collect::<Vec<_>>()
                    .join(" or ");
                self.missing(parent, next, &expected);
            }
        }
    }

    fn match_all(
        &mut self,
        parent: Node<'_, '_>,
        group: &'m Group,
        children: &[Node<'_, '_>],
        pos: &mut usize,
    ) {
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(child) = children.get(*pos).copied() {
            let name = child.tag_name().name();
            let decl = group.particles.iter().find_map(|particle| match particle {
                Particle::Element { decl, .. } if decl.name == name => Some(decl),
                _ => None,
            });
            let Some(decl) = decl else {
                break;
            };
            if seen.insert(decl.name.as_str()) {
                self.child_element(child, decl);
            } else {
                self.report(child, format!("element <{name}> may appear at most once here"));
            }
            *pos += 1;
        }
        for particle in &group.particles {
            if let Particle::Element { decl, occurs } = particle {
                if occurs.min > 0 && !seen.contains(decl.name.as_str()) {
                    self.missing(parent, None, &format!("<{}>", decl.name));
                }
            }
        }
    }

    fn missing(&mut self, parent: Node<'_, '_>, found: Option<Node<'_, '_>>, expected: &str) {
        match found {
            Some(found) => self.report(
                found,
                format!("expected {expected} but found <{}>", found.tag_name().name()),
            ),
            None => self.report(
                parent,
                format!("element <{}> is missing {expected}", parent.tag_name().name()),
            ),
        }
    }

    fn check_simple(&self, type_ref: &TypeRef, value: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DERIVATION_DEPTH {
            return Err("type derivation is too deep".to_string());
        }
        match type_ref {
            TypeRef::BuiltIn(builtin) => check_builtin(*builtin, value),
            TypeRef::Simple(simple) => self.check_restriction(simple, value, depth),
            TypeRef::Named(name) => match self.model.types.get(name) {
                Some(NamedType::Simple(simple)) => self.check_restriction(simple, value, depth),
                Some(NamedType::Complex(_)) => Err(format!("type '{name}' is not a simple type")),
                None => Ok(()),
            },
            TypeRef::Complex(_) => Err("expected a simple type".to_string()),
        }
    }

    fn check_restriction(
        &self,
        simple: &SimpleType,
        value: &str,
        depth: usize,
    ) -> Result<(), String> {
        self.check_simple(&simple.base, value, depth + 1)?;
        check_facets(&simple.facets, value)
    }
}

fn starts_group(group: &Group, next: Option<&Node<'_, '_>>) -> bool {
    next.is_some_and(|child| group_starts_with(group, child.tag_name().name()))
}

fn group_starts_with(group: &Group, name: &str) -> bool {
    match group.compositor {
        Compositor::Sequence => {
            for particle in &group.particles {
                if particle_starts_with(particle, name) {
                    return true;
                }
                if !particle_is_optional(particle) {
                    return false;
                }
            }
            false
        }
        Compositor::Choice | Compositor::All => group
            .particles
            .iter()
            .any(|particle| particle_starts_with(particle, name)),
    }
}

fn particle_starts_with(particle: &Particle, name: &str) -> bool {
    match particle {
        Particle::Element { decl, .. } => decl.name == name,
        Particle::Any { .. } => true,
        Particle::Group(group) => group_starts_with(group, name),
    }
}

fn particle_is_optional(particle: &Particle) -> bool {
    match particle {
        Particle::Element { occurs, .. } | Particle::Any { occurs } => occurs.min == 0,
        Particle::Group(group) => {
            group.occurs.min == 0
                || match group.compositor {
                    Compositor::Choice => group.particles.iter().any(particle_is_optional),
                    Compositor::Sequence | Compositor::All => {
                        group.particles.iter().all(particle_is_optional)
                    }
                }
        }
    }
}

fn describe_particle(particle: &Particle) -> String {
    match particle {
        Particle::Element { decl, .. } => format!("<{}>", decl.name),
        Particle::Any { .. } => "any element".to_string(),
        Particle::Group(group) => group
            .particles
            .first()
            .map(describe_particle)
            .unwrap_or_else(|| "an empty group".to_string()),
    }
}

fn check_builtin(builtin: BuiltIn, raw: &str) -> Result<(), String> {
    let value = raw.trim();
    let valid = match builtin {
        BuiltIn::AnyType | BuiltIn::AnySimpleType | BuiltIn::String => true,
        BuiltIn::Boolean => matches!(value, "true" | "false" | "1" | "0"),
        BuiltIn::Int => value.parse::<i32>().is_ok(),
        BuiltIn::Long => value.parse::<i64>().is_ok(),
        BuiltIn::Integer => is_integer(value),
        BuiltIn::Decimal => is_decimal(value),
        BuiltIn::Double => is_double(value),
        BuiltIn::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        BuiltIn::DateTime => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
    };
    if valid {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid {}", builtin.xsd_name()))
    }
}

fn check_facets(facets: &Facets, raw: &str) -> Result<(), String> {
    let value = raw.trim();
    if !facets.enumeration.is_empty()
        && !facets.enumeration.iter().any(|allowed| allowed == value)
    {
        return Err(format!(
            "'{value}' is not one of {}",
            facets.enumeration.join(", ")
        ));
    }
    if !facets.patterns.is_empty()
        && !facets.patterns.iter().any(|pattern| pattern.is_match(value))
    {
        return Err(format!("'{value}' does not match the required pattern"));
    }
    let length = value.chars().count();
    if let Some(min) = facets.min_length.filter(|min| length < *min) {
        return Err(format!("'{value}' is shorter than {min} characters"));
    }
    if let Some(max) = facets.max_length.filter(|max| length > *max) {
        return Err(format!("'{value}' is longer than {max} characters"));
    }
    if facets.min_inclusive.is_some() || facets.max_inclusive.is_some() {
        let number: f64 = value
            .parse()
            .map_err(|_| format!("'{value}' is not a number"))?;
        if let Some(min) = facets.min_inclusive.filter(|min| number < *min) {
            return Err(format!("{value} is less than {min}"));
        }
        if let Some(max) = facets.max_inclusive.filter(|max| number > *max) {
            return Err(format!("{value} is greater than {max}"));
        }
    }
    Ok(())
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

fn is_double(value: &str) -> bool {
    if matches!(value, "INF" | "+INF" | "-INF" | "NaN") {
        return true;
    }
    let plain = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    plain && value.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lexical_forms() {
        assert!(check_builtin(BuiltIn::Boolean, " true ").is_ok());
        assert!(check_builtin(BuiltIn::Boolean, "yes").is_err());
        assert!(check_builtin(BuiltIn::Int, "-42").is_ok());
        assert!(check_builtin(BuiltIn::Int, "3000000000").is_err());
        assert!(check_builtin(BuiltIn::Long, "3000000000").is_ok());
        assert!(check_builtin(BuiltIn::Integer, "123456789012345678901234567890").is_ok());
        assert!(check_builtin(BuiltIn::Decimal, "-.5").is_ok());
        assert!(check_builtin(BuiltIn::Decimal, "1e3").is_err());
        assert!(check_builtin(BuiltIn::Double, "1e3").is_ok());
        assert!(check_builtin(BuiltIn::Double, "INF").is_ok());
        assert!(check_builtin(BuiltIn::Double, "inf").is_err());
        assert!(check_builtin(BuiltIn::Date, "2024-02-29").is_ok());
        assert!(check_builtin(BuiltIn::Date, "2023-02-29").is_err());
        assert!(check_builtin(BuiltIn::DateTime, "2024-02-29T10:00:00Z").is_ok());
        assert!(check_builtin(BuiltIn::DateTime, "2024-02-29T10:00:00").is_ok());
        assert!(check_builtin(BuiltIn::DateTime, "yesterday").is_err());
    }

    #[test]
    fn facet_messages() {
        let facets = Facets {
            enumeration: vec!["red".into(), "green".into()],
            ..Facets::default()
        };
        assert!(check_facets(&facets, "red").is_ok());
        assert_eq!(
            check_facets(&facets, "blue").unwrap_err(),
            "'blue' is not one of red, green"
        );

        let facets = Facets {
            min_inclusive: Some(1.0),
            max_inclusive: Some(10.0),
            ..Facets::default()
        };
        assert!(check_facets(&facets, "10").is_ok());
        assert_eq!(check_facets(&facets, "11").unwrap_err(), "11 is greater than 10");
        assert_eq!(check_facets(&facets, "abc").unwrap_err(), "'abc' is not a number");
    }
}
