use crate::entity_type::EntityType;
use crate::error::TemplateError;
use crate::router::uri::encode_component;
use crate::utils::ensure;
use std::collections::HashSet;
use std::fmt;
use std::fmt::Write;

const RESERVED: [char; 4] = ['/', ';', '?', '#'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Path,
    Variable,
    Matrix,
    Query,
}

/// A named, typed route argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    optional: bool,
    value_type: EntityType,
}

impl Parameter {
    pub fn new<T: 'static>(name: impl Into<String>) -> Self {
        Self::typed(name, EntityType::of::<T>())
    }

    pub fn typed(name: impl Into<String>, value_type: EntityType) -> Self {
        Self { name: name.into(), optional: false, value_type }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    pub fn value_type(&self) -> &EntityType {
        &self.value_type
    }
}

/// One element of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// A literal path segment, matched exactly.
    Path(String),
    /// A positional path segment bound to a named argument.
    Variable(Parameter),
    /// A `;name=value` parameter of the last path segment.
    Matrix(Parameter),
    /// A `?name=value` parameter.
    Query(Parameter),
}

impl PathElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            PathElement::Path(_) => ElementKind::Path,
            PathElement::Variable(_) => ElementKind::Variable,
            PathElement::Matrix(_) => ElementKind::Matrix,
            PathElement::Query(_) => ElementKind::Query,
        }
    }

    /// The argument this element binds, `None` for literal segments.
    pub fn parameter(&self) -> Option<&Parameter> {
        match self {
            PathElement::Path(_) => None,
            PathElement::Variable(p) | PathElement::Matrix(p) | PathElement::Query(p) => Some(p),
        }
    }

    #[inline]
    pub fn is_positional(&self) -> bool {
        matches!(self, PathElement::Path(_) | PathElement::Variable(_))
    }

    /// True for dynamic elements that must be bound for the route to match.
    pub fn is_required(&self) -> bool {
        self.parameter().is_some_and(|p| !p.is_optional())
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, p) = match self {
            PathElement::Path(literal) => return write!(f, "/{literal}"),
            PathElement::Variable(p) => return write!(f, "/{{{}}}", p.name),
            PathElement::Matrix(p) => (';', p),
            PathElement::Query(p) => ('?', p),
        };
        if p.optional { write!(f, "{prefix}[{}]", p.name) } else { write!(f, "{prefix}{}", p.name) }
    }
}

/// A validated route template: positional elements in path order, then matrix and query
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    elements: Vec<PathElement>,
    required_argument_count: usize,
}

impl Signature {
    /// Validates `elements` as a template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a literal is empty or contains a reserved character,
    /// when a name is empty or declared twice, when a path variable is optional, or when a
    /// positional element follows a matrix or query parameter.
    pub fn new(elements: Vec<PathElement>) -> Result<Self, TemplateError> {
        let mut names = HashSet::new();
        let mut seen_named = false;

        for element in &elements {
            if element.is_positional() {
                ensure!(!seen_named, TemplateError::PositionalAfterParameter { element: element.to_string() });
            } else {
                seen_named = true;
            }

            match element {
                PathElement::Path(literal) => {
                    ensure!(!literal.is_empty(), TemplateError::EmptySegment);
                    if let Some(character) = literal.chars().find(|c| RESERVED.contains(c)) {
                        return Err(TemplateError::InvalidSegment { segment: literal.clone(), character });
                    }
                }
                PathElement::Variable(p) => {
                    ensure!(!p.optional, TemplateError::OptionalVariable { name: p.name.clone() });
                }
                PathElement::Matrix(_) | PathElement::Query(_) => {}
            }

            if let Some(p) = element.parameter() {
                ensure!(!p.name.is_empty(), TemplateError::EmptyName);
                ensure!(names.insert(p.name.as_str()), TemplateError::duplicate_argument(&p.name));
            }
        }

        let required_argument_count = elements.iter().filter(|e| e.is_required()).count();
        Ok(Self { elements, required_argument_count })
    }

    pub fn builder() -> SignatureBuilder {
        SignatureBuilder::new()
    }

    #[inline]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// PATH and VARIABLE elements, in path order.
    pub fn positional(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter().take_while(|e| e.is_positional())
    }

    pub fn variables(&self) -> impl Iterator<Item = &Parameter> {
        self.elements.iter().filter_map(|e| match e {
            PathElement::Variable(p) => Some(p),
            _ => None,
        })
    }

    /// Every dynamic element with its parameter, in signature order.
    pub fn parameters(&self) -> impl Iterator<Item = (ElementKind, &Parameter)> {
        self.elements.iter().filter_map(|e| e.parameter().map(|p| (e.kind(), p)))
    }

    #[inline]
    pub fn required_argument_count(&self) -> usize {
        self.required_argument_count
    }

    /// Positional elements as a request path is matched against them: literals
    /// percent-encoded, `None` for variables.
    pub(crate) fn shape_segments(&self) -> Vec<Option<String>> {
        self.positional()
            .map(|element| match element {
                PathElement::Path(literal) => Some(encode_component(literal).to_string()),
                _ => None,
            })
            .collect()
    }

    /// The positional template with variable names replaced by `{p0}`, `{p1}`, ...
    ///
    /// Two signatures with the same shape match exactly the same paths.
    pub(crate) fn shape(&self) -> String {
        let mut shape = String::new();
        let mut index = 0;
        for segment in self.shape_segments() {
            shape.push('/');
            match segment {
                Some(literal) => shape.push_str(&literal),
                None => {
                    let _ = write!(shape, "{{p{index}}}");
                    index += 1;
                }
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut positional = 0;
        for element in self.positional() {
            write!(f, "{element}")?;
            positional += 1;
        }
        if positional == 0 {
            f.write_str("/")?;
        }

        for element in self.elements.iter().filter(|e| e.kind() == ElementKind::Matrix) {
            write!(f, "{element}")?;
        }

        let queries = self.elements.iter().filter(|e| e.kind() == ElementKind::Query);
        for (i, element) in queries.enumerate() {
            let text = element.to_string();
            if i == 0 { f.write_str(&text)? } else { write!(f, "&{}", &text[1..])? }
        }
        Ok(())
    }
}

/// Builds a [`Signature`] element by element; validation happens in [`build`](Self::build).
///
/// ```
/// use micro_rest::router::Signature;
///
/// let signature = Signature::builder()
///     .path("/users")
///     .variable::<u64>("id")
///     .optional_query::<String>("fields")
///     .build()
///     .unwrap();
/// assert_eq!(signature.to_string(), "/users/{id}?[fields]");
/// ```
#[derive(Debug, Default)]
pub struct SignatureBuilder {
    elements: Vec<PathElement>,
}

impl SignatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one literal segment per non-empty `/`-separated part of `path`.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.elements.extend(path.split('/').filter(|s| !s.is_empty()).map(|s| PathElement::Path(s.to_string())));
        self
    }

    /// Appends a single literal segment, kept as is.
    #[must_use]
    pub fn segment(self, literal: impl Into<String>) -> Self {
        self.element(PathElement::Path(literal.into()))
    }

    #[must_use]
    pub fn variable<T: 'static>(self, name: impl Into<String>) -> Self {
        self.element(PathElement::Variable(Parameter::new::<T>(name)))
    }

    #[must_use]
    pub fn matrix<T: 'static>(self, name: impl Into<String>) -> Self {
        self.element(PathElement::Matrix(Parameter::new::<T>(name)))
    }

    #[must_use]
    pub fn optional_matrix<T: 'static>(self, name: impl Into<String>) -> Self {
        self.element(PathElement::Matrix(Parameter::new::<T>(name).optional()))
    }

    #[must_use]
    pub fn query<T: 'static>(self, name: impl Into<String>) -> Self {
        self.element(PathElement::Query(Parameter::new::<T>(name)))
    }

    #[must_use]
    pub fn optional_query<T: 'static>(self, name: impl Into<String>) -> Self {
        self.element(PathElement::Query(Parameter::new::<T>(name).optional()))
    }

    #[must_use]
    pub fn element(mut self, element: PathElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn build(self) -> Result<Signature, TemplateError> {
        Signature::new(self.elements)
    }
}
