//! DTD Object Model
//!
//! The result of a parse. Elements, entities and notations are indexed by
//! name; `items` keeps every top-level declaration in source order so the
//! DTD can be written back out faithfully.

use std::collections::{HashMap, HashSet};

/// Occurrence modifier on a content particle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinal {
    #[default]
    None,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMany,
    /// `+`
    OneOrMany,
}

impl Cardinal {
    pub fn suffix(self) -> &'static str {
        match self {
            Cardinal::None => "",
            Cardinal::Optional => "?",
            Cardinal::ZeroOrMany => "*",
            Cardinal::OneOrMany => "+",
        }
    }
}

/// Group flavour of a container particle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// `(a | b)`
    Choice,
    /// `(a, b)`
    Sequence,
    /// `(#PCDATA | a | b)*`
    Mixed,
}

impl ContainerKind {
    pub fn separator(self) -> &'static str {
        match self {
            ContainerKind::Sequence => ",",
            ContainerKind::Choice | ContainerKind::Mixed => "|",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Any,
    Empty,
    PCData,
    Name(String),
    Container(ContainerKind, Vec<Item>),
}

/// A content model particle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub cardinal: Cardinal,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Item {
            kind,
            cardinal: Cardinal::None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Item::new(ItemKind::Name(name.into()))
    }

    pub fn container(kind: ContainerKind, items: Vec<Item>) -> Self {
        Item::new(ItemKind::Container(kind, items))
    }

    pub fn with_cardinal(mut self, cardinal: Cardinal) -> Self {
        self.cardinal = cardinal;
        self
    }

    /// Children of a container, empty for leaves
    pub fn children(&self) -> &[Item] {
        match &self.kind {
            ItemKind::Container(_, items) => items,
            _ => &[],
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, ItemKind::Container(..))
    }

    /// Every element name referenced anywhere in this particle
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match &self.kind {
            ItemKind::Name(name) => names.push(name),
            ItemKind::Container(_, items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            _ => {}
        }
    }
}

/// Declared element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// None while only forward-referenced by an ATTLIST
    pub content: Option<Item>,
    /// Attribute lookup; a later definition of the same name replaces the earlier
    pub attributes: HashMap<String, Attribute>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            content: None,
            attributes: HashMap::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// CDATA, ID, IDREF, IDREFS, ENTITY, ENTITIES, NMTOKEN, NMTOKENS
    Keyword(String),
    /// `(a|b|c)`
    Enumeration(Vec<String>),
    /// `NOTATION (a|b)`
    Notation(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeDecl {
    Fixed,
    Required,
    Implied,
    /// Plain default literal
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttributeType,
    pub decl: AttributeDecl,
    /// Present for Fixed and Value
    pub default_value: Option<String>,
}

/// One `<!ATTLIST>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttList {
    pub element: String,
    pub attributes: Vec<Attribute>,
}

/// SYSTEM or PUBLIC identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalId {
    System { system: String },
    /// `system` is always present for entities; notations may omit it
    Public { public: String, system: Option<String> },
}

impl ExternalId {
    pub fn system(&self) -> Option<&str> {
        match self {
            ExternalId::System { system } => Some(system),
            ExternalId::Public { system, .. } => system.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    /// Declared with `%`
    pub is_parameter: bool,
    /// Inline replacement text
    pub value: Option<String>,
    pub external_id: Option<ExternalId>,
    /// Notation of an unparsed external entity
    pub ndata: Option<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, is_parameter: bool) -> Self {
        Entity {
            name: name.into(),
            is_parameter,
            value: None,
            external_id: None,
            ndata: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.external_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notation {
    pub name: String,
    pub external_id: ExternalId,
}

/// Top-level declaration in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `<!ELEMENT>`; content lives in `Dtd::elements`
    Element(String),
    AttList(AttList),
    /// Every `<!ENTITY>`, including later duplicates whose value is not binding
    Entity(Entity),
    Notation(Notation),
    Comment(String),
    ProcessingInstruction(String),
}

/// Parsed DTD
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dtd {
    pub items: Vec<Declaration>,
    pub elements: HashMap<String, Element>,
    /// General entities, first declaration of each name
    pub entities: HashMap<String, Entity>,
    /// Parameter entities, first declaration of each name
    pub parameter_entities: HashMap<String, Entity>,
    pub notations: HashMap<String, Notation>,
    /// Name of the inferred root element, when requested and unambiguous
    pub root_element: Option<String>,
    /// File path or URL the DTD was read from
    pub source_id: Option<String>,
}

impl Dtd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn parameter_entity(&self, name: &str) -> Option<&Entity> {
        self.parameter_entities.get(name)
    }

    pub fn notation(&self, name: &str) -> Option<&Notation> {
        self.notations.get(name)
    }

    /// The inferred root element
    pub fn root(&self) -> Option<&Element> {
        self.root_element.as_deref().and_then(|name| self.elements.get(name))
    }

    /// Get an element, creating an empty placeholder if it is not declared yet
    pub fn element_or_insert(&mut self, name: &str) -> &mut Element {
        self.elements
            .entry(name.to_string())
            .or_insert_with(|| Element::new(name))
    }

    /// The single element that no container content references, if there is
    /// exactly one such element
    pub fn guess_root_element(&self) -> Option<String> {
        let mut candidates: HashSet<&str> = self.elements.keys().map(String::as_str).collect();

        for element in self.elements.values() {
            let content = match &element.content {
                Some(item) if item.is_container() => item,
                _ => continue,
            };
            for name in content.referenced_names() {
                candidates.remove(name);
            }
        }

        if candidates.len() == 1 {
            candidates.into_iter().next().map(str::to_string)
        } else {
            None
        }
    }
}
