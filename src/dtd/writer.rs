//! DTD Writer
//!
//! Canonical text for a parsed DTD: one declaration per line, in source
//! order, with parameter entities already expanded. Parsing the output again
//! yields an equal `Dtd`.

use super::model::{
    AttList, Attribute, AttributeDecl, AttributeType, Declaration, Dtd, Entity, ExternalId, Item,
    ItemKind, Notation,
};
use std::fmt::{self, Write};

/// Serialize every declaration in `dtd.items`
pub fn write_dtd(dtd: &Dtd) -> String {
    dtd.to_string()
}

impl fmt::Display for Dtd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            write_declaration(f, self, item)?;
        }
        Ok(())
    }
}

fn write_declaration<W: Write>(out: &mut W, dtd: &Dtd, item: &Declaration) -> fmt::Result {
    match item {
        Declaration::Element(name) => match dtd.element(name).and_then(|e| e.content.as_ref()) {
            Some(content) => writeln!(out, "<!ELEMENT {} {}>", name, content),
            None => Ok(()),
        },
        Declaration::AttList(list) => writeln!(out, "{}", list),
        Declaration::Entity(entity) => writeln!(out, "{}", entity),
        Declaration::Notation(notation) => writeln!(out, "{}", notation),
        Declaration::Comment(text) => writeln!(out, "<!--{}-->", text),
        Declaration::ProcessingInstruction(text) => writeln!(out, "<?{}?>", text),
    }
}

/// Quote a literal, switching to single quotes when the text has a double quote
struct Literal<'a>(&'a str);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains('"') {
            write!(f, "'{}'", self.0)
        } else {
            write!(f, "\"{}\"", self.0)
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ItemKind::Any => f.write_str("ANY")?,
            ItemKind::Empty => f.write_str("EMPTY")?,
            ItemKind::PCData => f.write_str("#PCDATA")?,
            ItemKind::Name(name) => f.write_str(name)?,
            ItemKind::Container(kind, items) => {
                f.write_char('(')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(kind.separator())?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(')')?;
            }
        }
        f.write_str(self.cardinal.suffix())
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Keyword(keyword) => f.write_str(keyword),
            AttributeType::Enumeration(values) => write!(f, "({})", values.join("|")),
            AttributeType::Notation(names) => write!(f, "NOTATION ({})", names.join("|")),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.name, self.attr_type)?;
        let value = self.default_value.as_deref().unwrap_or("");
        match self.decl {
            AttributeDecl::Fixed => write!(f, "#FIXED {}", Literal(value)),
            AttributeDecl::Required => f.write_str("#REQUIRED"),
            AttributeDecl::Implied => f.write_str("#IMPLIED"),
            AttributeDecl::Value => write!(f, "{}", Literal(value)),
        }
    }
}

impl fmt::Display for AttList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<!ATTLIST {}", self.element)?;
        for attribute in &self.attributes {
            write!(f, " {}", attribute)?;
        }
        f.write_char('>')
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::System { system } => write!(f, "SYSTEM {}", Literal(system)),
            ExternalId::Public { public, system } => {
                write!(f, "PUBLIC {}", Literal(public))?;
                match system {
                    Some(system) => write!(f, " {}", Literal(system)),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<!ENTITY ")?;
        if self.is_parameter {
            f.write_str("% ")?;
        }
        f.write_str(&self.name)?;
        if let Some(value) = &self.value {
            write!(f, " {}", Literal(value))?;
        }
        if let Some(external_id) = &self.external_id {
            write!(f, " {}", external_id)?;
        }
        if let Some(ndata) = &self.ndata {
            write!(f, " NDATA {}", ndata)?;
        }
        f.write_char('>')
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<!NOTATION {} {}>", self.name, self.external_id)
    }
}
