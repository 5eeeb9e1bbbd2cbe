//! DTD grammar: object model, parser and writer

pub mod model;
pub mod parser;
pub mod writer;

pub use model::{
    AttList, Attribute, AttributeDecl, AttributeType, Cardinal, ContainerKind, Declaration, Dtd,
    Element, Entity, ExternalId, Item, ItemKind, Notation,
};
pub use parser::{parse_source, parse_str, DtdParser};
pub use writer::write_dtd;
