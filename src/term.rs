//! Elixir Term Conversion Utilities
//!
//! Converts the DTD object model and parse errors to Elixir terms.

use rustler::{Atom, Encoder, Env, NewBinary, NifResult, Term};
use std::collections::HashMap;
use crate::core::error::ParseError;
use crate::dtd::{
    Attribute, AttributeDecl, AttributeType, Cardinal, ContainerKind, Declaration, Dtd, Element,
    Entity, ExternalId, Item, ItemKind, Notation,
};

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    error,
    // dtd map keys
    items,
    elements,
    entities,
    parameter_entities,
    notations,
    root,
    source,
    name,
    content,
    attributes,
    attr_type = "type",
    decl,
    default,
    parameter,
    value,
    external_id,
    ndata,
    // declarations
    element,
    attlist,
    entity,
    notation,
    comment,
    pi,
    // content items
    any,
    empty,
    pcdata,
    choice,
    sequence,
    mixed,
    // cardinals
    none,
    optional,
    zero_or_many,
    one_or_many,
    // attributes
    enumeration,
    fixed,
    required,
    implied,
    // external ids
    system,
    public,
}

/// `{:ok, term}`
pub fn ok_tuple<'a>(env: Env<'a>, term: Term<'a>) -> Term<'a> {
    (ok(), term).encode(env)
}

/// `{:error, {source, line, column, message}}`
pub fn error_to_term<'a>(env: Env<'a>, err: &ParseError) -> Term<'a> {
    let detail = (
        err.source_id.as_deref().encode(env),
        err.line,
        err.column,
        str_to_binary(env, &err.message),
    );
    (error(), detail).encode(env)
}

/// Convert a parsed DTD to a map
pub fn dtd_to_term<'a>(env: Env<'a>, dtd: &Dtd) -> NifResult<Term<'a>> {
    let mut item_list = Term::list_new_empty(env);
    for decl in dtd.items.iter().rev() {
        item_list = item_list.list_prepend(declaration_to_term(env, decl)?);
    }

    let pairs = [
        (items().encode(env), item_list),
        (elements().encode(env), named_map(env, &dtd.elements, element_to_term)?),
        (entities().encode(env), named_map(env, &dtd.entities, entity_to_term)?),
        (
            parameter_entities().encode(env),
            named_map(env, &dtd.parameter_entities, entity_to_term)?,
        ),
        (notations().encode(env), named_map(env, &dtd.notations, notation_to_term)?),
        (root().encode(env), dtd.root_element.as_deref().encode(env)),
        (source().encode(env), dtd.source_id.as_deref().encode(env)),
    ];
    Term::map_from_pairs(env, &pairs)
}

/// `%{name => value}` for one of the DTD indexes
fn named_map<'a, T>(
    env: Env<'a>,
    map: &HashMap<String, T>,
    convert: fn(Env<'a>, &T) -> NifResult<Term<'a>>,
) -> NifResult<Term<'a>> {
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        pairs.push((str_to_binary(env, key), convert(env, value)?));
    }
    Term::map_from_pairs(env, &pairs)
}

fn declaration_to_term<'a>(env: Env<'a>, decl: &Declaration) -> NifResult<Term<'a>> {
    Ok(match decl {
        Declaration::Element(element_name) => (element(), str_to_binary(env, element_name)).encode(env),
        Declaration::AttList(list) => {
            let mut attrs = Term::list_new_empty(env);
            for attr in list.attributes.iter().rev() {
                attrs = attrs.list_prepend(attribute_to_term(env, attr)?);
            }
            (attlist(), str_to_binary(env, &list.element), attrs).encode(env)
        }
        Declaration::Entity(e) => (entity(), entity_to_term(env, e)?).encode(env),
        Declaration::Notation(n) => (notation(), notation_to_term(env, n)?).encode(env),
        Declaration::Comment(text) => (comment(), str_to_binary(env, text)).encode(env),
        Declaration::ProcessingInstruction(text) => (pi(), str_to_binary(env, text)).encode(env),
    })
}

fn element_to_term<'a>(env: Env<'a>, el: &Element) -> NifResult<Term<'a>> {
    let content_term = match &el.content {
        Some(item) => item_to_term(env, item),
        None => rustler::types::atom::nil().encode(env),
    };
    let pairs = [
        (name().encode(env), str_to_binary(env, &el.name)),
        (content().encode(env), content_term),
        (attributes().encode(env), named_map(env, &el.attributes, attribute_to_term)?),
    ];
    Term::map_from_pairs(env, &pairs)
}

/// `{:any | :empty | :pcdata, cardinal}`, `{:name, name, cardinal}` or
/// `{:choice | :sequence | :mixed, [items], cardinal}`
pub fn item_to_term<'a>(env: Env<'a>, item: &Item) -> Term<'a> {
    let card = cardinal_atom(item.cardinal);
    match &item.kind {
        ItemKind::Any => (any(), card).encode(env),
        ItemKind::Empty => (empty(), card).encode(env),
        ItemKind::PCData => (pcdata(), card).encode(env),
        ItemKind::Name(n) => (name(), str_to_binary(env, n), card).encode(env),
        ItemKind::Container(kind, children) => {
            let tag = match kind {
                ContainerKind::Choice => choice(),
                ContainerKind::Sequence => sequence(),
                ContainerKind::Mixed => mixed(),
            };
            let mut list = Term::list_new_empty(env);
            for child in children.iter().rev() {
                list = list.list_prepend(item_to_term(env, child));
            }
            (tag, list, card).encode(env)
        }
    }
}

fn cardinal_atom(cardinal: Cardinal) -> Atom {
    match cardinal {
        Cardinal::None => none(),
        Cardinal::Optional => optional(),
        Cardinal::ZeroOrMany => zero_or_many(),
        Cardinal::OneOrMany => one_or_many(),
    }
}

fn attribute_to_term<'a>(env: Env<'a>, attr: &Attribute) -> NifResult<Term<'a>> {
    let type_term = match &attr.attr_type {
        AttributeType::Keyword(keyword) => str_to_binary(env, keyword),
        AttributeType::Enumeration(values) => (enumeration(), values).encode(env),
        AttributeType::Notation(names) => (notation(), names).encode(env),
    };
    let decl_atom = match attr.decl {
        AttributeDecl::Fixed => fixed(),
        AttributeDecl::Required => required(),
        AttributeDecl::Implied => implied(),
        AttributeDecl::Value => value(),
    };
    let pairs = [
        (name().encode(env), str_to_binary(env, &attr.name)),
        (attr_type().encode(env), type_term),
        (decl().encode(env), decl_atom.encode(env)),
        (default().encode(env), attr.default_value.as_deref().encode(env)),
    ];
    Term::map_from_pairs(env, &pairs)
}

fn entity_to_term<'a>(env: Env<'a>, e: &Entity) -> NifResult<Term<'a>> {
    let pairs = [
        (name().encode(env), str_to_binary(env, &e.name)),
        (parameter().encode(env), e.is_parameter.encode(env)),
        (value().encode(env), e.value.as_deref().encode(env)),
        (external_id().encode(env), external_id_to_term(env, e.external_id.as_ref())),
        (ndata().encode(env), e.ndata.as_deref().encode(env)),
    ];
    Term::map_from_pairs(env, &pairs)
}

fn notation_to_term<'a>(env: Env<'a>, n: &Notation) -> NifResult<Term<'a>> {
    let pairs = [
        (name().encode(env), str_to_binary(env, &n.name)),
        (external_id().encode(env), external_id_to_term(env, Some(&n.external_id))),
    ];
    Term::map_from_pairs(env, &pairs)
}

/// `{:system, uri}`, `{:public, pubid, uri | nil}` or nil
fn external_id_to_term<'a>(env: Env<'a>, id: Option<&ExternalId>) -> Term<'a> {
    match id {
        Some(ExternalId::System { system: uri }) => (system(), str_to_binary(env, uri)).encode(env),
        Some(ExternalId::Public { public: pubid, system: uri }) => {
            (public(), str_to_binary(env, pubid), uri.as_deref().encode(env)).encode(env)
        }
        None => rustler::types::atom::nil().encode(env),
    }
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}
