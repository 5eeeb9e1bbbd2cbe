//! DTD Parser
//!
//! Recursive descent parser over the scanner's token stream. One token of
//! lookahead. The first error aborts the parse; the only lenient spot is an
//! unknown `<!KEYWORD ...>` at the top level, which is skipped through `>`.

use super::model::{
    AttList, Attribute, AttributeDecl, AttributeType, Cardinal, ContainerKind, Declaration, Dtd,
    Entity, ExternalId, Item, ItemKind, Notation,
};
use crate::core::entities::{EntityNamespace, EntityTable};
use crate::core::error::{ErrorKind, ParseError, Result};
use crate::core::scanner::{Scanner, Token, TokenKind};
use crate::core::source::Source;

/// Maximum nesting of parenthesized content-model groups (default: 256)
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// DTD parser; owns the scanner and the entity expansion table
pub struct DtdParser {
    scanner: Scanner,
    entities: EntityTable,
    dtd: Dtd,
    /// Open content-model groups
    depth: u32,
    max_depth: u32,
}

impl DtdParser {
    /// Parser over already-decoded text with an optional source identifier
    pub fn new(text: impl Into<String>, source_id: Option<String>) -> Self {
        DtdParser {
            scanner: Scanner::new(text, source_id),
            entities: EntityTable::new(),
            dtd: Dtd::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Parser over inline text
    pub fn from_str(text: &str) -> Self {
        Self::new(text, None)
    }

    /// Read the whole source (blocking) and build a parser over it
    pub fn from_source(source: &Source) -> Result<Self> {
        let text = source.read()?;
        Ok(Self::new(text, source.id()))
    }

    /// Echo every consumed token as a TRACE event
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.scanner = self.scanner.with_trace(trace);
        self
    }

    /// Sets the maximum content-model group nesting depth.
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum number of parameter entity expansions per parse.
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.scanner = self.scanner.with_max_expansions(max);
        self
    }

    /// Parse the whole input. With `guess_root`, also infer the root element.
    pub fn parse(mut self, guess_root: bool) -> Result<Dtd> {
        tracing::debug!(source = ?self.scanner.source_id(), "parsing DTD");

        loop {
            if self.peek()?.kind == TokenKind::Eof {
                break;
            }
            self.parse_top_level()?;
        }

        let source_id = self.scanner.source_id().map(str::to_string);
        let mut dtd = self.dtd;
        dtd.source_id = source_id;
        if guess_root {
            dtd.root_element = dtd.guess_root_element();
            tracing::debug!(root = ?dtd.root_element, "root element inference");
        }

        tracing::debug!(
            items = dtd.items.len(),
            elements = dtd.elements.len(),
            entities = dtd.entities.len() + dtd.parameter_entities.len(),
            notations = dtd.notations.len(),
            "parsed DTD"
        );
        Ok(dtd)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&mut self) -> Result<&Token> {
        self.scanner.peek(&self.entities)
    }

    fn get(&mut self) -> Result<Token> {
        self.scanner.get(&self.entities)
    }

    /// Consume the next token, which must be of `kind`
    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let token = self.get()?;
        if token.kind != kind {
            return Err(self.unexpected(&token, kind.describe()));
        }
        Ok(token)
    }

    /// Consume the next token if it is of `kind`
    fn accept(&mut self, kind: TokenKind) -> Result<Option<Token>> {
        if self.peek()?.kind == kind {
            return self.get().map(Some);
        }
        Ok(None)
    }

    fn syntax_error(&self, token: &Token, message: impl Into<String>) -> ParseError {
        self.scanner.error(ErrorKind::Syntax, token.line, token.column, message)
    }

    fn unexpected(&self, token: &Token, wanted: &str) -> ParseError {
        self.syntax_error(token, format!("Expected {}, found {}", wanted, describe(token)))
    }

    // ========================================================================
    // Top level
    // ========================================================================

    fn parse_top_level(&mut self) -> Result<()> {
        let token = self.get()?;
        match token.kind {
            TokenKind::LtQues => self.parse_processing_instruction(),
            TokenKind::Conditional => self.parse_conditional(),
            // Closing of an INCLUDE section; nothing to do
            TokenKind::EndConditional => Ok(()),
            TokenKind::Comment => {
                self.dtd.items.push(Declaration::Comment(token.text));
                Ok(())
            }
            TokenKind::LtBang => {
                let keyword = self.expect(TokenKind::Identifier)?;
                match keyword.text.as_str() {
                    "ELEMENT" => self.parse_element(),
                    "ATTLIST" => self.parse_attlist(),
                    "ENTITY" => self.parse_entity(),
                    "NOTATION" => self.parse_notation(),
                    other => {
                        tracing::debug!(keyword = other, "skipping unsupported declaration");
                        self.scanner.skip_until(TokenKind::Gt, &self.entities)
                    }
                }
            }
            _ => Err(self.syntax_error(&token, format!("Unexpected {} at top level", describe(&token)))),
        }
    }

    /// `<?` already consumed; capture everything up to `?>` verbatim
    fn parse_processing_instruction(&mut self) -> Result<()> {
        let mut text = String::new();
        loop {
            text.push_str(&self.scanner.get_until('?')?);
            if self.scanner.next_char_is('>') {
                break;
            }
            text.push('?');
        }
        self.dtd.items.push(Declaration::ProcessingInstruction(text));
        Ok(())
    }

    /// `<![` already consumed
    fn parse_conditional(&mut self) -> Result<()> {
        let keyword = self.expect(TokenKind::Identifier)?;
        match keyword.text.as_str() {
            "INCLUDE" => self.scanner.skip_past('['),
            "IGNORE" => self.scanner.skip_conditional(),
            other => Err(self.syntax_error(
                &keyword,
                format!("Invalid conditional section keyword '{}'", other),
            )),
        }
    }

    // ========================================================================
    // <!ELEMENT>
    // ========================================================================

    fn parse_element(&mut self) -> Result<()> {
        let name = self.expect(TokenKind::Identifier)?;

        if self
            .dtd
            .element(&name.text)
            .is_some_and(|e| e.content.is_some())
        {
            return Err(self.syntax_error(
                &name,
                format!("Found second definition of element '{}'", name.text),
            ));
        }
        self.dtd.element_or_insert(&name.text);
        self.dtd.items.push(Declaration::Element(name.text.clone()));

        let content = self.parse_content_spec()?;
        self.dtd.element_or_insert(&name.text).content = Some(content);

        self.expect(TokenKind::Gt)?;
        Ok(())
    }

    fn parse_content_spec(&mut self) -> Result<Item> {
        let token = self.get()?;
        match token.kind {
            TokenKind::Identifier if token.text == "EMPTY" => Ok(Item::new(ItemKind::Empty)),
            TokenKind::Identifier if token.text == "ANY" => Ok(Item::new(ItemKind::Any)),
            TokenKind::LParen => {
                let next = self.peek()?;
                if next.is_keyword("#PCDATA") {
                    self.get()?;
                    self.parse_mixed()
                } else if matches!(next.kind, TokenKind::Identifier | TokenKind::LParen) {
                    self.parse_children(&token)
                } else {
                    let next = next.clone();
                    Err(self.unexpected(&next, "element name, '(' or #PCDATA"))
                }
            }
            _ => Err(self.unexpected(&token, "EMPTY, ANY or '('")),
        }
    }

    /// After `( #PCDATA`
    fn parse_mixed(&mut self) -> Result<Item> {
        let mut items = vec![Item::new(ItemKind::PCData)];
        let mut is_pcdata_only = true;

        loop {
            let token = self.get()?;
            match token.kind {
                TokenKind::RParen => {
                    let cardinal = if self.accept(TokenKind::Asterisk)?.is_some() {
                        Cardinal::ZeroOrMany
                    } else if is_pcdata_only {
                        Cardinal::None
                    } else {
                        return Err(self.syntax_error(
                            &token,
                            "Mixed content with element names must end with ')*'",
                        ));
                    };
                    return Ok(Item::container(ContainerKind::Mixed, items).with_cardinal(cardinal));
                }
                TokenKind::Pipe => {
                    let name = self.expect(TokenKind::Identifier)?;
                    items.push(Item::name(name.text));
                    is_pcdata_only = false;
                }
                _ => return Err(self.unexpected(&token, "'|' or ')' in mixed content")),
            }
        }
    }

    /// After the opening `(` of an element-content group
    fn parse_children(&mut self, open: &Token) -> Result<Item> {
        let group = self.parse_choice_sequence(open)?;
        let cardinal = self.parse_cardinality()?;
        Ok(group.with_cardinal(cardinal))
    }

    /// Group body through its `)`, bounded by `max_depth`. `open` is the
    /// group's `(` token.
    fn parse_choice_sequence(&mut self, open: &Token) -> Result<Item> {
        if self.depth >= self.max_depth {
            return Err(self.syntax_error(
                open,
                format!("Content model nested too deeply (limit {})", self.max_depth),
            ));
        }
        self.depth += 1;
        let group = self.parse_group();
        self.depth -= 1;
        group
    }

    /// The first separator decides between choice and sequence; a
    /// single-particle group is a sequence.
    fn parse_group(&mut self) -> Result<Item> {
        let mut kind: Option<ContainerKind> = None;
        let mut items = Vec::new();

        loop {
            items.push(self.parse_cp()?);

            let token = self.get()?;
            let separator = match token.kind {
                TokenKind::Pipe => ContainerKind::Choice,
                TokenKind::Comma => ContainerKind::Sequence,
                TokenKind::RParen => {
                    let kind = kind.unwrap_or(ContainerKind::Sequence);
                    return Ok(Item::container(kind, items));
                }
                _ => return Err(self.unexpected(&token, "',', '|' or ')' in content model")),
            };

            match kind {
                Some(existing) if existing != separator => {
                    return Err(self.syntax_error(
                        &token,
                        "Can't mix ',' and '|' separators in one content group",
                    ))
                }
                _ => kind = Some(separator),
            }
        }
    }

    /// Content particle: a name or a nested group, with its own cardinality
    fn parse_cp(&mut self) -> Result<Item> {
        let token = self.get()?;
        let item = match token.kind {
            TokenKind::Identifier => Item::name(token.text),
            TokenKind::LParen => self.parse_choice_sequence(&token)?,
            _ => return Err(self.unexpected(&token, "element name or '(' in content model")),
        };
        let cardinal = self.parse_cardinality()?;
        Ok(item.with_cardinal(cardinal))
    }

    fn parse_cardinality(&mut self) -> Result<Cardinal> {
        let cardinal = match self.peek()?.kind {
            TokenKind::Question => Cardinal::Optional,
            TokenKind::Asterisk => Cardinal::ZeroOrMany,
            TokenKind::Plus => Cardinal::OneOrMany,
            _ => return Ok(Cardinal::None),
        };
        self.get()?;
        Ok(cardinal)
    }

    // ========================================================================
    // <!ATTLIST>
    // ========================================================================

    fn parse_attlist(&mut self) -> Result<()> {
        let element = self.expect(TokenKind::Identifier)?;
        self.dtd.element_or_insert(&element.text);

        let mut attlist = AttList {
            element: element.text,
            attributes: Vec::new(),
        };

        while self.peek()?.kind != TokenKind::Gt {
            let attribute = self.parse_attdef()?;
            self.dtd
                .element_or_insert(&attlist.element)
                .attributes
                .insert(attribute.name.clone(), attribute.clone());
            attlist.attributes.push(attribute);
        }
        self.expect(TokenKind::Gt)?;

        self.dtd.items.push(Declaration::AttList(attlist));
        Ok(())
    }

    fn parse_attdef(&mut self) -> Result<Attribute> {
        let name = self.expect(TokenKind::Identifier)?;

        let type_token = self.get()?;
        let attr_type = match type_token.kind {
            TokenKind::Identifier if type_token.text == "NOTATION" => {
                self.expect(TokenKind::LParen)?;
                AttributeType::Notation(self.parse_name_list(false)?)
            }
            TokenKind::Identifier => AttributeType::Keyword(type_token.text),
            TokenKind::LParen => AttributeType::Enumeration(self.parse_name_list(true)?),
            _ => return Err(self.unexpected(&type_token, "attribute type")),
        };

        let token = self.get()?;
        let (decl, default_value) = match token.kind {
            TokenKind::Identifier => match token.text.as_str() {
                "#FIXED" => {
                    let value = self.expect(TokenKind::String)?;
                    (AttributeDecl::Fixed, Some(value.text))
                }
                "#REQUIRED" => (AttributeDecl::Required, None),
                "#IMPLIED" => (AttributeDecl::Implied, None),
                _ => {
                    return Err(self.syntax_error(
                        &token,
                        format!("Invalid attribute default '{}'", token.text),
                    ))
                }
            },
            TokenKind::String => (AttributeDecl::Value, Some(token.text)),
            _ => return Err(self.unexpected(&token, "#FIXED, #REQUIRED, #IMPLIED or a default value")),
        };

        Ok(Attribute {
            name: name.text,
            attr_type,
            decl,
            default_value,
        })
    }

    /// `a | b | c )` after the opening paren. Enumerations also take
    /// name tokens; notation lists only take names.
    fn parse_name_list(&mut self, allow_nmtokens: bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            let token = self.get()?;
            let valid = token.kind == TokenKind::Identifier
                || (allow_nmtokens && token.kind == TokenKind::NmToken);
            if !valid {
                return Err(self.unexpected(&token, "name in list"));
            }
            names.push(token.text);

            let token = self.get()?;
            match token.kind {
                TokenKind::Pipe => continue,
                TokenKind::RParen => return Ok(names),
                _ => return Err(self.unexpected(&token, "'|' or ')'")),
            }
        }
    }

    // ========================================================================
    // <!ENTITY>
    // ========================================================================

    fn parse_entity(&mut self) -> Result<()> {
        let is_parameter = self.accept(TokenKind::Percent)?.is_some();
        let name = self.expect(TokenKind::Identifier)?;

        let table = if is_parameter {
            &self.dtd.parameter_entities
        } else {
            &self.dtd.entities
        };
        // A redeclaration is kept for output but never becomes binding
        let is_first = !table.contains_key(&name.text);

        let mut entity = Entity::new(name.text, is_parameter);
        self.parse_entity_def(&mut entity)?;

        if is_first {
            if let Some(value) = &entity.value {
                let ns = if is_parameter {
                    EntityNamespace::Parameter
                } else {
                    EntityNamespace::General
                };
                self.entities.register(ns, &entity.name, value);
            }
            let table = if is_parameter {
                &mut self.dtd.parameter_entities
            } else {
                &mut self.dtd.entities
            };
            table.insert(entity.name.clone(), entity.clone());
        } else {
            tracing::debug!(entity = %entity.name, "ignoring redeclared entity value");
        }
        self.dtd.items.push(Declaration::Entity(entity));

        self.expect(TokenKind::Gt)?;
        Ok(())
    }

    fn parse_entity_def(&mut self, entity: &mut Entity) -> Result<()> {
        let token = self.get()?;
        match token.kind {
            TokenKind::String => {
                if entity.value.is_none() {
                    entity.value = Some(token.text);
                }
            }
            TokenKind::Identifier => {
                entity.external_id = Some(self.parse_external_id(&token, true)?);
                // NDATA only applies to general entities; on a parameter
                // entity the keyword is left for the closing '>' check
                if !entity.is_parameter && self.peek()?.kind == TokenKind::Identifier {
                    let keyword = self.get()?;
                    if keyword.text != "NDATA" {
                        return Err(self.syntax_error(
                            &keyword,
                            format!("Invalid NDATA declaration '{}'", keyword.text),
                        ));
                    }
                    let notation = self.expect(TokenKind::Identifier)?;
                    entity.ndata = Some(notation.text);
                }
            }
            _ => return Err(self.unexpected(&token, "entity value or external identifier")),
        }
        Ok(())
    }

    /// SYSTEM "uri" | PUBLIC "pubid" "uri"; `keyword` is already consumed.
    /// Notations may leave out the system literal after PUBLIC.
    fn parse_external_id(&mut self, keyword: &Token, system_required: bool) -> Result<ExternalId> {
        match keyword.text.as_str() {
            "SYSTEM" => {
                let system = self.expect(TokenKind::String)?;
                Ok(ExternalId::System { system: system.text })
            }
            "PUBLIC" => {
                let public = self.expect(TokenKind::String)?.text;
                let system = if system_required {
                    Some(self.expect(TokenKind::String)?.text)
                } else {
                    self.accept(TokenKind::String)?.map(|t| t.text)
                };
                Ok(ExternalId::Public { public, system })
            }
            other => Err(self.syntax_error(
                keyword,
                format!("Invalid external ID keyword '{}'", other),
            )),
        }
    }

    // ========================================================================
    // <!NOTATION>
    // ========================================================================

    fn parse_notation(&mut self) -> Result<()> {
        let name = self.expect(TokenKind::Identifier)?;
        let keyword = self.expect(TokenKind::Identifier)?;
        let external_id = self.parse_external_id(&keyword, false)?;

        let notation = Notation {
            name: name.text,
            external_id,
        };
        self.dtd.notations.insert(notation.name.clone(), notation.clone());
        self.dtd.items.push(Declaration::Notation(notation));

        self.expect(TokenKind::Gt)?;
        Ok(())
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier | TokenKind::NmToken => format!("'{}'", token.text),
        TokenKind::String => format!("literal \"{}\"", token.text),
        kind => kind.describe().to_string(),
    }
}

/// Parse DTD text
pub fn parse_str(text: &str, guess_root: bool) -> Result<Dtd> {
    DtdParser::from_str(text).parse(guess_root)
}

/// Parse a DTD from a file path or URL
pub fn parse_source(location: &str, guess_root: bool) -> Result<Dtd> {
    DtdParser::from_source(&Source::detect(location))?.parse(guess_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(text: &str) -> Dtd {
        parse_str(text, false).unwrap()
    }

    fn content(dtd: &Dtd, name: &str) -> Item {
        dtd.element(name).and_then(|e| e.content.clone()).unwrap()
    }

    fn names(items: &[Item]) -> Vec<String> {
        items
            .iter()
            .map(|i| match &i.kind {
                ItemKind::Name(n) => n.clone(),
                ItemKind::PCData => "#PCDATA".to_string(),
                other => format!("{:?}", other),
            })
            .collect()
    }

    #[rstest]
    #[case("EMPTY", ItemKind::Empty)]
    #[case("ANY", ItemKind::Any)]
    fn test_empty_and_any(#[case] spec: &str, #[case] expected: ItemKind) {
        let dtd = parse(&format!("<!ELEMENT a {}>", spec));
        let item = content(&dtd, "a");
        assert_eq!(item.kind, expected);
        assert_eq!(item.cardinal, Cardinal::None);
    }

    #[test]
    fn test_mixed_pcdata_only() {
        let item = content(&parse("<!ELEMENT p (#PCDATA)>"), "p");
        assert!(matches!(item.kind, ItemKind::Container(ContainerKind::Mixed, _)));
        assert_eq!(names(item.children()), vec!["#PCDATA"]);
        assert_eq!(item.cardinal, Cardinal::None);

        let item = content(&parse("<!ELEMENT p (#PCDATA)*>"), "p");
        assert_eq!(item.cardinal, Cardinal::ZeroOrMany);
    }

    #[test]
    fn test_mixed_with_names() {
        let item = content(&parse("<!ELEMENT p (#PCDATA|a|b)*>"), "p");
        assert!(matches!(item.kind, ItemKind::Container(ContainerKind::Mixed, _)));
        assert_eq!(names(item.children()), vec!["#PCDATA", "a", "b"]);
        assert_eq!(item.cardinal, Cardinal::ZeroOrMany);
    }

    #[rstest]
    #[case("<!ELEMENT p (#PCDATA|a)>")]
    #[case("<!ELEMENT p (#PCDATA|a)+>")]
    #[case("<!ELEMENT p (#PCDATA,a)*>")]
    #[case("<!ELEMENT p (#PCDATA|(a))*>")]
    fn test_mixed_errors(#[case] input: &str) {
        assert!(parse_str(input, false).unwrap_err().is_syntax());
    }

    #[test]
    fn test_sequence_with_group_cardinality() {
        let item = content(&parse("<!ELEMENT a (b, c, d)+>"), "a");
        assert!(matches!(item.kind, ItemKind::Container(ContainerKind::Sequence, _)));
        assert_eq!(names(item.children()), vec!["b", "c", "d"]);
        assert_eq!(item.cardinal, Cardinal::OneOrMany);
    }

    #[test]
    fn test_choice_and_nested_groups() {
        let item = content(&parse("<!ELEMENT a ((b | c)*, d?, (e))>"), "a");
        assert!(matches!(item.kind, ItemKind::Container(ContainerKind::Sequence, _)));
        let children = item.children();
        assert_eq!(children.len(), 3);
        assert!(matches!(children[0].kind, ItemKind::Container(ContainerKind::Choice, _)));
        assert_eq!(children[0].cardinal, Cardinal::ZeroOrMany);
        assert_eq!(names(children[0].children()), vec!["b", "c"]);
        assert_eq!(children[1], Item::name("d").with_cardinal(Cardinal::Optional));
        // single particle group defaults to a sequence
        assert!(matches!(children[2].kind, ItemKind::Container(ContainerKind::Sequence, _)));
        assert_eq!(item.cardinal, Cardinal::None);
    }

    #[test]
    fn test_single_child_group_is_sequence() {
        let item = content(&parse("<!ELEMENT a (b)>"), "a");
        assert_eq!(item, Item::container(ContainerKind::Sequence, vec![Item::name("b")]));
    }

    fn nested(depth: usize) -> String {
        format!("<!ELEMENT a {}b{}>", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let err = parse_str(&nested(10_000), false).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_nesting_up_to_limit() {
        let dtd = parse(&nested(DEFAULT_MAX_DEPTH as usize));
        assert_eq!(content(&dtd, "a").referenced_names(), vec!["b"]);

        assert!(DtdParser::from_str(&nested(3)).max_depth(3).parse(false).is_ok());
        let err = DtdParser::from_str(&nested(4)).max_depth(3).parse(false).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!((err.line, err.column), (1, 16));
    }

    #[rstest]
    #[case("<!ELEMENT a (b, c | d)>")]
    #[case("<!ELEMENT a (b | c, d)>")]
    #[case("<!ELEMENT a ((x, y), c | d)>")]
    fn test_mixing_separators_fails(#[case] input: &str) {
        let err = parse_str(input, false).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.message.contains("mix"));
    }

    #[rstest]
    #[case("<!ELEMENT a (b, )>")]
    #[case("<!ELEMENT a ()>")]
    #[case("<!ELEMENT a b>")]
    #[case("<!ELEMENT a (b)")]
    #[case("<!ELEMENT a EMPTY EMPTY>")]
    fn test_malformed_elements(#[case] input: &str) {
        assert!(parse_str(input, false).is_err());
    }

    #[test]
    fn test_duplicate_element_fails() {
        let err = parse_str("<!ELEMENT a EMPTY>\n<!ELEMENT a ANY>", false).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!((err.line, err.column), (2, 11));
    }

    #[test]
    fn test_attlist_before_element() {
        let dtd = parse(
            "<!ATTLIST a id ID #REQUIRED>\n<!ELEMENT a EMPTY>\n<!ATTLIST a lang CDATA 'en'>",
        );
        let element = dtd.element("a").unwrap();
        assert_eq!(element.content, Some(Item::new(ItemKind::Empty)));
        assert_eq!(element.attributes.len(), 2);
        assert_eq!(element.attribute("lang").unwrap().default_value.as_deref(), Some("en"));
        assert_eq!(element.attribute("lang").unwrap().decl, AttributeDecl::Value);
        assert!(matches!(dtd.items[0], Declaration::AttList(_)));
        assert_eq!(dtd.items[1], Declaration::Element("a".to_string()));
    }

    #[test]
    fn test_attlist_placeholder_not_in_items() {
        let dtd = parse("<!ATTLIST ghost x CDATA #IMPLIED>");
        assert_eq!(dtd.items.len(), 1);
        assert!(dtd.element("ghost").unwrap().content.is_none());
    }

    #[test]
    fn test_attribute_required_cdata() {
        let dtd = parse("<!ATTLIST a b CDATA #REQUIRED>");
        let attr = dtd.element("a").unwrap().attribute("b").unwrap();
        assert_eq!(attr.attr_type, AttributeType::Keyword("CDATA".to_string()));
        assert_eq!(attr.decl, AttributeDecl::Required);
        assert_eq!(attr.default_value, None);
    }

    #[test]
    fn test_attribute_types_and_defaults() {
        let dtd = parse(
            r#"<!ATTLIST img
                 align (left|right|1st) "left"
                 fmt NOTATION (gif | jpeg) #IMPLIED
                 version CDATA #FIXED "1.0"
                 refs IDREFS #IMPLIED>"#,
        );
        let img = dtd.element("img").unwrap();
        assert_eq!(
            img.attribute("align").unwrap().attr_type,
            AttributeType::Enumeration(vec!["left".into(), "right".into(), "1st".into()])
        );
        assert_eq!(
            img.attribute("fmt").unwrap().attr_type,
            AttributeType::Notation(vec!["gif".into(), "jpeg".into()])
        );
        let version = img.attribute("version").unwrap();
        assert_eq!(version.decl, AttributeDecl::Fixed);
        assert_eq!(version.default_value.as_deref(), Some("1.0"));
        match &dtd.items[0] {
            Declaration::AttList(list) => {
                let order: Vec<&str> = list.attributes.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(order, vec!["align", "fmt", "version", "refs"]);
            }
            other => panic!("expected ATTLIST, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_attribute_last_wins_for_lookup() {
        let dtd = parse("<!ATTLIST a x CDATA 'one' x CDATA 'two'>");
        let attr = dtd.element("a").unwrap().attribute("x").unwrap();
        assert_eq!(attr.default_value.as_deref(), Some("two"));
        match &dtd.items[0] {
            Declaration::AttList(list) => assert_eq!(list.attributes.len(), 2),
            other => panic!("expected ATTLIST, got {:?}", other),
        }
    }

    #[rstest]
    #[case("<!ATTLIST a x CDATA #BOGUS>")]
    #[case("<!ATTLIST a x CDATA #FIXED>")]
    #[case("<!ATTLIST a x NOTATION (1a) #IMPLIED>")]
    #[case("<!ATTLIST a x () #IMPLIED>")]
    #[case("<!ATTLIST a x CDATA>")]
    fn test_malformed_attributes(#[case] input: &str) {
        assert!(parse_str(input, false).is_err());
    }

    #[test]
    fn test_parameter_entity_macro() {
        let dtd = parse("<!ENTITY % x \"foo\"> <!ELEMENT %x;bar EMPTY>");
        assert!(dtd.element("foobar").is_some());
        assert_eq!(dtd.parameter_entity("x").unwrap().value.as_deref(), Some("foo"));

        // a parenthesized EMPTY is just a child named EMPTY
        let dtd = parse("<!ENTITY % x \"foo\"> <!ELEMENT %x;bar (EMPTY)>");
        assert_eq!(
            content(&dtd, "foobar"),
            Item::container(ContainerKind::Sequence, vec![Item::name("EMPTY")])
        );
    }

    #[test]
    fn test_parameter_entity_in_content_model() {
        let dtd = parse(
            "<!ENTITY % inline \"em | strong\">\n<!ELEMENT p (#PCDATA | %inline;)*>",
        );
        assert_eq!(names(content(&dtd, "p").children()), vec!["#PCDATA", "em", "strong"]);
    }

    #[test]
    fn test_undefined_parameter_entity() {
        let err = parse_str("<!ELEMENT a EMPTY>\n<!ELEMENT %nope; EMPTY>", false).unwrap_err();
        assert!(err.is_lexical());
        assert_eq!((err.line, err.column), (2, 11));
    }

    #[test]
    fn test_first_entity_value_wins() {
        let dtd = parse("<!ENTITY a \"1\">\n<!ENTITY a \"2\">");
        assert_eq!(dtd.entity("a").unwrap().value.as_deref(), Some("1"));
        let declared: Vec<_> = dtd
            .items
            .iter()
            .filter_map(|d| match d {
                Declaration::Entity(e) => e.value.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(declared, vec!["1", "2"]);
    }

    #[test]
    fn test_first_parameter_entity_value_is_expanded() {
        let dtd = parse("<!ENTITY % n \"one\"><!ENTITY % n \"two\"><!ELEMENT %n; EMPTY>");
        assert!(dtd.element("one").is_some());
        assert!(dtd.element("two").is_none());
    }

    #[test]
    fn test_parameter_and_general_namespaces() {
        let dtd = parse("<!ENTITY x \"general\"><!ENTITY % x \"param\">");
        assert_eq!(dtd.entity("x").unwrap().value.as_deref(), Some("general"));
        assert_eq!(dtd.parameter_entity("x").unwrap().value.as_deref(), Some("param"));
    }

    #[test]
    fn test_external_entities_and_ndata() {
        let dtd = parse(
            r#"<!NOTATION gif SYSTEM "image/gif">
               <!ENTITY logo SYSTEM "logo.gif" NDATA gif>
               <!ENTITY chap PUBLIC "-//X//Chapter" "chap.xml">
               <!ENTITY % mods SYSTEM "mods.ent">"#,
        );
        let logo = dtd.entity("logo").unwrap();
        assert_eq!(logo.external_id, Some(ExternalId::System { system: "logo.gif".into() }));
        assert_eq!(logo.ndata.as_deref(), Some("gif"));
        assert!(logo.value.is_none());
        assert_eq!(
            dtd.entity("chap").unwrap().external_id,
            Some(ExternalId::Public {
                public: "-//X//Chapter".into(),
                system: Some("chap.xml".into())
            })
        );
        let mods = dtd.parameter_entity("mods").unwrap();
        assert!(mods.is_external());
        assert_eq!(mods.external_id.as_ref().and_then(|id| id.system()), Some("mods.ent"));
    }

    #[test]
    fn test_external_parameter_entity_is_not_expanded() {
        let err = parse_str("<!ENTITY % ext SYSTEM \"x.ent\"> %ext;", false).unwrap_err();
        assert!(err.is_lexical());
    }

    /// NDATA on a parameter entity is not consumed by the entity definition;
    /// the closing '>' expectation then rejects it.
    #[test]
    fn test_ndata_on_parameter_entity_is_rejected() {
        let err = parse_str("<!ENTITY % p SYSTEM \"p.ent\" NDATA gif>", false).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.message.contains("NDATA"));
    }

    #[rstest]
    #[case("<!ENTITY a SYSTEM>")]
    #[case("<!ENTITY a PUBLIC \"p\">")]
    #[case("<!ENTITY a BOGUS \"x\">")]
    #[case("<!ENTITY a SYSTEM \"x\" FOO gif>")]
    #[case("<!ENTITY a>")]
    fn test_malformed_entities(#[case] input: &str) {
        assert!(parse_str(input, false).unwrap_err().is_syntax());
    }

    #[test]
    fn test_notations() {
        let dtd = parse(
            r#"<!NOTATION a PUBLIC "-//A">
               <!NOTATION b PUBLIC "-//B" "b.exe">
               <!NOTATION a SYSTEM "again">"#,
        );
        assert_eq!(
            dtd.notation("b").unwrap().external_id,
            ExternalId::Public { public: "-//B".into(), system: Some("b.exe".into()) }
        );
        // duplicate simply replaces the index entry
        assert_eq!(
            dtd.notation("a").unwrap().external_id,
            ExternalId::System { system: "again".into() }
        );
        assert_eq!(dtd.items.len(), 3);
    }

    #[test]
    fn test_comments_and_processing_instructions() {
        let dtd = parse("<?xml version=\"1.0\"?>\n<!-- hello -->\n<?odd a?b?>");
        assert_eq!(
            dtd.items,
            vec![
                Declaration::ProcessingInstruction("xml version=\"1.0\"".into()),
                Declaration::Comment(" hello ".into()),
                Declaration::ProcessingInstruction("odd a?b".into()),
            ]
        );
    }

    #[test]
    fn test_conditional_sections() {
        let dtd = parse(
            r#"<!ENTITY % draft "INCLUDE">
               <!ENTITY % final "IGNORE">
               <![%draft;[ <!ELEMENT kept EMPTY> ]]>
               <![%final;[ <!ELEMENT dropped EMPTY> <![INCLUDE[ <!ELEMENT nested ANY> ]]> ]]>
               <![ IGNORE [ %undefined; ]]>
               <!ELEMENT after ANY>"#,
        );
        assert!(dtd.element("kept").is_some());
        assert!(dtd.element("dropped").is_none());
        assert!(dtd.element("nested").is_none());
        assert!(dtd.element("after").is_some());
    }

    #[test]
    fn test_invalid_conditional_keyword() {
        assert!(parse_str("<![MAYBE[ ]]>", false).unwrap_err().is_syntax());
    }

    #[test]
    fn test_unknown_declaration_is_skipped() {
        let dtd = parse("<!DOCTYPE whatever (x|y) 'lit'>\n<!ELEMENT a EMPTY>");
        assert_eq!(dtd.items, vec![Declaration::Element("a".into())]);
    }

    #[rstest]
    #[case("stray")]
    #[case(">")]
    #[case("( a )")]
    #[case("'literal'")]
    fn test_stray_top_level_tokens(#[case] input: &str) {
        let err = parse_str(input, false).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!((err.line, err.column), (1, 1));
    }

    #[test]
    fn test_guess_root() {
        let text = "<!ELEMENT book (chapter)+>\n<!ELEMENT chapter (#PCDATA)>";
        let dtd = parse_str(text, true).unwrap();
        assert_eq!(dtd.root_element.as_deref(), Some("book"));
        assert_eq!(dtd.root().unwrap().name, "book");

        let dtd = parse_str(text, false).unwrap();
        assert_eq!(dtd.root_element, None);
    }

    #[test]
    fn test_guess_root_cyclic() {
        let dtd = parse_str("<!ELEMENT a (b)>\n<!ELEMENT b (a)>", true).unwrap();
        assert_eq!(dtd.root_element, None);
    }

    #[test]
    fn test_empty_input() {
        let dtd = parse("  \n ");
        assert!(dtd.items.is_empty());
        assert!(dtd.elements.is_empty());
    }

    #[test]
    fn test_trace_flag_has_no_effect_on_model() {
        let text = "<!ENTITY % x 'a'><!ELEMENT %x; (b?)><!ELEMENT b EMPTY>";
        let plain = DtdParser::from_str(text).parse(true).unwrap();
        let traced = DtdParser::from_str(text).with_trace(true).parse(true).unwrap();
        assert_eq!(plain, traced);
    }

    #[test]
    fn test_entity_expansion_limit() {
        let mut text = String::from("<!ENTITY % l0 \"a \">\n");
        for n in 1..=5 {
            let body = format!("%l{}; ", n - 1).repeat(10);
            text.push_str(&format!("<!ENTITY % l{} \"{}\">\n", n, body));
        }
        text.push_str("<!VENDOR %l5;>");

        let err = parse_str(&text, false).unwrap_err();
        assert!(err.is_lexical());
        assert!(err.message.contains("expansions"));

        let small = "<!ENTITY % x \"y\"><!ELEMENT %x; (%x;a, %x;b)>";
        assert!(DtdParser::from_str(small).max_entity_expansions(3).parse(false).is_ok());
        assert!(DtdParser::from_str(small).max_entity_expansions(2).parse(false).is_err());
    }

    #[test]
    fn test_parse_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.dtd");
        std::fs::write(&good, "<!ELEMENT doc (p*)>\n<!ELEMENT p (#PCDATA)>").unwrap();
        let location = good.display().to_string();
        let dtd = parse_source(&location, true).unwrap();
        assert_eq!(dtd.source_id.as_deref(), Some(location.as_str()));
        assert_eq!(dtd.root_element.as_deref(), Some("doc"));

        let broken = dir.path().join("broken.dtd");
        std::fs::write(&broken, "<!ELEMENT doc EMPTY>\n<!ELEMENT doc ANY>").unwrap();
        let location = broken.display().to_string();
        let err = parse_source(&location, false).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.source_id.as_deref(), Some(location.as_str()));
        assert_eq!((err.line, err.column), (2, 11));
    }

    #[test]
    fn test_source_id_in_errors() {
        let err = DtdParser::new("<!ELEMENT a (b,|c)>", Some("doc.dtd".into()))
            .parse(false)
            .unwrap_err();
        assert_eq!(err.source_id.as_deref(), Some("doc.dtd"));
        assert!(err.to_string().starts_with("doc.dtd:1:"));

        let dtd = DtdParser::new("<!ELEMENT a ANY>", Some("doc.dtd".into()))
            .parse(false)
            .unwrap();
        assert_eq!(dtd.source_id.as_deref(), Some("doc.dtd"));
    }
}
