//! XPath 1.0 subset used by synthesized locators.
//!
//! Supported: absolute and relative location paths with `/` and `//`, the `*`, name, `.`
//! and `..` steps, and predicates made of a position (`[2]`), an existence test (`[@id]`)
//! or an equality between operands. Operands are string literals, `@attr`, `text()`,
//! `local-name()`, `normalize-space(...)` and `concat(...)`.

use std::fmt;

use crate::dom::{normalize_space, NodeId, NodeKind, PageDom};
use crate::errors::XPathError;

/// Render `value` as an XPath string literal.
///
/// Double quotes are used unless the value contains one; values containing both quote
/// characters are emitted as `concat(...)`.
pub fn literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let mut args = Vec::new();
    for (index, part) in value.split('"').enumerate() {
        if index > 0 {
            args.push("'\"'".to_string());
        }
        if !part.is_empty() {
            args.push(format!("\"{part}\""));
        }
    }
    format!("concat({})", args.join(", "))
}

/// Parse and evaluate in one go, returning matches in document order.
pub fn select(dom: &PageDom, expression: &str) -> Result<Vec<NodeId>, XPathError> {
    Ok(XPath::parse(expression)?.evaluate(dom))
}

/// Number of nodes `expression` selects.
pub fn count(dom: &PageDom, expression: &str) -> Result<usize, XPathError> {
    select(dom, expression).map(|nodes| nodes.len())
}

#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    source: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    DescendantOrSelf,
    Parent,
    SelfNode,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    AnyNode,
    AnyElement,
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Exists(Operand),
    Equals(Operand, Operand),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(String),
    Attribute(String),
    Text,
    LocalName,
    Context,
    NormalizeSpace(Box<Operand>),
    Concat(Vec<Operand>),
}

enum Value {
    Str(String),
    Set(Vec<String>),
}

impl Value {
    fn string_value(self) -> String {
        match self {
            Value::Str(value) => value,
            Value::Set(values) => values.into_iter().next().unwrap_or_default(),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Value::Str(value) => !value.is_empty(),
            Value::Set(values) => !values.is_empty(),
        }
    }
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self, XPathError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(XPathError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let steps = parser.path()?;
        Ok(Self {
            source: expression.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against the document node; matches are deduplicated and in document order.
    pub fn evaluate(&self, dom: &PageDom) -> Vec<NodeId> {
        let mut current = vec![dom.root()];
        for step in &self.steps {
            let mut next = Vec::new();
            for context in current {
                let mut candidates: Vec<NodeId> = step
                    .axis_nodes(dom, context)
                    .into_iter()
                    .filter(|node| step.test.matches(dom, *node))
                    .collect();
                for predicate in &step.predicates {
                    candidates = predicate.filter(dom, candidates);
                }
                next.extend(candidates);
            }
            next.sort_unstable();
            next.dedup();
            current = next;
        }
        current
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }

    fn axis_nodes(&self, dom: &PageDom, context: NodeId) -> Vec<NodeId> {
        match self.axis {
            Axis::Child => dom.children(context).to_vec(),
            Axis::DescendantOrSelf => dom.subtree(context),
            Axis::Parent => dom.parent(context).into_iter().collect(),
            Axis::SelfNode => vec![context],
        }
    }
}

impl NodeTest {
    fn matches(&self, dom: &PageDom, node: NodeId) -> bool {
        match self {
            NodeTest::AnyNode => true,
            NodeTest::AnyElement => dom.is_element(node),
            NodeTest::Name(name) => dom
                .tag(node)
                .map_or(false, |tag| tag.eq_ignore_ascii_case(name)),
        }
    }
}

impl Predicate {
    fn filter(&self, dom: &PageDom, candidates: Vec<NodeId>) -> Vec<NodeId> {
        match self {
            Predicate::Position(position) => candidates
                .get(position.wrapping_sub(1))
                .copied()
                .into_iter()
                .collect(),
            Predicate::Exists(operand) => candidates
                .into_iter()
                .filter(|node| operand.eval(dom, *node).is_truthy())
                .collect(),
            Predicate::Equals(left, right) => candidates
                .into_iter()
                .filter(|node| equals(left.eval(dom, *node), right.eval(dom, *node)))
                .collect(),
        }
    }
}

fn equals(left: Value, right: Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Set(set), Value::Str(value)) | (Value::Str(value), Value::Set(set)) => {
            set.iter().any(|item| *item == value)
        }
        (Value::Set(a), Value::Set(b)) => a.iter().any(|item| b.contains(item)),
    }
}

impl Operand {
    fn eval(&self, dom: &PageDom, node: NodeId) -> Value {
        match self {
            Operand::Literal(value) => Value::Str(value.clone()),
            Operand::Attribute(name) => {
                Value::Set(dom.attr(node, name).map(str::to_string).into_iter().collect())
            }
            Operand::Text => Value::Set(dom.text_children(node).map(str::to_string).collect()),
            Operand::LocalName => Value::Str(dom.tag(node).unwrap_or_default().to_string()),
            Operand::Context => Value::Str(match dom.node(node).map(|n| &n.kind) {
                Some(NodeKind::Text(text)) => text.clone(),
                Some(NodeKind::Comment(text)) => text.clone(),
                _ => dom.text_content(node),
            }),
            Operand::NormalizeSpace(inner) => {
                Value::Str(normalize_space(&inner.eval(dom, node).string_value()))
            }
            Operand::Concat(parts) => Value::Str(
                parts
                    .iter()
                    .map(|part| part.eval(dom, node).string_value())
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Eq,
    Comma,
    Star,
    Dot,
    DotDot,
    Literal(String),
    Number(usize),
    Name(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::At => f.write_str("@"),
            Token::Eq => f.write_str("="),
            Token::Comma => f.write_str(","),
            Token::Star => f.write_str("*"),
            Token::Dot => f.write_str("."),
            Token::DotDot => f.write_str(".."),
            Token::Literal(value) => write!(f, "\"{value}\""),
            Token::Number(value) => write!(f, "{value}"),
            Token::Name(name) => f.write_str(name),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, XPathError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let single = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                tokens.push((Token::DoubleSlash, offset));
                i += 2;
                continue;
            }
            '.' if next == Some('.') => {
                tokens.push((Token::DotDot, offset));
                i += 2;
                continue;
            }
            '/' => Some(Token::Slash),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '@' => Some(Token::At),
            '=' => Some(Token::Eq),
            ',' => Some(Token::Comma),
            '*' => Some(Token::Star),
            '.' => Some(Token::Dot),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((token, offset));
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].1 != c {
                end += 1;
            }
            if end >= chars.len() {
                return Err(XPathError::UnterminatedLiteral(offset));
            }
            let value: String = chars[start..end].iter().map(|(_, c)| *c).collect();
            tokens.push((Token::Literal(value), offset));
            i = end + 1;
        } else if c.is_ascii_digit() {
            let mut end = i;
            while end < chars.len() && chars[end].1.is_ascii_digit() {
                end += 1;
            }
            let digits: String = chars[i..end].iter().map(|(_, c)| *c).collect();
            let value = digits
                .parse::<usize>()
                .map_err(|_| XPathError::UnexpectedToken {
                    token: digits.clone(),
                    offset,
                })?;
            tokens.push((Token::Number(value), offset));
            i = end;
        } else if is_name_start(c) {
            let mut end = i;
            while end < chars.len() && is_name_char(chars[end].1) {
                end += 1;
            }
            let name: String = chars[i..end].iter().map(|(_, c)| *c).collect();
            tokens.push((Token::Name(name), offset));
            i = end;
        } else {
            return Err(XPathError::UnexpectedToken {
                token: c.to_string(),
                offset,
            });
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Result<Token, XPathError> {
        let (token, _) = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(XPathError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self) -> XPathError {
        match self.tokens.get(self.pos) {
            Some((token, offset)) => XPathError::UnexpectedToken {
                token: token.to_string(),
                offset: *offset,
            },
            None => XPathError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), XPathError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn path(&mut self) -> Result<Vec<Step>, XPathError> {
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if self.peek().is_none() {
                    return Ok(steps);
                }
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
            }
            _ => {}
        }

        loop {
            steps.push(self.step()?);
            match self.peek() {
                None => break,
                Some(Token::Slash) => self.pos += 1,
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                }
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(steps)
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        let (axis, test) = match self.peek() {
            Some(Token::DotDot) => (Axis::Parent, NodeTest::AnyNode),
            Some(Token::Dot) => (Axis::SelfNode, NodeTest::AnyNode),
            Some(Token::Star) => (Axis::Child, NodeTest::AnyElement),
            Some(Token::Name(name)) => {
                if self.peek_at(1) == Some(&Token::LParen) {
                    return Err(XPathError::UnsupportedFunction(name.clone()));
                }
                (Axis::Child, NodeTest::Name(name.clone()))
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.predicate()?);
            self.expect(Token::RBracket)?;
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicate(&mut self) -> Result<Predicate, XPathError> {
        if let Some(Token::Number(position)) = self.peek() {
            let position = *position;
            self.pos += 1;
            return Ok(Predicate::Position(position));
        }
        let left = self.operand()?;
        if self.peek() == Some(&Token::Eq) {
            self.pos += 1;
            let right = self.operand()?;
            Ok(Predicate::Equals(left, right))
        } else {
            Ok(Predicate::Exists(left))
        }
    }

    fn operand(&mut self) -> Result<Operand, XPathError> {
        match self.advance()? {
            Token::Literal(value) => Ok(Operand::Literal(value)),
            Token::Dot => Ok(Operand::Context),
            Token::At => match self.advance()? {
                Token::Name(name) => Ok(Operand::Attribute(name)),
                _ => {
                    self.pos -= 1;
                    Err(self.unexpected())
                }
            },
            Token::Name(name) => {
                self.expect(Token::LParen)?;
                self.function(name)
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn function(&mut self, name: String) -> Result<Operand, XPathError> {
        match name.as_str() {
            "text" => {
                self.expect(Token::RParen)?;
                Ok(Operand::Text)
            }
            "local-name" => {
                self.expect(Token::RParen)?;
                Ok(Operand::LocalName)
            }
            "normalize-space" => {
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Operand::NormalizeSpace(Box::new(Operand::Context)));
                }
                let inner = self.operand()?;
                self.expect(Token::RParen)?;
                Ok(Operand::NormalizeSpace(Box::new(inner)))
            }
            "concat" => {
                let mut parts = vec![self.operand()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    parts.push(self.operand()?);
                }
                self.expect(Token::RParen)?;
                if parts.len() < 2 {
                    return Err(XPathError::UnsupportedFunction(name));
                }
                Ok(Operand::Concat(parts))
            }
            _ => Err(XPathError::UnsupportedFunction(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageDom {
        PageDom::parse(
            r#"<ul id="list"><li class="a">one</li><li>two</li><li>three</li></ul>
               <ul><li>four</li></ul>
               <input placeholder="  Your   name ">
               <button aria-label="close">x</button>"#,
        )
        .unwrap()
    }

    #[test]
    fn literal_quoting() {
        assert_eq!(literal("plain"), "\"plain\"");
        assert_eq!(literal("say \"hi\""), "'say \"hi\"'");
        assert_eq!(
            literal("it's \"x\""),
            "concat(\"it's \", '\"', \"x\", '\"')"
        );
    }

    #[test]
    fn positions_are_relative_to_each_parent() {
        let dom = page();
        assert_eq!(count(&dom, "//li").unwrap(), 4);
        // First li of each list.
        assert_eq!(count(&dom, "//li[1]").unwrap(), 2);
        let second = select(&dom, "//*[@id=\"list\"]/*[local-name()=\"li\"][2]").unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(dom.text_content(second[0]), "two");
    }

    #[test]
    fn attribute_and_text_predicates() {
        let dom = page();
        assert_eq!(count(&dom, "//*[@class]").unwrap(), 1);
        assert_eq!(
            count(&dom, "//*[local-name()=\"input\"][normalize-space(@placeholder)=\"Your name\"]")
                .unwrap(),
            1
        );
        assert_eq!(
            count(&dom, "//*[normalize-space(@aria-label)='close']").unwrap(),
            1
        );
        assert_eq!(
            count(&dom, "//*[local-name()=\"li\"][normalize-space(text())=\"three\"]").unwrap(),
            1
        );
        assert_eq!(count(&dom, "//li[text()=concat(\"th\", 'ree')]").unwrap(), 1);
    }

    #[test]
    fn parent_step_and_body_shortcut() {
        let dom = page();
        let lists = select(&dom, "//li/..").unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(select(&dom, "//body").unwrap(), vec![dom.body().unwrap()]);
        assert_eq!(count(&dom, "/html/body/ul").unwrap(), 2);
    }

    #[test]
    fn invalid_expressions_are_errors() {
        assert_eq!(XPath::parse(""), Err(XPathError::Empty));
        assert!(matches!(
            XPath::parse("//*[@id=\"x]"),
            Err(XPathError::UnterminatedLiteral(_))
        ));
        assert!(matches!(
            XPath::parse("//*[contains(@id, 'x')]"),
            Err(XPathError::UnsupportedFunction(name)) if name == "contains"
        ));
        assert!(XPath::parse("//div[").is_err());
        assert!(XPath::parse("#main").is_err());
    }
}
