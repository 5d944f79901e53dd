//! Small fragment DOM for tests
//!
//! Parses well-formed HTML fragments into an element tree and answers
//! selectors built from type, `*`, `#id`, `.class`, `[attr]` and
//! `[attr="value"]` compounds joined by descendant or `>` combinators,
//! with `,` separated groups.

use blockdata_core::{DomQuery, ExtractError, ExtractResult, NodeSet};

const VOID_TAGS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag.as_str())
    }

    fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }

    fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        decode_entities(&out)
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Element(el) => write_element(el, out),
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (key, value) in &el.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
    }
    out.push('>');
    if el.is_void() {
        return;
    }
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Parse a fragment into top-level nodes
fn parse_fragment(html: &str) -> Vec<Node> {
    let mut roots: Vec<Node> = Vec::new();
    let mut open: Vec<Element> = Vec::new();
    let mut rest = html;

    fn attach(node: Node, open: &mut [Element], roots: &mut Vec<Node>) {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            let tag = after[..end].trim().to_ascii_lowercase();
            rest = after.get(end + 1..).unwrap_or("");
            if let Some(pos) = open.iter().rposition(|el| el.tag == tag) {
                while open.len() > pos {
                    let Some(el) = open.pop() else { break };
                    attach(Node::Element(el), &mut open, &mut roots);
                }
            }
        } else if rest.starts_with('<')
            && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
        {
            let end = tag_end(rest);
            let (el, self_closing) = parse_open_tag(&rest[1..end]);
            rest = rest.get(end + 1..).unwrap_or("");
            if self_closing || el.is_void() {
                attach(Node::Element(el), &mut open, &mut roots);
            } else {
                open.push(el);
            }
        } else {
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let end = rest[first..].find('<').map_or(rest.len(), |i| i + first);
            attach(Node::Text(rest[..end].to_string()), &mut open, &mut roots);
            rest = &rest[end..];
        }
    }

    while let Some(el) = open.pop() {
        attach(Node::Element(el), &mut open, &mut roots);
    }
    roots
}

/// Index of the `>` closing the tag at the start of `s`, skipping quoted values
fn tag_end(s: &str) -> usize {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return i,
            _ => {}
        }
    }
    s.len()
}

fn parse_open_tag(body: &str) -> (Element, bool) {
    let self_closing = body.trim_end().ends_with('/');
    let body = body.trim_end().trim_end_matches('/');
    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let tag = body[..name_end].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let inner = &after_eq[1..];
                    let close = inner.find(q).unwrap_or(inner.len());
                    (&inner[..close], inner.get(close + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining.trim_start();
            value.to_string()
        } else {
            String::new()
        };

        if !key.is_empty() {
            attrs.push((key, value));
        }
    }

    (
        Element {
            tag,
            attrs,
            children: Vec::new(),
        },
        self_closing,
    )
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, el: &Element) -> bool {
        self.tag.as_ref().map_or(true, |tag| *tag == el.tag)
            && self
                .id
                .as_ref()
                .map_or(true, |id| el.attr("id") == Some(id.as_str()))
            && self.classes.iter().all(|class| el.has_class(class))
            && self.attrs.iter().all(|(key, expected)| match expected {
                Some(expected) => el.attr(key) == Some(expected.as_str()),
                None => el.attr(key).is_some(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches(&self, el: &Element, ancestors: &[&Element]) -> bool {
        let last = self.compounds.len() - 1;
        self.compounds[last].matches(el) && self.matches_upward(last, ancestors)
    }

    fn matches_upward(&self, idx: usize, ancestors: &[&Element]) -> bool {
        if idx == 0 {
            return true;
        }
        let target = &self.compounds[idx - 1];
        match self.combinators[idx - 1] {
            Combinator::Child => match ancestors.split_last() {
                Some((parent, rest)) => target.matches(parent) && self.matches_upward(idx - 1, rest),
                None => false,
            },
            Combinator::Descendant => (0..ancestors.len()).rev().any(|i| {
                target.matches(ancestors[i]) && self.matches_upward(idx - 1, &ancestors[..i])
            }),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Vec<Complex>, String> {
    selector.split(',').map(parse_complex).collect()
}

fn parse_complex(group: &str) -> Result<Complex, String> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending = None;

    let spaced = group.replace('>', " > ");
    for token in spaced.split_whitespace() {
        if token == ">" {
            pending = Some(Combinator::Child);
            continue;
        }
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        compounds.push(parse_compound(token)?);
    }

    if compounds.is_empty() || pending.is_some() {
        return Err(format!("malformed selector group '{group}'"));
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn parse_compound(token: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut rest = token;

    let tag_end = rest
        .find(|c: char| matches!(c, '#' | '.' | '['))
        .unwrap_or(rest.len());
    match &rest[..tag_end] {
        "" | "*" => {}
        tag => compound.tag = Some(tag.to_ascii_lowercase()),
    }
    rest = &rest[tag_end..];

    while let Some(marker) = rest.chars().next() {
        let body = &rest[marker.len_utf8()..];
        match marker {
            '#' | '.' => {
                let end = body
                    .find(|c: char| matches!(c, '#' | '.' | '['))
                    .unwrap_or(body.len());
                let name = body[..end].to_string();
                if name.is_empty() {
                    return Err(format!("empty name in '{token}'"));
                }
                if marker == '#' {
                    compound.id = Some(name);
                } else {
                    compound.classes.push(name);
                }
                rest = &body[end..];
            }
            '[' => {
                let end = body
                    .find(']')
                    .ok_or_else(|| format!("unclosed attribute selector in '{token}'"))?;
                let inner = &body[..end];
                let attr = match inner.split_once('=') {
                    Some((key, value)) => (
                        key.trim().to_ascii_lowercase(),
                        Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                    ),
                    None => (inner.trim().to_ascii_lowercase(), None),
                };
                compound.attrs.push(attr);
                rest = &body[end + 1..];
            }
            _ => return Err(format!("unexpected '{marker}' in '{token}'")),
        }
    }
    Ok(compound)
}

fn select<'a>(
    nodes: &'a [Node],
    selectors: &[Complex],
    ancestors: &mut Vec<&'a Element>,
    out: &mut Vec<Element>,
) {
    for node in nodes {
        if let Node::Element(el) = node {
            if selectors.iter().any(|s| s.matches(el, ancestors)) {
                out.push(el.clone());
            }
            ancestors.push(el);
            select(&el.children, selectors, ancestors, out);
            ancestors.pop();
        }
    }
}

/// Elements matched by one query
#[derive(Debug, Clone, Default)]
pub struct FragmentNodes(Vec<Element>);

impl NodeSet for FragmentNodes {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0.first()?.attr(name).map(decode_entities)
    }

    fn html(&self) -> String {
        self.0.first().map(Element::inner_html).unwrap_or_default()
    }

    fn text(&self) -> String {
        self.0.first().map(Element::text).unwrap_or_default()
    }

    fn outer_html_each(&self) -> Vec<String> {
        self.0.iter().map(Element::outer_html).collect()
    }
}

/// [`DomQuery`] over [`parse_fragment`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentDom;

impl DomQuery for FragmentDom {
    fn query(&self, html: &str, selector: Option<&str>) -> ExtractResult<Box<dyn NodeSet>> {
        let roots = parse_fragment(html);
        let matched = match selector {
            None => roots
                .into_iter()
                .filter_map(|node| match node {
                    Node::Element(el) => Some(el),
                    Node::Text(_) => None,
                })
                .collect(),
            Some(selector) => {
                let selectors = parse_selector(selector)
                    .map_err(|message| ExtractError::dom(Some(selector), message))?;
                let mut out = Vec::new();
                select(&roots, &selectors, &mut Vec::new(), &mut out);
                out
            }
        };
        Ok(Box::new(FragmentNodes(matched)))
    }
}
