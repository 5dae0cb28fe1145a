//! Component Tree Module
//!
//! The declarative tree that is rendered, serialized into a payload and
//! decoded back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Node ==
/// One node of a component tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(Element),
    Fragment(Vec<Node>),
    /// Interactive sub-component resolved through the module manifest
    Client(ClientNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    /// Renders the tree to HTML. Client nodes render as a placeholder
    /// element carrying their module reference and props.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape_html(text)),
            Node::Fragment(children) => children.iter().for_each(|child| child.write_html(out)),
            Node::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
                }
                out.push('>');
                element.children.iter().for_each(|child| child.write_html(out));
                out.push_str(&format!("</{}>", element.tag));
            }
            Node::Client(client) => {
                out.push_str(&format!(
                    "<div data-client=\"{}\"",
                    escape_html(&client.reference)
                ));
                if !client.props.is_empty() {
                    let props = serde_json::to_string(&client.props).unwrap_or_default();
                    out.push_str(&format!(" data-props=\"{}\"", escape_html(&props)));
                }
                out.push('>');
                client.children.iter().for_each(|child| child.write_html(out));
                out.push_str("</div>");
            }
        }
    }

    /// Calls `visit` on every client node in document order.
    pub fn for_each_client<'a>(&'a self, visit: &mut impl FnMut(&'a ClientNode)) {
        match self {
            Node::Text(_) => {}
            Node::Fragment(children) => children.iter().for_each(|c| c.for_each_client(visit)),
            Node::Element(element) => element
                .children
                .iter()
                .for_each(|c| c.for_each_client(visit)),
            Node::Client(client) => {
                visit(client);
                client.children.iter().for_each(|c| c.for_each_client(visit));
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<ClientNode> for Node {
    fn from(client: ClientNode) -> Self {
        Node::Client(client)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

/// Tag and attribute names are written to HTML unescaped, so a decoded tree
/// may only carry names made of ASCII letters, digits, `-` and `:`.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b':')
}

// == Element ==
/// A host element such as `div` or `time`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }
}

// == Client Node ==
/// Reference to an interactive sub-component.
///
/// `reference` is the key into the client module manifest. `module` is filled
/// in by decoding with whatever the active manifest resolved it to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientNode {
    pub reference: String,
    pub props: BTreeMap<String, Value>,
    pub children: Vec<Node>,
    pub module: Option<ResolvedModule>,
}

impl ClientNode {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// Load instructions a decoder resolved for a client module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModule {
    pub id: String,
    pub name: String,
    pub chunks: Vec<String>,
}

/// Escapes text for HTML content and double-quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_to_html() {
        let tree: Node = Element::new("p")
            .attr("class", "note")
            .child("Hello, ")
            .child(Element::new("b").child("world"))
            .into();
        assert_eq!(tree.to_html(), r#"<p class="note">Hello, <b>world</b></p>"#);
    }

    #[test]
    fn test_text_is_escaped() {
        let tree = Node::text("<script>&\"");
        assert_eq!(tree.to_html(), "&lt;script&gt;&amp;&quot;");
    }

    #[test]
    fn test_client_placeholder() {
        let tree: Node = ClientNode::new("counter#Counter").prop("start", 3).into();
        assert_eq!(
            tree.to_html(),
            r#"<div data-client="counter#Counter" data-props="{&quot;start&quot;:3}"></div>"#
        );
    }

    #[test]
    fn test_for_each_client_document_order() {
        let tree = Node::fragment([
            ClientNode::new("a").child(ClientNode::new("b")).into(),
            Element::new("div").child(ClientNode::new("c")).into(),
        ]);
        let mut seen = Vec::new();
        tree.for_each_client(&mut |client| seen.push(client.reference.clone()));
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}
