//! Authoring children and flattening them.

use super::node::{Tag, VNode};
use super::props::Props;
use crate::error::{Error, Result};

/// A child value as authored.
///
/// Lists nest arbitrarily; `Null` and `Bool(false)` are placeholders for
/// conditionally rendered children and disappear when flattened. Strings
/// and numbers become text nodes.
#[derive(Debug, Clone)]
pub enum Child {
    Node(VNode),
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
    List(Vec<Child>),
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.clone())
    }
}

impl From<bool> for Child {
    fn from(b: bool) -> Self {
        Child::Bool(b)
    }
}

impl From<f64> for Child {
    fn from(n: f64) -> Self {
        Child::Number(n)
    }
}

macro_rules! child_from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(n: $ty) -> Self {
                Child::Number(n as f64)
            }
        })*
    };
}

child_from_integer!(i32, i64, u32, u64, usize);

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(child: Option<T>) -> Self {
        child.map_or(Child::Null, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(children: Vec<T>) -> Self {
        Child::List(children.into_iter().map(Into::into).collect())
    }
}

/// Build a `Vec<Child>` from heterogeneous values.
///
/// ```rust,ignore
/// let kids = children!["Hello ", name, VNode::text("!"), None::<VNode>];
/// ```
#[macro_export]
macro_rules! children {
    () => { ::std::vec::Vec::<$crate::vdom::Child>::new() };
    ($($child:expr),+ $(,)?) => {
        ::std::vec![$($crate::vdom::Child::from($child)),+]
    };
}

/// Flatten authored children into a list of virtual nodes.
///
/// Nested lists are walked with an explicit stack rather than recursion, so
/// deeply nested input cannot overflow.
pub fn flatten(children: Vec<Child>) -> Result<Vec<VNode>> {
    let mut nodes = Vec::with_capacity(children.len());
    let mut stack = vec![children.into_iter()];

    while let Some(top) = stack.last_mut() {
        match top.next() {
            None => {
                stack.pop();
            }
            Some(Child::Null) | Some(Child::Bool(false)) => {}
            Some(Child::Bool(true)) => {
                return Err(Error::InvalidChild("true".to_owned()));
            }
            Some(Child::Text(text)) => nodes.push(VNode::text(text)),
            Some(Child::Number(n)) => nodes.push(VNode::text(n.to_string())),
            Some(Child::Node(node)) => nodes.push(node),
            Some(Child::List(list)) => stack.push(list.into_iter()),
        }
    }

    Ok(nodes)
}

/// Build a virtual node, flattening `children`.
pub fn dom(tag: impl Into<Tag>, props: Props, children: Vec<Child>) -> Result<VNode> {
    Ok(VNode::tagged(tag, props, flatten(children)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_lists_in_order() {
        let node = dom(
            "ul",
            Props::new(),
            children![
                "a",
                vec![Child::from("b"), Child::List(vec!["c".into(), "d".into()])],
                "e"
            ],
        )
        .unwrap();

        let texts: Vec<_> = node
            .children()
            .iter()
            .map(|c| c.text_value().unwrap())
            .collect();
        assert_eq!(texts, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn drops_null_and_false() {
        let maybe: Option<VNode> = None;
        let node = dom("div", Props::new(), children!["x", maybe, false, "y"]).unwrap();
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn numbers_become_text() {
        let node = dom("span", Props::new(), children![42, 1.5]).unwrap();
        assert_eq!(node.children()[0].text_value(), Some("42"));
        assert_eq!(node.children()[1].text_value(), Some("1.5"));
    }

    #[test]
    fn true_is_an_invalid_child() {
        let err = dom("div", Props::new(), children!["ok", true]).unwrap_err();
        assert!(matches!(err, Error::InvalidChild(_)));
    }

    #[test]
    fn empty_children_macro() {
        let node = dom("br", Props::new(), children![]).unwrap();
        assert!(node.children().is_empty());
    }
}
