//! Listing page model
//!
//! A page is `{ data: { children: [ { kind, data: { name, ... } } ] } }`.
//! Each child becomes an `Item` keyed by its `name`, the dedup identifier.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One feed entry. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// Unique identifier, also the pagination cursor
    pub name: String,
    /// Type prefix such as `t1`/`t3`, when present
    pub kind: Option<String>,
    /// The child's full `data` object
    pub data: serde_json::Value,
}

impl Item {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind: None,
            data,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Deserialize)]
struct Child {
    #[serde(default)]
    kind: Option<String>,
    data: serde_json::Value,
}

/// Parse the items of one listing page, preserving server order.
pub fn parse_page(body: &serde_json::Value) -> Result<Vec<Item>> {
    let envelope = Envelope::deserialize(body).map_err(|e| Error::Decode(e.to_string()))?;

    envelope
        .data
        .children
        .into_iter()
        .enumerate()
        .map(|(index, child)| {
            let name = child
                .data
                .get("name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::Decode(format!("child {index} has no data.name")))?
                .to_string();
            Ok(Item {
                name,
                kind: child.kind,
                data: child.data,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_children_in_order() {
        let body = json!({
            "kind": "Listing",
            "data": {
                "after": "t3_b",
                "children": [
                    {"kind": "t3", "data": {"name": "t3_a", "title": "first"}},
                    {"kind": "t3", "data": {"name": "t3_b", "title": "second"}}
                ]
            }
        });
        let items = parse_page(&body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "t3_a");
        assert_eq!(items[0].kind.as_deref(), Some("t3"));
        assert_eq!(items[1].data["title"], "second");
    }

    #[test]
    fn empty_children_is_empty_page() {
        let items = parse_page(&json!({"data": {"children": []}})).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn missing_name_is_decode_error() {
        let body = json!({"data": {"children": [{"data": {"title": "nameless"}}]}});
        match parse_page(&body) {
            Err(Error::Decode(msg)) => assert!(msg.contains("child 0"), "got: {msg}"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_decode_error() {
        assert!(matches!(
            parse_page(&json!({"error": 404})),
            Err(Error::Decode(_))
        ));
    }
}
