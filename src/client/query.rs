use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Single query parameter value.
///
/// Scalars render as one `key=value` pair, `List` repeats the key once per
/// element, and `Null` drops the key altogether.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<QueryValue>),
}

impl QueryValue {
    fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Null => Ok(()),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::Int(i) => write!(f, "{i}"),
            QueryValue::Float(x) => write!(f, "{x}"),
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! query_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    QueryValue::$variant(value.into())
                }
            }
        )*
    };
}

query_value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

/// Ordered query parameters for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    params: Vec<(String, QueryValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing any earlier value for the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.iter().all(|(_, value)| value.is_null())
    }

    /// Appends the parameters to `url`. Leaves the URL untouched when nothing survives.
    pub fn apply_to(&self, url: &mut Url) {
        let pairs: Vec<(&str, String)> = self
            .params
            .iter()
            .flat_map(|(key, value)| expand(key, value))
            .collect();
        if pairs.is_empty() {
            return;
        }

        let mut serializer = url.query_pairs_mut();
        for (key, value) in pairs {
            serializer.append_pair(key, &value);
        }
    }
}

fn expand<'a>(key: &'a str, value: &QueryValue) -> Vec<(&'a str, String)> {
    match value {
        QueryValue::Null => Vec::new(),
        QueryValue::List(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| (key, item.to_string()))
            .collect(),
        scalar => vec![(key, scalar.to_string())],
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.set(key, value);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(query: &Query) -> String {
        let mut url = Url::parse("https://api.example.com/x").unwrap();
        query.apply_to(&mut url);
        url.to_string()
    }

    #[test]
    fn lists_repeat_the_key_and_nulls_are_omitted() {
        let query = Query::new()
            .with("a", vec![1, 2])
            .with("b", QueryValue::Null);
        assert_eq!(render(&query), "https://api.example.com/x?a=1&a=2");
    }

    #[test]
    fn scalars_render_like_plain_values() {
        let query = Query::new()
            .with("teamId", 42)
            .with("pg[limit]", 1.5)
            .with("active", true)
            .with("q", "a b&c");
        assert_eq!(
            render(&query),
            "https://api.example.com/x?teamId=42&pg%5Blimit%5D=1.5&active=true&q=a+b%26c"
        );
    }

    #[test]
    fn set_replaces_existing_key_in_place() {
        let mut query = Query::new();
        query.set("a", 1).set("b", 2).set("a", 3);
        assert_eq!(render(&query), "https://api.example.com/x?a=3&b=2");
    }

    #[test]
    fn empty_or_all_null_query_adds_no_question_mark() {
        assert_eq!(render(&Query::new()), "https://api.example.com/x");

        let query = Query::new().with("b", None::<i64>);
        assert!(query.is_empty());
        assert_eq!(render(&query), "https://api.example.com/x");
    }

    #[test]
    fn deserializes_from_json_object_shapes() {
        let query: Query = serde_json::from_value(serde_json::json!({
            "params": [["cols[]", ["id", "name"]], ["teamId", 7], ["x", null]]
        }))
        .unwrap();
        assert_eq!(
            render(&query),
            "https://api.example.com/x?cols%5B%5D=id&cols%5B%5D=name&teamId=7"
        );
    }

    #[test]
    fn collects_from_pairs() {
        let query: Query = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(render(&query), "https://api.example.com/x?a=1&b=2");
    }
}
