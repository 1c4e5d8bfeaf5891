use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Which corpus a search runs against; `All` sends no source filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    #[default]
    All,
    Erpnext,
    Drive,
    Gmail,
    Tasks,
}

impl SearchSource {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "erpnext" | "doctype" | "documents" => SearchSource::Erpnext,
            "drive" | "google drive" => SearchSource::Drive,
            "gmail" | "email" => SearchSource::Gmail,
            "tasks" | "task" => SearchSource::Tasks,
            _ => SearchSource::All,
        }
    }

    /// Value sent as the `source` argument
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            SearchSource::All => None,
            SearchSource::Erpnext => Some("erpnext"),
            SearchSource::Drive => Some("drive"),
            SearchSource::Gmail => Some("gmail"),
            SearchSource::Tasks => Some("tasks"),
        }
    }
}

/// Arguments of one `search` call. Dates are `YYYY-MM-DD` as produced by
/// the desk date controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub source: SearchSource,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// `Ok(None)` for a blank query, which is ignored rather than sent
    pub fn validated(mut self) -> Result<Option<Self>, ChatError> {
        self.query = self.query.trim().to_string();
        if self.query.is_empty() {
            return Ok(None);
        }
        self.from_date = self.from_date.filter(|d| !d.trim().is_empty());
        self.to_date = self.to_date.filter(|d| !d.trim().is_empty());
        if let (Some(from), Some(to)) = (&self.from_date, &self.to_date) {
            // ISO dates order lexically
            if from > to {
                return Err(ChatError::InvalidDateRange);
            }
        }
        Ok(Some(self))
    }

    /// Keyword arguments for the RPC body
    pub fn to_args(&self) -> Value {
        let mut args = serde_json::Map::new();
        args.insert("query".to_string(), Value::String(self.query.clone()));
        if let Some(source) = self.source.as_param() {
            args.insert("source".to_string(), Value::String(source.to_string()));
        }
        if let Some(from) = &self.from_date {
            args.insert("from_date".to_string(), Value::String(from.clone()));
        }
        if let Some(to) = &self.to_date {
            args.insert("to_date".to_string(), Value::String(to.clone()));
        }
        Value::Object(args)
    }
}

/// One search result row. The backend returns slightly different shapes per
/// source, so every field is optional and aliased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default, alias = "subject")]
    pub title: Option<String>,
    /// Document name, used when no title is present
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub doctype: Option<String>,
    #[serde(default, alias = "link", alias = "webViewLink")]
    pub url: Option<String>,
    #[serde(default, alias = "content", alias = "description")]
    pub snippet: Option<String>,
}

impl SearchHit {
    pub fn display_title(&self) -> String {
        let title = self.title.as_deref().or(self.name.as_deref());
        match (&self.doctype, title) {
            (Some(doctype), Some(title)) => format!("{}: {}", doctype, title),
            (None, Some(title)) => title.to_string(),
            (Some(doctype), None) => doctype.clone(),
            (None, None) => "(untitled)".to_string(),
        }
    }
}

/// Google sources hand back their hits as a JSON-encoded string, ERPNext as
/// a plain list; accept both, plus null
fn deserialize_hits<'de, D>(deserializer: D) -> Result<Vec<SearchHit>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => {
                serde_json::from_value(Value::Array(items)).map_err(serde::de::Error::custom)
            }
            // A plain sentence such as "No files found."
            _ => Ok(Vec::new()),
        },
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default, deserialize_with = "deserialize_hits")]
    pub doctype_results: Vec<SearchHit>,
    #[serde(default, deserialize_with = "deserialize_hits")]
    pub drive_results: Vec<SearchHit>,
    #[serde(default, deserialize_with = "deserialize_hits")]
    pub gmail_results: Vec<SearchHit>,
    #[serde(default, deserialize_with = "deserialize_hits")]
    pub task_results: Vec<SearchHit>,
}

impl SearchResults {
    pub fn from_value(value: Value) -> Result<Self, ChatError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|(_, hits)| hits.is_empty())
    }

    /// Sections in display order, headings included
    pub fn sections(&self) -> [(&'static str, &[SearchHit]); 4] {
        [
            ("Documents", self.doctype_results.as_slice()),
            ("Google Drive", self.drive_results.as_slice()),
            ("Gmail", self.gmail_results.as_slice()),
            ("Tasks", self.task_results.as_slice()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_query_is_ignored() {
        assert_eq!(SearchQuery::new("   ").validated().unwrap(), None);
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let query = SearchQuery {
            query: "invoice".to_string(),
            from_date: Some("2024-05-02".to_string()),
            to_date: Some("2024-05-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.validated(), Err(ChatError::InvalidDateRange)));
    }

    #[test]
    fn test_args_skip_unset_fields() {
        let query = SearchQuery {
            query: " invoice ".to_string(),
            source: SearchSource::Drive,
            from_date: Some(String::new()),
            to_date: None,
        }
        .validated()
        .unwrap()
        .unwrap();
        assert_eq!(query.to_args(), json!({"query": "invoice", "source": "drive"}));
    }

    #[test]
    fn test_results_decode_with_missing_sections() {
        let results = SearchResults::from_value(json!({
            "doctype_results": [{"doctype": "Customer", "name": "CUST-0001"}],
            "gmail_results": [{"subject": "Re: quote", "snippet": "see attached"}]
        }))
        .unwrap();
        assert_eq!(results.doctype_results[0].display_title(), "Customer: CUST-0001");
        assert_eq!(results.gmail_results[0].display_title(), "Re: quote");
        assert!(results.drive_results.is_empty());
        assert!(!results.is_empty());
    }

    #[test]
    fn test_results_accept_encoded_lists() {
        let results = SearchResults::from_value(json!({
            "drive_results": "[{\"name\": \"Q3 plan\", \"webViewLink\": \"https://drive/x\"}]",
            "gmail_results": "No emails found.",
            "task_results": null
        }))
        .unwrap();
        assert_eq!(results.drive_results[0].display_title(), "Q3 plan");
        assert_eq!(results.drive_results[0].url.as_deref(), Some("https://drive/x"));
        assert!(results.gmail_results.is_empty());
        assert!(results.task_results.is_empty());
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(SearchSource::parse("Gmail"), SearchSource::Gmail);
        assert_eq!(SearchSource::parse(""), SearchSource::All);
        assert_eq!(SearchSource::All.as_param(), None);
    }
}
