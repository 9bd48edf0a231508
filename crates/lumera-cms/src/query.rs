//! Builders for the content backend's two query dialects: the structured
//! JSON query passed via the `q` parameter, and OData-style `$filter`
//! expressions for single-field lookups.

use std::collections::BTreeSet;

use serde::Serialize;

/// Path of the external-id field inside location documents.
pub const EXTERNAL_ID_PATH: &str = "data/externalId/iv";

/// Structured query serialized into the `q` parameter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    pub take: u32,
    pub skip: u64,
    pub sort: Vec<SortField>,
    pub filter: FilterGroup,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortField {
    pub path: String,
    pub order: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterGroup {
    pub and: Vec<FilterClause>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterClause {
    pub path: String,
    pub op: &'static str,
    pub value: Vec<String>,
}

impl StructuredQuery {
    /// A page query sorted newest-first, with no filters.
    pub fn page(skip: u64, take: u32) -> Self {
        Self {
            full_text: None,
            take,
            skip,
            sort: vec![SortField {
                path: "lastModified".to_string(),
                order: "descending",
            }],
            filter: FilterGroup { and: Vec::new() },
        }
    }

    #[must_use]
    pub fn with_full_text(mut self, full_text: Option<&str>) -> Self {
        self.full_text = full_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        self
    }

    /// Restricts results to the given external ids (AND-ed with the rest of
    /// the query). An empty or absent set adds no clause.
    #[must_use]
    pub fn with_id_allow_list(mut self, ids: Option<&BTreeSet<String>>) -> Self {
        if let Some(ids) = ids
            && !ids.is_empty()
        {
            self.filter.and.push(FilterClause {
                path: EXTERNAL_ID_PATH.to_string(),
                op: "in",
                value: ids.iter().cloned().collect(),
            });
        }
        self
    }

    /// Renders the query for use as the `q` parameter value.
    pub fn to_param(&self) -> String {
        serde_json::to_string(self).expect("structured query serializes")
    }
}

/// `path eq 'value'` with single quotes doubled.
pub fn odata_eq(path: &str, value: &str) -> String {
    format!("{path} eq '{}'", value.replace('\'', "''"))
}

/// `path in ('a','b',...)`; ids are assumed already deduplicated and sorted.
pub fn odata_in<'a>(path: &str, values: impl IntoIterator<Item = &'a String>) -> String {
    let quoted: Vec<String> = values
        .into_iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect();
    format!("{path} in ({})", quoted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn page_query_shape() {
        let query = StructuredQuery::page(20, 10);
        let value: serde_json::Value = serde_json::from_str(&query.to_param()).unwrap();
        assert_json_eq!(
            value,
            json!({
                "take": 10,
                "skip": 20,
                "sort": [{"path": "lastModified", "order": "descending"}],
                "filter": {"and": []}
            })
        );
    }

    #[test]
    fn full_text_is_omitted_when_blank() {
        let query = StructuredQuery::page(0, 10).with_full_text(Some("   "));
        assert!(!query.to_param().contains("fullText"));

        let query = StructuredQuery::page(0, 10).with_full_text(Some(" laser "));
        let value: serde_json::Value = serde_json::from_str(&query.to_param()).unwrap();
        assert_eq!(value["fullText"], "laser");
    }

    #[test]
    fn allow_list_becomes_an_in_clause() {
        let ids: BTreeSet<String> = ["8944".to_string(), "8883".to_string()].into();
        let query = StructuredQuery::page(0, 10).with_id_allow_list(Some(&ids));
        let value: serde_json::Value = serde_json::from_str(&query.to_param()).unwrap();
        assert_json_eq!(
            value["filter"],
            json!({"and": [{"path": "data/externalId/iv", "op": "in", "value": ["8883", "8944"]}]})
        );
    }

    #[test]
    fn empty_allow_list_adds_no_clause() {
        let ids: BTreeSet<String> = BTreeSet::new();
        let query = StructuredQuery::page(0, 10).with_id_allow_list(Some(&ids));
        let value: serde_json::Value = serde_json::from_str(&query.to_param()).unwrap();
        assert_eq!(value["filter"]["and"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn odata_helpers_quote_values() {
        assert_eq!(odata_eq("data/slug/iv", "it's-here"), "data/slug/iv eq 'it''s-here'");
        let ids = vec!["8883".to_string(), "8944".to_string()];
        assert_eq!(
            odata_in(EXTERNAL_ID_PATH, &ids),
            "data/externalId/iv in ('8883','8944')"
        );
    }
}
