use serde::Deserialize;
use serde_json::{Map, Value};

use crate::record::Record;

use super::UpsertOutcome;

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OAuthError {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveResult {
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub errors: Vec<SaveError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveError {
    #[serde(rename = "statusCode", default)]
    pub status_code: String,
    #[serde(default)]
    pub message: String,
}

/// Collections endpoints answer with an array, single-record calls with a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl SaveResult {
    pub fn into_outcome(self) -> UpsertOutcome {
        if self.success {
            return UpsertOutcome::Success {
                id: self.id.unwrap_or_default(),
                created: self.created,
            };
        }
        let messages = self
            .errors
            .into_iter()
            .map(|e| if e.message.is_empty() { e.status_code } else { e.message })
            .collect();
        UpsertOutcome::Failure { messages }
    }
}

/// Request body for an sObject Collections upsert.
pub(crate) fn upsert_body(object_type: &str, records: &[Record]) -> Value {
    let records = records
        .iter()
        .map(|record| {
            let mut fields = Map::new();
            fields.insert(
                "attributes".to_string(),
                serde_json::json!({ "type": object_type }),
            );
            for (name, value) in record.iter() {
                fields.insert(name.to_string(), Value::String(value.to_string()));
            }
            Value::Object(fields)
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "allOrNone": false,
        "records": records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_response_maps_each_result() {
        let body = r#"[
            {"id": "001A", "success": true, "created": true, "errors": []},
            {"success": false, "errors": [
                {"statusCode": "DUPLICATE_VALUE", "message": "duplicate value found", "fields": []},
                {"statusCode": "REQUIRED_FIELD_MISSING", "message": "", "fields": ["Name"]}
            ]}
        ]"#;

        let outcomes: Vec<UpsertOutcome> = serde_json::from_str::<OneOrMany<SaveResult>>(body)
            .unwrap()
            .into_vec()
            .into_iter()
            .map(SaveResult::into_outcome)
            .collect();

        assert_eq!(
            outcomes,
            vec![
                UpsertOutcome::Success {
                    id: "001A".to_string(),
                    created: true
                },
                UpsertOutcome::Failure {
                    messages: vec![
                        "duplicate value found".to_string(),
                        "REQUIRED_FIELD_MISSING".to_string()
                    ]
                },
            ]
        );
    }

    #[test]
    fn single_object_response_becomes_one_element() {
        let body = r#"{"id": "001B", "success": true, "created": false}"#;
        let results = serde_json::from_str::<OneOrMany<SaveResult>>(body)
            .unwrap()
            .into_vec();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.into_iter().next().unwrap().into_outcome(),
            UpsertOutcome::Success {
                id: "001B".to_string(),
                created: false
            }
        );
    }

    #[test]
    fn body_tags_records_with_object_type() {
        let record: Record = [("Invoice_NS_Id__c", "INV-001")].into_iter().collect();
        let body = upsert_body("Invoice__c", &[record]);
        assert_eq!(
            body,
            serde_json::json!({
                "allOrNone": false,
                "records": [
                    {"attributes": {"type": "Invoice__c"}, "Invoice_NS_Id__c": "INV-001"}
                ]
            })
        );
    }
}
