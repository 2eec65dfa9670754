use crate::errors::FetchError;
use coursegraph_core::{ChildKey, CourseId, GroupId, Level, MajorId, ResourceType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query sent to the aggregation endpoint for one level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_id: Option<MajorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    pub limit: usize,
    pub include_empty: bool,
}

impl AggregationRequest {
    pub fn new(level: Level, limit: usize, include_empty: bool) -> Self {
        Self {
            level,
            group_id: None,
            major_id: None,
            course_id: None,
            limit,
            include_empty,
        }
    }

    /// Narrow the request by one ancestor key. Type keys are not filters and
    /// are ignored.
    pub fn with_ancestor(mut self, key: &ChildKey) -> Self {
        match key {
            ChildKey::Group(id) => self.group_id = Some(*id),
            ChildKey::Major(id) => self.major_id = Some(*id),
            ChildKey::Course(id) => self.course_id = Some(*id),
            ChildKey::Type(_) => {}
        }
        self
    }
}

/// One child entry returned by the aggregation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: ChildKey,
    pub label: String,
    pub count: u64,
}

impl AggregateRow {
    pub fn new(key: ChildKey, label: impl Into<String>, count: u64) -> Self {
        Self {
            key,
            label: label.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

/// Response envelope used by every backend route.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
    #[serde(default)]
    pub request_id: Option<String>,
}

// Row shapes differ per level; the generic `id`/`name` spelling is accepted
// everywhere.

#[derive(Deserialize)]
struct GroupRow {
    #[serde(alias = "id")]
    group_id: i64,
    #[serde(alias = "name")]
    group_name: String,
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct MajorRow {
    #[serde(alias = "id")]
    major_id: i64,
    #[serde(alias = "name")]
    major_name: String,
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct CourseRow {
    #[serde(alias = "id")]
    course_id: i64,
    #[serde(alias = "name")]
    course_name: String,
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct TypeRow {
    #[serde(alias = "id")]
    resource_type: String,
    #[serde(default, alias = "name")]
    label: Option<String>,
    #[serde(default)]
    count: u64,
}

fn parse_rows<T: DeserializeOwned>(data: Value) -> Result<Vec<T>, FetchError> {
    serde_json::from_value(data).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Decode the row list of a successful response for `level`.
pub fn decode_rows(level: Level, data: Value) -> Result<Vec<AggregateRow>, FetchError> {
    let rows = match level {
        Level::Group => parse_rows::<GroupRow>(data)?
            .into_iter()
            .map(|r| AggregateRow::new(ChildKey::Group(GroupId(r.group_id)), r.group_name, r.count))
            .collect(),
        Level::Major => parse_rows::<MajorRow>(data)?
            .into_iter()
            .map(|r| AggregateRow::new(ChildKey::Major(MajorId(r.major_id)), r.major_name, r.count))
            .collect(),
        Level::Course => parse_rows::<CourseRow>(data)?
            .into_iter()
            .map(|r| {
                AggregateRow::new(ChildKey::Course(CourseId(r.course_id)), r.course_name, r.count)
            })
            .collect(),
        Level::Type => parse_rows::<TypeRow>(data)?
            .into_iter()
            .map(|r| {
                let label = r.label.unwrap_or_else(|| r.resource_type.clone());
                AggregateRow::new(ChildKey::Type(ResourceType::new(r.resource_type)), label, r.count)
            })
            .collect(),
    };
    Ok(rows)
}

/// Decode a full response body, enveloped or bare.
pub fn decode_body(level: Level, body: Value) -> Result<Vec<AggregateRow>, FetchError> {
    if body.is_array() {
        return decode_rows(level, body);
    }

    let envelope: ResponseEnvelope =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if let Some(request_id) = &envelope.request_id {
        tracing::debug!(%level, request_id = %request_id, "aggregation response received");
    }

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(|| ErrorBody {
            code: "UNKNOWN".to_string(),
            message: "request was not successful".to_string(),
            details: Value::Null,
        });
        return Err(FetchError::Envelope {
            code: error.code,
            message: error.message,
        });
    }

    match envelope.data {
        Some(data) => decode_rows(level, data),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_ancestor_sets_level_filters() {
        let request = AggregationRequest::new(Level::Type, 100, false)
            .with_ancestor(&ChildKey::Course(CourseId(3)))
            .with_ancestor(&ChildKey::Major(MajorId(2)))
            .with_ancestor(&ChildKey::Group(GroupId(1)));
        assert_eq!(request.group_id, Some(GroupId(1)));
        assert_eq!(request.major_id, Some(MajorId(2)));
        assert_eq!(request.course_id, Some(CourseId(3)));
    }

    #[test]
    fn test_request_serialization_skips_missing_filters() {
        let request = AggregationRequest::new(Level::Major, 50, true)
            .with_ancestor(&ChildKey::Group(GroupId(4)));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({"level": "major", "group_id": 4, "limit": 50, "include_empty": true})
        );
    }

    #[test]
    fn test_decode_level_specific_fields() {
        let rows = decode_rows(
            Level::Course,
            json!([{"course_id": 7, "course_name": "Ethics", "count": 12}]),
        )
        .unwrap();
        assert_eq!(rows, vec![AggregateRow::new(ChildKey::Course(CourseId(7)), "Ethics", 12)]);
    }

    #[test]
    fn test_decode_generic_field_names() {
        let rows = decode_rows(Level::Group, json!([{"id": 1, "name": "Engineering", "count": 3}]))
            .unwrap();
        assert_eq!(rows[0].key, ChildKey::Group(GroupId(1)));
        assert_eq!(rows[0].label, "Engineering");
    }

    #[test]
    fn test_type_rows_fall_back_to_resource_type_label() {
        let rows = decode_rows(
            Level::Type,
            json!([
                {"resource_type": "doc", "label": "Documents", "count": 2},
                {"resource_type": "video", "count": 5}
            ]),
        )
        .unwrap();
        assert_eq!(rows[0].label, "Documents");
        assert_eq!(rows[1].label, "video");
        assert_eq!(rows[1].key, ChildKey::Type(ResourceType::new("video")));
    }

    #[test]
    fn test_decode_body_handles_envelopes() {
        let ok = decode_body(
            Level::Major,
            json!({"success": true, "data": [{"major_id": 2, "major_name": "CS", "count": 1}], "request_id": "abc"}),
        )
        .unwrap();
        assert_eq!(ok.len(), 1);

        let err = decode_body(
            Level::Major,
            json!({"success": false, "error": {"code": "VALIDATION_ERROR", "message": "bad"}}),
        )
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let malformed = decode_body(Level::Major, json!({"success": true, "data": [{"major_id": "x"}]}))
            .unwrap_err();
        assert!(matches!(malformed, FetchError::Decode(_)));
    }
}
