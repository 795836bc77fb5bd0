use serde_json::{json, Map, Value as Json};

use super::{ConcreteValue, GraphValue, PageValue};
use crate::error::LookupError;

impl ConcreteValue {
    /// JSON form for API responses. Every object carries a `type` tag;
    /// integers and magnitudes are strings so no precision is lost.
    pub fn to_json(&self) -> Json {
        let tag = self.value_type().to_string();
        match self {
            ConcreteValue::Null => json!({ "type": tag }),
            ConcreteValue::Boolean(b) => json!({ "type": tag, "value": b }),
            ConcreteValue::Integer(i) => json!({ "type": tag, "value": i.to_string() }),
            ConcreteValue::Quantity(q) => {
                let mut object = Map::new();
                object.insert("type".into(), Json::String(tag));
                object.insert("magnitude".into(), Json::String(q.magnitude.to_string()));
                if let Some(units) = &q.units {
                    object.insert("units".into(), Json::String(units.clone()));
                }
                Json::Object(object)
            }
            ConcreteValue::String(s) | ConcreteValue::Markdown(s) => {
                json!({ "type": tag, "value": s })
            }
            ConcreteValue::Date(d) => {
                json!({ "type": tag, "value": d.format("%Y-%m-%d").to_string() })
            }
            ConcreteValue::PartialDate(d) => json!({ "type": tag, "value": d.to_string() }),
            ConcreteValue::Entry(id) => json!({ "type": tag, "id": id }),
            ConcreteValue::Property(id) => json!({ "type": tag, "id": id }),
            ConcreteValue::EntryType(id) => json!({ "type": tag, "id": id }),
            ConcreteValue::List(items) => json!({
                "type": tag,
                "value": items.iter().map(ConcreteValue::to_json).collect::<Vec<_>>(),
            }),
            ConcreteValue::Range(range) => json!({
                "type": tag,
                "min": range.min.to_json(),
                "max": range.max.to_json(),
            }),
            ConcreteValue::Page(page) => page_json(&tag, page),
            ConcreteValue::Annotated(annotated) => json!({
                "type": tag,
                "value": annotated.value.to_json(),
                "annotations": annotated
                    .annotations
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            }),
            ConcreteValue::Graph(graph) => graph_json(&tag, graph),
            ConcreteValue::Error(error) => json!({
                "type": tag,
                "errorClass": match &error.error {
                    LookupError::Parse(_) => "ParseError",
                    LookupError::Evaluation(_) => "EvaluationError",
                },
                "message": error.error.to_string(),
            }),
        }
    }
}

fn page_json(tag: &str, page: &PageValue) -> Json {
    let mut object = Map::new();
    object.insert("type".into(), json!(tag));
    object.insert(
        "values".into(),
        Json::Array(page.values.iter().map(ConcreteValue::to_json).collect()),
    );
    object.insert("startedAt".into(), json!(page.started_at));
    object.insert("pageSize".into(), json!(page.page_size));
    object.insert("totalCount".into(), json!(page.total_count));
    if let Some(source) = &page.source {
        object.insert(
            "source".into(),
            json!({
                "expression": source.expression.to_string(),
                "entryId": source.entry,
            }),
        );
    }
    Json::Object(object)
}

fn graph_json(tag: &str, graph: &GraphValue) -> Json {
    json!({
        "type": tag,
        "entries": graph.entries.iter().map(|e| json!({
            "id": e.id,
            "name": e.name,
            "entryType": e.entry_type,
            "isFocus": e.is_focus,
        })).collect::<Vec<_>>(),
        "relationships": graph.relationships.iter().map(|r| json!({
            "from": r.from,
            "to": r.to,
            "property": r.property,
        })).collect::<Vec<_>>(),
        "borders": graph.borders.iter().map(|b| json!({
            "entry": b.entry,
            "property": b.property,
            "count": b.count,
        })).collect::<Vec<_>>(),
    })
}
