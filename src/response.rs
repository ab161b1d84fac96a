use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

#[derive(Serialize)]
pub struct Envelope {
    pub status: &'static str,
    pub message: String,
}

// {"status":"success","message":...}
pub fn success(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        status: "success",
        message: message.into(),
    })
}

/// Success envelope with the fields of `data` merged next to `status` and `message`.
pub fn success_with<T: Serialize>(message: impl Into<String>, data: T) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(merge_envelope("success", message.into(), data)?))
}

pub fn merge_envelope<T: Serialize>(status: &'static str, message: String, data: T) -> Result<Value, ApiError> {
    let mut body = match serde_json::to_value(data)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize response: {}", e)))?
    {
        Value::Object(fields) => fields,
        Value::Null => Map::new(),
        other => {
            let mut fields = Map::new();
            fields.insert("data".to_string(), other);
            fields
        }
    };
    body.insert("status".to_string(), Value::String(status.to_string()));
    body.insert("message".to_string(), Value::String(message));
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Counts {
        total: i64,
        delayed: i64,
    }

    #[test]
    fn struct_fields_sit_beside_status_and_message() {
        let body = merge_envelope("success", "ok".into(), Counts { total: 3, delayed: 1 }).unwrap();
        assert_eq!(body, json!({"status": "success", "message": "ok", "total": 3, "delayed": 1}));
    }

    #[test]
    fn unit_data_yields_the_bare_envelope() {
        let body = merge_envelope("success", "done".into(), ()).unwrap();
        assert_eq!(body, json!({"status": "success", "message": "done"}));
    }

    #[test]
    fn non_object_data_is_nested() {
        let body = merge_envelope("success", "list".into(), vec![1, 2]).unwrap();
        assert_eq!(body["data"], json!([1, 2]));
    }
}
