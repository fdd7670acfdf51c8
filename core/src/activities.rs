//! Host-facing activities.
//!
//! Workflow hosts pass loosely-typed inputs where anything may be missing.
//! Each `*Inputs` record mirrors one activity, checks its required inputs
//! before any network activity and delegates to the client core.

use serde_json::{Map, Value};

use crate::client::{Credentials, FmService, RequestDescriptor};
use crate::config::ClientConfig;
use crate::error::FmError;
use crate::http::HttpMethod;
use crate::odata::{CollectionQuery, EntityKey, ODataCollection, ODataEntity};
use crate::query::Query;

fn require<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, FmError> {
    value.as_ref().ok_or_else(|| FmError::required(field))
}

fn require_str<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, FmError> {
    match value.as_deref() {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(FmError::required(field)),
    }
}

/// Creates an authenticated service connection.
#[derive(Debug, Clone, Default)]
pub struct CreateServiceInputs {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateServiceOutputs {
    pub service: FmService,
}

impl CreateServiceInputs {
    pub fn execute(&self, config: &ClientConfig) -> Result<CreateServiceOutputs, FmError> {
        let url = require_str(&self.url, "url")?;
        let credentials = Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        };
        let service = FmService::login(config, url, &credentials)?;
        Ok(CreateServiceOutputs { service })
    }
}

/// Sends an arbitrary request to the service API.
#[derive(Debug, Clone, Default)]
pub struct SendRequestInputs {
    pub service: Option<FmService>,
    pub method: Option<HttpMethod>,
    pub path: Option<String>,
    pub query: Option<Map<String, Value>>,
    pub body: Option<Value>,
    pub headers: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendRequestOutputs {
    pub result: Value,
}

impl SendRequestInputs {
    pub fn execute(&self) -> Result<SendRequestOutputs, FmError> {
        let service = require(&self.service, "service")?;
        let method = *require(&self.method, "method")?;
        let path = require_str(&self.path, "path")?;

        let mut descriptor = RequestDescriptor::new(method, path);
        if let Some(query) = &self.query {
            descriptor = descriptor.query(Query::from(query.clone()));
        }
        if let Some(body) = &self.body {
            descriptor = descriptor.body(body.clone());
        }
        for (name, value) in self.headers.iter().flatten() {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            descriptor = descriptor.header(name.clone(), value);
        }

        let result = service.send(&descriptor)?;
        Ok(SendRequestOutputs { result })
    }
}

/// Fetches a list of entities through OData.
#[derive(Debug, Clone, Default)]
pub struct GetODataCollectionInputs {
    pub service: Option<FmService>,
    pub path: Option<String>,
    pub filter: Option<String>,
    pub expand: Option<String>,
    pub order_by: Option<String>,
    pub top: Option<String>,
    pub skip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetODataCollectionOutputs {
    pub result: ODataCollection,
}

impl GetODataCollectionInputs {
    pub fn execute(&self) -> Result<GetODataCollectionOutputs, FmError> {
        let service = require(&self.service, "service")?;
        let path = require_str(&self.path, "path")?;
        let options = CollectionQuery {
            expand: self.expand.clone(),
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            top: self.top.clone(),
            skip: self.skip.clone(),
        };
        let result = service.get_odata_collection(path, &options)?;
        Ok(GetODataCollectionOutputs { result })
    }
}

/// Fetches a single entity through OData.
#[derive(Debug, Clone, Default)]
pub struct GetODataEntityInputs {
    pub service: Option<FmService>,
    pub path: Option<String>,
    pub id: Option<EntityKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetODataEntityOutputs {
    pub result: ODataEntity,
}

impl GetODataEntityInputs {
    pub fn execute(&self) -> Result<GetODataEntityOutputs, FmError> {
        let service = require(&self.service, "service")?;
        let path = require_str(&self.path, "path")?;
        let id = require(&self.id, "id")?;
        let result = service.get_odata_entity(path, id)?;
        Ok(GetODataEntityOutputs { result })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::tests::{json_response, service, RecordingTransport};

    fn validation_message(err: FmError) -> String {
        match err {
            FmError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_service_requires_url() {
        let err = CreateServiceInputs {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
        .execute(&ClientConfig::default())
        .unwrap_err();
        assert_eq!(validation_message(err), "url is required");
    }

    #[test]
    fn create_service_requires_credentials() {
        let err = CreateServiceInputs {
            url: Some("http://127.0.0.1:9/api".to_string()),
            ..Default::default()
        }
        .execute(&ClientConfig::default())
        .unwrap_err();
        assert_eq!(validation_message(err), "username/password is required");
    }

    #[test]
    fn send_request_checks_inputs_in_order() {
        let transport = RecordingTransport::replying([]);
        let mut inputs = SendRequestInputs::default();
        assert_eq!(validation_message(inputs.execute().unwrap_err()), "service is required");

        inputs.service = Some(service(transport.clone()));
        assert_eq!(validation_message(inputs.execute().unwrap_err()), "method is required");

        inputs.method = Some(HttpMethod::Get);
        assert_eq!(validation_message(inputs.execute().unwrap_err()), "path is required");

        inputs.path = Some(String::new());
        assert_eq!(validation_message(inputs.execute().unwrap_err()), "path is required");
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn send_request_forwards_query_body_and_headers() {
        let transport = RecordingTransport::replying([json_response(200, json!({"Id": 9}))]);
        let inputs = SendRequestInputs {
            service: Some(service(transport.clone())),
            method: Some(HttpMethod::Post),
            path: Some("OData/ServiceDesk/Ticket".to_string()),
            query: json!({"validate": true}).as_object().cloned(),
            body: Some(json!({"Title": "Door stuck"})),
            headers: json!({"X-Request-Id": "r-1", "X-Retry": 0}).as_object().cloned(),
        };
        let outputs = inputs.execute().unwrap();
        assert_eq!(outputs.result, json!({"Id": 9}));

        let request = transport.last_request();
        assert_eq!(request.url, "http://fm.test/api/OData/ServiceDesk/Ticket?validate=true");
        assert_eq!(request.body.as_deref(), Some(r#"{"Title":"Door stuck"}"#));
        assert_eq!(request.header("x-request-id"), Some("r-1"));
        assert_eq!(request.header("x-retry"), Some("0"));
    }

    #[test]
    fn send_request_keeps_host_query_order() {
        let transport = RecordingTransport::replying([json_response(200, json!({}))]);
        let inputs = SendRequestInputs {
            service: Some(service(transport.clone())),
            method: Some(HttpMethod::Get),
            path: Some("api/echo".to_string()),
            query: json!({"z": 1, "a": 2}).as_object().cloned(),
            ..Default::default()
        };
        inputs.execute().unwrap();
        assert_eq!(transport.last_request().url, "http://fm.test/api/api/echo?z=1&a=2");
    }

    #[test]
    fn collection_activity_maps_odata_options() {
        let transport = RecordingTransport::replying([json_response(200, json!({"value": []}))]);
        let inputs = GetODataCollectionInputs {
            service: Some(service(transport.clone())),
            path: Some("OData/ServiceDesk/Status".to_string()),
            filter: Some("x eq 1".to_string()),
            top: Some("10".to_string()),
            ..Default::default()
        };
        let outputs = inputs.execute().unwrap();
        assert!(outputs.result.value.is_empty());
        assert_eq!(
            transport.last_request().url,
            "http://fm.test/api/OData/ServiceDesk/Status?%24filter=x%20eq%201&%24top=10"
        );
    }

    #[test]
    fn collection_activity_requires_service_and_path() {
        let transport = RecordingTransport::replying([]);
        let err = GetODataCollectionInputs::default().execute().unwrap_err();
        assert_eq!(validation_message(err), "service is required");

        let err = GetODataCollectionInputs {
            service: Some(service(transport.clone())),
            ..Default::default()
        }
        .execute()
        .unwrap_err();
        assert_eq!(validation_message(err), "path is required");
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn entity_activity_requires_id() {
        let transport = RecordingTransport::replying([]);
        let err = GetODataEntityInputs {
            service: Some(service(transport.clone())),
            path: Some("OData/Facility/Person".to_string()),
            id: None,
        }
        .execute()
        .unwrap_err();
        assert_eq!(validation_message(err), "id is required");
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn entity_activity_reads_numeric_key() {
        let transport = RecordingTransport::replying([json_response(200, json!({"Id": 5}))]);
        let outputs = GetODataEntityInputs {
            service: Some(service(transport.clone())),
            path: Some("OData/Facility/Person".to_string()),
            id: Some(EntityKey::Int(5)),
        }
        .execute()
        .unwrap();
        assert_eq!(outputs.result.get("Id"), Some(&json!(5)));
        assert_eq!(transport.last_request().url, "http://fm.test/api/OData/Facility/Person(5)");
    }
}
