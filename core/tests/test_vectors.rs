//! Verify argument binding against JSON test vectors stored in `test-vectors/`.
//!
//! Each case gives a service definition, the call's positional and keyword
//! arguments, and the params and headers the dispatcher must receive.
//! Expected values are compared as parsed JSON.

use client_services::synth::bind;
use client_services::{BaseFetcher, CallArgs, Headers, HttpMethod, HttpRequest, HttpResponse, ServiceConfig, TransportError};
use serde_json::{json, Value};

fn object(value: &Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn binding_test_vectors() {
    let raw = include_str!("../../test-vectors/binding.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();

        let config = ServiceConfig::parse(&json!({ "method": case["definition"] }).to_string()).unwrap();
        let definition = config.get("method").unwrap();

        let args = CallArgs {
            positional: case["positional"].as_array().cloned().unwrap_or_default(),
            params: object(&case["params"]),
            headers: serde_json::from_value(case["headers"].clone()).unwrap(),
        };

        let (params, headers) = bind(definition, &args);
        assert_eq!(Value::Object(params), case["expected_params"], "{name}: params");

        let expected_headers: Headers = serde_json::from_value(case["expected_headers"].clone()).unwrap();
        assert_eq!(headers, expected_headers, "{name}: headers");
    }
}

fn offline(_: HttpRequest) -> Result<HttpResponse, TransportError> {
    Err(TransportError::Io("offline".to_string()))
}

type FnTransport = fn(HttpRequest) -> Result<HttpResponse, TransportError>;

#[test]
fn bound_arguments_render_as_query_pairs() {
    let raw = include_str!("../../test-vectors/binding.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let fetcher = BaseFetcher::new("http://hunter.test/v2", offline as FnTransport);

    let case = &vectors["cases"][3];
    let config = ServiceConfig::parse(&json!({ "method": case["definition"] }).to_string()).unwrap();
    let definition = config.get("method").unwrap();
    let args = CallArgs {
        positional: case["positional"].as_array().cloned().unwrap_or_default(),
        params: object(&case["params"]),
        headers: Headers::new(),
    };

    let (params, headers) = bind(definition, &args);
    let request = fetcher.build_request(&definition.endpoint, &params, &headers, HttpMethod::Get);

    assert_eq!(request.path, "http://hunter.test/v2/email-verifier");
    assert_eq!(
        request.query,
        vec![
            ("email".to_string(), "c@d.com".to_string()),
            ("strict".to_string(), "true".to_string()),
        ]
    );
    assert_eq!(request.method, HttpMethod::Get);
}
