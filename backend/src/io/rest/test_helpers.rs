//! Request builders for router tests.

use axum::{
    body::Body,
    http::{Method, Request, Response},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::extractors::{GUARDIAN_ID_HEADER, STEP_UP_PROOF_HEADER};

pub fn request(method: Method, uri: &str, guardian: Option<&str>, proof: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(guardian) = guardian {
        builder = builder.header(GUARDIAN_ID_HEADER, guardian);
    }
    if let Some(proof) = proof {
        builder = builder.header(STEP_UP_PROOF_HEADER, proof);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}
