//! Request phase: snapshot allow-listed request context.

use std::collections::HashMap;

use crate::plugin::correlation::CorrelationStore;
use crate::plugin::gateway::GatewayRequest;
use crate::plugin::payload::PendingRequest;

const UNKNOWN_CLIENT: &str = "unknown";

/// Build a `PendingRequest` for `request` and insert it into `store`.
///
/// `token_header` names the host's per-exchange token header, if any.
/// Returns the id the request was stored under.
pub fn capture_request<R: GatewayRequest + ?Sized>(
    request: &R,
    forward_headers: &[String],
    token_header: Option<&str>,
    store: &CorrelationStore,
) -> u64 {
    let pending = PendingRequest {
        id: store.next_id(),
        token: token_header
            .and_then(|name| request.header(name))
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        uri: request.uri(),
        method: request.method().to_string(),
        client_ip: client_ip(request),
        forwarded_headers: forwarded_headers(request, forward_headers),
    };

    let id = pending.id;
    tracing::debug!(
        id,
        method = %pending.method,
        uri = %pending.uri,
        captured = pending.forwarded_headers.len(),
        "Captured request context"
    );
    store.insert(pending);
    id
}

/// `X-Real-IP`, then `X-Forwarded-For`, else `"unknown"`.
pub fn client_ip<R: GatewayRequest + ?Sized>(request: &R) -> String {
    ["x-real-ip", "x-forwarded-for"]
        .iter()
        .find_map(|name| request.header(name).filter(|v| !v.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn forwarded_headers<R: GatewayRequest + ?Sized>(request: &R, names: &[String]) -> HashMap<String, String> {
    names
        .iter()
        .filter_map(|name| match request.header(name) {
            Some(value) if !value.is_empty() => Some((name.clone(), value.to_string())),
            _ => {
                tracing::debug!(header = %name, "Forward header absent or empty");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CorrelationConfig;
    use axum::body::Body;
    use axum::http::Request;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_capture_forward_headers() {
        let store = CorrelationStore::new(&CorrelationConfig::default());
        let request = Request::builder()
            .method("POST")
            .uri("/orders?id=7")
            .header("X-Token", "abc")
            .header("X-Empty", "")
            .header("X-Other", "ignored")
            .body(Body::empty())
            .unwrap();

        let id = capture_request(&request, &names(&["X-Token", "X-Empty", "X-Missing"]), None, &store);
        assert!(id > 0);
        assert_eq!(store.len(), 1);

        let (pending, _) = store.claim(None);
        let pending = pending.unwrap();
        assert_eq!(pending.id, id);
        assert_eq!(pending.uri, "/orders?id=7");
        assert_eq!(pending.method, "POST");
        assert_eq!(pending.client_ip, "unknown");
        assert_eq!(pending.forwarded_headers.len(), 1);
        assert_eq!(pending.forwarded_headers.get("X-Token").unwrap(), "abc");
    }

    #[test]
    fn test_capture_records_token() {
        let store = CorrelationStore::new(&CorrelationConfig::default());
        let request = Request::builder()
            .header("x-request-id", "req-1")
            .body(Body::empty())
            .unwrap();

        capture_request(&request, &[], Some("x-request-id"), &store);
        let (pending, _) = store.claim(Some("req-1"));
        assert_eq!(pending.unwrap().token.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_client_ip_order() {
        let both = Request::builder()
            .header("X-Forwarded-For", "10.0.0.2, 10.0.0.3")
            .header("X-Real-IP", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&both), "10.0.0.1");

        let forwarded = Request::builder()
            .header("X-Forwarded-For", "10.0.0.2, 10.0.0.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&forwarded), "10.0.0.2, 10.0.0.3");

        let none = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&none), "unknown");
    }
}
