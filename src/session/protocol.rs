//! Per-connection session state machine.
//!
//! [`SessionProtocol`] owns one channel's lifecycle:
//! `Disconnected → Connected → Closed`. It validates inbound envelopes,
//! dispatches them to the [`GatewayService`], and encodes responses and
//! pushes. Frames of one session are processed one at a time.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::messages::{OutboundEnvelope, RequestKind};
use crate::domain::{ChannelEvent, ChannelSender, ChannelToken, UserRef};
use crate::error::{GatewayError, WireError};
use crate::method::{MethodOutcome, is_truthy};
use crate::service::GatewayService;
use crate::view::GetUrlOutcome;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake not yet completed.
    Disconnected,
    /// Registered and processing frames.
    Connected,
    /// Torn down; terminal.
    Closed,
}

type Response = Result<Option<OutboundEnvelope>, GatewayError>;

/// Protocol state for one WebSocket connection.
#[derive(Debug)]
pub struct SessionProtocol {
    channel: ChannelToken,
    state: SessionState,
    service: Arc<GatewayService>,
}

impl SessionProtocol {
    /// Creates a session for `channel` in the `Disconnected` state.
    #[must_use]
    pub fn new(service: Arc<GatewayService>, channel: ChannelToken) -> Self {
        Self {
            channel,
            state: SessionState::Disconnected,
            service,
        }
    }

    /// Returns the channel token of this session.
    #[must_use]
    pub const fn channel(&self) -> ChannelToken {
        self.channel
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Registers the connection and returns the `Connected` greeting.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the session already
    /// started, or the registry failure.
    pub async fn connect(
        &mut self,
        user: Option<UserRef>,
        sender: ChannelSender,
    ) -> Result<OutboundEnvelope, GatewayError> {
        if self.state != SessionState::Disconnected {
            return Err(GatewayError::InvalidRequest(format!(
                "session {} already started",
                self.channel
            )));
        }
        self.service.connect(self.channel, user, sender).await?;
        self.state = SessionState::Connected;
        Ok(OutboundEnvelope::connected())
    }

    /// Removes the connection and everything it owns. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.service.disconnect(self.channel).await;
        self.state = SessionState::Closed;
    }

    /// Handles one text frame from the client.
    ///
    /// Returns the correlated response, or `None` when the frame must go
    /// unanswered (no usable `_id`, silent view outcomes, closed session).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedFrame`] if the frame is not a JSON
    /// object; the caller should close the socket.
    pub async fn receive(&mut self, text: &str) -> Response {
        let frame: Value =
            serde_json::from_str(text).map_err(|e| GatewayError::MalformedFrame(e.to_string()))?;
        let Value::Object(mut frame) = frame else {
            return Err(GatewayError::MalformedFrame(
                "frame is not a JSON object".to_string(),
            ));
        };

        if self.state != SessionState::Connected {
            tracing::debug!(channel = %self.channel, state = ?self.state, "frame ignored");
            return Ok(None);
        }

        let Some(id) = frame.remove("_id").filter(is_truthy) else {
            tracing::trace!(channel = %self.channel, "frame without _id dropped");
            return Ok(None);
        };

        let Some(raw_type) = frame.remove("type") else {
            return Ok(Some(OutboundEnvelope::error(
                id,
                &WireError::new("Bad message", "message type not found"),
            )));
        };

        let Some(kind) = raw_type.as_str().and_then(RequestKind::parse) else {
            return Ok(Some(OutboundEnvelope::error(
                id,
                &WireError::new(
                    "Bad message type",
                    format!("{} not recognized", display(&raw_type)),
                ),
            )));
        };

        let params = frame.remove("params");
        let result = match kind {
            RequestKind::Subscribe => self.recv_subscribe(&id, params).await,
            RequestKind::Unsubscribe => self.recv_unsubscribe(&id, params).await,
            RequestKind::Method => self.recv_method(&id, params).await,
            RequestKind::GetUrl => self.recv_geturl(&id, params).await,
        };

        match result {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::debug!(channel = %self.channel, request = kind.as_str(), error = %err, "request failed");
                Ok(Some(OutboundEnvelope::error(id, &err.to_wire())))
            }
        }
    }

    /// Translates an out-of-band channel event into the frame to send.
    #[must_use]
    pub fn handle_event(&self, event: ChannelEvent) -> Value {
        match event {
            ChannelEvent::HandleDdp(push) => OutboundEnvelope::ddp(push).to_value(),
            ChannelEvent::Send(value) => value,
        }
    }

    async fn recv_subscribe(&self, id: &Value, params: Option<Value>) -> Response {
        let params = object(params)?;
        for key in ["name", "_id"] {
            if !params.contains_key(key) {
                return Err(GatewayError::SubscriptionFieldMissing(key));
            }
        }
        let name = required(&params, "name")?;
        let parent = required(&params, "_id")?;

        let sub = self
            .service
            .subscribe(self.channel, &display(name), &display(parent))
            .await?;
        Ok(Some(OutboundEnvelope::success(
            id.clone(),
            json!({"name": name, "sub_id": sub.id}),
        )))
    }

    async fn recv_unsubscribe(&self, id: &Value, params: Option<Value>) -> Response {
        let params = object(params)?;
        let name = required(&params, "name")?;
        let parent = params.get("_id").map(display);

        self.service
            .unsubscribe(self.channel, &display(name), parent.as_deref())
            .await;
        Ok(Some(OutboundEnvelope::unsubscribed(id.clone(), name.clone())))
    }

    async fn recv_method(&self, id: &Value, params: Option<Value>) -> Response {
        let mut params = object(params)?;
        let name = display(required(&params, "name")?);
        let args = params.remove("params");

        let envelope = match self.service.call_method(&name, args).await? {
            MethodOutcome::Success(value) => OutboundEnvelope::success(id.clone(), value),
            MethodOutcome::Failure(value) => OutboundEnvelope::failure(id.clone(), value),
        };
        Ok(Some(envelope))
    }

    async fn recv_geturl(&self, id: &Value, params: Option<Value>) -> Response {
        let params = object(params)?;
        let url = display(required(&params, "url")?);

        let response = match self.service.get_url(self.channel, &url).await {
            Some(GetUrlOutcome::Rendered(markup)) => {
                Some(OutboundEnvelope::success(id.clone(), Value::String(markup)))
            }
            Some(GetUrlOutcome::Navigated) => {
                Some(OutboundEnvelope::success(id.clone(), json!({})))
            }
            None => None,
        };
        Ok(response)
    }
}

fn object(params: Option<Value>) -> Result<Map<String, Value>, GatewayError> {
    match params {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(GatewayError::MissingField("params")),
    }
}

fn required<'a>(params: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value, GatewayError> {
    params.get(key).ok_or(GatewayError::MissingField(key))
}

/// Strings as-is, anything else as compact JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::DdpPush;
    use crate::service::gateway_service::tests::make_service;
    use tokio::sync::mpsc;

    struct Harness {
        session: SessionProtocol,
        service: Arc<GatewayService>,
        rx: mpsc::UnboundedReceiver<ChannelEvent>,
    }

    async fn connected() -> Harness {
        let service = Arc::new(make_service());
        let mut session = SessionProtocol::new(Arc::clone(&service), ChannelToken::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let Ok(hello) = session.connect(None, tx).await else {
            panic!("connect failed");
        };
        assert_eq!(hello, OutboundEnvelope::connected());
        Harness {
            session,
            service,
            rx,
        }
    }

    async fn send(h: &mut Harness, frame: Value) -> Option<Value> {
        match h.session.receive(&frame.to_string()).await {
            Ok(response) => response.map(|env| env.to_value()),
            Err(err) => panic!("unexpected fatal error: {err}"),
        }
    }

    fn pushes(h: &mut Harness) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(event) = h.rx.try_recv() {
            out.push(h.session.handle_event(event));
        }
        out
    }

    #[tokio::test]
    async fn connect_registers_exactly_one_connection() {
        let h = connected().await;
        assert_eq!(h.session.state(), SessionState::Connected);
        assert_eq!(h.service.connections().len().await, 1);
        assert!(h.service.connections().contains(h.session.channel()).await);
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let mut h = connected().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(h.session.connect(None, tx).await.is_err());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_cascades() {
        let mut h = connected().await;
        let _ = send(
            &mut h,
            json!({"_id": "1", "type": "subscribe", "params": {"name": "tasks", "_id": "root"}}),
        )
        .await;

        h.session.disconnect().await;
        h.session.disconnect().await;
        assert_eq!(h.session.state(), SessionState::Closed);
        assert!(h.service.connections().is_empty().await);
        assert!(h.service.subscriptions().is_empty().await);
    }

    #[tokio::test]
    async fn missing_or_falsy_id_is_silent() {
        let mut h = connected().await;
        assert_eq!(send(&mut h, json!({"type": "method"})).await, None);
        assert_eq!(send(&mut h, json!({"_id": "", "type": "bogus"})).await, None);
        assert_eq!(send(&mut h, json!({"_id": null})).await, None);
    }

    #[tokio::test]
    async fn missing_type_is_reported() {
        let mut h = connected().await;
        let response = send(&mut h, json!({"_id": "5"})).await;
        assert_eq!(
            response,
            Some(json!({
                "_id": "5",
                "type": "Error",
                "params": {"name": "Bad message", "message": "message type not found"}
            }))
        );
    }

    #[tokio::test]
    async fn unknown_type_is_reported() {
        let mut h = connected().await;
        let response = send(&mut h, json!({"_id": "6", "type": "login"})).await;
        assert_eq!(
            response,
            Some(json!({
                "_id": "6",
                "type": "Error",
                "params": {"name": "Bad message type", "message": "login not recognized"}
            }))
        );
    }

    #[tokio::test]
    async fn malformed_frame_is_fatal() {
        let mut h = connected().await;
        assert!(matches!(
            h.session.receive("{not json").await,
            Err(GatewayError::MalformedFrame(_))
        ));
        assert!(matches!(
            h.session.receive("[1, 2]").await,
            Err(GatewayError::MalformedFrame(_))
        ));
    }

    #[tokio::test]
    async fn subscribe_scenario_two_records() {
        let mut h = connected().await;
        let response = send(
            &mut h,
            json!({"_id": "1", "type": "subscribe", "params": {"name": "tasks", "_id": "root"}}),
        )
        .await;

        let Some(response) = response else {
            panic!("expected a response");
        };
        assert_eq!(response.get("_id"), Some(&json!("1")));
        assert_eq!(response.get("type"), Some(&json!("Success")));
        assert_eq!(response.pointer("/params/name"), Some(&json!("tasks")));
        assert!(response.pointer("/params/sub_id").is_some_and(Value::is_u64));

        let pushes = pushes(&mut h);
        assert_eq!(pushes.len(), 2);
        for push in &pushes {
            assert_eq!(push.get("type"), Some(&json!("DDP")));
            assert_eq!(push.pointer("/params/type"), Some(&json!("insert")));
            assert!(push.get("_id").is_none());
        }
    }

    #[tokio::test]
    async fn subscription_ids_are_distinct() {
        let mut h = connected().await;
        let subscribe = |parent: &str| {
            json!({"_id": "1", "type": "subscribe", "params": {"name": "tasks", "_id": parent}})
        };
        let first = send(&mut h, subscribe("a")).await;
        let second = send(&mut h, subscribe("b")).await;
        let id = |v: &Option<Value>| v.as_ref().and_then(|r| r.pointer("/params/sub_id").cloned());
        assert!(id(&first).is_some());
        assert_ne!(id(&first), id(&second));
    }

    #[tokio::test]
    async fn repeated_subscribe_is_answered_with_same_id() {
        let mut h = connected().await;
        let frame = json!({"_id": "1", "type": "subscribe", "params": {"name": "tasks", "_id": "root"}});
        let first = send(&mut h, frame.clone()).await;
        let second = send(&mut h, frame).await;

        assert_eq!(first, second);
        assert_eq!(
            h.service
                .subscriptions()
                .count_for_channel(h.session.channel())
                .await,
            1
        );
        let inserts = pushes(&mut h)
            .iter()
            .filter(|p| p.pointer("/params/type") == Some(&json!("insert")))
            .count();
        assert_eq!(inserts, 2);
    }

    #[tokio::test]
    async fn subscribe_names_first_missing_key() {
        let mut h = connected().await;
        let response = send(&mut h, json!({"_id": "2", "type": "subscribe", "params": {}})).await;
        assert_eq!(
            response.and_then(|r| r.pointer("/params/message").cloned()),
            Some(json!("Subscription name not found"))
        );

        let response = send(
            &mut h,
            json!({"_id": "3", "type": "subscribe", "params": {"name": "tasks"}}),
        )
        .await;
        assert_eq!(
            response.and_then(|r| r.pointer("/params/message").cloned()),
            Some(json!("Subscription _id not found"))
        );
    }

    #[tokio::test]
    async fn missing_params_is_generic_bad_format() {
        let mut h = connected().await;
        for kind in ["subscribe", "unsubscribe", "method", "geturl"] {
            let response = send(&mut h, json!({"_id": "9", "type": kind})).await;
            assert_eq!(
                response,
                Some(json!({
                    "_id": "9",
                    "type": "Error",
                    "params": {"name": "Bad format", "message": "\"params\" key not found"}
                })),
                "request type {kind}"
            );
        }

        let response = send(&mut h, json!({"_id": "9", "type": "geturl", "params": {}})).await;
        assert_eq!(
            response.and_then(|r| r.pointer("/params/name").cloned()),
            Some(json!("Bad format"))
        );
    }

    #[tokio::test]
    async fn unknown_publication_is_reported() {
        let mut h = connected().await;
        let response = send(
            &mut h,
            json!({"_id": "4", "type": "subscribe", "params": {"name": "notes", "_id": "root"}}),
        )
        .await;
        assert_eq!(
            response,
            Some(json!({
                "_id": "4",
                "type": "Error",
                "params": {"name": "Not found", "message": "Publication notes not found"}
            }))
        );
    }

    #[tokio::test]
    async fn unsubscribe_acknowledges_and_removes() {
        let mut h = connected().await;
        let _ = send(
            &mut h,
            json!({"_id": "1", "type": "subscribe", "params": {"name": "tasks", "_id": "root"}}),
        )
        .await;
        let _ = pushes(&mut h);

        let response = send(
            &mut h,
            json!({"_id": "2", "type": "unsubscribe", "params": {"name": "tasks"}}),
        )
        .await;
        assert_eq!(
            response,
            Some(json!({
                "_id": "2",
                "type": "unsubscribed",
                "message": "Got unsub",
                "params": {"name": "tasks"}
            }))
        );
        assert!(h.service.subscriptions().is_empty().await);
    }

    #[tokio::test]
    async fn method_outcomes_share_envelope_shape() {
        let mut h = connected().await;
        let ok = send(
            &mut h,
            json!({"_id": "m1", "type": "method", "params": {"name": "echo", "params": {"x": 1}}}),
        )
        .await;
        assert_eq!(
            ok,
            Some(json!({"_id": "m1", "type": "Success", "params": {"x": 1}}))
        );

        let failed = send(
            &mut h,
            json!({"_id": "m2", "type": "method", "params": {"name": "echo", "params": false}}),
        )
        .await;
        assert_eq!(
            failed,
            Some(json!({"_id": "m2", "type": "Error", "params": false}))
        );

        let empty = send(
            &mut h,
            json!({"_id": "m3", "type": "method", "params": {"name": "echo", "params": null}}),
        )
        .await;
        assert_eq!(
            empty,
            Some(json!({"_id": "m3", "type": "Error", "params": null}))
        );
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let mut h = connected().await;
        let response = send(
            &mut h,
            json!({"_id": "m4", "type": "method", "params": {"name": "nope"}}),
        )
        .await;
        assert_eq!(
            response,
            Some(json!({
                "_id": "m4",
                "type": "Error",
                "params": {"name": "Not found", "message": "Method nope not found"}
            }))
        );
    }

    #[tokio::test]
    async fn geturl_renders_then_navigates() {
        let mut h = connected().await;
        let first = send(
            &mut h,
            json!({"_id": "u1", "type": "geturl", "params": {"url": "/items/1"}}),
        )
        .await;
        assert_eq!(
            first,
            Some(json!({"_id": "u1", "type": "Success", "params": "<item>/items/1</item>"}))
        );
        let channel = h.session.channel();
        assert_eq!(
            h.service.views().current_route(channel).await.as_deref(),
            Some("item")
        );

        let second = send(
            &mut h,
            json!({"_id": "u2", "type": "geturl", "params": {"url": "/items/2"}}),
        )
        .await;
        assert_eq!(second, Some(json!({"_id": "u2", "type": "Success", "params": {}})));

        let rejected = send(
            &mut h,
            json!({"_id": "u3", "type": "geturl", "params": {"url": "/items/deny"}}),
        )
        .await;
        assert_eq!(rejected, None);

        let unmatched = send(
            &mut h,
            json!({"_id": "u4", "type": "geturl", "params": {"url": "/elsewhere"}}),
        )
        .await;
        assert_eq!(unmatched, None);
    }

    #[tokio::test]
    async fn send_primitive_passes_through() {
        let h = connected().await;
        let raw = json!({"type": "Custom", "params": [1]});
        assert_eq!(h.session.handle_event(ChannelEvent::Send(raw.clone())), raw);

        let removed = h.session.handle_event(ChannelEvent::HandleDdp(DdpPush::Removed {
            id: "1".to_string(),
            parent: "root".to_string(),
        }));
        assert_eq!(removed.pointer("/params/type"), Some(&json!("remove")));
    }

    #[tokio::test]
    async fn closed_session_ignores_frames() {
        let mut h = connected().await;
        h.session.disconnect().await;
        assert_eq!(send(&mut h, json!({"_id": "1", "type": "login"})).await, None);
    }
}
