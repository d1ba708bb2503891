//! Self-addressed hop from the loop controller to the call launcher.
//!
//! The loop hands each dial to `/call/start` over HTTP so the launch runs as
//! its own short-lived invocation, possibly on another instance. The token
//! travels signed, exactly as it does in webhook URLs.

use std::time::Duration;

use async_trait::async_trait;
use escalation::TokenQuery;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No connection was made; the launcher never saw the request.
    #[error("launch endpoint unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The request may have been delivered (e.g. timed out waiting for the
    /// reply).
    #[error("launch request unconfirmed: {0}")]
    Unconfirmed(#[source] reqwest::Error),

    #[error("launch endpoint answered {status}")]
    Rejected { status: u16 },
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Unreachable(e)
        } else {
            Self::Unconfirmed(e)
        }
    }
}

impl DispatchError {
    /// Whether the launcher certainly did not start a call.
    pub fn is_undelivered(&self) -> bool {
        !matches!(self, Self::Unconfirmed(_))
    }
}

#[async_trait]
pub trait CallDispatcher: Send + Sync {
    /// Ask the launcher to place the call described by the signed token.
    async fn launch(&self, token: &TokenQuery) -> Result<(), DispatchError>;
}

/// Posts the signed token as JSON to this server's public `/call/start`.
pub struct HttpDispatcher {
    client: reqwest::Client,
    launch_url: String,
}

impl HttpDispatcher {
    pub fn new(launch_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            launch_url: launch_url.into(),
        })
    }
}

#[async_trait]
impl CallDispatcher for HttpDispatcher {
    async fn launch(&self, token: &TokenQuery) -> Result<(), DispatchError> {
        let response = self.client.post(&self.launch_url).json(token).send().await?;
        if !response.status().is_success() {
            return Err(DispatchError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use escalation::{CandidateList, ContinuationToken, EscalationRequest, Message, SigningKey};

    fn token() -> TokenQuery {
        let request = EscalationRequest::new(
            "+15550000",
            Message::Text("hello".into()),
            CandidateList::default(),
        );
        ContinuationToken::new(request, "+15550001")
            .to_query(&SigningKey::new("k"))
            .unwrap()
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/call/start")
    }

    #[tokio::test]
    async fn test_launch_posts_token_json() {
        let received: Arc<Mutex<Option<TokenQuery>>> = Arc::default();

        async fn launch(
            State(received): State<Arc<Mutex<Option<TokenQuery>>>>,
            Json(token): Json<TokenQuery>,
        ) -> StatusCode {
            *received.lock().unwrap() = Some(token);
            StatusCode::ACCEPTED
        }

        let app = Router::new()
            .route("/call/start", post(launch))
            .with_state(received.clone());
        let dispatcher = HttpDispatcher::new(serve(app).await, Duration::from_secs(5)).unwrap();
        let t = token();
        dispatcher.launch(&t).await.unwrap();
        assert_eq!(received.lock().unwrap().as_ref(), Some(&t));
    }

    #[tokio::test]
    async fn test_unreachable_launcher_is_undelivered() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher =
            HttpDispatcher::new(format!("http://{addr}/call/start"), Duration::from_secs(2))
                .unwrap();
        let err = dispatcher.launch(&token()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unreachable(_)));
        assert!(err.is_undelivered());
    }

    #[tokio::test]
    async fn test_rejection_is_undelivered() {
        let app = Router::new().route("/call/start", post(|| async { StatusCode::BAD_REQUEST }));
        let dispatcher = HttpDispatcher::new(serve(app).await, Duration::from_secs(5)).unwrap();
        let err = dispatcher.launch(&token()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { status: 400 }));
        assert!(err.is_undelivered());
    }

    #[tokio::test]
    async fn test_slow_launcher_is_unconfirmed_not_undelivered() {
        let app = Router::new().route(
            "/call/start",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(800)).await;
                StatusCode::ACCEPTED
            }),
        );
        let dispatcher =
            HttpDispatcher::new(serve(app).await, Duration::from_millis(200)).unwrap();
        let err = dispatcher.launch(&token()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unconfirmed(_)));
        assert!(!err.is_undelivered());
    }
}
