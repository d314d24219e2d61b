//! Async HTTP server: tokio + hyper. Converts HTTP to `RequestContext`, calls the app,
//! converts `Response` back. Stops on Ctrl-C.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::{App, CoreError, RequestContext, Response};

/// Run the server until Ctrl-C. Builds its own multi-thread runtime.
pub fn run(app: Arc<App>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = app.server_config().addr();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(serve(app, &addr))
}

/// Accept loop on `addr`; one task per connection.
pub async fn serve(app: Arc<App>, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        router = %app.server_config().path,
        api = %app.server_config().api_path,
        actions = app.dispatcher().registry().len(),
        "listening"
    );
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break Ok(());
            }
            accept_result = listener.accept() => {
                let (stream, peer) = match accept_result {
                    Ok(x) => x,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let app = Arc::clone(&app);
                tokio::task::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let app = Arc::clone(&app);
                        async move { Ok::<_, Infallible>(handle(app, req).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        tracing::debug!(%peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }
}

async fn handle(app: Arc<App>, req: Request<hyper::body::Incoming>) -> HyperResponse<Full<Bytes>> {
    match to_request_context(req).await {
        Ok(ctx) => into_hyper(app.handle_request(&ctx).await),
        Err(e) => {
            let body = serde_json::json!({ "error": e.to_string() });
            into_hyper(Response {
                status_code: 400,
                body: body.to_string().into_bytes(),
                content_type: Some("application/json".into()),
            })
        }
    }
}

async fn to_request_context(req: Request<hyper::body::Incoming>) -> Result<RequestContext, CoreError> {
    let method = req.method().to_string();
    let path = req.uri().path().trim_start_matches('/').to_string();
    let query_string = req.uri().query().unwrap_or("").to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| CoreError::InvalidRequest(e.to_string()))?
        .to_bytes()
        .to_vec();
    Ok(RequestContext {
        method,
        path,
        query_string,
        headers,
        body,
    })
}

fn into_hyper(resp: Response) -> HyperResponse<Full<Bytes>> {
    let mut out = HyperResponse::new(Full::new(Bytes::from(resp.body)));
    *out.status_mut() = StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if let Some(value) = resp.content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        out.headers_mut().insert(CONTENT_TYPE, value);
    }
    out
}
