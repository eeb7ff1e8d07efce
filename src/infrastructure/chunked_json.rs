// Length-prefixed JSON streaming of render updates
use crate::application::heatmap_service::{CaptureStatus, HeatmapService};
use crate::domain::heatmap::RenderModel;
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// One frame of the update stream
#[derive(Debug, Clone, Serialize)]
pub struct RenderUpdate {
    pub revision: u64,
    pub capturing: bool,
    pub status: CaptureStatus,
    /// Absent when no floor is selected
    pub render: Option<RenderModel>,
}

/// Build a chunked response where every frame is a 4-byte big-endian length
/// followed by a (possibly Brotli-compressed) JSON payload
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_chunk(msg, compress).await });

    // Content-Encoding stays unset: frames are compressed individually
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson-framed")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn serialize_chunk<T: Serialize>(msg: T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(&msg)?;
    let payload = if compress {
        brotli_compress(&json).await?
    } else {
        json
    };

    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(payload.len() as u32);
    chunk.put_slice(&payload);
    Ok(chunk.freeze())
}

/// Stream a fresh render of the current floor each time the session changes.
/// Rapid changes coalesce into one frame. The stream ends when `shutdown`
/// is cancelled.
pub fn stream_render_updates(
    service: HeatmapService,
    compress: bool,
    shutdown: CancellationToken,
) -> impl IntoResponse {
    let mut revisions = service.updates();
    let updates = async_stream::stream! {
        loop {
            let revision = *revisions.borrow_and_update();
            let snapshot = service.capture_snapshot().await;
            yield RenderUpdate {
                revision,
                capturing: snapshot.capturing,
                status: snapshot.status,
                render: service.render_current().await.ok(),
            };
            let more = tokio::select! {
                changed = revisions.changed() => changed.is_ok(),
                _ = shutdown.cancelled() => false,
            };
            if !more {
                break;
            }
        }
    };

    match chunked_json_stream(updates, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
