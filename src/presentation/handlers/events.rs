use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::application::ports::JobEvent;
use crate::application::services::JobStatusController;
use crate::domain::{Job, JobId};
use crate::presentation::state::AppState;

use super::error::ApiError;
use super::jobs::{JobIdQuery, parse_job_id};

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// Server-sent `status` events for one job: the current state first, then
/// every accepted write until the job is terminal.
#[tracing::instrument(skip(state))]
pub async fn job_events_handler(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
    let id = parse_job_id(&query.id)?;
    let receiver = state.events.subscribe();
    let job = state.controller.get_job(id).await?;

    let first = stream::once(std::future::ready(Ok(to_sse(&current_event(&job)))));
    let events: EventStream = if job.status.is_terminal() {
        first.boxed()
    } else {
        first
            .chain(follow(receiver, state.controller.clone(), id))
            .boxed()
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn follow(
    receiver: tokio::sync::broadcast::Receiver<JobEvent>,
    controller: Arc<JobStatusController>,
    id: JobId,
) -> impl futures::Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(receiver), move |state| {
        let controller = controller.clone();
        async move {
            let mut receiver = state?;
            loop {
                match receiver.recv().await {
                    Ok(event) if event.job_id == id => {
                        let next = (!event.status.is_terminal()).then_some(receiver);
                        return Some((Ok(to_sse(&event)), next));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(job_id = %id, skipped, "Event subscriber lagged");
                        // The skipped events may have held the terminal one.
                        match controller.get_job(id).await {
                            Ok(job) if job.status.is_terminal() => {
                                return Some((Ok(to_sse(&current_event(&job))), None));
                            }
                            Ok(_) => continue,
                            Err(e) => {
                                tracing::debug!(job_id = %id, error = %e, "Closing event stream");
                                return None;
                            }
                        }
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    })
}

fn current_event(job: &Job) -> JobEvent {
    JobEvent {
        job_id: job.id,
        job_type: job.job_type,
        status: job.status,
        progress: job.progress,
        stage: None,
        media_kind: None,
        content_seconds: None,
        error: job.error.clone(),
        at: job.updated_at,
    }
}

fn to_sse(event: &JobEvent) -> Event {
    Event::default()
        .event("status")
        .json_data(event)
        .unwrap_or_else(|_| Event::default().comment("unserializable event"))
}
