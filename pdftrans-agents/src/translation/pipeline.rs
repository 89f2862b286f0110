use crate::services::TranslationService;
use futures::stream::{self, StreamExt};
use pdftrans_core::{CancellationToken, Event, EventPublisher, PdfTransError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const MAX_CONCURRENCY: usize = 5;

/// Translation's progress band within the orchestrator's overall run
/// (26-70); events published here never exceed the upper bound.
const BAND_START: i32 = 26;
const BAND_SPAN: i32 = 44;

fn attempt_progress(attempt: u32, span: i32) -> i32 {
    BAND_START + (span * attempt as i32) / MAX_ATTEMPTS as i32
}

/// Translates one unit of text with up to three attempts, backing off
/// `0.5 * attempt` seconds between tries. Publishes a retry/success event
/// after every attempt. A cancellation is returned immediately and never
/// retried; exhausting all attempts returns every attempt's error joined
/// together.
async fn translate_with_retry<F>(
    token: &CancellationToken,
    publisher: &dyn EventPublisher,
    translate_one: F,
) -> Result<String>
where
    F: Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send>>,
{
    let mut errors = Vec::new();
    for attempt in 1..=MAX_ATTEMPTS {
        token.check()?;
        match translate_one().await {
            Ok(text) => {
                publisher.publish(
                    Event::new("translation", "translating", attempt_progress(attempt, BAND_SPAN).min(70))
                        .with_detail(serde_json::json!({"attempt": attempt, "status": "success"})),
                );
                return Ok(text);
            }
            Err(PdfTransError::Cancelled) => return Err(PdfTransError::Cancelled),
            Err(err) => {
                publisher.publish(
                    Event::new("translation", "translating", attempt_progress(attempt, BAND_SPAN - 7).min(69))
                        .with_detail(serde_json::json!({
                            "attempt": attempt,
                            "status": "retry",
                            "error": err.to_string(),
                        })),
                );
                errors.push(format!("attempt {attempt}: {err}"));
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
            }
        }
    }
    Err(PdfTransError::Translation(errors.join("; ")))
}

/// Translates every segment under a concurrency cap, preserving input order
/// in the returned vector regardless of completion order. Publishes one
/// fine-grained progress event per completed page/segment (stage
/// `translating_page`/`translating_segment`) in addition to the
/// per-attempt retry/success events `translate_with_retry` emits.
pub async fn translate_many(
    service: Arc<dyn TranslationService>,
    segments: Vec<String>,
    prompt: String,
    token: CancellationToken,
    per_page: bool,
    publisher: Arc<dyn EventPublisher>,
) -> Result<Vec<String>> {
    let total = segments.len();
    let completed = Arc::new(AtomicUsize::new(0));
    let indexed: Vec<(usize, String)> = segments.into_iter().enumerate().collect();
    let unit_stage = if per_page { "translating_page" } else { "translating_segment" };

    let results: Vec<Result<(usize, String)>> = stream::iter(indexed)
        .map(|(idx, segment)| {
            let service = Arc::clone(&service);
            let prompt = prompt.clone();
            let token = token.clone();
            let publisher = Arc::clone(&publisher);
            let completed = Arc::clone(&completed);
            async move {
                let translated = translate_with_retry(&token, publisher.as_ref(), || {
                    let service = Arc::clone(&service);
                    let prompt = prompt.clone();
                    let segment = segment.clone();
                    Box::pin(async move {
                        if per_page {
                            service.translate_page(&segment, &prompt).await
                        } else {
                            service.translate_segment(&segment, &prompt).await
                        }
                    })
                })
                .await?;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let progress = BAND_START + (BAND_SPAN * done as i32) / total.max(1) as i32;
                publisher.publish(
                    Event::new("translation", unit_stage, progress.min(70))
                        .with_detail(serde_json::json!({"completed": done, "total": total, "index": idx})),
                );

                Ok((idx, translated))
            }
        })
        .buffer_unordered(MAX_CONCURRENCY)
        .collect()
        .await;

    let mut ordered: Vec<Option<String>> = vec![None; results.len()];
    for result in results {
        let (idx, text) = result?;
        ordered[idx] = Some(text);
    }
    Ok(ordered.into_iter().map(|t| t.unwrap_or_default()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TermCandidate;
    use async_trait::async_trait;
    use pdftrans_core::{NullPublisher, PaperMetadata, PromptProfile};
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Mutex;

    struct FlakyService {
        failures_before_success: usize,
        attempts: StdAtomicUsize,
    }

    #[async_trait]
    impl TranslationService for FlakyService {
        async fn build_prompt_profile(&self, _abstract_text: &str, _filename: &str) -> Result<PromptProfile> {
            Ok(PromptProfile::default())
        }
        async fn translate_page(&self, page_text: &str, _prompt: &str) -> Result<String> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(PdfTransError::Translation("transient timeout".into()))
            } else {
                Ok(format!("translated:{page_text}"))
            }
        }
        async fn translate_segment(&self, segment: &str, prompt: &str) -> Result<String> {
            self.translate_page(segment, prompt).await
        }
        async fn extract_terms(&self, _text: &str, _domain: &str) -> Result<Vec<TermCandidate>> {
            Ok(vec![])
        }
        async fn extract_paper_metadata(&self, _text: &str) -> Result<PaperMetadata> {
            Ok(PaperMetadata::default())
        }
    }

    /// Records every event published, for assertions on per-attempt and
    /// per-segment progress reporting.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<Event>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_and_eventually_succeeds() {
        let service: Arc<dyn TranslationService> =
            Arc::new(FlakyService { failures_before_success: 2, attempts: StdAtomicUsize::new(0) });
        let out = translate_many(
            service,
            vec!["hello".to_string()],
            "prompt".to_string(),
            CancellationToken::new(),
            true,
            Arc::new(NullPublisher),
        )
        .await
        .unwrap();
        assert_eq!(out, vec!["translated:hello".to_string()]);
    }

    #[tokio::test]
    async fn exhausting_retries_returns_aggregated_error() {
        let service: Arc<dyn TranslationService> =
            Arc::new(FlakyService { failures_before_success: 99, attempts: StdAtomicUsize::new(0) });
        let err = translate_many(
            service,
            vec!["hello".to_string()],
            "prompt".to_string(),
            CancellationToken::new(),
            true,
            Arc::new(NullPublisher),
        )
        .await
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("attempt 1"));
        assert!(msg.contains("attempt 3"));
    }

    #[tokio::test]
    async fn cancellation_is_never_retried() {
        let token = CancellationToken::new();
        token.cancel();
        let service: Arc<dyn TranslationService> =
            Arc::new(FlakyService { failures_before_success: 0, attempts: StdAtomicUsize::new(0) });
        let err = translate_many(
            service,
            vec!["hello".to_string()],
            "prompt".to_string(),
            token,
            true,
            Arc::new(NullPublisher),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PdfTransError::Cancelled));
    }

    #[tokio::test]
    async fn preserves_input_order_under_concurrency() {
        let service: Arc<dyn TranslationService> =
            Arc::new(FlakyService { failures_before_success: 0, attempts: StdAtomicUsize::new(0) });
        let segments: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let out = translate_many(
            service,
            segments.clone(),
            "prompt".to_string(),
            CancellationToken::new(),
            true,
            Arc::new(NullPublisher),
        )
        .await
        .unwrap();
        for (idx, original) in segments.iter().enumerate() {
            assert_eq!(out[idx], format!("translated:{original}"));
        }
    }

    #[tokio::test]
    async fn publishes_retry_then_success_events_per_attempt() {
        let service: Arc<dyn TranslationService> =
            Arc::new(FlakyService { failures_before_success: 1, attempts: StdAtomicUsize::new(0) });
        let publisher = Arc::new(RecordingPublisher::default());
        translate_many(
            service,
            vec!["hello".to_string()],
            "prompt".to_string(),
            CancellationToken::new(),
            true,
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        )
        .await
        .unwrap();

        let events = publisher.events.lock().unwrap();
        let retries: Vec<&Event> = events.iter().filter(|e| e.stage == "translating").collect();
        assert_eq!(retries.len(), 2);
        assert_eq!(retries[0].detail.as_ref().unwrap()["status"], "retry");
        assert_eq!(retries[1].detail.as_ref().unwrap()["status"], "success");
        assert!(events.iter().any(|e| e.stage == "translating_page"));
    }

    #[tokio::test]
    async fn publishes_one_per_segment_progress_event_per_segment() {
        let service: Arc<dyn TranslationService> =
            Arc::new(FlakyService { failures_before_success: 0, attempts: StdAtomicUsize::new(0) });
        let publisher = Arc::new(RecordingPublisher::default());
        let segments: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        translate_many(
            service,
            segments,
            "prompt".to_string(),
            CancellationToken::new(),
            false,
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        )
        .await
        .unwrap();

        let events = publisher.events.lock().unwrap();
        let segment_events: Vec<&Event> = events.iter().filter(|e| e.stage == "translating_segment").collect();
        assert_eq!(segment_events.len(), 4);
        assert!(segment_events.iter().all(|e| e.progress >= BAND_START && e.progress <= 70));
    }
}
