use crate::transcript::TranscriptRow;
use crate::tts_client::{SpeechAudio, TtsClient};
use crate::voice::VoiceAssignment;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use log::info;
use std::time::Instant;

/// Audio for one row; `row_index` ties it back to the transcript.
#[derive(Debug)]
pub struct SynthesisResult {
    pub row_index: usize,
    pub audio: SpeechAudio,
}

/// Synthesize every row concurrently and return results in row order.
///
/// One call is dispatched per row through a bounded worker pool. Completion
/// order is arbitrary, so ordering is recovered from the index carried with
/// each result, never from completion order. Any single failure aborts the
/// whole batch: either every row succeeds or the job fails with no partial
/// artifact.
pub async fn synthesize_all(
    rows: &[TranscriptRow],
    assignments: &[VoiceAssignment],
    tts: &dyn TtsClient,
    max_concurrency: usize,
    persist_to_disk: bool,
) -> Result<Vec<SynthesisResult>> {
    anyhow::ensure!(
        rows.len() == assignments.len(),
        "row/assignment count mismatch: {} rows, {} assignments",
        rows.len(),
        assignments.len()
    );
    let started = Instant::now();

    let results: Vec<Result<(usize, SpeechAudio)>> =
        futures_util::stream::iter(rows.iter().zip(assignments.iter()).enumerate())
            .map(|(i, (row, assignment))| async move {
                let audio = tts
                    .synthesize(&row.text, &assignment.voice_id, assignment.rate, persist_to_disk)
                    .await
                    .with_context(|| format!("synthesis failed for line {}", i))?;
                Ok((i, audio))
            })
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;

    let mut ordered: Vec<Option<SynthesisResult>> = Vec::with_capacity(rows.len());
    ordered.resize_with(rows.len(), || None);
    for result in results {
        let (i, audio) = result?;
        ordered[i] = Some(SynthesisResult { row_index: i, audio });
    }
    let ordered: Vec<SynthesisResult> = ordered
        .into_iter()
        .map(|slot| slot.context("synthesis result slot left unfilled"))
        .collect::<Result<_>>()?;

    info!(
        "Synthesized {} lines in {:.2}s",
        ordered.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(ordered)
}
