//! Pipeline orchestration.
//!
//! One invocation walks a batch through
//! `Received → Segmented → Signed → Classified → Scored → Persisted → Reported`.
//! Input is validated and signed before any store I/O; the whole snapshot is
//! read before scoring and the whole delta is written after it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use etalon_core::{
    BatchOutcome, BatchReport, Error, FlaggedFragment, FlaggedText, Fragment, FragmentKind,
    InputBatch, Label, LinguisticNormalizer, ReferenceSample, ReferenceStore, Result,
    ScoredFragment, Signature,
};

use crate::aggregator::{aggregate, classify, exceeds_border};
use crate::config::EngineConfig;
use crate::evaluator::{Candidate, EvaluationPool};
use crate::segmenter::segment_text;
use crate::signature::SignatureGenerator;

/// A fragment with its signature, ready for classification.
#[derive(Debug, Clone)]
struct SignedFragment {
    fragment: Fragment,
    signature: Signature,
}

/// One input text after segmentation and signing.
#[derive(Debug, Clone)]
struct SignedText {
    text_id: Uuid,
    text: String,
    label: Label,
    fragments: Vec<SignedFragment>,
}

/// Runs batches against the reference corpus.
pub struct Pipeline {
    generator: SignatureGenerator,
    store: Arc<dyn ReferenceStore>,
    pool: EvaluationPool,
    config: EngineConfig,
    /// Serializes invocations so no two share a snapshot.
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        normalizer: Arc<dyn LinguisticNormalizer>,
        store: Arc<dyn ReferenceStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generator: SignatureGenerator::new(normalizer),
            pool: EvaluationPool::new(config.order_workers),
            store,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ReferenceStore> {
        &self.store
    }

    /// Process one batch to completion.
    #[instrument(
        skip(self, batch),
        fields(subsystem = "engine", component = "pipeline", item_count = batch.items.len())
    )]
    pub async fn run(&self, batch: &InputBatch) -> Result<BatchOutcome> {
        let _guard = self.run_lock.lock().await;
        let start = Instant::now();

        let texts = self.sign_batch(batch)?;
        let theme = batch.theme.clone();

        let snapshot = match theme.as_deref() {
            Some(theme) => self.store.get_theme(theme).await?,
            None => self.store.get_all().await?,
        };
        let snapshot_len = snapshot.len();

        let mut predefined = Vec::new();
        let mut candidates = Vec::new();
        for text in &texts {
            match classify(&text.label) {
                FragmentKind::Predefined => {
                    let weight = text.label.weight().unwrap_or_default();
                    for signed in &text.fragments {
                        predefined.push(ReferenceSample::from_signature(
                            signed.fragment.key(),
                            signed.signature.clone(),
                            weight,
                            theme.clone(),
                        ));
                    }
                }
                FragmentKind::Undefined => {
                    for signed in &text.fragments {
                        candidates.push(Candidate {
                            key: signed.fragment.key(),
                            signature: signed.signature.clone(),
                        });
                    }
                }
            }
        }

        let mut references = snapshot;
        references.extend(predefined.iter().cloned());
        debug!(
            subsystem = "engine",
            component = "pipeline",
            op = "classify",
            reference_count = references.len(),
            snapshot_count = snapshot_len,
            predefined_count = predefined.len(),
            candidate_count = candidates.len(),
            "Evaluation set assembled"
        );

        let ratios = self
            .pool
            .evaluate(Arc::new(candidates), Arc::new(references))
            .await?;

        let mut fragments = Vec::new();
        let mut delta = Vec::new();
        let mut flagged = Vec::new();
        let mut flagged_texts = Vec::new();

        for text in texts {
            let kind = classify(&text.label);
            let mut text_flagged = false;
            for signed in text.fragments {
                let key = signed.fragment.key();
                let (weight, level_ratios) = match kind {
                    FragmentKind::Predefined => (text.label.weight().unwrap_or_default(), None),
                    FragmentKind::Undefined => {
                        let r = ratios.get(&key).copied().unwrap_or_default();
                        (aggregate(&r), Some(r))
                    }
                };

                if kind == FragmentKind::Undefined {
                    if exceeds_border(weight, self.config.similarity_border) {
                        info!(
                            subsystem = "engine",
                            component = "pipeline",
                            op = "report",
                            text_id = %key.text_id,
                            part = key.part,
                            weight,
                            "Fragment exceeds similarity border"
                        );
                        flagged.push(FlaggedFragment {
                            text_id: key.text_id,
                            part: key.part,
                            weight,
                            sentences: signed.fragment.sentences.clone(),
                        });
                        text_flagged = true;
                    }
                    delta.push(ReferenceSample::from_signature(
                        key,
                        signed.signature,
                        weight,
                        theme.clone(),
                    ));
                }

                fragments.push(ScoredFragment {
                    text_id: key.text_id,
                    part: key.part,
                    kind,
                    weight,
                    ratios: level_ratios,
                });
            }
            if text_flagged {
                flagged_texts.push(FlaggedText {
                    text_id: text.text_id,
                    text: text.text,
                });
            }
        }

        delta.extend(predefined);
        self.store.upsert_all(&delta).await?;

        let report = BatchReport {
            fragment_count: fragments.len(),
            flagged,
            texts: flagged_texts,
        };

        info!(
            subsystem = "engine",
            component = "pipeline",
            op = "run",
            item_count = batch.items.len(),
            fragment_count = report.fragment_count,
            flagged_count = report.flagged.len(),
            persisted_count = delta.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch processed"
        );

        Ok(BatchOutcome { fragments, report })
    }

    /// Segment and sign every item; rejects the batch on the first bad text.
    fn sign_batch(&self, batch: &InputBatch) -> Result<Vec<SignedText>> {
        let mut seen = HashSet::with_capacity(batch.items.len());
        let mut texts = Vec::with_capacity(batch.items.len());

        for item in &batch.items {
            let text_id = item.id.unwrap_or_else(Uuid::now_v7);
            if !seen.insert(text_id) {
                return Err(Error::InvalidInput(format!(
                    "duplicate text id in batch: {}",
                    text_id
                )));
            }

            let fragments = segment_text(
                self.generator.normalizer(),
                text_id,
                &item.text,
                self.config.max_series,
            )?
            .into_iter()
            .map(|fragment| SignedFragment {
                signature: self.generator.generate(&fragment.sentences),
                fragment,
            })
            .collect();

            texts.push(SignedText {
                text_id,
                text: item.text.clone(),
                label: item.label,
                fragments,
            });
        }
        Ok(texts)
    }
}
