//! Order evaluation.
//!
//! Each signature level is scored by its own [`OrderEvaluator`], which finds
//! the best comparator ratio of every candidate fragment against the same
//! level of every eligible reference. The three evaluators share no state:
//! each fills its own [`LevelScores`] map, and [`EvaluationPool`] runs them on
//! a bounded set of blocking workers and joins all three before the maps are
//! merged into per-fragment [`LevelRatios`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, trace};

use etalon_core::{
    defaults, Error, FragmentKey, LevelRatios, Order, ReferenceSample, Result, Signature,
    SignatureLevel,
};

use crate::comparator::ratio;

/// Best ratio of any candidate set against any set of any reference level.
///
/// 0 when there are no references; never above 1.
pub fn best_ratio<'a, I>(candidate: &SignatureLevel, references: I) -> f64
where
    I: IntoIterator<Item = &'a SignatureLevel>,
{
    let mut best = 0.0_f64;
    for reference in references {
        for reference_set in reference {
            for candidate_set in candidate {
                best = best.max(ratio(candidate_set, reference_set));
                if best >= 1.0 {
                    return 1.0;
                }
            }
        }
    }
    best.min(1.0)
}

/// An unlabeled fragment awaiting evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: FragmentKey,
    pub signature: Signature,
}

/// Best ratios of one signature level, keyed by fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelScores {
    order: Order,
    scores: BTreeMap<FragmentKey, f64>,
}

impl LevelScores {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            scores: BTreeMap::new(),
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn insert(&mut self, key: FragmentKey, score: f64) {
        self.scores.insert(key, score);
    }

    pub fn get(&self, key: &FragmentKey) -> Option<f64> {
        self.scores.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Scores one signature level.
#[derive(Debug, Clone, Copy)]
pub struct OrderEvaluator {
    order: Order,
}

impl OrderEvaluator {
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Score every candidate against references from other texts.
    pub fn evaluate(&self, candidates: &[Candidate], references: &[ReferenceSample]) -> LevelScores {
        let mut scores = LevelScores::new(self.order);
        for candidate in candidates {
            let eligible = references
                .iter()
                .filter(|r| r.id != candidate.key.text_id)
                .map(|r| r.level(self.order));
            let best = best_ratio(candidate.signature.level(self.order), eligible);
            trace!(
                subsystem = "engine",
                component = "evaluator",
                order = %self.order,
                text_id = %candidate.key.text_id,
                part = candidate.key.part,
                ratio = best,
                "Level scored"
            );
            scores.insert(candidate.key, best);
        }
        scores
    }
}

/// Merge per-level maps into per-fragment ratios. Missing entries read as 0.
pub fn join_levels(levels: Vec<LevelScores>) -> BTreeMap<FragmentKey, LevelRatios> {
    let mut merged: BTreeMap<FragmentKey, LevelRatios> = BTreeMap::new();
    for level in levels {
        for (key, score) in level.scores {
            let entry = merged.entry(key).or_default();
            match level.order {
                Order::First => entry.order1 = score,
                Order::Second => entry.order2 = score,
                Order::Third => entry.order3 = score,
            }
        }
    }
    merged
}

/// Bounded worker pool running the three order evaluators.
#[derive(Debug, Clone)]
pub struct EvaluationPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl Default for EvaluationPool {
    fn default() -> Self {
        Self::new(defaults::ORDER_WORKERS)
    }
}

impl EvaluationPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fork one evaluator per level, wait for all of them, then merge.
    pub async fn evaluate(
        &self,
        candidates: Arc<Vec<Candidate>>,
        references: Arc<Vec<ReferenceSample>>,
    ) -> Result<BTreeMap<FragmentKey, LevelRatios>> {
        if candidates.is_empty() {
            return Ok(BTreeMap::new());
        }
        let start = Instant::now();

        let mut handles = Vec::with_capacity(Order::ALL.len());
        for order in Order::ALL {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("evaluation pool closed: {}", e)))?;
            let candidates = Arc::clone(&candidates);
            let references = Arc::clone(&references);
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                OrderEvaluator::new(order).evaluate(&candidates, &references)
            }));
        }

        let mut levels = Vec::with_capacity(handles.len());
        for handle in handles {
            let level = handle
                .await
                .map_err(|e| Error::Internal(format!("order evaluator failed: {}", e)))?;
            levels.push(level);
        }

        debug!(
            subsystem = "engine",
            component = "evaluator",
            op = "evaluate",
            fragment_count = candidates.len(),
            reference_count = references.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Order evaluation joined"
        );
        Ok(join_levels(levels))
    }
}
