//! Core data models for etalon.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// SIGNATURES
// =============================================================================

/// One de-duplicated set of normalized word forms.
///
/// Held sorted so that encoding is deterministic.
pub type FeatureSet = BTreeSet<String>;

/// One signature level: an ordered sequence of feature sets.
pub type SignatureLevel = Vec<FeatureSet>;

/// Signature granularity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Per-sentence lemma sets.
    First,
    /// Noun/verb sets over sentence pairs.
    Second,
    /// Noun sets over sentence triples.
    Third,
}

impl Order {
    /// All levels, finest first.
    pub const ALL: [Order; 3] = [Order::First, Order::Second, Order::Third];

    /// Aggregation weight of this level.
    pub fn weight(self) -> f64 {
        match self {
            Order::First => defaults::ORDER1_WEIGHT,
            Order::Second => defaults::ORDER2_WEIGHT,
            Order::Third => defaults::ORDER3_WEIGHT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Order::First => "order1",
            Order::Second => "order2",
            Order::Third => "order3",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-level linguistic fingerprint of a fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub order1: SignatureLevel,
    pub order2: SignatureLevel,
    pub order3: SignatureLevel,
}

impl Signature {
    /// Borrow the sets of one level.
    pub fn level(&self, order: Order) -> &SignatureLevel {
        match order {
            Order::First => &self.order1,
            Order::Second => &self.order2,
            Order::Third => &self.order3,
        }
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// Ground-truth marker of an input text.
///
/// On the wire this is the string `"?"` (unlabeled) or a base-10 integer,
/// either as a string (`"1"`) or a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LabelRepr", into = "String")]
pub enum Label {
    /// `"?"`: the text is to be scored.
    Unlabeled,
    /// Trusted score applied to every fragment of the text.
    Score(i64),
}

impl Label {
    pub fn is_labeled(&self) -> bool {
        matches!(self, Label::Score(_))
    }

    /// The trusted weight, if labeled.
    pub fn weight(&self) -> Option<f64> {
        match self {
            Label::Unlabeled => None,
            Label::Score(score) => Some(*score as f64),
        }
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed == "?" {
            return Ok(Label::Unlabeled);
        }
        trimmed
            .parse::<i64>()
            .map(Label::Score)
            .map_err(|_| Error::InvalidLabel(s.to_string()))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Unlabeled => f.write_str("?"),
            Label::Score(score) => write!(f, "{}", score),
        }
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelRepr {
    Text(String),
    Number(i64),
}

impl TryFrom<LabelRepr> for Label {
    type Error = Error;

    fn try_from(repr: LabelRepr) -> Result<Self> {
        match repr {
            LabelRepr::Text(s) => s.parse(),
            LabelRepr::Number(n) => Ok(Label::Score(n)),
        }
    }
}

/// One text submitted for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputItem {
    /// Text identifier; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub text: String,
    pub label: Label,
}

impl InputItem {
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            id: None,
            text: text.into(),
            label,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
}

/// An ordered batch of input items, optionally scoped to a corpus theme.
///
/// Accepts either a bare JSON array of items or `{"theme": .., "items": [..]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BatchRepr")]
pub struct InputBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub items: Vec<InputItem>,
}

impl InputBatch {
    pub fn new(items: Vec<InputItem>) -> Self {
        Self { theme: None, items }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchRepr {
    Items(Vec<InputItem>),
    Scoped {
        #[serde(default)]
        theme: Option<String>,
        items: Vec<InputItem>,
    },
}

impl From<BatchRepr> for InputBatch {
    fn from(repr: BatchRepr) -> Self {
        match repr {
            BatchRepr::Items(items) => InputBatch { theme: None, items },
            BatchRepr::Scoped { theme, items } => InputBatch { theme, items },
        }
    }
}

// =============================================================================
// FRAGMENTS
// =============================================================================

/// Identity of a fragment: `(text_id, part)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentKey {
    pub text_id: Uuid,
    pub part: i32,
}

impl FragmentKey {
    pub fn new(text_id: Uuid, part: i32) -> Self {
        Self { text_id, part }
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.text_id, self.part)
    }
}

/// A contiguous run of sentences from one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text_id: Uuid,
    pub part: i32,
    pub sentences: Vec<String>,
}

impl Fragment {
    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.text_id, self.part)
    }
}

/// Whether a fragment carries ground truth or is to be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// From a labeled text; becomes reference data as-is.
    Predefined,
    /// From an unlabeled text; scored against the reference set.
    Undefined,
}

/// Persisted reference fragment ("etalon").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSample {
    pub id: Uuid,
    pub part: i32,
    pub order1: SignatureLevel,
    pub order2: SignatureLevel,
    pub order3: SignatureLevel,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl ReferenceSample {
    /// Build a sample from a fragment key and its signature.
    pub fn from_signature(
        key: FragmentKey,
        signature: Signature,
        weight: f64,
        theme: Option<String>,
    ) -> Self {
        Self {
            id: key.text_id,
            part: key.part,
            order1: signature.order1,
            order2: signature.order2,
            order3: signature.order3,
            weight,
            theme,
        }
    }

    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.id, self.part)
    }

    /// Borrow the sets of one level.
    pub fn level(&self, order: Order) -> &SignatureLevel {
        match order {
            Order::First => &self.order1,
            Order::Second => &self.order2,
            Order::Third => &self.order3,
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Best ratio found at each signature level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRatios {
    pub order1: f64,
    pub order2: f64,
    pub order3: f64,
}

impl LevelRatios {
    pub fn get(&self, order: Order) -> f64 {
        match order {
            Order::First => self.order1,
            Order::Second => self.order2,
            Order::Third => self.order3,
        }
    }
}

/// Every fragment processed by one invocation, with its final weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFragment {
    pub text_id: Uuid,
    pub part: i32,
    pub kind: FragmentKind,
    pub weight: f64,
    /// Per-level ratios; present for undefined fragments only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratios: Option<LevelRatios>,
}

impl ScoredFragment {
    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.text_id, self.part)
    }
}

/// A fragment whose weight exceeded the similarity border.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedFragment {
    pub text_id: Uuid,
    pub part: i32,
    pub weight: f64,
    /// The fragment's sentences, for display.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sentences: Vec<String>,
}

/// A submitted text containing at least one flagged fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedText {
    pub text_id: Uuid,
    pub text: String,
}

/// Result returned to the caller or queue acknowledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub flagged: Vec<FlaggedFragment>,
    pub texts: Vec<FlaggedText>,
    pub fragment_count: usize,
}

/// Full outcome of one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub fragments: Vec<ScoredFragment>,
    pub report: BatchReport,
}

impl BatchOutcome {
    /// Look up a processed fragment by key.
    pub fn fragment(&self, key: FragmentKey) -> Option<&ScoredFragment> {
        self.fragments.iter().find(|f| f.key() == key)
    }
}

// =============================================================================
// QUEUE
// =============================================================================

/// Lifecycle state of a queued analysis batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Running => "running",
            MessageStatus::Completed => "completed",
            MessageStatus::Failed => "failed",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "running" => Ok(MessageStatus::Running),
            "completed" => Ok(MessageStatus::Completed),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(Error::Queue(format!("unknown message status: {}", other))),
        }
    }
}

/// A batch waiting in (or processed by) the ingestion queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMessage {
    pub id: Uuid,
    pub batch: InputBatch,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BatchReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
