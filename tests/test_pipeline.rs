use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use iv_ledger::classify::Regime;
use iv_ledger::ledger::{
    LedgerSchema, LedgerSnapshot, LedgerStore, MemoryStore, StoreError, VersionToken, data_records,
    empty_ledger,
};
use iv_ledger::model::{Symbol, ValidationError};
use iv_ledger::pipeline::{Pipeline, PipelineError};

// ── Fixtures ────────────────────────────────────────────────────────

fn scenario_a_body(date: &str) -> Value {
    json!({
        "symbol": "NIFTY",
        "date": date,
        "spot": 25020,
        "strike_step": 50,
        "option_chain": [
            {"strike": 24900, "ce_iv": 12.1, "pe_iv": 12.5, "ce_oi": 1000, "pe_oi": 1200},
            {"strike": 25000, "ce_iv": null, "pe_iv": 11.9, "ce_oi": 5000, "pe_oi": 4000},
            {"strike": 25100, "ce_iv": 13.0, "pe_iv": 13.4, "ce_oi": 800, "pe_oi": 900}
        ]
    })
}

/// Regime ledger with the given AVG_IV history, one row per day.
fn ledger_with_history(history: &[f64]) -> String {
    let mut text = empty_ledger(LedgerSchema::Regime).unwrap();
    for (i, avg) in history.iter().enumerate() {
        text.push_str(&format!(
            "2023-12-{:02},NIFTY,25000.0,25000,{avg},{avg},{avg},100,100,,\r\n",
            i + 1
        ));
    }
    text
}

fn memory_store(text: String) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_ledgers([
        (Symbol::Nifty, text),
        (Symbol::BankNifty, empty_ledger(LedgerSchema::Regime).unwrap()),
    ]))
}

// ── Mock stores ─────────────────────────────────────────────────────

/// Store whose document changes between every read and write.
struct RacingStore {
    text: String,
    writes: AtomicUsize,
}

#[async_trait]
impl LedgerStore for RacingStore {
    async fn read(&self, _symbol: Symbol) -> Result<LedgerSnapshot, StoreError> {
        Ok(LedgerSnapshot {
            text: self.text.clone(),
            version: VersionToken("stale".into()),
        })
    }

    async fn write(
        &self,
        symbol: Symbol,
        _text: &str,
        _version: &VersionToken,
        _message: &str,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Conflict(symbol))
    }

    fn describe(&self) -> String {
        "racing".into()
    }
}

/// Store that must never be touched.
struct UnreachableStore;

#[async_trait]
impl LedgerStore for UnreachableStore {
    async fn read(&self, _symbol: Symbol) -> Result<LedgerSnapshot, StoreError> {
        Err(StoreError::Transport("read should not happen".into()))
    }

    async fn write(
        &self,
        _symbol: Symbol,
        _text: &str,
        _version: &VersionToken,
        _message: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Transport("write should not happen".into()))
    }

    fn describe(&self) -> String {
        "unreachable".into()
    }
}

// ── Strike selection through the pipeline ───────────────────────────

#[tokio::test]
async fn invalid_atm_falls_back_to_first_equidistant_strike() {
    let store = memory_store(empty_ledger(LedgerSchema::Regime).unwrap());
    let pipeline = Pipeline::new(store.clone(), LedgerSchema::Regime);

    let out = pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap();

    assert_eq!(out.atm, 25000);
    assert_eq!(out.strike, 24900);
    assert_eq!(out.avg_iv, 12.3);
    assert_eq!((out.ce_oi, out.pe_oi), (1000, 1200));

    let ranking = out.ranking.unwrap();
    assert_eq!(ranking.iv_percentile, None);
    assert_eq!(ranking.iv_regime, Regime::Na);

    let text = store.text(Symbol::Nifty).await.unwrap();
    let rows = data_records(&text);
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][3], "24900");
    assert_eq!(&rows[0][6], "12.3");
    assert_eq!(&rows[0][9], "");
    assert_eq!(&rows[0][10], "NA");
}

#[tokio::test]
async fn empty_chain_is_rejected_before_touching_the_store() {
    let pipeline = Pipeline::new(Arc::new(UnreachableStore), LedgerSchema::Regime);
    let mut body = scenario_a_body("2024-01-05");
    body["option_chain"] = json!([]);

    let err = pipeline.process_request(&body).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoValidStrike { atm: 25000 }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn invalid_request_is_a_validation_error() {
    let pipeline = Pipeline::new(Arc::new(UnreachableStore), LedgerSchema::Regime);
    let mut body = scenario_a_body("2024-01-05");
    body.as_object_mut().unwrap().remove("spot");

    let err = pipeline.process_request(&body).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(err.to_string(), "Missing field: spot");
}

#[tokio::test]
async fn huge_spot_is_rejected_not_overflowed() {
    let pipeline = Arc::new(Pipeline::new(Arc::new(UnreachableStore), LedgerSchema::Regime));
    let mut body = scenario_a_body("2024-01-05");
    body["spot"] = json!(1e300);

    // Run on its own task so an arithmetic panic would surface as a JoinError
    let task = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process_request(&body).await }
    });
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::InvalidField { field: "spot", .. })
    ));
}

// ── Classification against ledger history ───────────────────────────

#[tokio::test]
async fn ranks_against_trailing_history() {
    // 18 of 30 readings at or below 12.3
    let mut history = vec![10.0; 18];
    history.extend(vec![15.0; 12]);
    let store = memory_store(ledger_with_history(&history));
    let pipeline = Pipeline::new(store.clone(), LedgerSchema::Regime);

    let out = pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap();
    let ranking = out.ranking.unwrap();
    assert_eq!(ranking.iv_percentile, Some(60.0));
    assert_eq!(ranking.iv_regime, Regime::NormalHigh);

    let text = store.text(Symbol::Nifty).await.unwrap();
    let last = data_records(&text).pop().unwrap();
    assert_eq!(&last[9], "60.0");
    assert_eq!(&last[10], "NORMAL_HIGH");
}

#[tokio::test]
async fn only_the_last_thirty_readings_count() {
    // Five old low readings fall out of the window
    let mut history = vec![1.0; 5];
    history.extend(vec![20.0; 30]);
    let store = memory_store(ledger_with_history(&history));
    let pipeline = Pipeline::new(store, LedgerSchema::Regime);

    let out = pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap();
    let ranking = out.ranking.unwrap();
    assert_eq!(ranking.iv_percentile, Some(0.0));
    assert_eq!(ranking.iv_regime, Regime::Compression);
}

#[tokio::test]
async fn classify_false_leaves_ranking_out() {
    let store = memory_store(ledger_with_history(&[10.0, 11.0]));
    let pipeline = Pipeline::new(store.clone(), LedgerSchema::Regime);
    let mut body = scenario_a_body("2024-01-05");
    body["classify"] = json!(false);

    let out = pipeline.process_request(&body).await.unwrap();
    assert!(out.ranking.is_none());

    let json = serde_json::to_value(&out).unwrap();
    assert!(json.get("iv_percentile").is_none());
    assert!(json.get("iv_regime").is_none());

    let text = store.text(Symbol::Nifty).await.unwrap();
    let last = data_records(&text).pop().unwrap();
    assert_eq!(last.len(), 11);
    assert_eq!(&last[9], "");
    assert_eq!(&last[10], "");
}

// ── Upsert and commit ───────────────────────────────────────────────

#[tokio::test]
async fn resubmitting_a_date_replaces_its_row() {
    let store = memory_store(ledger_with_history(&[10.0, 11.0]));
    let pipeline = Pipeline::new(store.clone(), LedgerSchema::Regime);

    pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap();

    let mut corrected = scenario_a_body("2024-01-05");
    corrected["option_chain"][0]["ce_iv"] = json!(14.1);
    let out = pipeline.process_request(&corrected).await.unwrap();
    assert_eq!(out.avg_iv, 13.3);
    // History excludes the row being replaced
    assert_eq!(out.ranking.unwrap().iv_percentile, Some(100.0));

    let text = store.text(Symbol::Nifty).await.unwrap();
    let rows = data_records(&text);
    assert_eq!(rows.len(), 3);
    let keyed: Vec<_> = rows.iter().filter(|r| &r[0] == "2024-01-05").collect();
    assert_eq!(keyed.len(), 1);
    assert_eq!(&rows[2][0], "2024-01-05");
    assert_eq!(&rows[2][6], "13.3");
}

#[tokio::test]
async fn legacy_schema_writes_nine_columns() {
    let store = memory_store(empty_ledger(LedgerSchema::Legacy).unwrap());
    let pipeline = Pipeline::new(store.clone(), LedgerSchema::Legacy);

    let out = pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap();
    assert!(out.ranking.is_some());

    let text = store.text(Symbol::Nifty).await.unwrap();
    assert!(text.starts_with("Date,Symbol,Spot,Strike,CE_IV,PE_IV,AVG_IV,CE_OI,PE_OI\r\n"));
    assert_eq!(data_records(&text)[0].len(), 9);
}

#[tokio::test]
async fn conflict_is_retryable_and_writes_once() {
    let store = Arc::new(RacingStore {
        text: empty_ledger(LedgerSchema::Regime).unwrap(),
        writes: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::new(store.clone(), LedgerSchema::Regime);

    let err = pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::LedgerConflict(Symbol::Nifty)));
    assert!(err.is_retryable());
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_version_leaves_ledger_unchanged() {
    let original = ledger_with_history(&[10.0]);
    let store = memory_store(original.clone());
    let stale = store.read(Symbol::Nifty).await.unwrap();

    // Another writer commits first
    store
        .write(Symbol::Nifty, &original, &stale.version, "concurrent")
        .await
        .unwrap();
    let after_concurrent = store.text(Symbol::Nifty).await.unwrap();

    let err = store
        .write(Symbol::Nifty, "garbage", &stale.version, "late")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(Symbol::Nifty)));
    assert_eq!(store.text(Symbol::Nifty).await.unwrap(), after_concurrent);
}

#[tokio::test]
async fn missing_ledger_is_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(store, LedgerSchema::Regime);

    let err = pipeline
        .process_request(&scenario_a_body("2024-01-05"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::LedgerUnavailable(Symbol::Nifty)));
}
