//! Reference corpus export and import.
//!
//! Samples are exchanged as a JSON array of [`ReferenceSample`] records,
//! which is the same shape the store persists.

use std::path::Path;

use tracing::{info, warn};

use etalon_core::{Error, ReferenceSample, ReferenceStore, Result};

/// Read the corpus, optionally restricted to one theme.
pub async fn export_corpus(
    store: &dyn ReferenceStore,
    theme: Option<&str>,
) -> Result<Vec<ReferenceSample>> {
    match theme {
        Some(theme) => store.get_theme(theme).await,
        None => store.get_all().await,
    }
}

/// Check a sample before it is written to the store.
pub fn validate_sample(sample: &ReferenceSample) -> Result<()> {
    if sample.part < 0 {
        return Err(Error::InvalidInput(format!(
            "sample {}: part must be non-negative, got {}",
            sample.key(),
            sample.part
        )));
    }
    if !sample.weight.is_finite() {
        return Err(Error::InvalidInput(format!(
            "sample {}: weight must be finite",
            sample.key()
        )));
    }
    Ok(())
}

/// Validate all samples, then upsert them. Nothing is written if any sample
/// is rejected.
pub async fn import_corpus(store: &dyn ReferenceStore, samples: &[ReferenceSample]) -> Result<u64> {
    for sample in samples {
        validate_sample(sample)?;
    }
    let changed = store.upsert_all(samples).await?;
    info!(
        subsystem = "engine",
        component = "corpus",
        op = "import",
        sample_count = samples.len(),
        changed,
        "Corpus imported"
    );
    Ok(changed)
}

/// Write the corpus to a JSON file. Returns the number of samples written.
pub async fn dump_json(
    store: &dyn ReferenceStore,
    theme: Option<&str>,
    path: impl AsRef<Path>,
) -> Result<usize> {
    let path = path.as_ref();
    let samples = export_corpus(store, theme).await?;
    let body = serde_json::to_vec_pretty(&samples)?;
    tokio::fs::write(path, body).await?;
    info!(
        subsystem = "engine",
        component = "corpus",
        op = "dump",
        path = %path.display(),
        sample_count = samples.len(),
        "Corpus written"
    );
    Ok(samples.len())
}

/// Load samples from a JSON file into the store.
pub async fn load_json(store: &dyn ReferenceStore, path: impl AsRef<Path>) -> Result<u64> {
    let body = tokio::fs::read(path.as_ref()).await?;
    let samples: Vec<ReferenceSample> = serde_json::from_slice(&body)?;
    import_corpus(store, &samples).await
}

/// Load a seed corpus at startup. A missing file seeds nothing; a malformed
/// one is an error.
pub async fn seed_from_file(store: &dyn ReferenceStore, path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await? {
        warn!(
            subsystem = "engine",
            component = "corpus",
            op = "seed",
            path = %path.display(),
            "Corpus seed file not found, starting from the stored corpus"
        );
        return Ok(0);
    }
    load_json(store, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use etalon_db::test_fixtures::reference_sample;
    use etalon_db::InMemoryReferenceStore;
    use uuid::Uuid;

    #[test]
    fn test_validate_rejects_negative_part() {
        let mut sample = reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], 1.0);
        assert!(validate_sample(&sample).is_ok());
        sample.part = -1;
        assert!(matches!(
            validate_sample(&sample),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_weight() {
        let sample = reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], f64::INFINITY);
        assert!(validate_sample(&sample).is_err());
        let sample = reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], f64::NAN);
        assert!(validate_sample(&sample).is_err());
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing() {
        let store = InMemoryReferenceStore::new();
        let good = reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], 1.0);
        let mut bad = reference_sample(Uuid::new_v4(), 0, &[&["окно"]], 0.0);
        bad.part = -3;

        assert!(import_corpus(&store, &[good, bad]).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dump_and_load_file() {
        let source = InMemoryReferenceStore::new();
        let mut themed = reference_sample(Uuid::new_v4(), 1, &[&["кошка", "окно"]], 1.0);
        themed.theme = Some("animals".to_string());
        let plain = reference_sample(Uuid::new_v4(), 0, &[&["река"]], 0.0);
        source.upsert_all(&[themed.clone(), plain]).await.unwrap();

        let path = std::env::temp_dir().join(format!("etalon-corpus-{}.json", Uuid::new_v4()));
        let written = dump_json(&source, Some("animals"), &path).await.unwrap();
        assert_eq!(written, 1);

        let target = InMemoryReferenceStore::new();
        assert_eq!(load_json(&target, &path).await.unwrap(), 1);
        assert_eq!(target.get_all().await.unwrap(), vec![themed]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let store = InMemoryReferenceStore::new();
        let path = std::env::temp_dir().join(format!("etalon-missing-{}.json", Uuid::new_v4()));
        assert!(matches!(load_json(&store, &path).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_seed_from_file() {
        let store = InMemoryReferenceStore::new();
        let missing = std::env::temp_dir().join(format!("etalon-seed-{}.json", Uuid::new_v4()));
        assert_eq!(seed_from_file(&store, &missing).await.unwrap(), 0);

        let sample = reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], 1.0);
        let seed = std::env::temp_dir().join(format!("etalon-seed-{}.json", Uuid::new_v4()));
        std::fs::write(&seed, serde_json::to_vec(&vec![sample.clone()]).unwrap()).unwrap();
        assert_eq!(seed_from_file(&store, &seed).await.unwrap(), 1);
        assert_eq!(store.get_all().await.unwrap(), vec![sample]);

        std::fs::write(&seed, b"{not json").unwrap();
        assert!(matches!(
            seed_from_file(&store, &seed).await,
            Err(Error::Serialization(_))
        ));
        let _ = std::fs::remove_file(&seed);
    }
}
