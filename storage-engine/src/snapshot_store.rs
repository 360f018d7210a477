use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{Error, Result};
use songdo::ports::SnapshotRepository;
use songdo::realestate::DealSnapshot;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Deal snapshots stored as `realestate_{YYYY-MM-DD}.json` files in one directory
#[derive(Clone, Debug)]
pub struct JsonSnapshotRepository {
    dir: PathBuf,
}

impl JsonSnapshotRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("realestate_{}.json", date))
    }
}

#[async_trait]
impl SnapshotRepository for JsonSnapshotRepository {
    async fn load(&self, date: NaiveDate) -> Result<Option<DealSnapshot>> {
        let path = self.path_for(date);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Snapshot(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Snapshot(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &DealSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Snapshot(format!("failed to create {}: {}", self.dir.display(), e))
        })?;

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| Error::Snapshot(format!("failed to encode snapshot: {}", e)))?;

        // Write then rename so readers never see a half-written file
        let path = self.path_for(snapshot.date);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::Snapshot(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Snapshot(format!("failed to rename {}: {}", tmp.display(), e)))?;

        debug!("Saved snapshot {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songdo::realestate::Deal;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn deal() -> Deal {
        Deal {
            apartment_name: "센트럴파크".into(),
            area: "84.9㎡".into(),
            floor: "20층".into(),
            price: "9억원".into(),
            price_numeric: 90_000,
            deal_date: "2025-03-01".into(),
            build_year: "2011".into(),
            location: "송도동".into(),
            price_per_pyeong: "3,498만원".into(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonSnapshotRepository::new(dir.path().join("data"));
        let snapshot = DealSnapshot::new(date("2025-03-02"), vec![deal()], "test");

        repo.save(&snapshot).await.unwrap();

        assert!(repo.path_for(date("2025-03-02")).ends_with("realestate_2025-03-02.json"));
        let loaded = repo.load(date("2025-03-02")).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonSnapshotRepository::new(dir.path());

        assert!(repo.load(date("2025-01-01")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonSnapshotRepository::new(dir.path());
        std::fs::write(repo.path_for(date("2025-01-01")), b"{ not json").unwrap();

        let err = repo.load(date("2025-01-01")).await.unwrap_err();
        assert!(matches!(err, Error::Snapshot(_)));
    }
}
