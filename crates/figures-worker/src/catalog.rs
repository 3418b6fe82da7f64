//! Subject catalog: registration, seeding and activation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use figures_models::{
    now_millis, NewSubject, SeedSummary, Subject, SubjectId, SubjectStatus,
};
use figures_store::{StoreError, SubjectStore};

use crate::error::{WorkerError, WorkerResult};
use crate::lock_manager::SubjectLockManager;

/// Sample figures loaded by `seed` when no explicit list is given.
const DEFAULT_FIGURES: [(&str, &str); 10] = [
    ("織田信長", "戦国時代の武将。天下統一を目指し、桶狭間の戦いで今川義元を破る。本能寺の変で倒れる。"),
    ("豊臣秀吉", "戦国時代から安土桃山時代の武将。織田信長に仕え、天下統一を果たす。"),
    ("徳川家康", "江戸幕府の初代征夷大将軍。関ヶ原の戦いで勝利し、260年続く江戸時代を築く。"),
    ("坂本龍馬", "幕末の志士。薩長同盟の仲介や大政奉還に尽力。近代日本の礎を築いた。"),
    ("西郷隆盛", "幕末から明治時代の武士・軍人・政治家。明治維新の立役者の一人。"),
    ("伊達政宗", "戦国時代から江戸時代初期の武将。仙台藩の初代藩主。独眼竜として知られる。"),
    ("武田信玄", "戦国時代の武将。甲斐国の守護大名。風林火山の旗印で知られる。"),
    ("上杉謙信", "戦国時代の武将。越後国の守護代。軍神と称される。川中島の戦いで武田信玄と対峙。"),
    ("真田幸村", "安土桃山時代から江戸時代初期の武将。大坂の陣で徳川家康を追い詰めた。"),
    ("源義経", "平安時代末期の武将。兄・頼朝を助けて平家を滅ぼすが、後に追われる身となる。"),
];

/// The built-in sample catalog, every entry immediately claimable.
pub fn default_catalog() -> Vec<NewSubject> {
    DEFAULT_FIGURES
        .iter()
        .map(|(name, bio)| NewSubject {
            status: Some(SubjectStatus::Available),
            bio: Some(bio.to_string()),
            ..NewSubject::named(*name)
        })
        .collect()
}

#[derive(Clone)]
pub struct SubjectCatalog {
    store: Arc<dyn SubjectStore>,
    locks: SubjectLockManager,
}

impl SubjectCatalog {
    pub fn new(store: Arc<dyn SubjectStore>, locks: SubjectLockManager) -> Self {
        Self { store, locks }
    }

    /// Every subject, ordered by id.
    pub async fn list(&self) -> WorkerResult<Vec<Subject>> {
        Ok(self.store.list().await?)
    }

    /// Register one subject under the next free ordinal id.
    pub async fn register(&self, input: NewSubject) -> WorkerResult<Subject> {
        input.checked_status()?;
        let existing = self.store.list().await?;
        let name = input.display_name.trim();
        if existing.iter().any(|s| s.display_name == name) {
            return Err(WorkerError::invalid_input(format!(
                "subject '{}' is already registered",
                name
            )));
        }
        self.insert_next(input, &existing).await
    }

    /// Register every entry whose display name is not yet in the catalog.
    pub async fn seed(&self, inputs: Vec<NewSubject>) -> WorkerResult<SeedSummary> {
        for input in &inputs {
            input.checked_status()?;
        }

        let mut existing = self.store.list().await?;
        let mut names: HashSet<String> =
            existing.iter().map(|s| s.display_name.clone()).collect();

        let mut summary = SeedSummary::default();
        for input in inputs {
            let name = input.display_name.trim().to_string();
            if !names.insert(name.clone()) {
                info!(display_name = %name, "Skipped (exists)");
                summary.skipped += 1;
                continue;
            }
            let subject = self.insert_next(input, &existing).await?;
            existing.push(subject);
            summary.added += 1;
        }

        info!(added = summary.added, skipped = summary.skipped, "Seed finished");
        Ok(summary)
    }

    pub async fn activate(&self, id: &SubjectId) -> WorkerResult<Subject> {
        self.locks.activate(id).await
    }

    async fn insert_next(&self, input: NewSubject, existing: &[Subject]) -> WorkerResult<Subject> {
        let next_ordinal = existing
            .iter()
            .filter_map(|s| s.id.ordinal())
            .max()
            .map(|highest| highest + 1)
            .unwrap_or(1);
        let subject = input.into_subject(SubjectId::from_ordinal(next_ordinal), now_millis())?;

        match self.store.insert(&subject).await {
            Ok(()) => {
                info!(subject_id = %subject.id, display_name = %subject.display_name, status = %subject.status, "Registered subject");
                Ok(subject)
            }
            Err(StoreError::AlreadyExists(id)) => Err(WorkerError::invalid_input(format!(
                "subject id {} is already taken",
                id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
