use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use labops_catalogs::ReferenceKind;
use labops_core::KitId;
use labops_kits::{Kit, KitAgreement, KitChildren, KitExam, KitLocation};

use super::r#trait::{KitFilter, KitStore, KitStoreError, KitTransaction};

/// Row counts per table, for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSizes {
    pub kits: usize,
    pub exams: usize,
    pub locations: usize,
    pub agreements: usize,
}

/// One write recorded by a transaction, replayed on commit.
#[derive(Debug, Clone)]
enum WriteOp {
    InsertKit(Kit),
    UpdateKit(Kit),
    ClearChildren(KitId, ReferenceKind),
    InsertExam(KitExam),
    InsertLocation(KitLocation),
    InsertAgreement(KitAgreement),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    kits: HashMap<KitId, Kit>,
    /// Unique index on `kits.code`.
    codes: HashMap<String, KitId>,
    exams: HashMap<KitId, Vec<KitExam>>,
    locations: HashMap<KitId, Vec<KitLocation>>,
    agreements: HashMap<KitId, Vec<KitAgreement>>,
}

impl Tables {
    /// Apply one write, enforcing the same constraints as the SQL schema.
    fn apply(&mut self, op: &WriteOp) -> Result<u64, KitStoreError> {
        match op {
            WriteOp::InsertKit(kit) => {
                if self.kits.contains_key(&kit.id) {
                    return Err(KitStoreError::unique(
                        "kits_pkey",
                        format!("kit {} already exists", kit.id),
                    ));
                }
                if self.codes.contains_key(&kit.code) {
                    return Err(KitStoreError::unique(
                        "kits_code_key",
                        format!("code {} already exists", kit.code),
                    ));
                }
                self.codes.insert(kit.code.clone(), kit.id);
                self.kits.insert(kit.id, kit.clone());
                Ok(1)
            }
            WriteOp::UpdateKit(kit) => {
                let Some(existing) = self.kits.get(&kit.id) else {
                    return Ok(0);
                };
                if existing.code != kit.code {
                    if self.codes.contains_key(&kit.code) {
                        return Err(KitStoreError::unique(
                            "kits_code_key",
                            format!("code {} already exists", kit.code),
                        ));
                    }
                    self.codes.remove(&existing.code);
                    self.codes.insert(kit.code.clone(), kit.id);
                }
                self.kits.insert(kit.id, kit.clone());
                Ok(1)
            }
            WriteOp::ClearChildren(kit_id, kind) => {
                let removed = match kind {
                    ReferenceKind::Exam => self.exams.remove(kit_id).map(|v| v.len()),
                    ReferenceKind::Location => self.locations.remove(kit_id).map(|v| v.len()),
                    ReferenceKind::Agreement => self.agreements.remove(kit_id).map(|v| v.len()),
                };
                Ok(removed.unwrap_or(0) as u64)
            }
            WriteOp::InsertExam(row) => {
                self.ensure_kit(row.kit_id, "kit_exams_kit_id_fkey")?;
                let rows = self.exams.entry(row.kit_id).or_default();
                if rows.iter().any(|r| r.exam_id == row.exam_id) {
                    return Err(KitStoreError::unique(
                        "kit_exams_kit_id_exam_id_key",
                        format!("exam {} already linked to kit {}", row.exam_id, row.kit_id),
                    ));
                }
                rows.push(row.clone());
                Ok(1)
            }
            WriteOp::InsertLocation(row) => {
                self.ensure_kit(row.kit_id, "kit_locations_kit_id_fkey")?;
                let rows = self.locations.entry(row.kit_id).or_default();
                if rows.iter().any(|r| r.location_id == row.location_id) {
                    return Err(KitStoreError::unique(
                        "kit_locations_kit_id_location_id_key",
                        format!(
                            "location {} already linked to kit {}",
                            row.location_id, row.kit_id
                        ),
                    ));
                }
                rows.push(row.clone());
                Ok(1)
            }
            WriteOp::InsertAgreement(row) => {
                self.ensure_kit(row.kit_id, "kit_agreements_kit_id_fkey")?;
                let rows = self.agreements.entry(row.kit_id).or_default();
                if rows.iter().any(|r| r.agreement_id == row.agreement_id) {
                    return Err(KitStoreError::unique(
                        "kit_agreements_kit_id_agreement_id_key",
                        format!(
                            "agreement {} already linked to kit {}",
                            row.agreement_id, row.kit_id
                        ),
                    ));
                }
                rows.push(row.clone());
                Ok(1)
            }
        }
    }

    fn ensure_kit(&self, kit_id: KitId, constraint: &str) -> Result<(), KitStoreError> {
        if self.kits.contains_key(&kit_id) {
            Ok(())
        } else {
            Err(KitStoreError::backend(format!(
                "foreign key {constraint} violated: kit {kit_id} does not exist"
            )))
        }
    }

    /// Delete a kit and cascade to its children.
    fn delete_kit(&mut self, id: KitId) -> bool {
        let Some(kit) = self.kits.remove(&id) else {
            return false;
        };
        self.codes.remove(&kit.code);
        self.exams.remove(&id);
        self.locations.remove(&id);
        self.agreements.remove(&id);
        true
    }

    fn children(&self, id: KitId) -> KitChildren {
        KitChildren {
            exams: self.exams.get(&id).cloned().unwrap_or_default(),
            locations: self.locations.get(&id).cloned().unwrap_or_default(),
            agreements: self.agreements.get(&id).cloned().unwrap_or_default(),
        }
    }

    fn matches(&self, kit: &Kit, filter: KitFilter) -> bool {
        match filter {
            KitFilter::All => true,
            KitFilter::Status(status) => kit.status == status,
            KitFilter::Location(location_id) => self
                .locations
                .get(&kit.id)
                .is_some_and(|rows| rows.iter().any(|r| r.location_id == location_id)),
            KitFilter::Agreement(agreement_id) => self
                .agreements
                .get(&kit.id)
                .is_some_and(|rows| rows.iter().any(|r| r.agreement_id == agreement_id)),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    open_transactions: AtomicUsize,
}

impl Shared {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, KitStoreError> {
        self.tables
            .read()
            .map_err(|_| KitStoreError::backend("lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, KitStoreError> {
        self.tables
            .write()
            .map_err(|_| KitStoreError::backend("lock poisoned"))
    }
}

/// In-memory kit store with real transaction semantics.
///
/// Intended for tests/dev. Not optimized for performance.
///
/// A transaction works on a private copy of the tables and records every
/// write. On commit the log is replayed against the *current* committed state
/// under the write lock, so constraints are re-checked against whatever other
/// transactions committed in the meantime; the result is swapped in only if
/// every write succeeds.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKitStore {
    shared: Arc<Shared>,
}

impl InMemoryKitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions begun and not yet released.
    pub fn open_transactions(&self) -> usize {
        self.shared.open_transactions.load(Ordering::SeqCst)
    }

    pub fn table_sizes(&self) -> TableSizes {
        let Ok(tables) = self.shared.read() else {
            return TableSizes::default();
        };
        TableSizes {
            kits: tables.kits.len(),
            exams: tables.exams.values().map(Vec::len).sum(),
            locations: tables.locations.values().map(Vec::len).sum(),
            agreements: tables.agreements.values().map(Vec::len).sum(),
        }
    }
}

#[async_trait]
impl KitStore for InMemoryKitStore {
    type Tx = InMemoryKitTransaction;

    async fn begin(&self) -> Result<Self::Tx, KitStoreError> {
        let working = self.shared.read()?.clone();
        self.shared.open_transactions.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryKitTransaction {
            shared: self.shared.clone(),
            working,
            log: Vec::new(),
        })
    }

    async fn find_kit(&self, id: KitId) -> Result<Option<Kit>, KitStoreError> {
        Ok(self.shared.read()?.kits.get(&id).cloned())
    }

    async fn find_kit_by_code(&self, code: &str) -> Result<Option<Kit>, KitStoreError> {
        let tables = self.shared.read()?;
        Ok(tables
            .codes
            .get(code)
            .and_then(|id| tables.kits.get(id))
            .cloned())
    }

    async fn list_kits(&self, filter: KitFilter) -> Result<Vec<Kit>, KitStoreError> {
        let tables = self.shared.read()?;
        let mut kits: Vec<Kit> = tables
            .kits
            .values()
            .filter(|kit| tables.matches(kit, filter))
            .cloned()
            .collect();
        kits.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(kits)
    }

    async fn load_children(&self, id: KitId) -> Result<KitChildren, KitStoreError> {
        Ok(self.shared.read()?.children(id))
    }

    async fn save_kit(&self, kit: &Kit) -> Result<bool, KitStoreError> {
        let written = self.shared.write()?.apply(&WriteOp::UpdateKit(kit.clone()))?;
        Ok(written > 0)
    }

    async fn delete_kit(&self, id: KitId) -> Result<bool, KitStoreError> {
        Ok(self.shared.write()?.delete_kit(id))
    }
}

/// Transaction handle of [`InMemoryKitStore`].
#[derive(Debug)]
pub struct InMemoryKitTransaction {
    shared: Arc<Shared>,
    working: Tables,
    log: Vec<WriteOp>,
}

impl InMemoryKitTransaction {
    fn record(&mut self, op: WriteOp) -> Result<u64, KitStoreError> {
        let affected = self.working.apply(&op)?;
        self.log.push(op);
        Ok(affected)
    }
}

impl Drop for InMemoryKitTransaction {
    fn drop(&mut self) {
        self.shared.open_transactions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KitTransaction for InMemoryKitTransaction {
    async fn insert_kit(&mut self, kit: &Kit) -> Result<(), KitStoreError> {
        self.record(WriteOp::InsertKit(kit.clone())).map(|_| ())
    }

    async fn update_kit(&mut self, kit: &Kit) -> Result<bool, KitStoreError> {
        self.record(WriteOp::UpdateKit(kit.clone()))
            .map(|written| written > 0)
    }

    async fn clear_children(
        &mut self,
        kit_id: KitId,
        kind: ReferenceKind,
    ) -> Result<u64, KitStoreError> {
        self.record(WriteOp::ClearChildren(kit_id, kind))
    }

    async fn insert_exam(&mut self, row: &KitExam) -> Result<(), KitStoreError> {
        self.record(WriteOp::InsertExam(row.clone())).map(|_| ())
    }

    async fn insert_location(&mut self, row: &KitLocation) -> Result<(), KitStoreError> {
        self.record(WriteOp::InsertLocation(row.clone())).map(|_| ())
    }

    async fn insert_agreement(&mut self, row: &KitAgreement) -> Result<(), KitStoreError> {
        self.record(WriteOp::InsertAgreement(row.clone())).map(|_| ())
    }

    async fn commit(self) -> Result<(), KitStoreError> {
        let mut tables = self.shared.write()?;
        let mut next = tables.clone();
        for op in &self.log {
            next.apply(op)?;
        }
        *tables = next;
        Ok(())
    }

    async fn rollback(self) -> Result<(), KitStoreError> {
        Ok(())
    }
}
