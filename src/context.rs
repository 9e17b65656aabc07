//! Snap context — набор snapshot id, под которым уходит исходящая запись.
//!
//! Контекст неизменяем после построения и разделяется через `Arc` между
//! realm-владельцем, очередями cap_snap и исходящими записями. `snaps`
//! отсортирован по убыванию (новые впереди); код ниже по стеку полагается
//! на то, что `snaps[0]` — самый новый снапшот.

use std::sync::Arc;

/// Неизменяемый snapshot-контекст: sequence number плюс видимые realm'у
/// snap id, новые впереди.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapContext {
    /// Sequence number, назначенный сервером; трактуется монотонно.
    pub seq: u64,
    /// Snapshot id по убыванию.
    pub snaps: Vec<u64>,
}

impl SnapContext {
    /// Построить разделяемый контекст из неотсортированного набора снапшотов.
    pub fn new(seq: u64, mut snaps: Vec<u64>) -> Arc<Self> {
        snaps.sort_unstable_by(|a, b| b.cmp(a));
        Arc::new(Self { seq, snaps })
    }

    /// Бинарный поиск по убывающему вектору снапшотов.
    #[inline]
    pub fn contains(&self, snap: u64) -> bool {
        self.snaps
            .binary_search_by(|probe| snap.cmp(probe))
            .is_ok()
    }

    /// true, если `snaps` строго убывает (snap id уникальны).
    pub fn is_descending(&self) -> bool {
        self.snaps.windows(2).all(|w| w[0] > w[1])
    }
}
