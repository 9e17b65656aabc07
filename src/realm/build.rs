//! realm/build — построение snap-контекста для realm.
//!
//! Контекст realm'а — это его собственные снапшоты, снапшоты прежних
//! родителей и срез родительского контекста начиная с `parent_since`,
//! отсортированные по убыванию, под `seq = max(realm.seq, seq контекста
//! родителя)`.
//!
//! Кэшированный контекст — мемоизация по ключу `(realm.seq, seq контекста
//! родителя)`: он валиден, пока `ctx.seq >= realm.seq` и, при наличии
//! родителя, `ctx.seq >= parent ctx.seq`. Перестройка поддерева идёт строго
//! сверху вниз, поэтому ребёнок всегда собирается по свежему контексту
//! родителя.

use std::sync::Arc;

use log::debug;

use super::RealmMap;
use crate::context::SnapContext;
use crate::metrics::record_context_built;

impl RealmMap {
    /// Построить snap-контекст для `ino`; если у родителя контекста нет —
    /// сначала построить родительский. No-op, пока кэш проходит version gate.
    pub(crate) fn build_context(&mut self, ino: u64) {
        let Some(realm) = self.get(ino) else {
            debug_assert!(false, "build_context on unknown realm {ino:#x}");
            return;
        };
        let parent = realm.parent;

        if let Some(p) = parent {
            let parent_built = self
                .get(p)
                .map(|r| r.cached_context.is_some())
                .unwrap_or(true);
            if !parent_built {
                self.build_context(p);
            }
        }
        let parent_ctx: Option<Arc<SnapContext>> = parent
            .and_then(|p| self.get(p))
            .and_then(|r| r.cached_context.clone());

        let realm = self.get(ino).expect("realm present");
        if let Some(ctx) = &realm.cached_context {
            let parent_ok = match (&parent, &parent_ctx) {
                (None, _) => true,
                (Some(_), Some(pc)) => ctx.seq >= pc.seq,
                (Some(_), None) => false,
            };
            if ctx.seq >= realm.seq && parent_ok {
                debug!(
                    "build_context {:#x} seq {} ({} snaps) unchanged",
                    ino,
                    ctx.seq,
                    ctx.snaps.len()
                );
                return;
            }
        }

        let mut seq = realm.seq;
        let inherited = parent_ctx.as_ref().map(|c| c.snaps.len()).unwrap_or(0);
        let mut snaps =
            Vec::with_capacity(inherited + realm.snaps.len() + realm.prior_parent_snaps.len());
        if let Some(pc) = &parent_ctx {
            // наследуем только снапшоты родителя, взятые после смены родителя
            snaps.extend(pc.snaps.iter().copied().filter(|&s| s >= realm.parent_since));
            if pc.seq > seq {
                seq = pc.seq;
            }
        }
        snaps.extend_from_slice(&realm.snaps);
        snaps.extend_from_slice(&realm.prior_parent_snaps);

        // SnapContext::new сортирует по убыванию
        let ctx = SnapContext::new(seq, snaps);
        debug!(
            "build_context {:#x} seq {} ({} snaps)",
            ino,
            ctx.seq,
            ctx.snaps.len()
        );
        record_context_built();
        self.get_mut(ino).expect("realm present").cached_context = Some(ctx);
    }

    /// Перестроить контекст `ino` и всех realm'ов под ним, сверху вниз.
    pub(crate) fn rebuild_subtree(&mut self, ino: u64) {
        debug!("rebuild_subtree {:#x}", ino);
        self.build_context(ino);
        let children = self
            .get(ino)
            .map(|r| r.children.clone())
            .unwrap_or_default();
        for child in children {
            self.rebuild_subtree(child);
        }
    }
}
