//! engine/capsnap — постановка и финализация cap_snap.
//!
//! queue_cap_snap захватывает snapshot-состояние инода под заданным
//! контекстом. Если идёт синхронная запись (write cap активно
//! используется), захват остаётся pending (`writing`), пока запись не
//! осядет; второй pending-захват не ставится никогда — пока один pending,
//! новые записи стартовать не могут, значит идущие сейчас записи начались
//! до предыдущего захвата.
//!
//! finish_cap_snap фиксирует финальные size/mtime. Захват с грязными
//! страницами ждёт writeback; чистый — ставит свой инод в snap-flush
//! список.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::debug;

use super::SnapEngine;
use crate::capsnap::{CapSnap, FlushState};
use crate::context::SnapContext;
use crate::inode::{CapInode, InodeState, CAP_WR};
use crate::metrics::{record_capsnap_flushable, record_capsnap_queued};

impl SnapEngine {
    /// Поставить в очередь snapshot-захват инода под `ctx`.
    ///
    /// Берёт realm lock в read-режиме (топология не должна меняться под
    /// ногами) и per-inode lock.
    pub fn queue_cap_snap(&self, inode: &Arc<CapInode>, ctx: &Arc<SnapContext>) {
        let _topology = self.realms_read();
        self.queue_cap_snap_locked(inode, ctx);
    }

    /// Ядро queue_cap_snap; вызывающий код уже держит realm lock в read-
    /// или write-режиме.
    pub(crate) fn queue_cap_snap_locked(&self, inode: &Arc<CapInode>, ctx: &Arc<SnapContext>) {
        let mut st = inode.lock();
        if st.have_pending_cap_snap() {
            debug!(
                "queue_cap_snap {:#x} seq {} already pending",
                inode.ino, ctx.seq
            );
            return;
        }

        let mut cs = CapSnap {
            context: ctx.clone(),
            follows: ctx.seq.saturating_sub(1),
            issued: st.caps_issued,
            dirty: st.wrbuffer_ref_head,
            writing: false,
            size: 0,
            mtime: 0,
            atime: 0,
            ctime: 0,
            time_warp_seq: 0,
            flushed: false,
        };
        // Счётчик грязных страниц переезжает с head'а на этот захват; все
        // последующие загрязнения страниц происходят уже после снапшота.
        st.wrbuffer_ref_head = 0;

        let pending = (st.caps_used & CAP_WR) != 0;
        record_capsnap_queued(pending);
        if pending {
            debug!(
                "queue_cap_snap {:#x} seq {} used WR, now pending",
                inode.ino, ctx.seq
            );
            cs.writing = true;
            st.cap_snaps.push(cs);
        } else {
            // writer'а в полёте нет: size/mtime финальны прямо сейчас
            st.cap_snaps.push(cs);
            let idx = st.cap_snaps.len() - 1;
            self.finish_cap_snap_locked(inode.ino, &mut st, idx);
        }
    }

    /// Зафиксировать финальные size/mtime для cap_snap, следующего за
    /// `follows`. Ошибка, если такого захвата нет или он всё ещё ждёт
    /// writer'а.
    pub fn finish_cap_snap(&self, inode: &Arc<CapInode>, follows: u64) -> Result<FlushState> {
        let mut st = inode.lock();
        let idx = st
            .cap_snaps
            .iter()
            .position(|c| c.follows == follows)
            .ok_or_else(|| {
                anyhow!("inode {:#x}: no cap_snap following {}", inode.ino, follows)
            })?;
        if st.cap_snaps[idx].writing {
            return Err(anyhow!(
                "inode {:#x}: cap_snap following {} still has a writer pending",
                inode.ino,
                follows
            ));
        }
        Ok(self.finish_cap_snap_locked(inode.ino, &mut st, idx))
    }

    /// Вызывающий код держит inode lock; захват не должен быть pending.
    fn finish_cap_snap_locked(
        &self,
        ino: u64,
        st: &mut InodeState,
        idx: usize,
    ) -> FlushState {
        debug_assert!(!st.cap_snaps[idx].writing);
        let (size, mtime, atime, ctime, time_warp_seq) =
            (st.size, st.mtime, st.atime, st.ctime, st.time_warp_seq);
        let cs = &mut st.cap_snaps[idx];
        cs.size = size;
        cs.mtime = mtime;
        cs.atime = atime;
        cs.ctime = ctime;
        cs.time_warp_seq = time_warp_seq;

        if cs.dirty > 0 {
            debug!(
                "finish_cap_snap {:#x} follows {} still has {} dirty page(s)",
                ino, cs.follows, cs.dirty
            );
            return FlushState::NotYetFlushable;
        }
        debug!("finish_cap_snap {:#x} follows {} clean", ino, cs.follows);
        record_capsnap_flushable();
        self.add_to_flush_list(ino);
        FlushState::Flushable
    }

    /// Синхронная запись завершилась: снять флаг pending с ожидающего
    /// захвата и зафиксировать его. None, если pending не было.
    pub fn complete_pending_write(&self, inode: &Arc<CapInode>) -> Option<FlushState> {
        let mut st = inode.lock();
        let idx = st.cap_snaps.iter().rposition(|c| c.writing)?;
        st.cap_snaps[idx].writing = false;
        debug!(
            "complete_pending_write {:#x} follows {}",
            inode.ino, st.cap_snaps[idx].follows
        );
        Some(self.finish_cap_snap_locked(inode.ino, &mut st, idx))
    }

    /// Writeback завершил `pages` грязных страниц захвата, следующего за
    /// `follows`. Когда счётчик dirty стекает в ноль (и writer не pending),
    /// инод попадает в snap-flush список.
    pub fn complete_writeback(
        &self,
        inode: &Arc<CapInode>,
        follows: u64,
        pages: u64,
    ) -> Option<FlushState> {
        let mut st = inode.lock();
        let idx = st.cap_snaps.iter().position(|c| c.follows == follows)?;
        let cs = &mut st.cap_snaps[idx];
        cs.dirty = cs.dirty.saturating_sub(pages);
        if cs.dirty == 0 && !cs.writing {
            debug!(
                "complete_writeback {:#x} follows {} clean",
                inode.ino, follows
            );
            record_capsnap_flushable();
            self.add_to_flush_list(inode.ino);
            Some(FlushState::Flushable)
        } else {
            Some(FlushState::NotYetFlushable)
        }
    }

    /// MDS подтвердил flush захвата, следующего за `follows`; выбрасываем
    /// его. true, если отправленный захват был удалён.
    pub fn ack_cap_snap_flush(&self, inode: &Arc<CapInode>, follows: u64) -> bool {
        let mut st = inode.lock();
        let before = st.cap_snaps.len();
        st.cap_snaps.retain(|c| !(c.follows == follows && c.flushed));
        let removed = st.cap_snaps.len() != before;
        if removed {
            debug!("ack_cap_snap_flush {:#x} follows {}", inode.ino, follows);
        }
        removed
    }
}
