//! engine/flush — snap-flush список и flush-драйвер.
//!
//! Иноды с финализированными чистыми cap_snaps встают в flush-список;
//! драйвер выбирает их и передаёт flush-payload'ы сессионному слою. Хэндл
//! сессии ищется один раз и переиспользуется, пока подряд идут иноды
//! одного MDS; мьютекс сессии берётся на per-inode батч. Никакой graph
//! lock в цикле не держится, мьютекс списка охраняет только O(1) операции
//! очереди.

use std::sync::Arc;

use log::{debug, warn};

use super::SnapEngine;
use crate::capsnap::CapSnapFlush;
use crate::metrics::record_capsnap_flush_sent;
use crate::session::MdsSession;

impl SnapEngine {
    /// Поставить инод в очередь на snap flush (идемпотентно, пока он там).
    pub(crate) fn add_to_flush_list(&self, ino: u64) {
        let mut q = self.flush_list.lock().expect("flush list lock poisoned");
        if !q.contains(&ino) {
            q.push_back(ino);
        }
    }

    /// Число инодов, ожидающих в snap-flush списке.
    pub fn flush_list_len(&self) -> usize {
        self.flush_list
            .lock()
            .expect("flush list lock poisoned")
            .len()
    }

    /// Выбрать snap-flush список до дна, отправив каждый осевший чистый
    /// cap_snap его сессии MDS. Graph lock не держится; может
    /// блокироваться на messenger'е.
    pub fn flush_snaps(&self) {
        debug!("flush_snaps");
        let mut session: Option<Arc<MdsSession>> = None;

        loop {
            let ino = {
                let mut q = self.flush_list.lock().expect("flush list lock poisoned");
                match q.pop_front() {
                    Some(i) => i,
                    None => break,
                }
            };
            let Some(inode) = self.inodes.lookup(ino) else {
                debug!("flush_snaps: inode {:#x} no longer resident", ino);
                continue;
            };

            // переиспользуем хэндл сессии, пока MDS не сменился
            let sess = match &session {
                Some(s) if s.mds == inode.auth_mds => s.clone(),
                _ => match self.sessions.get(inode.auth_mds) {
                    Some(s) => {
                        session = Some(s.clone());
                        s
                    }
                    None => {
                        warn!(
                            "flush_snaps: no session for mds{} (inode {:#x})",
                            inode.auth_mds, ino
                        );
                        continue;
                    }
                },
            };

            let _batch = sess.lock();
            let flushes: Vec<CapSnapFlush> = {
                let mut st = inode.lock();
                st.cap_snaps
                    .iter_mut()
                    .filter(|c| !c.writing && c.dirty == 0 && !c.flushed)
                    .map(|c| {
                        c.flushed = true;
                        CapSnapFlush {
                            ino,
                            follows: c.follows,
                            seq: c.context.seq,
                            size: c.size,
                            mtime: c.mtime,
                            atime: c.atime,
                            ctime: c.ctime,
                            time_warp_seq: c.time_warp_seq,
                            issued: c.issued,
                        }
                    })
                    .collect()
            };

            for flush in flushes {
                match self.sessions.send_flush(&sess, &flush) {
                    Ok(()) => record_capsnap_flush_sent(),
                    Err(e) => {
                        warn!(
                            "flush_snaps: send to mds{} failed for inode {:#x} follows {}: {:#}",
                            sess.mds, ino, flush.follows, e
                        );
                        // оставляем отправляемым для следующего прохода
                        let mut st = inode.lock();
                        if let Some(c) =
                            st.cap_snaps.iter_mut().find(|c| c.follows == flush.follows)
                        {
                            c.flushed = false;
                        }
                    }
                }
            }
        }
        debug!("flush_snaps done");
    }
}
