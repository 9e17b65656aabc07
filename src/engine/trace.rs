//! engine/trace — применение snap-trace'а от MDS.
//!
//! Trace перечисляет realm-записи от самого глубокого затронутого realm'а
//! до корня. Для каждой записи: определить продвижение seq, захватить
//! cap_snaps для всех инодов с caps *до* мутации realm'а (незавершённые
//! записи принадлежат прежнему snap-набору), поправить родительскую связь,
//! затем установить новые параметры realm'а. Инвалидация накапливается по
//! всему trace'у, и одна перестройка сверху вниз запускается от корневой
//! записи.

use log::debug;

use super::SnapEngine;
use crate::metrics::record_trace_applied;
use crate::realm::RealmMap;
use crate::wire::TraceRecord;

fn sorted_desc(v: &[u64]) -> Vec<u64> {
    let mut out = v.to_vec();
    out.sort_unstable_by(|a, b| b.cmp(a));
    out
}

impl SnapEngine {
    /// Применить разобранный trace. `deletion` подавляет захват cap_snaps
    /// (против исчезающего snap-набора захватывать нечего).
    ///
    /// Возвращает первый (самый глубокий) realm trace'а с одной
    /// дополнительной ссылкой, которую вызывающий код обязан отпустить.
    ///
    /// Вызывающий код держит realm lock в write-режиме (`map`).
    pub(crate) fn update_snap_trace(
        &self,
        map: &mut RealmMap,
        trace: &[TraceRecord],
        deletion: bool,
    ) -> u64 {
        debug!("update_snap_trace deletion={}", deletion);
        let mut first: Option<u64> = None;
        let mut invalidate = false;

        for (i, rec) in trace.iter().enumerate() {
            map.get_or_create(rec.ino);
            if first.is_none() {
                // самый глубокий realm уходит вызывающему коду со ссылкой
                map.hold(rec.ino);
                first = Some(rec.ino);
            }

            let realm_seq = map.get(rec.ino).map(|r| r.seq).unwrap_or(0);
            let advancing = rec.seq > realm_seq;
            if advancing {
                debug!(
                    "update_snap_trace advancing {:#x} {} -> {}",
                    rec.ino, realm_seq, rec.seq
                );
                // Захват под контекстом как он есть сейчас, до любых
                // изменений состояния realm'а.
                if !deletion {
                    let (ctx, inos) = {
                        let r = map.get(rec.ino).expect("realm present");
                        (r.cached_context.clone(), r.inodes_with_caps.clone())
                    };
                    if let Some(ctx) = ctx {
                        for ino in inos {
                            if let Some(inode) = self.inodes.lookup(ino) {
                                self.queue_cap_snap_locked(&inode, &ctx);
                            }
                        }
                    } else if !inos.is_empty() {
                        debug!(
                            "update_snap_trace {:#x}: no cached context, skipping {} capture(s)",
                            rec.ino,
                            inos.len()
                        );
                    }
                }
            } else {
                debug!(
                    "update_snap_trace {:#x} seq {} unchanged",
                    rec.ino, realm_seq
                );
            }

            invalidate |= map.adjust_parent(rec.ino, rec.parent);

            if advancing {
                let r = map.get_mut(rec.ino).expect("realm present");
                r.seq = rec.seq;
                r.created = rec.created;
                r.parent_since = rec.parent_since;
                r.snaps = sorted_desc(&rec.snaps);
                r.prior_parent_snaps = sorted_desc(&rec.prior_parent_snaps);
                invalidate = true;
            } else if map.get(rec.ino).expect("realm present").cached_context.is_none() {
                invalidate = true;
            }

            // перестраиваем один раз, от корня trace'а: trace идёт от листа
            // к корню, так что всё затронутое поддерево висит под ним
            if i + 1 == trace.len() && invalidate {
                map.rebuild_subtree(rec.ino);
            }
            map.put(rec.ino);
        }

        record_trace_applied();
        first.expect("decoder rejects empty traces")
    }
}
