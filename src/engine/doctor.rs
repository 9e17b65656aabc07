//! engine/doctor — проверка целостности realm-графа и отчёт.
//!
//! Обходит все зарегистрированные realm'ы под read lock'ом и собирает
//! структурные нарушения:
//! - связи parent/child двусторонние и встречаются ровно один раз;
//! - цепочки родителей завершаются (нет циклов);
//! - зарегистрированный realm обязан держать ссылки;
//! - кэшированный контекст строго убывает, его seq покрывает seq realm'а,
//!   и каждый снапшот в нём прослеживается до собственных снапшотов
//!   realm'а, снапшотов прежних родителей или контекста родителя начиная с
//!   parent_since.

use super::SnapEngine;

/// Результат прохода самопроверки.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Сколько зарегистрированных realm'ов обойдено.
    pub realms: usize,
    /// Realm'ы с построенным контекстом.
    pub contexts: usize,
    /// Человекочитаемые нарушения; пусто, если граф согласован.
    pub errors: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl SnapEngine {
    /// Проверить все структурные инварианты realm-графа.
    pub fn check(&self) -> CheckReport {
        let map = self.realms_read();
        let mut report = CheckReport {
            realms: map.len(),
            ..Default::default()
        };
        let err = |report: &mut CheckReport, msg: String| report.errors.push(msg);

        for (&ino, realm) in map.iter() {
            if realm.ino != ino {
                err(&mut report, format!("realm {ino:#x}: key/ino mismatch"));
            }
            if realm.nref == 0 {
                err(
                    &mut report,
                    format!("realm {ino:#x}: registered with zero nref"),
                );
            }

            match realm.parent {
                Some(p) => {
                    if realm.parent_ino != p {
                        err(
                            &mut report,
                            format!(
                                "realm {ino:#x}: parent link {p:#x} != parent_ino {:#x}",
                                realm.parent_ino
                            ),
                        );
                    }
                    match map.get(p) {
                        None => err(
                            &mut report,
                            format!("realm {ino:#x}: parent {p:#x} not registered"),
                        ),
                        Some(parent) => {
                            let n = parent.children.iter().filter(|&&c| c == ino).count();
                            if n != 1 {
                                err(
                                    &mut report,
                                    format!(
                                        "realm {ino:#x}: {n} entries in parent {p:#x} child list"
                                    ),
                                );
                            }
                        }
                    }
                }
                None => {
                    if realm.parent_ino != 0 {
                        err(
                            &mut report,
                            format!(
                                "realm {ino:#x}: parent_ino {:#x} without a parent link",
                                realm.parent_ino
                            ),
                        );
                    }
                }
            }

            for &child in &realm.children {
                match map.get(child) {
                    None => err(
                        &mut report,
                        format!("realm {ino:#x}: child {child:#x} not registered"),
                    ),
                    Some(c) if c.parent != Some(ino) => err(
                        &mut report,
                        format!(
                            "realm {ino:#x}: child {child:#x} points at parent {:?}",
                            c.parent
                        ),
                    ),
                    _ => {}
                }
            }

            // цепочка родителей обязана дойти до корня за |realms| шагов
            let mut cur = realm.parent;
            let mut hops = 0usize;
            while let Some(p) = cur {
                hops += 1;
                if hops > map.len() {
                    err(
                        &mut report,
                        format!("realm {ino:#x}: parent chain does not terminate"),
                    );
                    break;
                }
                cur = map.get(p).and_then(|r| r.parent);
            }

            if let Some(ctx) = &realm.cached_context {
                report.contexts += 1;
                if !ctx.is_descending() {
                    err(
                        &mut report,
                        format!("realm {ino:#x}: context snaps not strictly descending"),
                    );
                }
                if ctx.seq < realm.seq {
                    err(
                        &mut report,
                        format!(
                            "realm {ino:#x}: context seq {} below realm seq {}",
                            ctx.seq, realm.seq
                        ),
                    );
                }
                let parent_ctx = realm
                    .parent
                    .and_then(|p| map.get(p))
                    .and_then(|r| r.cached_context.as_ref());
                for &snap in &ctx.snaps {
                    let own = realm.snaps.contains(&snap)
                        || realm.prior_parent_snaps.contains(&snap);
                    let inherited = parent_ctx
                        .map(|pc| snap >= realm.parent_since && pc.contains(snap))
                        .unwrap_or(false);
                    if !own && !inherited {
                        err(
                            &mut report,
                            format!("realm {ino:#x}: context snap {snap} has no source"),
                        );
                    }
                }
            }
        }
        report
    }
}
