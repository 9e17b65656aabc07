// tests/split.rs
//
// Запуск только этого файла:
//   cargo test --test split -- --nocapture
//
// Покрываем:
// 1) Split мигрирует перечисленные иноды в новый дочерний realm, предварительно
//    поставив их cap_snaps под контекстом СТАРОГО realm'а.
// 2) Stale-гонка (инод уже в более новом realm'е) оставляет этот инод в покое.
// 3) Дочерние realm'ы, названные в split'е, переподчиняются новому realm'у.

use std::sync::Arc;

use anyhow::Result;

use snaprealm::{CapInode, SnapOp};

mod common;
use common::{engine_with, msg_bytes, rec, update_msg};

// Старый realm 1 (created 1) с контекстом {seq:4, snaps:[40]} и инодами
// A=100, B=101, C=102.
fn setup_old_realm(
    engine: &snaprealm::SnapEngine,
    inodes: &common::TestInodes,
) -> Result<[Arc<CapInode>; 3]> {
    engine.get_realm(1);
    engine.handle_snap(0, &update_msg(vec![rec(1, 0, 4, 1, 0, &[40], &[])]))?;

    let a = CapInode::new(100, 0);
    let b = CapInode::new(101, 0);
    let c = CapInode::new(102, 0);
    for inode in [&a, &b, &c] {
        inodes.insert(inode.clone());
        engine.attach_inode(inode, 1);
    }
    Ok([a, b, c])
}

#[test]
fn split_migrates_inodes_under_old_context() -> Result<()> {
    let (engine, inodes, _sessions) = engine_with(&[0]);
    let [a, b, c] = setup_old_realm(&engine, &inodes)?;
    let old_ctx = engine.get_context(1)?;

    // realm 2 (created 100) отщепляется от realm 1, забирая A и B
    engine.handle_snap(
        0,
        &msg_bytes(
            SnapOp::Split,
            2,
            &[100, 101],
            &[],
            vec![rec(2, 1, 1, 100, 41, &[], &[]), rec(1, 0, 4, 1, 0, &[40], &[])],
        ),
    )?;

    for inode in [&a, &b] {
        let st = inode.lock();
        assert_eq!(st.realm, 2, "inode {:#x} moved to the split realm", inode.ino);
        assert_eq!(st.cap_snaps.len(), 1);
        let cs = &st.cap_snaps[0];
        assert!(
            Arc::ptr_eq(&cs.context, &old_ctx),
            "capture taken under the old context"
        );
        assert_eq!(cs.context.seq, 4);
        assert_eq!(cs.context.snaps, vec![40]);
        assert_eq!(cs.follows, 3);
    }
    assert_eq!(c.lock().realm, 1, "unnamed inode stays behind");
    assert!(c.lock().cap_snaps.is_empty(), "no capture for it either");

    let old = engine.realm_info(1).unwrap();
    assert_eq!(old.inodes_with_caps, vec![102]);
    let new = engine.realm_info(2).unwrap();
    assert_eq!(new.created, 100);
    assert_eq!(new.parent, Some(1));
    let mut members = new.inodes_with_caps.clone();
    members.sort_unstable();
    assert_eq!(members, vec![100, 101]);

    // новый realm не наследует ничего старше parent_since 41
    let ctx = new.cached_context.unwrap();
    assert_eq!(ctx.seq, 4);
    assert!(ctx.snaps.is_empty());

    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn stale_split_race_skips_the_inode() -> Result<()> {
    let (engine, inodes, _sessions) = engine_with(&[0]);
    let [a, b, _c] = setup_old_realm(&engine, &inodes)?;

    // другой MDS уже поместил A в realm 3, созданный позже (200), чем
    // приходящий split-realm (100)
    engine.get_realm(3);
    engine.handle_snap(0, &update_msg(vec![rec(3, 0, 1, 200, 0, &[], &[])]))?;
    engine.attach_inode(&a, 3);

    engine.handle_snap(
        0,
        &msg_bytes(
            SnapOp::Split,
            2,
            &[100, 101],
            &[],
            vec![rec(2, 1, 1, 100, 41, &[], &[]), rec(1, 0, 4, 1, 0, &[40], &[])],
        ),
    )?;

    assert_eq!(a.lock().realm, 3, "A stays in the newer realm");
    assert!(a.lock().cap_snaps.is_empty(), "no capture for A");
    assert_eq!(b.lock().realm, 2, "B still migrates");
    assert_eq!(b.lock().cap_snaps.len(), 1);
    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn split_reparents_named_child_realms() -> Result<()> {
    let (engine, inodes, _sessions) = engine_with(&[0]);
    setup_old_realm(&engine, &inodes)?;

    // realm 5 до split'а — ребёнок 1
    engine.get_realm(5);
    engine.handle_snap(
        0,
        &update_msg(vec![rec(5, 1, 1, 3, 0, &[], &[]), rec(1, 0, 4, 1, 0, &[40], &[])]),
    )?;
    assert_eq!(engine.realm_info(5).unwrap().parent, Some(1));

    engine.handle_snap(
        0,
        &msg_bytes(
            SnapOp::Split,
            2,
            &[],
            &[5],
            vec![rec(2, 1, 1, 100, 0, &[], &[]), rec(1, 0, 4, 1, 0, &[40], &[])],
        ),
    )?;

    assert_eq!(engine.realm_info(5).unwrap().parent, Some(2));
    assert_eq!(engine.realm_info(2).unwrap().children, vec![5]);
    assert!(
        !engine.realm_info(1).unwrap().children.contains(&5),
        "old parent lost the child"
    );

    // переподчинённый ребёнок видит снапшоты старого realm'а через новый
    let ctx = engine.realm_info(5).and_then(|i| i.cached_context).unwrap();
    assert_eq!(ctx.seq, 4);
    assert_eq!(ctx.snaps, vec![40]);
    assert!(engine.check().is_clean());
    Ok(())
}
