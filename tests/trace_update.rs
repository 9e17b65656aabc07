// tests/trace_update.rs
//
// Запуск только этого файла:
//   cargo test --test trace_update -- --nocapture
//
// Покрываем:
// 1) Update realm'а вливает новые снапшоты в кэшированный контекст, по
//    убыванию.
// 2) Наследование от родителя: родительские снапшоты старше parent_since
//    отфильтровываются, seq контекста ребёнка поднимается до родительского.
// 3) Продвижение родителя перестраивает контексты всех детей (каскад
//    сверху вниз).
// 4) Законы: идемпотентность trace'а, монотонность seq, членство в реестре
//    ровно пока остаются ссылки.

use std::sync::Arc;

use anyhow::Result;

mod common;
use common::{engine_with, rec, update_msg};

#[test]
fn update_merges_snaps_descending() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    engine.get_realm(1);
    engine.handle_snap(0, &update_msg(vec![rec(1, 0, 5, 1, 0, &[10], &[])]))?;

    let info = engine.realm_info(1).expect("realm registered");
    assert_eq!(info.seq, 5);
    let ctx = info.cached_context.expect("context built");
    assert_eq!(ctx.seq, 5);
    assert_eq!(ctx.snaps, vec![10]);

    engine.handle_snap(0, &update_msg(vec![rec(1, 0, 6, 1, 0, &[10, 20], &[])]))?;

    let ctx = engine.get_context(1)?;
    assert_eq!(ctx.seq, 6);
    assert_eq!(ctx.snaps, vec![20, 10], "newest first");
    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn parent_inheritance_respects_parent_since() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    engine.get_realm(2);
    engine.handle_snap(
        0,
        &update_msg(vec![
            rec(2, 1, 3, 2, 15, &[], &[]),
            rec(1, 0, 7, 1, 0, &[30, 20, 10], &[]),
        ]),
    )?;

    let ctx = engine.get_context(2)?;
    assert_eq!(ctx.seq, 7, "child seq raised to the parent's");
    assert_eq!(ctx.snaps, vec![30, 20], "snap 10 predates parent_since 15");

    let parent = engine.realm_info(1).expect("parent registered");
    assert_eq!(parent.children, vec![2]);
    assert_eq!(engine.realm_info(2).unwrap().parent, Some(1));
    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn parent_bump_cascades_to_all_children() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    engine.get_realm(11);
    engine.get_realm(12);
    engine.handle_snap(
        0,
        &update_msg(vec![rec(11, 10, 1, 2, 0, &[], &[]), rec(10, 0, 1, 1, 0, &[], &[])]),
    )?;
    engine.handle_snap(
        0,
        &update_msg(vec![rec(12, 10, 1, 3, 0, &[], &[]), rec(10, 0, 1, 1, 0, &[], &[])]),
    )?;

    // двигаем одного родителя; оба ребёнка обязаны увидеть новый снапшот
    engine.handle_snap(0, &update_msg(vec![rec(10, 0, 2, 1, 0, &[50], &[])]))?;

    for child in [11, 12] {
        let ctx = engine
            .realm_info(child)
            .and_then(|i| i.cached_context)
            .expect("child context rebuilt");
        assert_eq!(ctx.seq, 2, "child {child} seq");
        assert_eq!(ctx.snaps, vec![50], "child {child} snaps");
    }
    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn applying_the_same_trace_twice_changes_nothing() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    engine.get_realm(2);
    let msg = update_msg(vec![
        rec(2, 1, 4, 2, 0, &[25], &[5]),
        rec(1, 0, 6, 1, 0, &[30, 20], &[]),
    ]);
    engine.handle_snap(0, &msg)?;

    let before_child = engine.realm_info(2).unwrap();
    let before_parent = engine.realm_info(1).unwrap();

    engine.handle_snap(0, &msg)?;

    let after_child = engine.realm_info(2).unwrap();
    let after_parent = engine.realm_info(1).unwrap();

    assert_eq!(after_child.seq, before_child.seq);
    assert_eq!(after_child.snaps, before_child.snaps);
    assert_eq!(after_child.prior_parent_snaps, before_child.prior_parent_snaps);
    assert_eq!(after_child.nref, before_child.nref);
    assert_eq!(after_parent.seq, before_parent.seq);
    assert_eq!(after_parent.snaps, before_parent.snaps);
    assert!(
        Arc::ptr_eq(
            before_child.cached_context.as_ref().unwrap(),
            after_child.cached_context.as_ref().unwrap()
        ),
        "an unchanged trace must not rebuild the context"
    );
    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn seq_never_decreases() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    engine.get_realm(1);
    engine.handle_snap(0, &update_msg(vec![rec(1, 0, 9, 1, 0, &[70, 60], &[])]))?;

    // устаревший trace с меньшим seq обязан игнорироваться
    engine.handle_snap(0, &update_msg(vec![rec(1, 0, 4, 1, 0, &[10], &[])]))?;

    let info = engine.realm_info(1).unwrap();
    assert_eq!(info.seq, 9);
    assert_eq!(info.snaps, vec![70, 60]);
    assert_eq!(info.cached_context.unwrap().seq, 9);
    assert!(engine.check().is_clean());
    Ok(())
}

#[test]
fn realm_dropped_when_last_reference_goes() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    engine.get_realm(1);
    engine.handle_snap(0, &update_msg(vec![rec(1, 0, 2, 1, 0, &[10], &[])]))?;
    assert_eq!(engine.realm_count(), 1);

    engine.put_realm(1);
    assert_eq!(engine.realm_count(), 0, "no refs, no registry entry");
    assert!(engine.realm_info(1).is_none());
    Ok(())
}

#[test]
fn trace_for_unreferenced_realm_leaves_no_residue() -> Result<()> {
    let (engine, _inodes, _sessions) = engine_with(&[0]);

    // realm никто не держит: обе ссылки самого trace'а отпускаются
    engine.handle_snap(0, &update_msg(vec![rec(42, 0, 3, 1, 0, &[11], &[])]))?;
    assert_eq!(engine.realm_count(), 0);
    Ok(())
}
