//! wire/encode — помощники для сборки snap-сообщений.
//!
//! Что здесь:
//! - encode_trace_record: одна per-realm запись, фиксированный заголовок +
//!   массивы снапшотов.
//! - encode_snap_message: целое сообщение; trace_len вычисляется по
//!   закодированным записям.
//!
//! Сам движок только декодирует; это — для пиров и тестов.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use super::{SnapMessage, TraceRecord};
use crate::consts::{
    SNAP_HDR_OFF_NUM_SPLIT_INOS, SNAP_HDR_OFF_NUM_SPLIT_REALMS, SNAP_HDR_OFF_OP,
    SNAP_HDR_OFF_SPLIT, SNAP_HDR_OFF_TRACE_LEN, SNAP_HDR_SIZE, TRACE_REC_HDR_SIZE,
    TRACE_REC_OFF_CREATED, TRACE_REC_OFF_INO, TRACE_REC_OFF_NUM_PRIOR, TRACE_REC_OFF_NUM_SNAPS,
    TRACE_REC_OFF_PARENT, TRACE_REC_OFF_PARENT_SINCE, TRACE_REC_OFF_SEQ,
};

// Защита от некорректной длины (поля счётчиков — u32)
fn u32_len(what: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| anyhow!("{} length {} does not fit in u32", what, len))
}

fn push_u64s(out: &mut Vec<u8>, vals: &[u64]) {
    let mut b = [0u8; 8];
    for &v in vals {
        LittleEndian::write_u64(&mut b, v);
        out.extend_from_slice(&b);
    }
}

/// Построить фиксированный заголовок одной trace-записи.
fn build_record_hdr(rec: &TraceRecord) -> Result<[u8; TRACE_REC_HDR_SIZE]> {
    let num_snaps = u32_len("snaps", rec.snaps.len())?;
    let num_prior = u32_len("prior_parent_snaps", rec.prior_parent_snaps.len())?;

    let mut hdr = [0u8; TRACE_REC_HDR_SIZE];
    LittleEndian::write_u64(&mut hdr[TRACE_REC_OFF_INO..TRACE_REC_OFF_INO + 8], rec.ino);
    LittleEndian::write_u64(
        &mut hdr[TRACE_REC_OFF_PARENT..TRACE_REC_OFF_PARENT + 8],
        rec.parent,
    );
    LittleEndian::write_u64(&mut hdr[TRACE_REC_OFF_SEQ..TRACE_REC_OFF_SEQ + 8], rec.seq);
    LittleEndian::write_u64(
        &mut hdr[TRACE_REC_OFF_CREATED..TRACE_REC_OFF_CREATED + 8],
        rec.created,
    );
    LittleEndian::write_u64(
        &mut hdr[TRACE_REC_OFF_PARENT_SINCE..TRACE_REC_OFF_PARENT_SINCE + 8],
        rec.parent_since,
    );
    LittleEndian::write_u32(
        &mut hdr[TRACE_REC_OFF_NUM_SNAPS..TRACE_REC_OFF_NUM_SNAPS + 4],
        num_snaps,
    );
    LittleEndian::write_u32(
        &mut hdr[TRACE_REC_OFF_NUM_PRIOR..TRACE_REC_OFF_NUM_PRIOR + 4],
        num_prior,
    );
    Ok(hdr)
}

/// Закодировать одну trace-запись: заголовок, свои снапшоты, снапшоты
/// прежних родителей.
pub fn encode_trace_record(rec: &TraceRecord) -> Result<Vec<u8>> {
    let hdr = build_record_hdr(rec)?;
    let mut out = Vec::with_capacity(
        TRACE_REC_HDR_SIZE + 8 * (rec.snaps.len() + rec.prior_parent_snaps.len()),
    );
    out.extend_from_slice(&hdr);
    push_u64s(&mut out, &rec.snaps);
    push_u64s(&mut out, &rec.prior_parent_snaps);
    Ok(out)
}

/// Закодировать целое snap-сообщение: заголовок, split-списки, trace.
pub fn encode_snap_message(msg: &SnapMessage) -> Result<Vec<u8>> {
    let num_split_inos = u32_len("split_inos", msg.split_inos.len())?;
    let num_split_realms = u32_len("split_realms", msg.split_realms.len())?;

    let mut trace = Vec::new();
    for rec in &msg.trace {
        trace.extend_from_slice(&encode_trace_record(rec)?);
    }
    let trace_len = u32_len("trace", trace.len())?;

    let mut hdr = [0u8; SNAP_HDR_SIZE];
    LittleEndian::write_u32(&mut hdr[SNAP_HDR_OFF_OP..SNAP_HDR_OFF_OP + 4], msg.op.as_u32());
    LittleEndian::write_u64(
        &mut hdr[SNAP_HDR_OFF_SPLIT..SNAP_HDR_OFF_SPLIT + 8],
        msg.split,
    );
    LittleEndian::write_u32(
        &mut hdr[SNAP_HDR_OFF_NUM_SPLIT_INOS..SNAP_HDR_OFF_NUM_SPLIT_INOS + 4],
        num_split_inos,
    );
    LittleEndian::write_u32(
        &mut hdr[SNAP_HDR_OFF_NUM_SPLIT_REALMS..SNAP_HDR_OFF_NUM_SPLIT_REALMS + 4],
        num_split_realms,
    );
    LittleEndian::write_u32(
        &mut hdr[SNAP_HDR_OFF_TRACE_LEN..SNAP_HDR_OFF_TRACE_LEN + 4],
        trace_len,
    );

    // Пишем заголовок, split-списки и trace по порядку
    let mut out = Vec::with_capacity(
        SNAP_HDR_SIZE + 8 * (msg.split_inos.len() + msg.split_realms.len()) + trace.len(),
    );
    out.extend_from_slice(&hdr);
    push_u64s(&mut out, &msg.split_inos);
    push_u64s(&mut out, &msg.split_realms);
    out.extend_from_slice(&trace);
    Ok(out)
}
