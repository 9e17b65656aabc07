//! wire/decode — разбор snap-сообщений.
//!
//! Поведение:
//! - Фиксированный заголовок, split-списки и каждая trace-запись
//!   проверяются по границам буфера; любой underflow или невозможная длина
//!   → ошибка, и вызывающий код отбрасывает сообщение.
//! - Регион trace — ровно `trace_len` байт и должен быть выбран целыми
//!   записями; сообщение обязано заканчиваться trace-регионом.
//! - Заявленные счётчики ограничиваются `EngineConfig`, чтобы враждебное
//!   поле длины не управляло аллокацией.
//!
//! Декодер ничего не мутирует: сообщение разбирается целиком либо никак.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use super::{SnapMessage, SnapOp, TraceRecord};
use crate::config::EngineConfig;
use crate::consts::{
    SNAP_HDR_OFF_NUM_SPLIT_INOS, SNAP_HDR_OFF_NUM_SPLIT_REALMS, SNAP_HDR_OFF_OP,
    SNAP_HDR_OFF_SPLIT, SNAP_HDR_OFF_TRACE_LEN, SNAP_HDR_SIZE, TRACE_REC_HDR_SIZE,
    TRACE_REC_OFF_CREATED, TRACE_REC_OFF_INO, TRACE_REC_OFF_NUM_PRIOR, TRACE_REC_OFF_NUM_SNAPS,
    TRACE_REC_OFF_PARENT, TRACE_REC_OFF_PARENT_SINCE, TRACE_REC_OFF_SEQ,
};

/// Курсор по буферу сообщения с проверкой границ.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn need(&self, n: usize) -> Result<()> {
        if n > self.buf.len() - self.pos {
            return Err(anyhow!(
                "snap message truncated: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len() - self.pos
            ));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u64_array(&mut self, count: usize) -> Result<Vec<u64>> {
        let raw = self.take(count.checked_mul(8).ok_or_else(|| anyhow!("length overflow"))?)?;
        let mut out = Vec::with_capacity(count);
        for chunk in raw.chunks_exact(8) {
            out.push(LittleEndian::read_u64(chunk));
        }
        Ok(out)
    }
}

fn decode_trace_record(c: &mut Cursor<'_>, cfg: &EngineConfig) -> Result<TraceRecord> {
    // Читаем фиксированный заголовок записи и разбираем его по смещениям
    let hdr = c.take(TRACE_REC_HDR_SIZE)?;
    let ino = LittleEndian::read_u64(&hdr[TRACE_REC_OFF_INO..TRACE_REC_OFF_INO + 8]);
    let parent = LittleEndian::read_u64(&hdr[TRACE_REC_OFF_PARENT..TRACE_REC_OFF_PARENT + 8]);
    let seq = LittleEndian::read_u64(&hdr[TRACE_REC_OFF_SEQ..TRACE_REC_OFF_SEQ + 8]);
    let created = LittleEndian::read_u64(&hdr[TRACE_REC_OFF_CREATED..TRACE_REC_OFF_CREATED + 8]);
    let parent_since =
        LittleEndian::read_u64(&hdr[TRACE_REC_OFF_PARENT_SINCE..TRACE_REC_OFF_PARENT_SINCE + 8]);
    let num_snaps =
        LittleEndian::read_u32(&hdr[TRACE_REC_OFF_NUM_SNAPS..TRACE_REC_OFF_NUM_SNAPS + 4]) as usize;
    let num_prior =
        LittleEndian::read_u32(&hdr[TRACE_REC_OFF_NUM_PRIOR..TRACE_REC_OFF_NUM_PRIOR + 4]) as usize;

    // Защита от некорректных длин
    if num_snaps > cfg.max_snaps_per_record || num_prior > cfg.max_snaps_per_record {
        return Err(anyhow!(
            "trace record {:#x}: snap counts {}/{} exceed limit {}",
            ino,
            num_snaps,
            num_prior,
            cfg.max_snaps_per_record
        ));
    }
    if parent == ino {
        return Err(anyhow!("trace record {:#x} is its own parent", ino));
    }

    let snaps = c.u64_array(num_snaps)?;
    let prior_parent_snaps = c.u64_array(num_prior)?;

    Ok(TraceRecord {
        ino,
        parent,
        seq,
        created,
        parent_since,
        snaps,
        prior_parent_snaps,
    })
}

/// Разобрать целое snap-сообщение.
///
/// Возвращает ошибку (ничего не трогая), если буфер обрезан, опкод
/// неизвестен, заявленная длина невозможна, trace пуст или границы записей
/// не попадают точно в конец trace.
pub fn decode_snap_message(buf: &[u8], cfg: &EngineConfig) -> Result<SnapMessage> {
    let mut c = Cursor::new(buf);

    let hdr = c.take(SNAP_HDR_SIZE)?;
    let op_raw = LittleEndian::read_u32(&hdr[SNAP_HDR_OFF_OP..SNAP_HDR_OFF_OP + 4]);
    let op =
        SnapOp::from_u32(op_raw).ok_or_else(|| anyhow!("unknown snap opcode {}", op_raw))?;
    let split = LittleEndian::read_u64(&hdr[SNAP_HDR_OFF_SPLIT..SNAP_HDR_OFF_SPLIT + 8]);
    let num_split_inos = LittleEndian::read_u32(
        &hdr[SNAP_HDR_OFF_NUM_SPLIT_INOS..SNAP_HDR_OFF_NUM_SPLIT_INOS + 4],
    ) as usize;
    let num_split_realms = LittleEndian::read_u32(
        &hdr[SNAP_HDR_OFF_NUM_SPLIT_REALMS..SNAP_HDR_OFF_NUM_SPLIT_REALMS + 4],
    ) as usize;
    let trace_len =
        LittleEndian::read_u32(&hdr[SNAP_HDR_OFF_TRACE_LEN..SNAP_HDR_OFF_TRACE_LEN + 4]) as usize;

    if num_split_inos > cfg.max_split_inos || num_split_realms > cfg.max_split_inos {
        return Err(anyhow!(
            "split lists {}/{} exceed limit {}",
            num_split_inos,
            num_split_realms,
            cfg.max_split_inos
        ));
    }

    let split_inos = c.u64_array(num_split_inos)?;
    let split_realms = c.u64_array(num_split_realms)?;

    // Регион trace: ровно trace_len байт, завершающих сообщение
    c.need(trace_len)?;
    let trace_end = c.pos + trace_len;
    if trace_end != buf.len() {
        return Err(anyhow!(
            "snap message has {} trailing bytes after trace",
            buf.len() - trace_end
        ));
    }

    let mut trace = Vec::new();
    while c.pos < trace_end {
        if trace.len() == cfg.max_trace_records {
            return Err(anyhow!("trace exceeds {} records", cfg.max_trace_records));
        }
        let rec = decode_trace_record(&mut c, cfg)?;
        if c.pos > trace_end {
            return Err(anyhow!(
                "trace record {:#x} overruns trace boundary",
                rec.ino
            ));
        }
        trace.push(rec);
    }
    if trace.is_empty() {
        return Err(anyhow!("snap message with empty trace"));
    }

    Ok(SnapMessage {
        op,
        split,
        split_inos,
        split_realms,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_snap_message;

    fn rec(ino: u64, parent: u64, seq: u64) -> TraceRecord {
        TraceRecord {
            ino,
            parent,
            seq,
            created: 1,
            parent_since: 0,
            snaps: vec![30, 20],
            prior_parent_snaps: vec![10],
        }
    }

    fn msg() -> SnapMessage {
        SnapMessage {
            op: SnapOp::Split,
            split: 7,
            split_inos: vec![100, 101],
            split_realms: vec![8],
            trace: vec![rec(7, 1, 4), rec(1, 0, 9)],
        }
    }

    #[test]
    fn roundtrip() {
        let cfg = EngineConfig::default();
        let m = msg();
        let bytes = encode_snap_message(&m).unwrap();
        let back = decode_snap_message(&bytes, &cfg).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn truncated_buffers_rejected() {
        let cfg = EngineConfig::default();
        let bytes = encode_snap_message(&msg()).unwrap();
        for cut in [0, 1, 10, 23, 24, 40, bytes.len() - 1] {
            assert!(
                decode_snap_message(&bytes[..cut], &cfg).is_err(),
                "cut at {cut} must fail"
            );
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let cfg = EngineConfig::default();
        let mut bytes = encode_snap_message(&msg()).unwrap();
        bytes.push(0);
        assert!(decode_snap_message(&bytes, &cfg).is_err());
    }

    #[test]
    fn unknown_opcode_rejected() {
        let cfg = EngineConfig::default();
        let mut bytes = encode_snap_message(&msg()).unwrap();
        bytes[0] = 0xEE;
        assert!(decode_snap_message(&bytes, &cfg).is_err());
    }

    #[test]
    fn empty_trace_rejected() {
        let cfg = EngineConfig::default();
        let mut m = msg();
        m.trace.clear();
        let bytes = encode_snap_message(&m).unwrap();
        assert!(decode_snap_message(&bytes, &cfg).is_err());
    }

    #[test]
    fn self_parent_rejected() {
        let cfg = EngineConfig::default();
        let mut m = msg();
        m.trace = vec![rec(7, 7, 4)];
        let bytes = encode_snap_message(&m).unwrap();
        assert!(decode_snap_message(&bytes, &cfg).is_err());
    }

    #[test]
    fn snap_count_limit_enforced() {
        let cfg = EngineConfig::default().with_max_snaps_per_record(1);
        let bytes = encode_snap_message(&msg()).unwrap();
        assert!(decode_snap_message(&bytes, &cfg).is_err());
    }

    #[test]
    fn trace_record_limit_enforced() {
        let cfg = EngineConfig::default().with_max_trace_records(1);
        let bytes = encode_snap_message(&msg()).unwrap();
        assert!(decode_snap_message(&bytes, &cfg).is_err());
    }
}
