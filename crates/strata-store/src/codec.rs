//! Property codec for the container backend.
//!
//! Bridges an in-memory [`Value`] onto the container's native attribute
//! representation: fixed-width little-endian payloads for scalars and
//! numeric vectors, and 8-byte segment ids into the container's
//! variable-length heap for string data.
//!
//! # Variable-length read discipline
//!
//! Reading a string attribute makes the substrate allocate one buffer per
//! string ([`VlenBuffers`]). The codec copies those buffers into
//! caller-owned `String`s and then explicitly reclaims them; the buffers
//! also reclaim themselves on drop, so the release runs on every exit path
//! — a failed UTF-8 validation must not leak substrate memory. The
//! container keeps an outstanding-buffer count so leaks are observable.
//!
//! The write path mirrors this: the codec builds [`VlenDesc`] descriptors
//! that borrow the caller's string storage, and the heap copies out of them
//! inside the store call. No descriptor outlives the call.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_types::{DataType, Value};

use crate::error::{StoreError, StoreResult};

/// Width of a heap segment id in an attribute payload.
const SEGMENT_ID_BYTES: usize = 8;

/// Container-native representation of one stored property.
///
/// `len` is the element count (1 for scalars); the payload layout depends
/// on `dtype`. The size is derived from the value at write time, never
/// pre-declared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawAttr {
    pub dtype: DataType,
    pub len: u64,
    pub payload: Vec<u8>,
}

/// Write descriptor referencing caller-owned string bytes.
///
/// Built by the codec, consumed by [`VlenHeap::store`] within the same
/// call; the borrow makes a dangling descriptor unrepresentable.
pub(crate) struct VlenDesc<'a> {
    bytes: &'a [u8],
}

impl<'a> VlenDesc<'a> {
    pub(crate) fn new(s: &'a str) -> Self {
        Self { bytes: s.as_bytes() }
    }
}

/// The container's variable-length segment heap.
///
/// String payloads live here, keyed by segment id; attribute payloads hold
/// only the ids. Segments are freed when the owning attribute is
/// overwritten or removed, so the heap never accumulates orphans.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct VlenHeap {
    segments: BTreeMap<u64, Vec<u8>>,
    next_segment: u64,
}

impl VlenHeap {
    /// Copy a descriptor's bytes into a fresh segment and return its id.
    pub(crate) fn store(&mut self, desc: VlenDesc<'_>) -> u64 {
        let id = self.next_segment;
        self.next_segment += 1;
        self.segments.insert(id, desc.bytes.to_vec());
        id
    }

    /// Free a segment. Freeing an unknown id is a no-op.
    pub(crate) fn free(&mut self, id: u64) {
        self.segments.remove(&id);
    }

    /// Allocate read buffers for the given segments.
    ///
    /// Each returned buffer is a substrate-owned copy that the caller must
    /// reclaim; the outstanding counter tracks unreclaimed buffers.
    pub(crate) fn acquire(
        &self,
        ids: &[u64],
        counter: &Arc<AtomicUsize>,
        ctx: &str,
    ) -> StoreResult<VlenBuffers> {
        let mut bufs = Vec::with_capacity(ids.len());
        for id in ids {
            let seg = self.segments.get(id).ok_or_else(|| StoreError::Corrupt {
                path: ctx.to_string(),
                reason: format!("dangling vlen segment {id}"),
            })?;
            bufs.push(seg.clone());
        }
        Ok(VlenBuffers::new(bufs, Arc::clone(counter)))
    }

    /// Number of live segments (introspection for heap-leak tests).
    pub(crate) fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// Substrate-allocated read buffers for a variable-length attribute.
///
/// Must be reclaimed after the contents have been copied out; dropping the
/// value reclaims as a backstop so no exit path leaks.
pub struct VlenBuffers {
    bufs: Vec<Vec<u8>>,
    counter: Arc<AtomicUsize>,
    reclaimed: bool,
}

impl VlenBuffers {
    fn new(bufs: Vec<Vec<u8>>, counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(bufs.len(), Ordering::SeqCst);
        Self {
            bufs,
            counter,
            reclaimed: false,
        }
    }

    /// The per-string buffers, in attribute order.
    pub fn bufs(&self) -> &[Vec<u8>] {
        &self.bufs
    }

    /// Hand the buffers back to the substrate.
    ///
    /// Mandatory after copying; the surrounding read surfaces any reclaim
    /// failure only after the copied data is safe in caller-owned storage.
    pub fn reclaim(mut self) -> StoreResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if !self.reclaimed {
            self.counter.fetch_sub(self.bufs.len(), Ordering::SeqCst);
            self.bufs.clear();
            self.reclaimed = true;
        }
    }
}

impl Drop for VlenBuffers {
    fn drop(&mut self) {
        self.release();
    }
}

/// Encode a value into its container-native representation, storing any
/// variable-length string data in the heap.
pub(crate) fn encode(value: &Value, heap: &mut VlenHeap) -> RawAttr {
    match value {
        Value::Bool(b) => RawAttr {
            dtype: DataType::Bool,
            len: 1,
            payload: vec![u8::from(*b)],
        },
        Value::Int(i) => RawAttr {
            dtype: DataType::Int64,
            len: 1,
            payload: i.to_le_bytes().to_vec(),
        },
        Value::Float(x) => RawAttr {
            dtype: DataType::Float64,
            len: 1,
            payload: x.to_bits().to_le_bytes().to_vec(),
        },
        Value::FloatVec(v) => {
            let mut payload = Vec::with_capacity(v.len() * 8);
            for x in v {
                payload.extend_from_slice(&x.to_bits().to_le_bytes());
            }
            RawAttr {
                dtype: DataType::FloatVec,
                len: v.len() as u64,
                payload,
            }
        }
        Value::Str(s) => {
            let id = heap.store(VlenDesc::new(s));
            RawAttr {
                dtype: DataType::String,
                len: 1,
                payload: id.to_le_bytes().to_vec(),
            }
        }
        Value::StrVec(v) => {
            // Descriptors first (borrowing the caller's strings), then one
            // heap store per descriptor inside this call.
            let descs: Vec<VlenDesc<'_>> = v.iter().map(|s| VlenDesc::new(s)).collect();
            let mut payload = Vec::with_capacity(descs.len() * SEGMENT_ID_BYTES);
            for desc in descs {
                payload.extend_from_slice(&heap.store(desc).to_le_bytes());
            }
            RawAttr {
                dtype: DataType::StringVec,
                len: v.len() as u64,
                payload,
            }
        }
    }
}

/// Decode a container-native attribute back into a [`Value`].
///
/// `ctx` names the node/property for error context. Variable-length reads
/// acquire substrate buffers, copy them out, and reclaim them before
/// returning; the drop guard covers the error paths.
pub(crate) fn decode(
    attr: &RawAttr,
    heap: &VlenHeap,
    counter: &Arc<AtomicUsize>,
    ctx: &str,
) -> StoreResult<Value> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: ctx.to_string(),
        reason,
    };

    match attr.dtype {
        DataType::Bool => match attr.payload.as_slice() {
            [b] => Ok(Value::Bool(*b != 0)),
            other => Err(corrupt(format!("bool payload has {} bytes", other.len()))),
        },
        DataType::Int64 => {
            let bytes: [u8; 8] = attr.payload[..]
                .try_into()
                .map_err(|_| corrupt(format!("int payload has {} bytes", attr.payload.len())))?;
            Ok(Value::Int(i64::from_le_bytes(bytes)))
        }
        DataType::Float64 => {
            let bytes: [u8; 8] = attr.payload[..]
                .try_into()
                .map_err(|_| corrupt(format!("float payload has {} bytes", attr.payload.len())))?;
            Ok(Value::Float(f64::from_bits(u64::from_le_bytes(bytes))))
        }
        DataType::FloatVec => {
            if attr.payload.len() != attr.len as usize * 8 {
                return Err(corrupt(format!(
                    "float vector payload has {} bytes for {} elements",
                    attr.payload.len(),
                    attr.len
                )));
            }
            let values = attr
                .payload
                .chunks_exact(8)
                .map(|c| f64::from_bits(u64::from_le_bytes(c.try_into().expect("chunk of 8"))))
                .collect();
            Ok(Value::FloatVec(values))
        }
        DataType::String | DataType::StringVec => {
            let ids = segment_ids(&attr.payload, ctx)?;
            let bufs = heap.acquire(&ids, counter, ctx)?;

            // Copy into caller-owned strings. If validation fails here the
            // drop guard reclaims the substrate buffers.
            let mut strings = Vec::with_capacity(bufs.bufs().len());
            for raw in bufs.bufs() {
                let s = std::str::from_utf8(raw)
                    .map_err(|e| corrupt(format!("invalid utf-8 in vlen segment: {e}")))?;
                strings.push(s.to_string());
            }

            // The copy is complete; reclaim failure from here on cannot
            // lose data, only signal a leak upstream.
            bufs.reclaim()?;

            if attr.dtype == DataType::String {
                let mut strings = strings;
                let s = strings
                    .pop()
                    .ok_or_else(|| corrupt("string attribute with no segment".to_string()))?;
                if !strings.is_empty() {
                    return Err(corrupt("string attribute with multiple segments".to_string()));
                }
                Ok(Value::Str(s))
            } else {
                Ok(Value::StrVec(strings))
            }
        }
    }
}

/// Free the heap segments owned by an attribute, if it has any.
///
/// Must run whenever an attribute is overwritten or removed.
pub(crate) fn free_segments(attr: &RawAttr, heap: &mut VlenHeap) {
    if matches!(attr.dtype, DataType::String | DataType::StringVec) {
        if let Ok(ids) = segment_ids(&attr.payload, "") {
            for id in ids {
                heap.free(id);
            }
        }
    }
}

fn segment_ids(payload: &[u8], ctx: &str) -> StoreResult<Vec<u64>> {
    if payload.len() % SEGMENT_ID_BYTES != 0 {
        return Err(StoreError::Corrupt {
            path: ctx.to_string(),
            reason: format!("vlen payload of {} bytes is not id-aligned", payload.len()),
        });
    }
    Ok(payload
        .chunks_exact(SEGMENT_ID_BYTES)
        .map(|c| u64::from_le_bytes(c.try_into().expect("chunk of 8")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (VlenHeap, Arc<AtomicUsize>) {
        (VlenHeap::default(), Arc::new(AtomicUsize::new(0)))
    }

    #[test]
    fn roundtrip_scalars() {
        let (mut heap, counter) = fresh();
        for v in [
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(i64::MIN),
            Value::Float(-2.5),
        ] {
            let raw = encode(&v, &mut heap);
            let back = decode(&raw, &heap, &counter, "t").unwrap();
            assert_eq!(v, back);
        }
    }

    #[test]
    fn roundtrip_float_vec() {
        let (mut heap, counter) = fresh();
        let v = Value::FloatVec(vec![1.0, 0.5, -3.25]);
        let raw = encode(&v, &mut heap);
        assert_eq!(raw.len, 3);
        assert_eq!(decode(&raw, &heap, &counter, "t").unwrap(), v);
    }

    #[test]
    fn roundtrip_empty_float_vec() {
        let (mut heap, counter) = fresh();
        let v = Value::FloatVec(vec![]);
        let raw = encode(&v, &mut heap);
        assert_eq!(decode(&raw, &heap, &counter, "t").unwrap(), v);
    }

    #[test]
    fn float_nan_bits_survive() {
        let (mut heap, counter) = fresh();
        let raw = encode(&Value::Float(f64::NAN), &mut heap);
        let back = decode(&raw, &heap, &counter, "t").unwrap();
        match back {
            Value::Float(x) => assert!(x.is_nan()),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn roundtrip_strings() {
        let (mut heap, counter) = fresh();
        let v = Value::Str("membrane voltage".to_string());
        let raw = encode(&v, &mut heap);
        assert_eq!(heap.segment_count(), 1);
        assert_eq!(decode(&raw, &heap, &counter, "t").unwrap(), v);
    }

    #[test]
    fn roundtrip_string_array() {
        let (mut heap, counter) = fresh();
        let v = Value::StrVec(vec!["mV".into(), "ms".into(), "".into()]);
        let raw = encode(&v, &mut heap);
        assert_eq!(raw.len, 3);
        assert_eq!(heap.segment_count(), 3);
        assert_eq!(decode(&raw, &heap, &counter, "t").unwrap(), v);
    }

    #[test]
    fn roundtrip_empty_string_array() {
        let (mut heap, counter) = fresh();
        let v = Value::StrVec(vec![]);
        let raw = encode(&v, &mut heap);
        assert_eq!(decode(&raw, &heap, &counter, "t").unwrap(), v);
    }

    #[test]
    fn vlen_reads_reclaim_buffers() {
        let (mut heap, counter) = fresh();
        let raw = encode(&Value::StrVec(vec!["a".into(), "b".into()]), &mut heap);
        for _ in 0..100 {
            decode(&raw, &heap, &counter, "t").unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_utf8_still_reclaims() {
        let (mut heap, counter) = fresh();
        let id = heap.store(VlenDesc { bytes: &[0xff, 0xfe] });
        let raw = RawAttr {
            dtype: DataType::String,
            len: 1,
            payload: id.to_le_bytes().to_vec(),
        };
        let err = decode(&raw, &heap, &counter, "t").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        // The drop guard must have released the acquired buffers.
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dangling_segment_is_corrupt() {
        let (heap, counter) = fresh();
        let raw = RawAttr {
            dtype: DataType::String,
            len: 1,
            payload: 99u64.to_le_bytes().to_vec(),
        };
        let err = decode(&raw, &heap, &counter, "t").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn free_segments_releases_heap_entries() {
        let (mut heap, _) = fresh();
        let raw = encode(&Value::StrVec(vec!["x".into(), "y".into()]), &mut heap);
        assert_eq!(heap.segment_count(), 2);
        free_segments(&raw, &mut heap);
        assert_eq!(heap.segment_count(), 0);
    }

    #[test]
    fn free_segments_ignores_fixed_width() {
        let (mut heap, _) = fresh();
        let keep = encode(&Value::Str("keep".into()), &mut heap);
        let num = encode(&Value::FloatVec(vec![1.0]), &mut heap);
        free_segments(&num, &mut heap);
        assert_eq!(heap.segment_count(), 1);
        free_segments(&keep, &mut heap);
        assert_eq!(heap.segment_count(), 0);
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let (heap, counter) = fresh();
        let raw = RawAttr {
            dtype: DataType::Int64,
            len: 1,
            payload: vec![1, 2, 3],
        };
        assert!(matches!(
            decode(&raw, &heap, &counter, "t").unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn misaligned_vlen_payload_is_corrupt() {
        let (heap, counter) = fresh();
        let raw = RawAttr {
            dtype: DataType::StringVec,
            len: 1,
            payload: vec![0; 7],
        };
        assert!(matches!(
            decode(&raw, &heap, &counter, "t").unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }
}
