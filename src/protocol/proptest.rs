//! Property-based tests for the frame codec.
//!
//! These tests use proptest to verify:
//! - Roundtrip of every send and receive frame
//! - Decoding never panics on arbitrary input
//! - Path and trailing data stay separated for any path contents

#![cfg(test)]

use proptest::prelude::*;

use crate::protocol::{Chunk, FileInfo, PtyOpenOptions, RecvFrame, SendFrame};

// =============================================================================
// Arbitrary Generators
// =============================================================================

prop_compose! {
    fn arb_pty_options()(
        cmd in ".{0,32}",
        args in prop::collection::vec(".{0,16}", 0..8),
        env in prop::collection::vec("[A-Z_]{1,8}=.{0,16}", 0..8),
        inherit_env in any::<bool>(),
    ) -> PtyOpenOptions {
        PtyOpenOptions { cmd, args, env, inherit_env }
    }
}

prop_compose! {
    fn arb_chunk()(
        offset in any::<u64>(),
        data in prop::collection::vec(any::<u8>(), 0..2048),
    ) -> Chunk {
        Chunk::new(offset, data)
    }
}

prop_compose! {
    fn arb_file_info()(
        path in "/[a-zA-Z0-9/._-]{0,64}",
        size in any::<u64>(),
        mode in any::<u32>(),
        mtime in any::<i64>(),
    ) -> FileInfo {
        FileInfo { path, size, mode, mtime }
    }
}

fn arb_send_frame() -> impl Strategy<Value = SendFrame> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..512).prop_map(SendFrame::PtyWrite),
        arb_pty_options().prop_map(SendFrame::PtyOpen),
        Just(SendFrame::PtyClose),
        (any::<u16>(), any::<u16>()).prop_map(|(cols, rows)| SendFrame::PtyResize { cols, rows }),
        (".{0,64}", arb_chunk())
            .prop_map(|(path, chunk)| SendFrame::FileWriteOrTruncate { path, chunk }),
        ".{0,64}".prop_map(|path| SendFrame::FileQueryInfo { path }),
        (".{0,64}", any::<i64>(), any::<u64>()).prop_map(|(path, offset, max_length)| {
            SendFrame::FileRead {
                path,
                offset,
                max_length,
            }
        }),
    ]
}

fn arb_recv_frame() -> impl Strategy<Value = RecvFrame> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..512).prop_map(RecvFrame::PtyData),
        Just(RecvFrame::PtyOpened),
        Just(RecvFrame::PtyClosed),
        (".{0,64}", any::<u64>()).prop_map(|(path, offset)| RecvFrame::FileWritten { path, offset }),
        arb_file_info().prop_map(RecvFrame::FileInfo),
        (".{0,64}", arb_chunk()).prop_map(|(path, chunk)| RecvFrame::FileChunkRead { path, chunk }),
        ".{0,128}".prop_map(RecvFrame::Log),
    ]
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn roundtrip_send_frame(frame in arb_send_frame()) {
        let encoded = frame.encode().unwrap();
        prop_assert_eq!(encoded[0], frame.message_type().as_u8());
        let decoded = SendFrame::decode(&encoded).unwrap();
        prop_assert_eq!(frame, decoded);
    }

    #[test]
    fn roundtrip_recv_frame(frame in arb_recv_frame()) {
        let encoded = frame.encode().unwrap();
        let decoded = RecvFrame::decode(&encoded).unwrap();
        prop_assert_eq!(frame, decoded);
    }

    #[test]
    fn roundtrip_pty_options(options in arb_pty_options()) {
        let bytes = options.to_msgpack().unwrap();
        prop_assert_eq!(PtyOpenOptions::from_msgpack(&bytes).unwrap(), options);
    }

    #[test]
    fn roundtrip_resize(cols in any::<u16>(), rows in any::<u16>()) {
        let encoded = SendFrame::PtyResize { cols, rows }.encode().unwrap();
        prop_assert_eq!(encoded.len(), 5);
        match SendFrame::decode(&encoded).unwrap() {
            SendFrame::PtyResize { cols: c, rows: r } => {
                prop_assert_eq!((c, r), (cols, rows));
            }
            other => prop_assert!(false, "unexpected frame {:?}", other),
        }
    }

    #[test]
    fn chunk_path_survives_any_utf8(
        path in "\\PC{0,32}",
        data in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let frame = RecvFrame::FileChunkRead { path: path.clone(), chunk: Chunk::new(0, data.clone()) };
        match RecvFrame::decode(&frame.encode().unwrap()).unwrap() {
            RecvFrame::FileChunkRead { path: p, chunk } => {
                prop_assert_eq!(p, path);
                prop_assert_eq!(chunk.data, data);
            }
            other => prop_assert!(false, "unexpected frame {:?}", other),
        }
    }

    #[test]
    fn decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = RecvFrame::decode(&data);
        let _ = SendFrame::decode(&data);
    }
}
