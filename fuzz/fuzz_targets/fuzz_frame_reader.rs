#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use logpipe::error::FrameError;
use logpipe::event::ConvertedEvent;
use logpipe::frame::FrameCodec;
use logpipe::relay::ControlCommand;

fuzz_target!(|data: &[u8]| {
    // Small limit so the oversize path is exercised too
    let events: FrameCodec<ConvertedEvent> = FrameCodec::default().with_max_frame_len(256);
    let commands: FrameCodec<ControlCommand> = FrameCodec::default().with_max_frame_len(256);

    let mut reader = Cursor::new(data);
    loop {
        match events.read_frame(&mut reader) {
            Ok(event) => {
                // Anything decoded must encode back into exactly one frame
                let frame = events.encode(&event).expect("decoded event re-encodes");
                assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);
            }
            Err(FrameError::Closed | FrameError::IncompleteFrame { .. }) => break,
            Err(_) => {}
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let mut reader = data;
        while let Ok(_) | Err(FrameError::MalformedFrame { .. } | FrameError::OversizedFrame { .. }) =
            commands.read_frame_async(&mut reader).await
        {}
    });
});
