#[cfg(test)]
mod tests {
    extern crate sdp_rs as sdp;

    #[test]
    fn crc16_known_values() {
        assert_eq!(0x0000, sdp::crc16(&[]));
        assert_eq!(0x0c1e, sdp::crc16(&[0x01, 0x02, 0x03]));
        assert_eq!(0x0104, sdp::crc16(&[0x7e]));
        assert_eq!(0x8f51, sdp::crc16(&[0x7d, 0x66]));
        // trailer low byte collides with the end-of-frame delimiter
        assert_eq!(0x0066, sdp::crc16(&[0x11]));
    }

    #[test]
    fn crc16_incremental_matches_one_shot() {
        let data = [0xaa, 0xbb, 0xcc, 0xdd, 0x7e, 0x00];
        let mut context = sdp::Crc16Context::new();
        for &byte in data.iter() {
            context.step(byte);
        }
        assert_eq!(sdp::crc16(&data), context.finalize());
    }

    #[test]
    fn message_with_own_trailer_verifies_to_zero() {
        let payload = [0x01, 0x02, 0x03];
        let crc = sdp::crc16(&payload);
        let mut raw = payload.to_vec();
        raw.push((crc >> 8) as u8);
        raw.push((crc & 0xff) as u8);
        assert!(sdp::verify(&raw));

        raw[1] ^= 0x01;
        assert!(!sdp::verify(&raw));
    }

    #[test]
    fn compose_plain_payload() {
        let mut frame = [0u8; 32];
        let size = sdp::compose(
            &mut frame,
            sdp::Header::Ack(sdp::ACK),
            &[0x01, 0x02, 0x03],
            0x0c1e,
        )
        .unwrap();
        assert_eq!(
            &frame[..size],
            &[0x7e, 0x00, 0x01, 0x02, 0x03, 0x0c, 0x1e, 0x66]
        );
    }

    #[test]
    fn compose_escapes_sof_in_payload() {
        let mut frame = [0u8; 32];
        let size = sdp::compose(&mut frame, sdp::Header::Ack(sdp::ACK), &[0x7e], 0x0104).unwrap();
        assert_eq!(&frame[..size], &[0x7e, 0x00, 0x7d, 0x5e, 0x01, 0x04, 0x66]);
    }

    #[test]
    fn compose_escapes_dle_and_eof_in_payload() {
        let mut frame = [0u8; 32];
        let size = sdp::compose(
            &mut frame,
            sdp::Header::Ack(sdp::ACK),
            &[0x7d, 0x66],
            0x8f51,
        )
        .unwrap();
        assert_eq!(
            &frame[..size],
            &[0x7e, 0x00, 0x7d, 0x5d, 0x7d, 0x46, 0x8f, 0x51, 0x66]
        );
    }

    #[test]
    fn compose_escapes_crc_trailer() {
        // crc16([0x11]) = 0x0066, the low byte must go out stuffed
        let mut frame = [0u8; 32];
        let size = sdp::compose(&mut frame, sdp::Header::Ack(sdp::ACK), &[0x11], 0x0066).unwrap();
        assert_eq!(&frame[..size], &[0x7e, 0x00, 0x11, 0x00, 0x7d, 0x46, 0x66]);
    }

    #[test]
    fn compose_full_duplex_header() {
        let mut frame = [0u8; 32];
        let size = sdp::compose(
            &mut frame,
            sdp::Header::ResponseStatus(sdp::DATA, sdp::STATUS_OK),
            &[0x01, 0x02, 0x03],
            0x0c1e,
        )
        .unwrap();
        assert_eq!(
            &frame[..size],
            &[0x7e, 0x00, 0xff, 0x01, 0x02, 0x03, 0x0c, 0x1e, 0x66]
        );
    }

    #[test]
    fn compose_rejects_empty_payload() {
        let mut frame = [0u8; 32];
        let result = sdp::compose(&mut frame, sdp::Header::Ack(sdp::ACK), &[], 0);
        assert_eq!(Err(sdp::Error::NoPayload), result);
    }

    #[test]
    fn compose_worst_case_fits_max_frame_size() {
        // every payload byte needs escaping
        let max_payload: u8 = 8;
        let payload = [0x7e; 8];
        let crc = sdp::crc16(&payload);
        let bound = sdp::HeaderVariant::HalfDuplex.max_frame_size(max_payload);
        let mut frame = vec![0u8; bound];
        let size = sdp::compose(&mut frame, sdp::Header::Ack(sdp::ACK), &payload, crc).unwrap();
        assert!(size <= bound);

        // no bare delimiter between the frame's own SOF and EOF
        assert_eq!(sdp::SOF, frame[0]);
        assert_eq!(sdp::EOF, frame[size - 1]);
        for &byte in &frame[1..size - 1] {
            assert_ne!(sdp::SOF, byte);
            assert_ne!(sdp::EOF, byte);
        }
    }

    #[test]
    fn compose_reports_overflow() {
        let payload = [0x7e, 0x7d, 0x66, 0x7e];
        let crc = sdp::crc16(&payload);
        let mut frame = [0u8; 64];
        let size = sdp::compose(&mut frame, sdp::Header::Ack(sdp::ACK), &payload, crc).unwrap();

        let mut short = vec![0u8; size - 1];
        let result = sdp::compose(&mut short, sdp::Header::Ack(sdp::ACK), &payload, crc);
        assert_eq!(Err(sdp::Error::FrameTooBig), result);
    }

    #[test]
    fn stuff_unstuff_round_trip() {
        let cases: [&[u8]; 5] = [
            &[],
            &[0x01, 0x02, 0x03],
            &[0x7e, 0x7d, 0x66],
            &[0x7e; 16],
            &[0x00, 0x7d, 0x5e, 0x20, 0xff],
        ];
        for data in cases.iter() {
            let stuffed = sdp::stuff(data);
            for &byte in &stuffed[..] {
                if byte == sdp::SOF || byte == sdp::EOF {
                    panic!("delimiter survived stuffing");
                }
            }
            assert_eq!(Some(data.to_vec()), sdp::unstuff(&stuffed));
        }
    }

    #[test]
    fn unstuff_rejects_bad_escapes() {
        // dangling escape at the end
        assert_eq!(None, sdp::unstuff(&[0x01, 0x7d]));
        // escape announcing a byte that never needs escaping
        assert_eq!(None, sdp::unstuff(&[0x7d, 0x00]));
    }

    #[test]
    fn composed_frames_recover_their_payload() {
        let cases: [&[u8]; 8] = [
            &[0x01],
            &[0x7e],
            &[0x7d],
            &[0x66],
            &[0x01, 0x02, 0x03],
            &[0x7e, 0x7d, 0x66, 0x7e, 0x7d, 0x66],
            // payloads whose CRC trailer contains a delimiter byte
            &[0x11],
            &[0x15],
        ];
        for payload in cases.iter() {
            let crc = sdp::crc16(payload);
            let mut frame = [0u8; 64];
            let size = sdp::compose(&mut frame, sdp::Header::Ack(sdp::ACK), payload, crc).unwrap();

            // strip SOF, header and EOF, then undo the stuffing
            let body = &frame[2..size - 1];
            let raw = sdp::unstuff(body).unwrap();
            assert!(sdp::verify(&raw));
            assert_eq!(payload.to_vec(), raw[..raw.len() - sdp::CRC_SIZE].to_vec());
        }
    }
}
