//! One-shot bitstream conformance gate.
//!
//! The frame assembler assumes start-code (Annex B) delimited packets for the
//! H.264/H.265 families. This check runs once per stream session, on the
//! first packet that carries a usable decode timestamp, and fails terminally
//! when the convention does not hold: nothing downstream can be trusted if
//! the framing assumption is wrong.

use anyhow::{bail, Result};

use crate::stream::Packet;
use crate::CodecId;

const START_CODE_LONG: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const START_CODE_SHORT: [u8; 3] = [0x00, 0x00, 0x01];

#[derive(Debug, Default)]
pub struct BitstreamValidator {
    validated: bool,
}

impl BitstreamValidator {
    pub fn new() -> Self {
        BitstreamValidator { validated: false }
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Validate the first usable packet of a session. Subsequent calls are
    /// no-ops. Families without start codes (AV1) pass unconditionally.
    pub fn check(&mut self, codec: CodecId, packet: &Packet) -> Result<()> {
        if self.validated {
            return Ok(());
        }
        if !codec.uses_start_codes() {
            self.validated = true;
            return Ok(());
        }
        if packet.data.starts_with(&START_CODE_LONG) || packet.data.starts_with(&START_CODE_SHORT)
        {
            self.validated = true;
            return Ok(());
        }
        let prefix = &packet.data[..packet.data.len().min(4)];
        bail!(
            "{} bitstream is not start-code delimited (leading bytes {:02x?}); \
             the relay only supports Annex B byte streams",
            codec,
            prefix
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimeBase;

    fn packet(data: Vec<u8>) -> Packet {
        Packet {
            data,
            pts: Some(0),
            dts: Some(0),
            duration: 1,
            time_base: TimeBase::new(1, 30),
            is_keyframe: true,
            width: 1920,
            height: 1080,
        }
    }

    #[test]
    fn four_byte_start_code_passes() -> Result<()> {
        let mut validator = BitstreamValidator::new();
        validator.check(CodecId::H264, &packet(vec![0, 0, 0, 1, 0x67, 0x42]))?;
        assert!(validator.is_validated());
        Ok(())
    }

    #[test]
    fn three_byte_start_code_passes() -> Result<()> {
        let mut validator = BitstreamValidator::new();
        validator.check(CodecId::H265, &packet(vec![0, 0, 1, 0x40]))?;
        assert!(validator.is_validated());
        Ok(())
    }

    #[test]
    fn other_prefix_fails() {
        let mut validator = BitstreamValidator::new();
        let err = validator
            .check(CodecId::H264, &packet(vec![0x1f, 0x2e, 0x3d, 0x4c]))
            .unwrap_err();
        assert!(err.to_string().contains("not start-code delimited"));
        assert!(!validator.is_validated());
    }

    #[test]
    fn av1_skips_start_code_check() -> Result<()> {
        let mut validator = BitstreamValidator::new();
        validator.check(CodecId::Av1, &packet(vec![0x12, 0x00]))?;
        assert!(validator.is_validated());
        Ok(())
    }

    #[test]
    fn check_runs_at_most_once() -> Result<()> {
        let mut validator = BitstreamValidator::new();
        validator.check(CodecId::H264, &packet(vec![0, 0, 0, 1, 0x67]))?;
        // A later malformed packet no longer trips the gate.
        validator.check(CodecId::H264, &packet(vec![0xff, 0xff, 0xff, 0xff]))?;
        Ok(())
    }
}
