//! Firmware flashing through the Riden bootloader.
//!
//! The bootloader speaks a raw ASCII protocol on the same serial port, with no Modbus framing:
//!
//! ```text
//!  Normal
//!    |
//!  ProbingBootloader --"boot"--> AlreadyInBootloader --+
//!    |                                                  |
//!  TriggeringReboot --reboot, settle, probe once------> BootloaderReady --> Flashing --> Done
//!
//!  any failure ==> Failed
//! ```
//!
//! Every reply has a fixed length. A read that times out yields whatever arrived so far, which
//! then fails the comparison. Nothing in here is retried, and a rejected chunk aborts the
//! transfer: the device is left with a partial image and must be flashed again.

use core::fmt;
use std::thread;

use log::{debug, info, trace, warn};

use crate::{
    config::{BootloaderConfig, RetryPolicy},
    error::{Error, Result},
    model::{ModelProfile, ProductModel},
    register::{BOOTLOADER_MAGIC, RidenRegister},
    session::DeviceSession,
    transport::{RtuMaster, SerialLink, read_until_full},
};

/// Bytes per firmware chunk. The final chunk may be shorter.
pub const CHUNK_SIZE: usize = 64;

const QUERY: &[u8] = b"queryd\r\n";
const QUERY_REPLY: &[u8] = b"boot";
const INFO: &[u8] = b"getinf\r\n";
const INFO_TAG: &[u8] = b"inf";
const INFO_LEN: usize = 13;
const UPLOAD: &[u8] = b"upfirm\r\n";
const UPLOAD_REPLY: &[u8] = b"upredy";
const CHUNK_ACK: &[u8] = b"OK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootloaderState {
    /// Nothing sent yet.
    Normal,
    ProbingBootloader,
    AlreadyInBootloader,
    TriggeringReboot,
    BootloaderReady,
    Flashing,
    Done,
    Failed,
}

/// Device report of the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootloaderInfo {
    /// Raw model code, same encoding as the identity register. `60125` => RD6012P.
    pub id: u16,
    /// E.g. `6012` for both the RD6012 and the RD6012P.
    pub model_number: u16,
}

impl BootloaderInfo {
    fn from_id(id: u16) -> Self {
        Self {
            id,
            model_number: id / 10,
        }
    }

    /// The model including its variant, if the code is a known one.
    pub fn model(&self) -> Option<ProductModel> {
        ProductModel::try_from(self.id).ok()
    }
}

impl fmt::Display for BootloaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model() {
            Some(model) => write!(f, "{model}"),
            None => write!(f, "RD{}", self.model_number),
        }
    }
}

/// Drives the bootloader over an exclusively owned serial link.
///
/// No [`DeviceSession`] may use the same port while a client exists.
pub struct BootloaderClient<S: SerialLink> {
    link: S,
    /// Modbus unit address, used to trigger the reboot.
    unit_id: u8,
    config: BootloaderConfig,
    state: BootloaderState,
}

impl<S: SerialLink> BootloaderClient<S> {
    pub fn new(link: S, unit_id: u8, config: BootloaderConfig) -> Self {
        Self {
            link,
            unit_id,
            config,
            state: BootloaderState::Normal,
        }
    }

    pub fn state(&self) -> BootloaderState {
        self.state
    }

    pub fn link(&self) -> &S {
        &self.link
    }

    pub fn into_link(self) -> S {
        self.link
    }

    /// Bring the device into its bootloader, rebooting it if needed.
    ///
    /// Returns the path taken: [`BootloaderState::AlreadyInBootloader`] or
    /// [`BootloaderState::TriggeringReboot`]. Either way the client ends up
    /// [`BootloaderState::BootloaderReady`].
    pub fn enter(&mut self) -> Result<BootloaderState, S::Error> {
        let outcome = self.try_enter();
        self.settle(outcome)
    }

    /// Ask the bootloader which device it runs on.
    ///
    /// Only valid once [`Self::enter`] succeeded.
    pub fn query_info(&mut self) -> Result<BootloaderInfo, S::Error> {
        self.expect_state(&[BootloaderState::BootloaderReady, BootloaderState::Done])?;
        let outcome = self.try_query_info();
        self.settle(outcome)
    }

    /// Upload a firmware image in [`CHUNK_SIZE`] chunks, in order.
    ///
    /// `progress` is called after every acknowledged chunk with the bytes sent so far and
    /// the image size. Only valid right after [`Self::enter`] (and optionally
    /// [`Self::query_info`]); nothing is sent otherwise.
    pub fn flash(
        &mut self,
        image: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<(), S::Error> {
        self.expect_state(&[BootloaderState::BootloaderReady])?;
        let outcome = self.try_flash(image, &mut progress);
        self.settle(outcome)
    }

    fn try_enter(&mut self) -> Result<BootloaderState, S::Error> {
        if self.probe()? {
            self.transition(BootloaderState::AlreadyInBootloader);
            self.transition(BootloaderState::BootloaderReady);
            return Ok(BootloaderState::AlreadyInBootloader);
        }

        self.transition(BootloaderState::TriggeringReboot);
        self.trigger_reboot()?;
        debug!("Waiting {:?} for the device to reboot", self.config.settle_delay);
        thread::sleep(self.config.settle_delay);
        self.link.reconnect().map_err(Error::SerialError)?;

        if !self.probe()? {
            return Err(Error::BootloaderEntryFailed);
        }
        self.transition(BootloaderState::BootloaderReady);
        Ok(BootloaderState::TriggeringReboot)
    }

    /// Send `queryd` and check for `boot`.
    fn probe(&mut self) -> Result<bool, S::Error> {
        self.transition(BootloaderState::ProbingBootloader);
        self.link
            .set_timeout(self.config.timeout)
            .map_err(Error::SerialError)?;
        self.link.open().map_err(Error::SerialError)?;

        let reply = self.command::<4>(QUERY)?;
        let in_bootloader = reply.as_slice() == QUERY_REPLY;
        debug!("Bootloader probe: {reply:02X?} (in bootloader: {in_bootloader})");
        Ok(in_bootloader)
    }

    /// Reboot through Modbus. The link is only borrowed, so the raw protocol continues on the
    /// same port afterwards.
    fn trigger_reboot(&mut self) -> Result<(), S::Error> {
        let master = RtuMaster::new(&mut self.link, self.unit_id);
        let mut session = DeviceSession::with_retry(master, RetryPolicy::default());

        let identity = session.read_identity()?;
        match ModelProfile::detect(identity.id) {
            Ok(profile) => info!("Found device: {}", profile.model),
            Err(err) => warn!("{err}, rebooting anyway"),
        }
        session.write_register_unacknowledged(RidenRegister::System, BOOTLOADER_MAGIC)
    }

    fn try_query_info(&mut self) -> Result<BootloaderInfo, S::Error> {
        let reply = self.command::<INFO_LEN>(INFO)?;
        if reply.len() != INFO_LEN || !reply.starts_with(INFO_TAG) {
            warn!("Invalid bootloader info: {reply:02X?}");
            return Err(Error::InvalidBootloaderResponse);
        }

        let info = BootloaderInfo::from_id(u16::from_le_bytes([reply[7], reply[8]]));
        info!("Bootloader reports {info}");
        Ok(info)
    }

    fn try_flash(
        &mut self,
        image: &[u8],
        progress: &mut impl FnMut(usize, usize),
    ) -> Result<(), S::Error> {
        self.transition(BootloaderState::Flashing);
        let reply = self.command::<6>(UPLOAD)?;
        if reply.as_slice() != UPLOAD_REPLY {
            warn!("Flash mode refused: {reply:02X?}");
            return Err(Error::FlashModeRejected);
        }

        info!("Flashing {} bytes", image.len());
        for (chunk, data) in image.chunks(CHUNK_SIZE).enumerate() {
            let offset = chunk * CHUNK_SIZE;
            let ack = self.command::<2>(data)?;
            if ack.as_slice() != CHUNK_ACK {
                warn!("Chunk {chunk} at offset {offset} rejected: {ack:02X?}");
                return Err(Error::ChunkRejected { chunk, offset });
            }
            progress(offset + data.len(), image.len());
        }

        self.transition(BootloaderState::Done);
        Ok(())
    }

    /// Write `command` and read a reply of up to `N` bytes.
    fn command<const N: usize>(&mut self, command: &[u8]) -> Result<heapless::Vec<u8, N>, S::Error> {
        trace!("TX {command:02X?}");
        self.link.write_all(command).map_err(Error::SerialError)?;
        self.link.flush().map_err(Error::SerialError)?;

        let mut buf = [0u8; N];
        let len = read_until_full(&mut self.link, &mut buf).map_err(Error::SerialError)?;
        trace!("RX {:02X?}", &buf[..len]);
        heapless::Vec::from_slice(&buf[..len]).map_err(|_| Error::BufferError)
    }

    fn expect_state(&self, allowed: &[BootloaderState]) -> Result<(), S::Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            warn!("Bootloader not ready, client is {:?}", self.state);
            Err(Error::BootloaderNotReady(self.state))
        }
    }

    fn transition(&mut self, state: BootloaderState) {
        info!("=> {state:?}");
        self.state = state;
    }

    fn settle<T>(&mut self, outcome: Result<T, S::Error>) -> Result<T, S::Error> {
        if outcome.is_err() {
            self.transition(BootloaderState::Failed);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::mock_serial::MockSerial;

    const READ_IDENTITY: [u8; 8] = [0x01, 0x03, 0x00, 0x00, 0x00, 0x04, 0x44, 0x09];
    /// RD6012, serial 1234, firmware 128.
    const IDENTITY_REPLY: [u8; 13] = [
        0x01, 0x03, 0x08, 0xEA, 0xD9, 0x00, 0x00, 0x04, 0xD2, 0x00, 0x80, 0xF3, 0x84,
    ];
    const WRITE_BOOTLOADER: [u8; 8] = [0x01, 0x06, 0x01, 0x00, 0x16, 0x01, 0x47, 0x96];

    fn client(mock: MockSerial) -> BootloaderClient<MockSerial> {
        let config = BootloaderConfig::default().with_settle_delay(Duration::ZERO);
        BootloaderClient::new(mock, 0x01, config)
    }

    fn ready_client(replies: &[&[u8]]) -> BootloaderClient<MockSerial> {
        let mut mock = MockSerial::new();
        mock.queue_reply(b"boot");
        for reply in replies {
            mock.queue_reply(reply);
        }
        let mut client = client(mock);
        client.enter().unwrap();
        client
    }

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn already_in_bootloader_sends_no_reboot() {
        let mut mock = MockSerial::new();
        mock.queue_reply(b"boot");

        let mut client = client(mock);
        assert_eq!(client.enter().unwrap(), BootloaderState::AlreadyInBootloader);
        assert_eq!(client.state(), BootloaderState::BootloaderReady);
        assert_eq!(client.link().written_data(), QUERY);
        assert_eq!(client.link().reconnected(), 0);
    }

    #[test]
    fn reboots_into_bootloader() {
        let mut mock = MockSerial::new();
        mock.queue_reply(b"");
        mock.queue_reply(&IDENTITY_REPLY);
        // Device reboots without answering.
        mock.queue_reply(b"");
        mock.queue_reply(b"boot");

        let mut client = client(mock);
        assert_eq!(client.enter().unwrap(), BootloaderState::TriggeringReboot);
        assert_eq!(client.state(), BootloaderState::BootloaderReady);

        let expected = [QUERY, &READ_IDENTITY[..], &WRITE_BOOTLOADER[..], QUERY].concat();
        assert_eq!(client.link().written_data(), expected.as_slice());
        assert_eq!(client.link().reconnected(), 1);
    }

    #[test]
    fn entry_fails_after_a_single_reprobe() {
        let mut mock = MockSerial::new();
        mock.queue_reply(b"nope");
        mock.queue_reply(&IDENTITY_REPLY);
        mock.queue_reply(b"");
        mock.queue_reply(b"nope");
        mock.queue_reply(b"boot");

        let mut client = client(mock);
        assert!(matches!(client.enter(), Err(Error::BootloaderEntryFailed)));
        assert_eq!(client.state(), BootloaderState::Failed);

        // Exactly two probes.
        let written = client.link().written_data();
        assert!(written.ends_with(&[&WRITE_BOOTLOADER[..], QUERY].concat()));
    }

    #[test]
    fn info_reports_model_number() {
        let reply = [
            b'i', b'n', b'f', 0x00, 0x00, 0x00, 0x00, 0xD8, 0xEA, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut client = ready_client(&[&reply]);

        let info = client.query_info().unwrap();
        assert_eq!(info.model_number, 6012);
        assert_eq!(info.model(), Some(ProductModel::RD6012));
        assert_eq!(info.to_string(), "RD6012");
        assert_eq!(client.state(), BootloaderState::BootloaderReady);
    }

    #[test]
    fn info_keeps_the_variant() {
        // 60125
        let reply = [
            b'i', b'n', b'f', 0x00, 0x00, 0x00, 0x00, 0xDD, 0xEA, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut client = ready_client(&[&reply]);

        let info = client.query_info().unwrap();
        assert_eq!(info.id, 60125);
        assert_eq!(info.model_number, 6012);
        assert_eq!(info.to_string(), "RD6012P");

        // Unknown codes still print the model number.
        assert_eq!(BootloaderInfo::from_id(60990).to_string(), "RD6099");
    }

    #[test]
    fn info_rejects_wrong_tag_or_length() {
        let mut client = ready_client(&[b"xyz0000000000"]);
        assert!(matches!(
            client.query_info(),
            Err(Error::InvalidBootloaderResponse)
        ));
        assert_eq!(client.state(), BootloaderState::Failed);

        let mut client = ready_client(&[b"inf00000"]);
        assert!(matches!(
            client.query_info(),
            Err(Error::InvalidBootloaderResponse)
        ));

        // Silence.
        let mut client = ready_client(&[]);
        assert!(matches!(
            client.query_info(),
            Err(Error::InvalidBootloaderResponse)
        ));
    }

    #[test]
    fn flash_streams_every_chunk() {
        let mut client = ready_client(&[b"upredy", b"OK", b"OK", b"OK"]);
        let firmware = image(150);

        let mut reports = Vec::new();
        client
            .flash(&firmware, |sent, total| reports.push((sent, total)))
            .unwrap();

        assert_eq!(client.state(), BootloaderState::Done);
        assert_eq!(reports, vec![(64, 150), (128, 150), (150, 150)]);
        let expected = [QUERY, UPLOAD, &firmware[..]].concat();
        assert_eq!(client.link().written_data(), expected.as_slice());
    }

    #[test]
    fn rejected_chunk_stops_the_transfer() {
        let mut client = ready_client(&[b"upredy", b"OK", b"NO", b"OK"]);
        let firmware = image(150);

        let err = client.flash(&firmware, |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::ChunkRejected {
                chunk: 1,
                offset: 64
            }
        ));
        assert_eq!(client.state(), BootloaderState::Failed);

        // The third chunk never left.
        let expected = [QUERY, UPLOAD, &firmware[..128]].concat();
        assert_eq!(client.link().written_data(), expected.as_slice());
    }

    #[test]
    fn flash_requires_entering_the_bootloader_first() {
        let mut mock = MockSerial::new();
        mock.queue_reply(b"upredy");
        let mut client = client(mock);

        let err = client.flash(&image(10), |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::BootloaderNotReady(BootloaderState::Normal)
        ));
        assert!(matches!(
            client.query_info(),
            Err(Error::BootloaderNotReady(BootloaderState::Normal))
        ));
        assert_eq!(client.state(), BootloaderState::Normal);
        assert!(client.link().written_data().is_empty());
    }

    #[test]
    fn failed_client_cannot_flash() {
        let mut client = ready_client(&[b"xyz0000000000"]);
        assert!(client.query_info().is_err());

        let err = client.flash(&image(10), |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::BootloaderNotReady(BootloaderState::Failed)
        ));
        assert_eq!(
            client.link().written_data(),
            [QUERY, INFO].concat().as_slice()
        );
    }

    #[test]
    fn flash_mode_must_be_acknowledged() {
        let mut client = ready_client(&[b"busy!!"]);
        let err = client.flash(&image(10), |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::FlashModeRejected));
        assert_eq!(client.state(), BootloaderState::Failed);
        assert_eq!(
            client.link().written_data(),
            [QUERY, UPLOAD].concat().as_slice()
        );
    }
}
