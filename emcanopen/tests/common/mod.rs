#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use emcanopen::config::{BitTiming, Config};
use emcanopen::core::{EmergencyCode, Fault, StdId};
use emcanopen::fault::FaultSink;
use emcanopen::frame::{Data, Frame, TxHeader};
use emcanopen::hal::{Can, HalError, LinkErrors, MailboxId, Notifications, RxFifo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentFrame {
    pub id: u16,
    pub rtr: bool,
    pub data: Data,
    pub mailbox: MailboxId,
}

#[derive(Debug, Default)]
pub struct CanState {
    pub free_mailboxes: u32,
    pub reject_tx: bool,
    pub abort_supported: bool,
    pub fail_start: bool,
    pub fail_notifications: bool,
    pub fail_stop: bool,
    pub fail_configure: bool,
    pub fail_filter: bool,
    pub started: bool,
    pub configured: Option<(BitTiming, Config)>,
    pub notifications: Option<Notifications>,
    pub filter_calls: Vec<RxFifo>,
    pub sent: Vec<SentFrame>,
    pub aborted: Vec<MailboxId>,
    pub rx: [VecDeque<Frame>; 2],
    pub errors: LinkErrors,
    next_mailbox: u8,
}

/// Controller model with three mailboxes that never complete on their own
#[derive(Debug, Default)]
pub struct MockCan {
    pub state: Mutex<CanState>,
}

impl MockCan {
    pub fn new() -> Self {
        let can = Self::default();
        can.with(|s| s.free_mailboxes = 3);
        can
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut CanState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.with(|s| s.sent.clone())
    }

    pub fn sent_ids(&self) -> Vec<u16> {
        self.with(|s| s.sent.iter().map(|f| f.id).collect())
    }

    pub fn set_free(&self, free: u32) {
        self.with(|s| s.free_mailboxes = free);
    }

    /// Completes the transmission in one mailbox.
    pub fn complete_one(&self) {
        self.with(|s| s.free_mailboxes = (s.free_mailboxes + 1).min(3));
    }

    pub fn push_rx(&self, fifo: RxFifo, frame: Frame) {
        self.with(|s| s.rx[usize::from(fifo)].push_back(frame));
    }

    pub fn set_errors(&self, errors: LinkErrors) {
        self.with(|s| s.errors = errors);
    }
}

fn fail_if(fail: bool) -> Result<(), HalError> {
    if fail { Err(HalError) } else { Ok(()) }
}

impl Can for MockCan {
    fn configure(&self, timing: &BitTiming, config: &Config) -> Result<(), HalError> {
        self.with(|s| {
            fail_if(s.fail_configure)?;
            s.configured = Some((*timing, *config));
            Ok(())
        })
    }

    fn configure_pass_all_filter(&self, fifo: RxFifo) -> Result<(), HalError> {
        self.with(|s| {
            fail_if(s.fail_filter)?;
            s.filter_calls.push(fifo);
            Ok(())
        })
    }

    fn start(&self) -> Result<(), HalError> {
        self.with(|s| {
            fail_if(s.fail_start)?;
            s.started = true;
            Ok(())
        })
    }

    fn stop(&self) -> Result<(), HalError> {
        self.with(|s| {
            s.started = false;
            fail_if(s.fail_stop)
        })
    }

    fn enable_notifications(&self, events: Notifications) -> Result<(), HalError> {
        self.with(|s| {
            fail_if(s.fail_notifications)?;
            s.notifications = Some(events);
            Ok(())
        })
    }

    fn free_mailbox_count(&self) -> u32 {
        self.with(|s| s.free_mailboxes)
    }

    fn add_message(&self, header: &TxHeader, data: &Data) -> Result<MailboxId, HalError> {
        self.with(|s| {
            if s.reject_tx || s.free_mailboxes == 0 {
                return Err(HalError);
            }
            s.free_mailboxes -= 1;
            let mailbox = MailboxId::new(s.next_mailbox);
            s.next_mailbox = (s.next_mailbox + 1) % 3;
            s.sent.push(SentFrame {
                id: header.id.into_u16(),
                rtr: header.rtr,
                data: Data::from_raw(header.length, *data.raw()),
                mailbox,
            });
            Ok(mailbox)
        })
    }

    fn abort_message(&self, mailbox: MailboxId) -> bool {
        self.with(|s| {
            if s.abort_supported {
                s.aborted.push(mailbox);
            }
            s.abort_supported
        })
    }

    fn receive(&self, fifo: RxFifo) -> Option<Frame> {
        self.with(|s| s.rx[usize::from(fifo)].pop_front())
    }

    fn link_errors(&self) -> LinkErrors {
        self.with(|s| s.errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEvent {
    Report(Fault, EmergencyCode, u32),
    Reset(Fault, u32),
}

/// Fault collaborator that records every call and tracks active conditions
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FaultEvent>>,
    active: Mutex<Vec<Fault>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<FaultEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<FaultEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn reports(&self, fault: Fault) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, FaultEvent::Report(f, _, _) if *f == fault))
            .count()
    }
}

impl FaultSink for RecordingSink {
    fn report(&self, fault: Fault, code: EmergencyCode, info: u32) {
        self.events
            .lock()
            .unwrap()
            .push(FaultEvent::Report(fault, code, info));
        let mut active = self.active.lock().unwrap();
        if !active.contains(&fault) {
            active.push(fault);
        }
    }

    fn reset(&self, fault: Fault, info: u32) {
        self.events.lock().unwrap().push(FaultEvent::Reset(fault, info));
        self.active.lock().unwrap().retain(|f| *f != fault);
    }

    fn is_active(&self, fault: Fault) -> bool {
        self.active.lock().unwrap().contains(&fault)
    }
}

pub fn std_id(id: u16) -> StdId {
    StdId::new(id).unwrap()
}

pub fn data_frame(id: u16, data: &[u8]) -> Frame {
    Frame::new(std_id(id), data).unwrap()
}
