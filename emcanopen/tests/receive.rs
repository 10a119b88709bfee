mod common;

use std::sync::Mutex;

use common::{MockCan, RecordingSink, data_frame, std_id};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use emcanopen::Error;
use emcanopen::config::Config;
use emcanopen::frame::{DataLength, Frame};
use emcanopen::hal::RxFifo;
use emcanopen::module::Module;
use emcanopen::registry::{RxHandler, RxSlot, TxSlot};

type TestModule<'a> = Module<'a, CriticalSectionRawMutex, &'a MockCan, RecordingSink>;

#[derive(Default)]
struct Inbox(Mutex<Vec<Frame>>);

impl Inbox {
    fn frames(&self) -> Vec<Frame> {
        self.0.lock().unwrap().clone()
    }
}

impl RxHandler for Inbox {
    fn on_frame(&self, frame: &Frame) {
        self.0.lock().unwrap().push(*frame);
    }
}

#[test]
fn test_disjoint_ranges() {
    let inboxes: [Inbox; 3] = Default::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 3];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();

    for (index, base) in [0x100, 0x200, 0x300].into_iter().enumerate() {
        module
            .init_rx_slot(index, std_id(base), 0x7F0, false, &inboxes[index])
            .unwrap();
    }
    module.enter_normal_mode().unwrap();

    let frame = data_frame(0x205, &[0xDE, 0xAD, 0xBE, 0xEF]);
    can.push_rx(RxFifo::Fifo0, frame);
    module.on_rx_pending(RxFifo::Fifo0);

    assert!(inboxes[0].frames().is_empty());
    assert_eq!(inboxes[1].frames(), [frame]);
    assert!(inboxes[2].frames().is_empty());
    assert_eq!(inboxes[1].frames()[0].id().into_u16(), 0x205);
    assert_eq!(&*inboxes[1].frames()[0].data, &[0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn test_masked_bits() {
    let inbox = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 1];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();
    module
        .init_rx_slot(0, std_id(0x580), 0x780, false, &inbox)
        .unwrap();

    for id in 0x580..=0x5FF {
        assert!(module.process_rx_frame(&data_frame(id, &[])));
    }
    for id in [0x000, 0x57F, 0x600, 0x780, 0x7FF] {
        assert!(!module.process_rx_frame(&data_frame(id, &[])));
    }
    assert_eq!(inbox.frames().len(), 0x80);
}

#[test]
fn test_rtr_is_discriminated() {
    let data = Inbox::default();
    let remote = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 2];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();
    module.init_rx_slot(0, std_id(0x181), 0x7FF, false, &data).unwrap();
    module.init_rx_slot(1, std_id(0x181), 0x7FF, true, &remote).unwrap();

    let request = Frame::new_remote(std_id(0x181), DataLength::new(8).unwrap());
    assert!(module.process_rx_frame(&request));
    assert!(module.process_rx_frame(&data_frame(0x181, &[1])));

    assert_eq!(data.frames(), [data_frame(0x181, &[1])]);
    assert_eq!(remote.frames(), [request]);
}

#[test]
fn test_overlap_lowest_index_wins() {
    let specific = Inbox::default();
    let general = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 2];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();
    module.init_rx_slot(1, std_id(0x000), 0x000, false, &general).unwrap();
    module.init_rx_slot(0, std_id(0x0A0), 0x7FF, false, &specific).unwrap();

    module.process_rx_frame(&data_frame(0x0A0, &[]));
    module.process_rx_frame(&data_frame(0x0A1, &[]));

    assert_eq!(specific.frames().len(), 1);
    assert_eq!(general.frames()[0].id().into_u16(), 0x0A1);
    assert_eq!(general.frames().len(), 1);
}

#[test]
fn test_unmatched_frames_are_dropped() {
    let inbox = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 4];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();
    module.init_rx_slot(3, std_id(0x700), 0x7FF, false, &inbox).unwrap();

    can.push_rx(RxFifo::Fifo1, data_frame(0x701, &[5]));
    can.push_rx(RxFifo::Fifo1, data_frame(0x080, &[]));
    module.on_rx_pending(RxFifo::Fifo1);

    assert!(inbox.frames().is_empty());
    assert!(faults.events().is_empty());
    assert!(can.with(|s| s.rx[1].is_empty()));
}

#[test]
fn test_both_fifos_drain_until_empty() {
    let inbox = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 1];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();
    module.init_rx_slot(0, std_id(0x000), 0x000, false, &inbox).unwrap();

    can.push_rx(RxFifo::Fifo0, data_frame(0x010, &[]));
    can.push_rx(RxFifo::Fifo0, data_frame(0x011, &[]));
    can.push_rx(RxFifo::Fifo1, data_frame(0x020, &[]));

    module.on_rx_pending(RxFifo::Fifo1);
    module.on_rx_pending(RxFifo::Fifo0);

    let ids: Vec<u16> = inbox.frames().iter().map(|f| f.id().into_u16()).collect();
    assert_eq!(ids, [0x020, 0x010, 0x011]);
}

#[test]
fn test_filter_programmed_once() {
    let inbox = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 3];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();

    for index in 0..3 {
        module
            .init_rx_slot(index, std_id(0x100 + index as u16), 0x7FF, false, &inbox)
            .unwrap();
    }
    assert_eq!(can.with(|s| s.filter_calls.clone()), [RxFifo::Fifo0]);

    // Re-initialisation drops the filter along with the slots
    module.init(&Config::default()).unwrap();
    assert!(!module.rx_slot(0).unwrap().is_bound());
    module.init_rx_slot(0, std_id(0x100), 0x7FF, false, &inbox).unwrap();
    assert_eq!(can.with(|s| s.filter_calls.len()), 2);
}

#[test]
fn test_filter_failure_leaves_slot_unbound() {
    let inbox = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 1];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();

    can.with(|s| s.fail_filter = true);
    assert_eq!(
        module.init_rx_slot(0, std_id(0x200), 0x7FF, false, &inbox),
        Err(Error::HardwareError)
    );
    assert!(!module.rx_slot(0).unwrap().is_bound());
    assert!(!module.process_rx_frame(&data_frame(0x200, &[])));

    // Next registration retries the filter
    can.with(|s| s.fail_filter = false);
    module.init_rx_slot(0, std_id(0x200), 0x7FF, false, &inbox).unwrap();
    assert_eq!(can.with(|s| s.filter_calls.clone()), [RxFifo::Fifo0]);
    assert!(module.process_rx_frame(&data_frame(0x200, &[])));
    assert_eq!(inbox.frames().len(), 1);
}

#[test]
fn test_invalid_rx_slot_index() {
    let inbox = Inbox::default();
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 2];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();

    assert_eq!(
        module.init_rx_slot(2, std_id(0x100), 0x7FF, false, &inbox),
        Err(Error::InvalidArgument)
    );
    assert!(can.with(|s| s.filter_calls.is_empty()));
    assert_eq!(module.rx_capacity(), 2);
}

#[test]
fn test_closure_handler() {
    let count = Mutex::new(0u32);
    let handler = |frame: &Frame| *count.lock().unwrap() += u32::from(frame.data[0]);
    let can = MockCan::new();
    let faults = RecordingSink::default();
    let mut rx_slots = [RxSlot::EMPTY; 1];
    let mut tx_slots = [TxSlot::EMPTY; 1];
    let module = TestModule::new(&can, &faults, &mut rx_slots, &mut tx_slots);
    module.init(&Config::default()).unwrap();
    module.init_rx_slot(0, std_id(0x200), 0x7FF, false, &handler).unwrap();

    module.process_rx_frame(&data_frame(0x200, &[3]));
    module.process_rx_frame(&data_frame(0x200, &[4]));
    assert_eq!(*count.lock().unwrap(), 7);
}
