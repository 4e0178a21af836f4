//! Core type tests for tasklet-core

use tasklet_core::{Events, StatusMask, TaskId, TaskStatus, TkError};

#[test]
fn test_status_bits_are_distinct() {
    let all = [
        TaskStatus::Idle,
        TaskStatus::Running,
        TaskStatus::Waiting,
        TaskStatus::Terminating,
        TaskStatus::Terminated,
    ];
    let combined = all.iter().fold(0u8, |acc, s| acc | s.bits());
    assert_eq!(combined.count_ones(), 5);
}

#[test]
fn test_mask_composition() {
    let mask = StatusMask::NONE | TaskStatus::Waiting;
    assert!(mask.contains(TaskStatus::Waiting));
    assert!(!mask.contains(TaskStatus::Running));
}

#[test]
fn test_task_id_display() {
    let id = TaskId::new(4, 2);
    assert_eq!(format!("{}", id), "task#4.2");
    assert_eq!(id.index(), 4);
}

#[test]
fn test_error_codes() {
    assert_eq!(TkError::Os(5).code(), 5);
    assert_eq!(TkError::AllocationFailure.code(), 12);
    assert_eq!(format!("{}", TkError::PoolFull), "Task pool is full");
}

#[test]
fn test_event_union() {
    let events = Events::IN | Events::OUT;
    assert!(events.contains(Events::IN));
    assert!(!events.contains(Events::ERR));
}
