// tests against the process-wide default registry. tests run concurrently and share it, so every
// test uses its own keys.

use correlate::{
    error::WaitError,
    answer_req,
    apply_req,
    default_registry,
};
use std::{
    thread,
    time::{Duration, Instant},
};

#[test]
fn answer_from_other_thread() {
    let req = apply_req("answer_from_other_thread").unwrap();
    let join = thread::spawn(|| {
        thread::sleep(Duration::from_millis(100));
        answer_req("answer_from_other_thread", Ok("ok"));
    });
    let v = req.wait_answer(Duration::from_secs(5)).unwrap();
    assert_eq!(*v.downcast::<&str>().unwrap(), "ok");
    join.join().unwrap();
}

#[test]
fn answer_with_error_from_other_thread() {
    let req = apply_req("answer_with_error_from_other_thread").unwrap();
    let join = thread::spawn(|| {
        thread::sleep(Duration::from_millis(50));
        answer_req::<()>("answer_with_error_from_other_thread", Err(anyhow::anyhow!("test")));
    });
    let e = req.wait_answer(Duration::from_secs(5)).unwrap_err();
    assert_eq!(e.into_answered().unwrap().to_string(), "test");
    join.join().unwrap();
}

#[test]
fn answer_before_wait() {
    let req = apply_req("answer_before_wait").unwrap();
    answer_req("answer_before_wait", Ok(42u64));
    let v = req.wait_answer(Duration::from_millis(200)).unwrap();
    assert_eq!(*v.downcast::<u64>().unwrap(), 42);
}

#[test]
fn timeout() {
    let req = apply_req("timeout").unwrap();
    let start = Instant::now();
    let e = req.wait_answer(Duration::from_millis(200)).unwrap_err();
    assert!(matches!(e, WaitError::DeadlineExceeded(_)));
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[test]
fn repetition_apply() {
    let _req = apply_req("repetition_apply").unwrap();
    assert!(apply_req("repetition_apply").is_none());
}

#[test]
fn repetition_wait() {
    let req = apply_req("repetition_wait").unwrap();
    let _ = req.wait_answer(Duration::from_millis(20));
    assert!(req.wait_answer(Duration::from_millis(20)).unwrap_err().is_repetition_call());
}

#[test]
fn delete() {
    let req = apply_req("delete").unwrap();
    req.delete();
    assert!(apply_req("delete").is_some());
}

#[test]
fn wait_error_into_anyhow() {
    fn wait(key: &str) -> anyhow::Result<u8> {
        let req = apply_req(key).unwrap();
        let v = req.wait_answer(Duration::from_millis(10))?;
        Ok(*v.downcast::<u8>().map_err(|_| anyhow::anyhow!("wrong type"))?)
    }
    let e = wait("wait_error_into_anyhow").unwrap_err();
    assert_eq!(e.to_string(), "deadline exceeded");
}

#[test]
fn default_shard_count() {
    assert_eq!(default_registry().shard_count(), 256);
}
