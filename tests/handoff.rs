#![allow(missing_docs)]

//! Handoff rendezvous and the handoff-backed executor, across threads.

mod common;

use confluence::channel::{ExecutorExt, handoff_channel};
use confluence::stream::Chunk;
use confluence::{Exit, Handoff, Take};
use futures_lite::StreamExt;
use futures_lite::future::block_on;
use proptest::prelude::*;
use std::future::Future;
use std::task::{Context, Poll};
use std::thread;

#[test]
fn offer_completes_only_once_taken() {
    common::init_test_logging();
    confluence::test_phase!("offer_completes_only_once_taken");
    let handoff = Handoff::new();
    let waker = confluence::test_utils::noop_waker();
    let mut cx = Context::from_waker(&waker);

    let mut offer = Box::pin(handoff.offer(7_u32));
    assert!(offer.as_mut().poll(&mut cx).is_pending());
    confluence::assert_with_log!(handoff.is_full(), "value resident", true, handoff.is_full());
    assert!(offer.as_mut().poll(&mut cx).is_pending());

    assert_eq!(handoff.try_take(), Some(7));
    assert!(!handoff.is_full());
    assert_eq!(offer.as_mut().poll(&mut cx), Poll::Ready(()));
    confluence::test_complete!("offer_completes_only_once_taken");
}

#[test]
fn try_take_on_empty_returns_none() {
    common::init_test_logging();
    confluence::test_phase!("try_take_on_empty_returns_none");
    let handoff: Handoff<u8> = Handoff::new();
    assert_eq!(handoff.try_take(), None);
    assert!(!handoff.is_full());
    confluence::test_complete!("try_take_on_empty_returns_none");
}

#[test]
fn second_offer_waits_for_the_occupant() {
    common::init_test_logging();
    confluence::test_phase!("second_offer_waits_for_the_occupant");
    let handoff = Handoff::new();
    let waker = confluence::test_utils::noop_waker();
    let mut cx = Context::from_waker(&waker);

    let mut first = Box::pin(handoff.offer("a"));
    let mut second = Box::pin(handoff.offer("b"));
    assert!(first.as_mut().poll(&mut cx).is_pending());
    assert!(second.as_mut().poll(&mut cx).is_pending());

    assert_eq!(handoff.try_take(), Some("a"));
    assert_eq!(first.as_mut().poll(&mut cx), Poll::Ready(()));
    assert!(second.as_mut().poll(&mut cx).is_pending());
    assert_eq!(handoff.try_take(), Some("b"));
    assert_eq!(second.as_mut().poll(&mut cx), Poll::Ready(()));
    confluence::test_complete!("second_offer_waits_for_the_occupant");
}

#[test]
fn producer_thread_feeds_consumer_in_order() {
    common::init_test_logging();
    confluence::test_phase!("producer_thread_feeds_consumer_in_order");
    let handoff = Handoff::new();
    let producer = {
        let handoff = handoff.clone();
        thread::spawn(move || {
            block_on(async {
                for i in 0..100_u32 {
                    handoff.offer(i).await;
                }
            });
        })
    };

    let received: Vec<u32> = block_on(async {
        let mut received = Vec::new();
        for _ in 0..100 {
            received.push(handoff.take().await);
        }
        received
    });
    producer.join().expect("producer thread");
    let expected: Vec<u32> = (0..100).collect();
    confluence::assert_with_log!(received == expected, "offer order kept", expected, received);
    confluence::test_complete!("producer_thread_feeds_consumer_in_order");
}

#[test]
fn handoff_executor_collects_chunks_until_end() {
    common::init_test_logging();
    confluence::test_phase!("handoff_executor_collects_chunks_until_end");
    let (sink, executor) = handoff_channel::<&'static str, u32>();
    let producer = thread::spawn(move || {
        block_on(async {
            sink.emit(1).await;
            sink.emit_chunk(Chunk::from(vec![2, 3])).await;
            sink.emit_chunk(Chunk::empty()).await;
            sink.emit(4).await;
            sink.end().await;
        });
    });

    let exit = block_on(executor.collect());
    producer.join().expect("producer thread");
    let (items, ()) = exit.into_result().expect("source ends cleanly");
    assert_eq!(items, vec![1, 2, 3, 4]);
    confluence::test_complete!("handoff_executor_collects_chunks_until_end");
}

#[test]
fn handoff_executor_reports_producer_failure() {
    common::init_test_logging();
    confluence::test_phase!("handoff_executor_reports_producer_failure");
    let (sink, executor) = handoff_channel::<&'static str, u32>();
    let producer = thread::spawn(move || {
        block_on(async {
            sink.emit(1).await;
            sink.fail("disk full").await;
        });
    });

    let takes: Vec<Take<&str, u32>> = block_on(executor.into_take_stream().collect());
    producer.join().expect("producer thread");
    assert_eq!(takes.len(), 2);
    assert_eq!(takes[0], Take::singleton(1));
    confluence::assert_with_log!(
        takes[1] == Take::fail("disk full"),
        "failure take last",
        Take::<&str, u32>::fail("disk full"),
        takes[1]
    );
    assert_eq!(takes[1].clone().into_exit(), Exit::fail(Some("disk full")));
    confluence::test_complete!("handoff_executor_reports_producer_failure");
}

proptest! {
    #[test]
    fn sequential_offers_and_takes_preserve_order(values in proptest::collection::vec(any::<i64>(), 0..64)) {
        let handoff = Handoff::new();
        let producer = {
            let handoff = handoff.clone();
            let values = values.clone();
            thread::spawn(move || {
                block_on(async {
                    for v in values {
                        handoff.offer(v).await;
                    }
                });
            })
        };
        let received: Vec<i64> = block_on(async {
            let mut out = Vec::with_capacity(values.len());
            for _ in 0..values.len() {
                out.push(handoff.take().await);
            }
            out
        });
        producer.join().expect("producer thread");
        prop_assert_eq!(received, values);
        prop_assert!(handoff.try_take().is_none());
    }
}
