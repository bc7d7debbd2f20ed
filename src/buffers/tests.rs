use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::*;

fn drain<T>(rx: &mut mpsc::UnboundedReceiver<Batch<T>>) -> Vec<Batch<T>> {
    let mut batches = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        batches.push(batch);
    }
    batches
}

// -- Threshold trigger --

#[test]
fn threshold_cuts_exactly_n_items_in_order() {
    let (buffer, mut rx) = BatchBuffer::new(3);
    buffer.append("a").unwrap();
    buffer.append("b").unwrap();
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    buffer.append("c").unwrap();
    let batch = rx.try_recv().unwrap();
    assert_eq!(batch.items, vec!["a", "b", "c"]);
    assert_eq!(batch.trigger, FlushTrigger::Threshold);
    assert!(buffer.is_empty(), "pending list should be swapped for an empty one");
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn below_threshold_nothing_is_cut() {
    let (buffer, mut rx) = BatchBuffer::new(20);
    for i in 0..19 {
        buffer.append(i).unwrap();
    }
    assert_eq!(buffer.len(), 19);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn consecutive_batches_get_increasing_sequence_numbers() {
    let (buffer, mut rx) = BatchBuffer::new(2);
    for i in 0..6 {
        buffer.append(i).unwrap();
    }
    let batches = drain(&mut rx);
    let seqs: Vec<u64> = batches.iter().map(|b| b.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    assert_eq!(batches[2].items, vec![4, 5]);
}

#[test]
fn zero_max_count_is_clamped_to_one() {
    let (buffer, mut rx) = BatchBuffer::new(0);
    assert_eq!(buffer.max_count(), 1);
    buffer.append(1).unwrap();
    assert_eq!(rx.try_recv().unwrap().items, vec![1]);
}

// -- Manual flush / close --

#[test]
fn manual_flush_cuts_pending_and_skips_when_empty() {
    let (buffer, mut rx) = BatchBuffer::new(10);
    assert_eq!(buffer.flush(FlushTrigger::Manual), 0);
    assert!(drain(&mut rx).is_empty(), "empty flush must not emit a batch");

    buffer.append(1).unwrap();
    buffer.append(2).unwrap();
    assert_eq!(buffer.flush(FlushTrigger::Manual), 2);
    let batch = rx.try_recv().unwrap();
    assert_eq!(batch.items, vec![1, 2]);
    assert_eq!(batch.trigger, FlushTrigger::Manual);
}

#[tokio::test]
async fn close_cuts_remaining_and_ends_the_stream() {
    let (buffer, mut rx) = BatchBuffer::new(10);
    buffer.append("last").unwrap();

    assert_eq!(buffer.close(), 1);
    assert!(buffer.is_closed());
    assert_eq!(buffer.append("late"), Err(BufferError::Closed));

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.items, vec!["last"]);
    assert_eq!(batch.trigger, FlushTrigger::Shutdown);
    assert!(rx.recv().await.is_none(), "sender should be dropped on close");
}

#[test]
fn dropped_receiver_does_not_break_append() {
    let (buffer, rx) = BatchBuffer::new(2);
    drop(rx);
    buffer.append(1).unwrap();
    buffer.append(2).unwrap();
    assert!(buffer.is_empty(), "cut still happens, batch is dropped with a warning");
}

// -- Interval trigger --

#[tokio::test(start_paused = true)]
async fn interval_flushes_partial_batch_once() {
    let cancel = CancellationToken::new();
    let (buffer, mut rx) = BatchBuffer::new(20);
    let ticker = buffer.spawn_ticker(Duration::from_secs(5), cancel.clone());
    let start = Instant::now();

    for i in 0..5 {
        buffer.append(i).unwrap();
    }

    // Nothing before the first tick.
    assert!(
        time::timeout(Duration::from_millis(4_999), rx.recv())
            .await
            .is_err()
    );

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.items, vec![0, 1, 2, 3, 4]);
    assert_eq!(batch.trigger, FlushTrigger::Interval);
    assert!(start.elapsed() >= Duration::from_secs(5));

    // Later ticks find nothing and emit nothing.
    assert!(
        time::timeout(Duration::from_secs(20), rx.recv())
            .await
            .is_err()
    );

    cancel.cancel();
    ticker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn threshold_flush_happens_before_the_tick() {
    let cancel = CancellationToken::new();
    let (buffer, mut rx) = BatchBuffer::new(3);
    let _ticker = buffer.spawn_ticker(Duration::from_secs(5), cancel.clone());
    let start = Instant::now();

    time::advance(Duration::from_millis(300)).await;
    buffer.append("e1").unwrap();
    time::advance(Duration::from_millis(300)).await;
    buffer.append("e2").unwrap();
    time::advance(Duration::from_millis(300)).await;
    buffer.append("e3").unwrap();

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.items, vec!["e1", "e2", "e3"]);
    assert_eq!(batch.trigger, FlushTrigger::Threshold);
    assert!(start.elapsed() < Duration::from_secs(1));

    // The tick that follows has nothing left to send.
    assert!(
        time::timeout(Duration::from_secs(6), rx.recv())
            .await
            .is_err()
    );
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn threshold_cut_restarts_the_timer() {
    let cancel = CancellationToken::new();
    let (buffer, mut rx) = BatchBuffer::new(2);
    let _ticker = buffer.spawn_ticker(Duration::from_secs(5), cancel.clone());
    let start = Instant::now();

    time::advance(Duration::from_secs(4)).await;
    buffer.append(1).unwrap();
    buffer.append(2).unwrap();
    assert_eq!(rx.recv().await.unwrap().trigger, FlushTrigger::Threshold);

    buffer.append(3).unwrap();

    // Without the reset the tick would fire at t=5s.
    assert!(
        time::timeout(Duration::from_millis(4_900), rx.recv())
            .await
            .is_err()
    );

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.items, vec![3]);
    assert_eq!(batch.trigger, FlushTrigger::Interval);
    assert!(start.elapsed() >= Duration::from_secs(9));
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn cancelled_ticker_stops_flushing() {
    let cancel = CancellationToken::new();
    let (buffer, mut rx) = BatchBuffer::new(20);
    let ticker = buffer.spawn_ticker(Duration::from_secs(1), cancel.clone());

    cancel.cancel();
    ticker.await.unwrap();

    buffer.append(1).unwrap();
    time::advance(Duration::from_secs(10)).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(buffer.len(), 1);
}

// -- Concurrency --

#[test]
fn concurrent_appends_are_delivered_exactly_once() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 1_000;

    let (buffer, mut rx) = BatchBuffer::new(7);

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let buffer = buffer.clone();
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    buffer.append((t, i)).unwrap();
                }
            });
        }
    });
    buffer.close();

    let mut batches = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(batch) => batches.push(batch),
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => panic!("sender should be closed"),
        }
    }

    // Batches arrive in cut order.
    for (expected, batch) in batches.iter().enumerate() {
        assert_eq!(batch.seq, expected as u64);
    }

    let mut seen = HashSet::new();
    let mut last_per_thread = [None::<usize>; THREADS];
    for batch in &batches {
        match batch.trigger {
            FlushTrigger::Threshold => assert_eq!(batch.items.len(), 7),
            FlushTrigger::Shutdown => assert!(batch.items.len() < 7),
            other => panic!("unexpected trigger {other}"),
        }
        for &(t, i) in &batch.items {
            assert!(seen.insert((t, i)), "({t}, {i}) delivered twice");
            // Each producer's items stay in call order across batches.
            if let Some(prev) = last_per_thread[t] {
                assert!(i > prev);
            }
            last_per_thread[t] = Some(i);
        }
    }
    assert_eq!(seen.len(), THREADS * PER_THREAD, "no item lost");
}
