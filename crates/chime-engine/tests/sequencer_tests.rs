mod common;

use chime_engine::{Error, VoiceClipOptions, VoiceClipSequencer};
use common::{GatedBackend, RecordingBackend};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::timeout;

fn out() -> VoiceClipOptions {
    VoiceClipOptions { device_name: "out".into(), volume: 1.0, rate: 1.0 }
}

#[tokio::test]
async fn three_clips_play_in_order_one_at_a_time() {
    let (backend, mut calls) = GatedBackend::new();
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());

    seq.enqueue(vec![1], out());
    seq.enqueue(vec![2], out());
    seq.enqueue(vec![3], out());

    for expected in 1u8..=3 {
        let (req, done) = calls.recv().await.unwrap();
        assert_eq!(req.data, vec![expected]);
        assert_eq!(req.device_name, "out");
        assert_eq!(req.volume, Some(1.0));
        assert_eq!(req.rate, Some(1.0));
        assert_eq!(req.speed, 1.0);
        assert!(seq.is_playing());

        // Nothing else is issued while this clip is outstanding.
        assert!(timeout(Duration::from_millis(30), calls.recv()).await.is_err());
        done.send(Ok(())).unwrap();
    }

    seq.wait_idle().await;
    assert!(!seq.is_playing());
    assert_eq!(seq.pending(), 0);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(calls.try_recv().is_err());
}

#[tokio::test]
async fn clips_queued_mid_playback_wait_their_turn() {
    let (backend, mut calls) = GatedBackend::new();
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());

    seq.enqueue(b"first".to_vec(), out());
    let (req, done) = calls.recv().await.unwrap();
    assert_eq!(req.data, b"first");

    seq.enqueue(b"second".to_vec(), out());
    seq.enqueue(b"third".to_vec(), out());
    assert_eq!(seq.pending(), 2);

    done.send(Ok(())).unwrap();
    let (req, done) = calls.recv().await.unwrap();
    assert_eq!(req.data, b"second");
    assert_eq!(seq.pending(), 1);
    done.send(Ok(())).unwrap();
    let (req, done) = calls.recv().await.unwrap();
    assert_eq!(req.data, b"third");
    done.send(Ok(())).unwrap();

    seq.wait_idle().await;
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_backend_does_not_wedge_the_queue() {
    let backend = RecordingBackend::new();
    backend.panic_on.lock().push(vec![1]);
    backend.panic_on.lock().push(vec![3]);
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());

    seq.enqueue(vec![1], out());
    timeout(Duration::from_secs(5), seq.wait_idle()).await.unwrap();
    assert!(!seq.is_playing());

    // Clips enqueued after the panic still reach the backend, and a panic
    // mid-queue does not drop the clips behind it.
    for i in 2u8..=4 {
        seq.enqueue(vec![i], out());
    }
    timeout(Duration::from_secs(5), seq.wait_idle()).await.unwrap();
    assert_eq!(backend.payloads(), vec![vec![1], vec![2], vec![3], vec![4]]);
    assert_eq!(seq.pending(), 0);
    assert!(!seq.is_playing());
}

#[tokio::test]
async fn failed_clip_does_not_stall_the_queue() {
    let (backend, mut calls) = GatedBackend::new();
    let seq = VoiceClipSequencer::new(backend, Handle::current());

    for i in 0u8..3 {
        seq.enqueue(vec![i], out());
    }
    let (req, done) = calls.recv().await.unwrap();
    assert_eq!(req.data, vec![0]);
    done.send(Err(Error::Backend("no such device".into()))).unwrap();

    let (req, done) = calls.recv().await.unwrap();
    assert_eq!(req.data, vec![1]);
    // Dropping the completion counts as a settled call too.
    drop(done);

    let (req, done) = calls.recv().await.unwrap();
    assert_eq!(req.data, vec![2]);
    done.send(Ok(())).unwrap();

    seq.wait_idle().await;
    assert!(calls.try_recv().is_err());
}

#[tokio::test]
async fn long_queue_drains_in_enqueue_order() {
    let backend = RecordingBackend::new();
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());

    let expected: Vec<Vec<u8>> = (0u16..500).map(|i| i.to_be_bytes().to_vec()).collect();
    for payload in &expected {
        seq.enqueue(payload.clone(), out());
    }
    seq.wait_idle().await;

    assert_eq!(backend.payloads(), expected);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueuers_keep_their_own_order() {
    let backend = RecordingBackend::new();
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());

    let mut tasks = Vec::new();
    for producer in 0u8..4 {
        let seq = seq.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0u8..25 {
                seq.enqueue(vec![producer, i], out());
                tokio::task::yield_now().await;
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    seq.wait_idle().await;

    let played = backend.payloads();
    assert_eq!(played.len(), 100);
    for producer in 0u8..4 {
        let seen: Vec<u8> = played.iter().filter(|p| p[0] == producer).map(|p| p[1]).collect();
        assert_eq!(seen, (0u8..25).collect::<Vec<_>>());
    }
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn enqueue_from_a_plain_thread() {
    let backend = RecordingBackend::new();
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());

    let producer = seq.clone();
    std::thread::spawn(move || {
        for i in 0u8..10 {
            producer.enqueue(vec![i], VoiceClipOptions::new("speakers"));
        }
    })
    .join()
    .unwrap();

    seq.wait_idle().await;
    assert_eq!(backend.payloads(), (0u8..10).map(|i| vec![i]).collect::<Vec<_>>());
    assert!(backend.requests.lock().iter().all(|r| r.device_name == "speakers"));
}

#[tokio::test]
async fn empty_device_name_is_still_queued() {
    let backend = RecordingBackend::new();
    let seq = VoiceClipSequencer::new(backend.clone(), Handle::current());
    seq.enqueue(vec![9], VoiceClipOptions::new(""));
    seq.wait_idle().await;
    assert_eq!(backend.payloads(), vec![vec![9]]);
}
